//! # Size Governor
//!
//! Keeps the encoded call stack under a byte ceiling by evicting the oldest
//! frames that the current dispatch did not touch.
//!
//! Eviction is lossy. Return handlers of evicted frames become unreachable, so
//! a stale token that relied on them may later fail with `EmptyStack` or
//! `NotFound`.

use waystack_core::{CallStack, Codec, NavResult};

/// Result of fitting a stack to the ceiling.
#[derive(Debug, Clone)]
pub struct Governed {
    pub stack: CallStack,
    /// Size of the encoded stack after eviction.
    pub encoded_len: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SizeGovernor {
    ceiling: Option<usize>,
    codec: Codec,
}

impl SizeGovernor {
    pub fn new(ceiling: Option<usize>, codec: Codec) -> Self {
        Self { ceiling, codec }
    }

    pub fn measure(&self, stack: &CallStack) -> NavResult<usize> {
        Ok(self.codec.encode_stack(stack)?.len())
    }

    /// Evicts bottom frames until the stack fits, never touching the top
    /// `protected` frames. The top frame is always protected.
    ///
    /// When only protected frames remain the stack is returned over budget.
    pub fn fit(&self, mut stack: CallStack, protected: usize) -> NavResult<Governed> {
        let protected = protected.max(1);
        let mut encoded_len = self.measure(&stack)?;
        let mut evicted = 0;

        let Some(ceiling) = self.ceiling else {
            return Ok(Governed {
                stack,
                encoded_len,
                evicted,
            });
        };

        while encoded_len > ceiling {
            if stack.len() <= protected {
                tracing::warn!(
                    waystack.depth = stack.len(),
                    encoded_len,
                    ceiling,
                    "stack over ceiling with only frames from the current dispatch left"
                );
                break;
            }
            evicted += stack.evict_bottom(1);
            encoded_len = self.measure(&stack)?;
        }

        if evicted > 0 {
            tracing::info!(
                evicted,
                waystack.depth = stack.len(),
                encoded_len,
                ceiling,
                "evicted oldest frames to fit stack ceiling"
            );
        }

        Ok(Governed {
            stack,
            encoded_len,
            evicted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waystack_core::{Context, Frame};

    /// Frames whose contexts do not compress away.
    fn frame(view: &str, seed: u64) -> Frame {
        let noise: Vec<i64> = (0..200)
            .map(|i| ((seed * 7919 + i * 104_729) % 1_000_003) as i64)
            .collect();
        Frame::new(view, Context::new().with("noise", noise))
    }

    fn five_frames() -> CallStack {
        let frames = (0..5).map(|i| frame(&format!("v{i}"), i)).collect();
        CallStack::from_frames(frames).unwrap()
    }

    #[test]
    fn test_no_ceiling_keeps_everything() {
        let governed = SizeGovernor::new(None, Codec::default())
            .fit(five_frames(), 1)
            .unwrap();
        assert_eq!(governed.evicted, 0);
        assert_eq!(governed.stack.len(), 5);
    }

    #[test]
    fn test_evicts_from_bottom_first() {
        let codec = Codec::default();
        let full = five_frames();
        let top_three = CallStack::from_frames(full.frames()[2..].to_vec()).unwrap();
        let ceiling = codec.encode_stack(&top_three).unwrap().len();

        let governed = SizeGovernor::new(Some(ceiling), codec)
            .fit(full.clone(), 2)
            .unwrap();

        assert_eq!(governed.evicted, 2);
        assert_eq!(governed.stack.frames(), &full.frames()[2..]);
        assert!(governed.encoded_len <= ceiling);
    }

    #[test]
    fn test_never_evicts_protected_frames() {
        let full = five_frames();
        let governed = SizeGovernor::new(Some(1), Codec::default())
            .fit(full.clone(), 2)
            .unwrap();

        assert_eq!(governed.evicted, 3);
        assert_eq!(governed.stack.frames(), &full.frames()[3..]);
    }

    #[test]
    fn test_top_frame_always_protected() {
        let governed = SizeGovernor::new(Some(1), Codec::default())
            .fit(five_frames(), 0)
            .unwrap();
        assert_eq!(governed.stack.len(), 1);
        assert_eq!(governed.stack.top().view.as_str(), "v4");
    }
}
