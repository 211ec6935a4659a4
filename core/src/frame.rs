//! Frames, call stacks, and the action references carried by tokens.

use crate::error::{NavError, NavResult};
use crate::value::{Context, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

registry_id!(
    /// Identifies a registered render function.
    ViewId
);
registry_id!(
    /// Identifies a registered action callback.
    ActionId
);
registry_id!(
    /// Identifies a registered return handler.
    HandlerId
);

/// One level of navigation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub view: ViewId,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    /// Handler to run against the frame below when this frame returns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_return: Option<HandlerId>,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub return_context: Context,
}

impl Frame {
    pub fn new(view: impl Into<ViewId>, context: Context) -> Self {
        Self {
            view: view.into(),
            context,
            on_return: None,
            return_context: Context::new(),
        }
    }

    /// A frame pushed by `call`, remembering how to hand control back.
    pub fn called(
        view: impl Into<ViewId>,
        context: Context,
        on_return: Option<HandlerId>,
        return_context: Context,
    ) -> Self {
        Self {
            view: view.into(),
            context,
            on_return,
            return_context,
        }
    }
}

/// Ordered frames, bottom first. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CallStack(Vec<Frame>);

impl CallStack {
    /// A fresh single-frame stack.
    pub fn new(root: Frame) -> Self {
        Self(vec![root])
    }

    /// Builds a stack from frames, rejecting an empty sequence.
    pub fn from_frames(frames: Vec<Frame>) -> NavResult<Self> {
        if frames.is_empty() {
            return Err(NavError::Codec("call stack has no frames".into()));
        }
        Ok(Self(frames))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Stacks are never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn top(&self) -> &Frame {
        // Non-empty by construction.
        &self.0[self.0.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut Frame {
        let last = self.0.len() - 1;
        &mut self.0[last]
    }

    /// Replaces the top frame, returning the old one.
    pub fn replace_top(&mut self, frame: Frame) -> Frame {
        std::mem::replace(self.top_mut(), frame)
    }

    pub fn push(&mut self, frame: Frame) {
        self.0.push(frame);
    }

    /// Pops the top frame. The outermost frame cannot be popped.
    pub fn pop(&mut self) -> NavResult<Frame> {
        if self.0.len() <= 1 {
            return Err(NavError::EmptyStack);
        }
        self.0.pop().ok_or(NavError::EmptyStack)
    }

    /// Drops the `count` bottom-most frames. At least one frame always remains.
    pub fn evict_bottom(&mut self, count: usize) -> usize {
        let count = count.min(self.0.len().saturating_sub(1));
        self.0.drain(..count);
        count
    }
}

impl<'de> Deserialize<'de> for CallStack {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let frames = Vec::<Frame>::deserialize(deserializer)?;
        CallStack::from_frames(frames).map_err(serde::de::Error::custom)
    }
}

/// The action a token asks the server to apply to its stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Re-render the current state.
    Noop,
    /// Run a registered action callback after merging `overrides` into the top context.
    Invoke {
        action: ActionId,
        #[serde(default, skip_serializing_if = "Context::is_empty")]
        overrides: Context,
    },
    Goto {
        view: ViewId,
        #[serde(default, skip_serializing_if = "Context::is_empty")]
        context: Context,
    },
    Call {
        view: ViewId,
        #[serde(default, skip_serializing_if = "Context::is_empty")]
        context: Context,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_return: Option<HandlerId>,
        #[serde(default, skip_serializing_if = "Context::is_empty")]
        return_context: Context,
    },
    Return {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        value: Value,
    },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Noop => "noop",
            Action::Invoke { .. } => "invoke",
            Action::Goto { .. } => "goto",
            Action::Call { .. } => "call",
            Action::Return { .. } => "return",
        }
    }
}

/// The signed payload of a token: a stack plus the action to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub stack: CallStack,
    pub action: Action,
}
