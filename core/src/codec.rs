//! # Codec: call stacks to bytes and back
//!
//! Wire layout: `[FORMAT_VERSION] ++ deflate(json)`.
//!
//! Decoding only ever produces the closed value model, and the inflated size is
//! capped before any JSON is parsed. Encoding refuses anything decoding could
//! not reproduce exactly (non-finite floats, nesting past [`MAX_NESTING`]), so
//! a stack that was published can always be read back.

use crate::error::{NavError, NavResult};
use crate::frame::{Action, CallStack, Frame, Transfer};
use crate::value::{Context, MAX_NESTING};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

pub const FORMAT_VERSION: u8 = 1;

/// Default cap on the inflated payload size.
pub const DEFAULT_MAX_INFLATED: usize = 1024 * 1024;

/// Stateless encoder/decoder with a bounded inflate size.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    max_inflated: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INFLATED)
    }
}

impl Codec {
    pub fn new(max_inflated: usize) -> Self {
        Self { max_inflated }
    }

    pub fn encode_stack(&self, stack: &CallStack) -> NavResult<Vec<u8>> {
        check_stack(stack)?;
        encode_value(stack)
    }

    pub fn decode_stack(&self, bytes: &[u8]) -> NavResult<CallStack> {
        self.decode_value(bytes)
    }

    pub fn encode_transfer(&self, transfer: &Transfer) -> NavResult<Vec<u8>> {
        self.encode_transfer_parts(&transfer.stack, &transfer.action)
    }

    pub fn decode_transfer(&self, bytes: &[u8]) -> NavResult<Transfer> {
        self.decode_value(bytes)
    }

    /// Same bytes as [`Codec::encode_transfer`], without cloning the stack.
    pub fn encode_transfer_parts(&self, stack: &CallStack, action: &Action) -> NavResult<Vec<u8>> {
        check_stack(stack)?;
        check_action(action)?;
        encode_value(&TransferRef { stack, action })
    }

    fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> NavResult<T> {
        let (version, body) = bytes
            .split_first()
            .ok_or_else(|| NavError::Codec("empty payload".into()))?;
        if *version != FORMAT_VERSION {
            return Err(NavError::Codec(format!(
                "unsupported format version {version}"
            )));
        }

        let mut json = Vec::new();
        DeflateDecoder::new(body)
            .take(self.max_inflated as u64 + 1)
            .read_to_end(&mut json)
            .map_err(|e| NavError::Codec(format!("inflate failed: {e}")))?;
        if json.len() > self.max_inflated {
            return Err(NavError::Codec(format!(
                "payload inflates beyond {} bytes",
                self.max_inflated
            )));
        }

        serde_json::from_slice(&json).map_err(|e| NavError::Codec(e.to_string()))
    }
}

#[derive(Serialize)]
struct TransferRef<'a> {
    stack: &'a CallStack,
    action: &'a Action,
}

fn check_context(ctx: &Context, what: impl FnOnce() -> String) -> NavResult<()> {
    ctx.check_encodable()
        .map_err(|e| NavError::Codec(format!("{} cannot be encoded: {e}", what())))
}

fn check_frame(i: usize, frame: &Frame) -> NavResult<()> {
    check_context(&frame.context, || format!("frame {i} (`{}`) context", frame.view))?;
    check_context(&frame.return_context, || {
        format!("frame {i} (`{}`) return context", frame.view)
    })
}

fn check_stack(stack: &CallStack) -> NavResult<()> {
    stack
        .frames()
        .iter()
        .enumerate()
        .try_for_each(|(i, frame)| check_frame(i, frame))
}

fn check_action(action: &Action) -> NavResult<()> {
    let what = || format!("`{}` action", action.label());
    match action {
        Action::Noop => Ok(()),
        Action::Invoke { overrides, .. } => check_context(overrides, what),
        Action::Goto { context, .. } => check_context(context, what),
        Action::Call {
            context,
            return_context,
            ..
        } => {
            check_context(context, what)?;
            check_context(return_context, what)
        }
        Action::Return { value } => value
            .check_encodable()
            .map_err(|e| NavError::Codec(format!("{} cannot be encoded: {e}", what()))),
    }
}

fn encode_value<T: Serialize>(value: &T) -> NavResult<Vec<u8>> {
    let json = serde_json::to_vec(value).map_err(|e| NavError::Codec(e.to_string()))?;

    let mut out = vec![FORMAT_VERSION];
    let mut encoder = DeflateEncoder::new(&mut out, Compression::fast());
    encoder
        .write_all(&json)
        .map_err(|e| NavError::Codec(format!("deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| NavError::Codec(format!("deflate failed: {e}")))?;
    Ok(out)
}
