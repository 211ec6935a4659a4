//! Protocol-agnostic core of Waystack: the closed value model, frames and call
//! stacks, the codec, the signer, the error taxonomy, and configuration.

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod signer;
pub mod telemetry;
pub mod value;

#[cfg(test)]
mod strategies;

pub use codec::Codec;
pub use config::{BackendKind, Keying, Mode, NavConfig};
pub use error::{NavError, NavResult};
pub use frame::{Action, ActionId, CallStack, Frame, HandlerId, Transfer, ViewId};
pub use signer::{AeadCipher, Cipher, GlobalKey, KeySource, SessionKeys, SignedEnvelope, Signer};
pub use value::{Context, Value};

pub mod prelude {
    pub use crate::config::{BackendKind, Mode, NavConfig};
    pub use crate::error::{NavError, NavResult};
    pub use crate::frame::{Action, ActionId, CallStack, Frame, HandlerId, Transfer, ViewId};
    pub use crate::signer::{GlobalKey, SessionKeys, Signer};
    pub use crate::value::{Context, Value};
}
