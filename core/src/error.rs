use thiserror::Error;

pub type NavResult<T> = Result<T, NavError>;

/// Every way a navigation request can fail.
///
/// All variants are terminal for the current request and none are retried.
#[derive(Error, Debug)]
pub enum NavError {
    /// Tag mismatch, wrong or missing key, or failed decryption.
    #[error("signature check failed: {0}")]
    Signature(String),

    /// Payload was authentic but could not be decoded (or could not be encoded).
    #[error("codec error: {0}")]
    Codec(String),

    /// A stored state identifier is unknown or was purged.
    #[error("state not found: {0}")]
    NotFound(String),

    /// A navigation primitive was used where it is not allowed,
    /// or a token named something the registry does not know.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// `return` was dispatched on a single-frame stack.
    #[error("cannot return from the outermost frame")]
    EmptyStack,

    /// The blob store failed for a reason other than a missing identifier.
    #[error("blob store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl NavError {
    /// Errors after which the request continues as a brand-new session.
    pub fn resets_session(&self) -> bool {
        matches!(self, NavError::Signature(_) | NavError::Codec(_))
    }

    /// Errors caused by application code rather than by the client or the store.
    ///
    /// A `Codec` error that reaches the host comes from encoding, i.e. an
    /// action left a value in a context that cannot be carried in a token.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            NavError::ProtocolViolation(_) | NavError::EmptyStack | NavError::Codec(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NavError::Signature(_) => "signature",
            NavError::Codec(_) => "codec",
            NavError::NotFound(_) => "not_found",
            NavError::ProtocolViolation(_) => "protocol_violation",
            NavError::EmptyStack => "empty_stack",
            NavError::Store(_) => "store",
            NavError::Config(_) => "config",
        }
    }
}
