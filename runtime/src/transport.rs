//! Transport - How a sealed envelope reaches the client and comes back
//!
//! - **GET**: base64url envelope in a query parameter, up to a length threshold
//! - **POST**: the same token in a hidden form field
//! - **Database**: the envelope lives in a [`BlobStore`]; the client only sees an id
//!
//! Which backend carries a given envelope depends only on the configured kind
//! and the token length.

use crate::store::BlobStore;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::fmt;
use std::sync::Arc;
use waystack_core::{BackendKind, NavConfig, NavError, NavResult, SignedEnvelope};

/// Length of a database token (uuid v4, simple hex form).
pub const STORED_ID_LEN: usize = 32;

/// An issued token and the channel it travels on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// URL query parameter.
    Get(String),
    /// Hidden form field.
    Post(String),
    /// Opaque identifier of a stored envelope, sent as a query parameter.
    Stored(String),
}

impl Token {
    pub fn as_str(&self) -> &str {
        match self {
            Token::Get(t) | Token::Post(t) | Token::Stored(t) => t,
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            Token::Get(_) => BackendKind::Get,
            Token::Post(_) => BackendKind::Post,
            Token::Stored(_) => BackendKind::Database,
        }
    }
}

/// A database write generated while rendering, flushed before the response.
#[derive(Clone)]
pub struct StagedWrite {
    pub id: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for StagedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedWrite")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// base64url (no padding) of the envelope wire form.
pub fn encode_wire_token(envelope: &SignedEnvelope) -> String {
    URL_SAFE_NO_PAD.encode(envelope.to_bytes())
}

/// Inverse of [`encode_wire_token`]. Undecodable input fails closed as a signature error.
pub fn decode_wire_token(token: &str) -> NavResult<SignedEnvelope> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| NavError::Signature(format!("malformed token: {e}")))?;
    SignedEnvelope::from_bytes(&bytes)
}

fn is_stored_id(token: &str) -> bool {
    token.len() == STORED_ID_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Clone)]
pub struct Transport {
    kind: BackendKind,
    get_threshold: usize,
    store: Option<Arc<dyn BlobStore>>,
}

impl Transport {
    /// The Database backend needs a store; the others ignore it.
    pub fn new(config: &NavConfig, store: Option<Arc<dyn BlobStore>>) -> NavResult<Self> {
        if config.backend == BackendKind::Database && store.is_none() {
            return Err(NavError::Config(
                "database backend configured without a blob store".into(),
            ));
        }
        Ok(Self {
            kind: config.backend,
            get_threshold: config.get_threshold,
            store,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Backend for a token of `token_len` characters.
    pub fn choose(&self, token_len: usize) -> BackendKind {
        match self.kind {
            BackendKind::Database => BackendKind::Database,
            BackendKind::Post => BackendKind::Post,
            BackendKind::Get if token_len > self.get_threshold => BackendKind::Post,
            BackendKind::Get => BackendKind::Get,
        }
    }

    /// Database publish: mint an identifier and stage the write.
    fn publish_stored(&self, envelope: &SignedEnvelope, staged: &mut Vec<StagedWrite>) -> Token {
        let id = uuid::Uuid::new_v4().simple().to_string();
        staged.push(StagedWrite {
            id: id.clone(),
            bytes: envelope.to_bytes(),
        });
        Token::Stored(id)
    }

    /// Publishes on the backend [`Transport::choose`] picks for this envelope,
    /// falling back from GET to POST when the token is too long for a URL.
    pub fn publish(&self, envelope: &SignedEnvelope, staged: &mut Vec<StagedWrite>) -> Token {
        let token = encode_wire_token(envelope);
        match self.choose(token.len()) {
            BackendKind::Database => self.publish_stored(envelope, staged),
            BackendKind::Get => Token::Get(token),
            BackendKind::Post => {
                if self.kind == BackendKind::Get {
                    tracing::debug!(
                        waystack.token_len = token.len(),
                        threshold = self.get_threshold,
                        "GET token over threshold, falling back to POST"
                    );
                }
                Token::Post(token)
            }
        }
    }

    /// Turns an inbound token back into an envelope.
    pub async fn resolve(&self, token: &str) -> NavResult<SignedEnvelope> {
        match self.kind {
            BackendKind::Get | BackendKind::Post => decode_wire_token(token),
            BackendKind::Database => {
                if !is_stored_id(token) {
                    return Err(NavError::NotFound(format!(
                        "`{}` is not a state identifier",
                        token.chars().take(STORED_ID_LEN + 4).collect::<String>()
                    )));
                }
                let bytes = self.store()?.get(token).await?;
                SignedEnvelope::from_bytes(&bytes)
            }
        }
    }

    /// Writes every staged blob. A no-op for client-side backends.
    pub async fn flush(&self, staged: Vec<StagedWrite>) -> NavResult<()> {
        if staged.is_empty() {
            return Ok(());
        }
        let store = self.store()?;
        let count = staged.len();
        for write in staged {
            store.put(&write.id, &write.bytes).await?;
        }
        tracing::debug!(count, "flushed staged state blobs");
        Ok(())
    }

    fn store(&self) -> NavResult<&Arc<dyn BlobStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| NavError::Config("no blob store attached".into()))
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .field("get_threshold", &self.get_threshold)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
