//! # Signer: authenticated (optionally encrypted) envelopes
//!
//! Tags are HMAC-SHA256 over the stored payload. When a [`Cipher`] is
//! configured the payload is encrypted first and the tag covers the
//! ciphertext (encrypt-then-MAC).
//!
//! `open` fails closed: anything short of a verified tag and a successful
//! decryption is a [`NavError::Signature`].

use crate::error::{NavError, NavResult};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;

/// Length of an HMAC-SHA256 tag.
pub const TAG_LEN: usize = 32;

/// Payload plus the tag that authenticates it.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub payload: Vec<u8>,
    pub tag: Vec<u8>,
}

impl SignedEnvelope {
    /// Wire form: `tag ++ payload`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tag.len() + self.payload.len());
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> NavResult<Self> {
        if bytes.len() < TAG_LEN {
            return Err(NavError::Signature("truncated envelope".into()));
        }
        let (tag, payload) = bytes.split_at(TAG_LEN);
        Ok(Self {
            payload: payload.to_vec(),
            tag: tag.to_vec(),
        })
    }
}

impl fmt::Debug for SignedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedEnvelope")
            .field("payload_len", &self.payload.len())
            .field("tag_len", &self.tag.len())
            .finish()
    }
}

/// Tags `bytes` with `key`.
pub fn seal(bytes: &[u8], key: &hmac::Key) -> SignedEnvelope {
    SignedEnvelope {
        payload: bytes.to_vec(),
        tag: hmac::sign(key, bytes).as_ref().to_vec(),
    }
}

/// Verifies the tag and returns the payload.
pub fn open(envelope: &SignedEnvelope, key: &hmac::Key) -> NavResult<Vec<u8>> {
    hmac::verify(key, &envelope.payload, &envelope.tag)
        .map_err(|_| NavError::Signature("tag mismatch".into()))?;
    Ok(envelope.payload.clone())
}

// ============== Key Sources ==============

/// Chooses the signing key for a request.
pub trait KeySource: Send + Sync + 'static {
    fn signing_key(&self, session: Option<&str>) -> NavResult<hmac::Key>;
}

/// One key for every client. Tokens can be bookmarked and shared.
#[derive(Clone)]
pub struct GlobalKey {
    key: hmac::Key,
}

impl GlobalKey {
    pub fn new(secret: &[u8]) -> NavResult<Self> {
        if secret.is_empty() {
            return Err(NavError::Config("signing secret must not be empty".into()));
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }
}

impl KeySource for GlobalKey {
    fn signing_key(&self, _session: Option<&str>) -> NavResult<hmac::Key> {
        Ok(self.key.clone())
    }
}

/// A key per session, derived as `HMAC(master, session id)`.
///
/// Tokens stop verifying once the session changes, which blocks cross-session
/// replay at the cost of bookmarkability.
#[derive(Clone)]
pub struct SessionKeys {
    master: hmac::Key,
}

impl SessionKeys {
    const LABEL: &'static [u8] = b"waystack/session-key/";

    pub fn new(master_secret: &[u8]) -> NavResult<Self> {
        if master_secret.is_empty() {
            return Err(NavError::Config("master secret must not be empty".into()));
        }
        Ok(Self {
            master: hmac::Key::new(hmac::HMAC_SHA256, master_secret),
        })
    }
}

impl KeySource for SessionKeys {
    fn signing_key(&self, session: Option<&str>) -> NavResult<hmac::Key> {
        let session = session
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NavError::Signature("no session id for per-session key".into()))?;

        let mut ctx = hmac::Context::with_key(&self.master);
        ctx.update(Self::LABEL);
        ctx.update(session.as_bytes());
        let derived = ctx.sign();
        Ok(hmac::Key::new(hmac::HMAC_SHA256, derived.as_ref()))
    }
}

// ============== Ciphers ==============

/// Pluggable payload encryption.
pub trait Cipher: Send + Sync + 'static {
    fn encrypt(&self, plaintext: &[u8]) -> NavResult<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> NavResult<Vec<u8>>;
}

/// ChaCha20-Poly1305 with a random nonce prepended to each ciphertext.
pub struct AeadCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AeadCipher {
    pub const KEY_LEN: usize = 32;

    pub fn new(key: &[u8]) -> NavResult<Self> {
        let unbound = UnboundKey::new(&aead::CHACHA20_POLY1305, key).map_err(|_| {
            NavError::Config(format!("cipher key must be {} bytes", Self::KEY_LEN))
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }
}

impl Cipher for AeadCipher {
    fn encrypt(&self, plaintext: &[u8]) -> NavResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; aead::NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| NavError::Signature("nonce generation failed".into()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| NavError::Signature("encryption failed".into()))?;

        let mut out = nonce_bytes.to_vec();
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> NavResult<Vec<u8>> {
        if ciphertext.len() < aead::NONCE_LEN {
            return Err(NavError::Signature("ciphertext too short".into()));
        }
        let (nonce, sealed) = ciphertext.split_at(aead::NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| NavError::Signature("bad nonce".into()))?;

        let mut in_out = sealed.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| NavError::Signature("decryption failed".into()))?;
        Ok(plain.to_vec())
    }
}

// ============== Signer ==============

/// Seals and opens envelopes with a key source and an optional cipher.
#[derive(Clone)]
pub struct Signer {
    keys: Arc<dyn KeySource>,
    cipher: Option<Arc<dyn Cipher>>,
}

impl Signer {
    pub fn new(keys: impl KeySource) -> Self {
        Self {
            keys: Arc::new(keys),
            cipher: None,
        }
    }

    pub fn with_cipher(mut self, cipher: impl Cipher) -> Self {
        self.cipher = Some(Arc::new(cipher));
        self
    }

    pub fn encrypts(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn seal(&self, bytes: &[u8], session: Option<&str>) -> NavResult<SignedEnvelope> {
        let key = self.keys.signing_key(session)?;
        match &self.cipher {
            Some(cipher) => Ok(seal(&cipher.encrypt(bytes)?, &key)),
            None => Ok(seal(bytes, &key)),
        }
    }

    pub fn open(&self, envelope: &SignedEnvelope, session: Option<&str>) -> NavResult<Vec<u8>> {
        let key = self.keys.signing_key(session)?;
        let payload = open(envelope, &key)?;
        match &self.cipher {
            Some(cipher) => cipher.decrypt(&payload),
            None => Ok(payload),
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("encrypts", &self.encrypts())
            .finish_non_exhaustive()
    }
}
