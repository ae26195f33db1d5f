//! Credential-gated payload access
//!
//! The payload cipher is an opaque seam: this crate defines the contract and
//! ships no working implementation. Callers must hold a well-formed
//! credential before the cipher is consulted at all.

use std::fmt;

use ft_error::{FwtapError, Result};
use tracing::debug;

use crate::constants::credential;

/// A 256-bit key, supplied as 64 hex characters
#[derive(Clone, PartialEq, Eq)]
pub struct Credential([u8; credential::KEY_LEN / 2]);

impl Credential {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.len() != credential::KEY_LEN {
            return Err(FwtapError::AuthenticationFailure(format!(
                "key must be {} characters, got {}",
                credential::KEY_LEN,
                input.len()
            )));
        }
        let mut key = [0u8; credential::KEY_LEN / 2];
        hex::decode_to_slice(input, &mut key).map_err(|e| {
            FwtapError::AuthenticationFailure(format!("key must be hexadecimal: {}", e))
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Never print key material
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Output of a successful decrypt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedPayload(pub Vec<u8>);

/// Turns an encrypted payload into something usable
pub trait PayloadCipher {
    fn decrypt(&self, credential: &Credential, payload: &[u8]) -> Result<DecryptedPayload>;
}

/// Placeholder cipher for builds with no real implementation linked in
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedCipher;

impl PayloadCipher for UnlinkedCipher {
    fn decrypt(&self, _credential: &Credential, _payload: &[u8]) -> Result<DecryptedPayload> {
        Err(FwtapError::AuthenticationFailure(
            "no payload cipher is linked into this build".into(),
        ))
    }
}

/// Whether the caller holds a credential
#[derive(Debug, Clone)]
pub enum CapabilityGate {
    Unavailable,
    Available(Credential),
}

impl CapabilityGate {
    /// Gate from optional user input; malformed input is an error, not `Unavailable`
    pub fn from_input(input: Option<&str>) -> Result<Self> {
        match input {
            None => Ok(Self::Unavailable),
            Some(raw) => Ok(Self::Available(Credential::parse(raw)?)),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn apply(&self, cipher: &dyn PayloadCipher, payload: &[u8]) -> Result<DecryptedPayload> {
        match self {
            Self::Unavailable => Err(FwtapError::CredentialRequired),
            Self::Available(credential) => {
                debug!(payload_len = payload.len(), "Invoking payload cipher");
                cipher.decrypt(credential, payload)
            }
        }
    }
}
