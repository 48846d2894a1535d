//! Encoding of values written to the backend.
//!
//! `Plain` stores the JSON as-is and offers no confidentiality. `Sealed`
//! encrypts it with XChaCha20-Poly1305 under a passphrase-derived key.

use std::fmt;

use housing_shared::crypto::{self, SymmetricKey};

use crate::error::Result;

#[derive(Clone, Default)]
pub enum Codec {
    #[default]
    Plain,
    Sealed(SymmetricKey),
}

impl Codec {
    pub fn sealed(passphrase: &str) -> Self {
        Self::Sealed(crypto::derive_vault_key(passphrase.as_bytes()))
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }

    pub fn encode(&self, json: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::Plain => Ok(json),
            Self::Sealed(key) => Ok(crypto::encrypt(key, &json)?),
        }
    }

    pub fn decode(&self, stored: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::Plain => Ok(stored),
            Self::Sealed(key) => Ok(crypto::decrypt(key, &stored)?),
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Sealed(_) => f.write_str("Sealed(..)"),
        }
    }
}
