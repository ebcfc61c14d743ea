//! Cryptographic collaborators used by the TLS 1.3 engine.
//!
//! The engine depends only on the traits in [`provider`]. The
//! [`rust_crypto`] module is the default implementation.

mod aead;
pub mod provider;
pub mod rust_crypto;
mod validation;

pub use aead::{Aad, Nonce, IV_LEN, TAG_LEN};

pub use provider::{
    ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider,
};
pub use provider::{CertificateError, CertificateVerifier, HkdfProvider, HmacProvider};
pub use provider::SignatureError;
pub use provider::{KeyProvider, SecureRandom, SignatureVerifier, SigningKey};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

// Re-export shared types for provider trait implementations
pub use crate::buffer::Buf;
pub use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureScheme};
