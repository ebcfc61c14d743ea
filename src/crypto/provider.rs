//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The protocol core never calls a primitive directly. Everything goes
//! through a [`CryptoProvider`], which holds static references to trait
//! objects, one per capability:
//!
//! - **Cipher Suites** ([`SupportedCipherSuite`]): factory for AEAD ciphers
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): factory for ECDHE key exchanges
//! - **Signature Verification** ([`SignatureVerifier`]): verify a signature with a certificate's key
//! - **Certificate Verification** ([`CertificateVerifier`]): chain, validity and hostname checks
//! - **Key Provider** ([`KeyProvider`]): parse and load private keys
//! - **Secure Random** ([`SecureRandom`]): cryptographically secure RNG
//! - **Hash Provider** ([`HashProvider`]): factory for hash contexts
//! - **HMAC Provider** ([`HmacProvider`]): Finished MACs and cookies
//! - **HKDF Provider** ([`HkdfProvider`]): extract and expand for the key schedule
//!
//! There is no process-wide default. A provider is handed to each
//! configuration explicitly, see [`crate::ClientConfig::builder`].
//!
//! # Implementing a Custom Provider
//!
//! 1. Implement the required traits for your crypto backend
//! 2. Create static instances of your implementations
//! 3. Build a [`CryptoProvider`] struct with references to those statics
//!
//! ```
//! use timpl::crypto::{Aad, Buf, Cipher, CipherSuite, HashAlgorithm, Nonce, SupportedCipherSuite};
//!
//! #[derive(Debug)]
//! struct MyCipher;
//!
//! impl Cipher for MyCipher {
//!     fn encrypt(&mut self, _: &mut Buf, _: Aad, _: Nonce) -> Result<(), String> {
//!         Ok(())
//!     }
//!     fn decrypt(&mut self, _: &mut Buf, _: Aad, _: Nonce) -> Result<(), String> {
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MySuite;
//!
//! impl SupportedCipherSuite for MySuite {
//!     fn suite(&self) -> CipherSuite {
//!         CipherSuite::AES_128_GCM_SHA256
//!     }
//!     fn hash_algorithm(&self) -> HashAlgorithm {
//!         HashAlgorithm::SHA256
//!     }
//!     fn key_len(&self) -> usize {
//!         16
//!     }
//!     fn create_cipher(&self, _key: &[u8]) -> Result<Box<dyn Cipher>, String> {
//!         Ok(Box::new(MyCipher))
//!     }
//! }
//!
//! static MY_SUITE: MySuite = MySuite;
//! static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] = &[&MY_SUITE];
//! ```
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe` to ensure
//! safe usage across threads and panic boundaries.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::time::SystemTime;

use thiserror::Error;

use crate::alert::AlertDescription;
use crate::buffer::Buf;
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureScheme};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

/// Blanket implementation: any type satisfying the bounds implements [`CryptoSafe`].
impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing authentication tag.
    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// Private key able to produce CertificateVerify signatures.
pub trait SigningKey: CryptoSafe {
    /// Sign `data` with `scheme`, writing the wire encoding of the signature.
    fn sign(&mut self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Schemes this key can sign with, most preferred first.
    fn schemes(&self) -> &'static [SignatureScheme];
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Get the public key for this exchange.
    fn pub_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Get the named group for this exchange.
    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Cipher suite support (factory for Cipher instances).
///
/// TLS 1.3 cipher suites only specify the AEAD algorithm and hash
/// function. Key exchange is negotiated separately.
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Hash algorithm used by this suite.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// AEAD key length in bytes.
    fn key_len(&self) -> usize;

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair from `random`.
    /// The provided `buf` will be used to store the public key.
    fn start_exchange(
        &self,
        buf: Buf,
        random: &dyn SecureRandom,
    ) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a signature on data using the key of a DER-encoded X.509 certificate.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), SignatureError>;
}

/// Why a CertificateVerify signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The certificate carrying the key is unusable.
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// The signature does not match the signed content.
    #[error("{0}")]
    Mismatch(String),
}

/// Why a certificate chain was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("malformed certificate: {0}")]
    BadEncoding(String),

    #[error("certificate expired or not yet valid")]
    Expired,

    #[error("issuer not trusted")]
    UnknownIssuer,

    #[error("certificate not valid for {0}")]
    NameMismatch(String),

    #[error("bad certificate signature: {0}")]
    BadSignature(String),

    #[error("unsupported certificate: {0}")]
    Unsupported(String),
}

impl CertificateError {
    pub fn alert_description(&self) -> AlertDescription {
        match self {
            CertificateError::Expired => AlertDescription::CertificateExpired,
            CertificateError::UnknownIssuer => AlertDescription::UnknownCa,
            CertificateError::Unsupported(_) => AlertDescription::UnsupportedCertificate,
            CertificateError::BadEncoding(_)
            | CertificateError::NameMismatch(_)
            | CertificateError::BadSignature(_) => AlertDescription::BadCertificate,
        }
    }
}

/// X.509 path validation.
pub trait CertificateVerifier: CryptoSafe {
    /// Validate `chain` (end-entity first) against `trust_anchors`.
    ///
    /// When `server_name` is given the end-entity certificate must be valid
    /// for that DNS name. Every certificate must be valid at `now`.
    fn verify_chain(
        &self,
        chain: &[&[u8]],
        trust_anchors: &[Buf],
        server_name: Option<&str>,
        now: SystemTime,
    ) -> Result<(), CertificateError>;
}

/// Private key parser (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;
}

/// HMAC provider, used for Finished and HelloRetryRequest cookies.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC-`hash`(key, data) into `out`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;
}

/// HKDF provider (RFC 5869).
pub trait HkdfProvider: CryptoSafe {
    /// HKDF-Extract: PRK = HKDF-Extract(salt, IKM)
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// HKDF-Expand: OKM = HKDF-Expand(PRK, info, L)
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for TLS 1.3 connections.
///
/// The provider uses static trait object references (`&'static dyn Trait`),
/// so it is cheap to clone into every configuration.
///
/// ```
/// use timpl::crypto::{rust_crypto, CryptoProvider};
///
/// let provider = rust_crypto::default_provider();
///
/// // Restrict to a single cipher suite, reuse everything else.
/// let custom = CryptoProvider {
///     cipher_suites: &provider.cipher_suites[..1],
///     ..provider.clone()
/// };
/// assert_eq!(custom.cipher_suites.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported AEAD cipher suites.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported key exchange groups (X25519, P-256, P-384).
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for CertificateVerify.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Chain validation for peer certificates.
    pub certificate_verification: &'static dyn CertificateVerifier,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for transcript hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider.
    pub hmac_provider: &'static dyn HmacProvider,

    /// HKDF provider for the key schedule.
    pub hkdf_provider: &'static dyn HkdfProvider,
}

impl CryptoProvider {
    /// Look up the implementation of a negotiated cipher suite.
    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.supported_cipher_suites().find(|cs| cs.suite() == suite)
    }

    /// Look up the implementation of a key exchange group.
    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.supported_kx_groups().find(|kx| kx.name() == group)
    }
}
