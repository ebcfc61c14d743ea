//! RustCrypto cryptographic provider implementation for timpl.
//!
//! A pure Rust backend built on crates from the
//! [RustCrypto](https://github.com/RustCrypto) organization, plus
//! `x25519-dalek`/`ed25519-dalek` for the Edwards curves.
//!
//! # Usage
//!
//! ```
//! use timpl::ClientConfig;
//! use timpl::crypto::rust_crypto;
//!
//! let config = ClientConfig::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .dangerous_skip_verification(true)
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

mod cipher_suite;
mod hash;
mod hkdf;
mod hmac;
mod kx_group;
mod random;
mod sign;
mod verify;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// - `TLS_AES_128_GCM_SHA256` (0x1301)
/// - `TLS_AES_256_GCM_SHA384` (0x1302)
/// - `TLS_CHACHA20_POLY1305_SHA256` (0x1303)
///
/// # Supported Key Exchange Groups
///
/// - `x25519`
/// - `secp256r1` (P-256)
/// - `secp384r1` (P-384)
///
/// # Supported Signature Schemes
///
/// - `ecdsa_secp256r1_sha256`, `ecdsa_secp384r1_sha384`
/// - `ed25519`
/// - `rsa_pss_rsae_sha256/384/512`
///
/// # Key Formats
///
/// The key provider loads private keys as PKCS#8 DER, PKCS#1 DER (RSA),
/// SEC1 DER (EC) or any of those PEM-armoured.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        certificate_verification: &verify::CERTIFICATE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        hkdf_provider: &hkdf::HKDF_PROVIDER,
    }
}
