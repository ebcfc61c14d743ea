//! Validation and filtering for crypto providers.
//!
//! A provider handed to a configuration is checked once, against known
//! answers, before any connection uses it.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, SupportedCipherSuite, SupportedKxGroup};
use crate::types::HashAlgorithm;
use crate::Error;

impl CryptoProvider {
    /// Returns an iterator over the provider's cipher suites that this crate
    /// knows how to run.
    pub fn supported_cipher_suites(
        &self,
    ) -> impl Iterator<Item = &'static dyn SupportedCipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .filter(|cs| {
                cs.suite().is_supported() && cs.hash_algorithm() == cs.suite().hash_algorithm()
            })
    }

    /// Returns an iterator over the provider's key exchange groups that
    /// this crate knows how to run.
    pub fn supported_kx_groups(&self) -> impl Iterator<Item = &'static dyn SupportedKxGroup> {
        self.kx_groups
            .iter()
            .copied()
            .filter(|kx| kx.name().is_supported())
    }

    /// Validates the provider configuration.
    ///
    /// - At least one supported cipher suite
    /// - At least one supported key exchange group
    /// - Hash, HMAC and HKDF produce known answers for every suite hash
    ///
    /// Returns `Error::ConfigError` if validation fails.
    pub fn validate(&self) -> Result<(), Error> {
        if self.supported_cipher_suites().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported TLS 1.3 cipher suites".to_string(),
            ));
        }
        if self.supported_kx_groups().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported key exchange groups".to_string(),
            ));
        }
        let hashes = self.validate_hash_provider()?;
        self.validate_hmac_provider()?;
        self.validate_hkdf_provider(&hashes)?;
        Ok(())
    }

    fn validate_hash_provider(&self) -> Result<Vec<HashAlgorithm>, Error> {
        let mut required: Vec<HashAlgorithm> = Vec::new();
        for cs in self.supported_cipher_suites() {
            if !required.contains(&cs.hash_algorithm()) {
                required.push(cs.hash_algorithm());
            }
        }

        for hash_alg in &required {
            let mut hasher = self.hash_provider.create_hash(*hash_alg);
            hasher.update(&[]);
            let mut result = Buf::new();
            hasher.clone_and_finalize(&mut result);

            let Some((_, expected)) = HASH_TEST_VECTORS.iter().find(|(h, _)| h == hash_alg) else {
                return Err(Error::ConfigError(format!(
                    "No expected hash data for hash algorithm: {:?}",
                    hash_alg
                )));
            };

            if result.as_ref() != *expected {
                return Err(Error::ConfigError(format!(
                    "Hash provider {:?} produced incorrect result",
                    hash_alg
                )));
            }
        }

        Ok(required)
    }

    /// Known answer check of HMAC-SHA256.
    fn validate_hmac_provider(&self) -> Result<(), Error> {
        let mut result = Buf::new();
        self.hmac_provider
            .hmac(
                HashAlgorithm::SHA256,
                b"key",
                b"The quick brown fox jumps over the lazy dog",
                &mut result,
            )
            .map_err(|e| Error::ConfigError(format!("HMAC provider failed: {}", e)))?;

        if result.as_ref() != HMAC_SHA256_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HMAC provider produced incorrect result for HMAC-SHA256".to_string(),
            ));
        }
        Ok(())
    }

    /// RFC 5869 test case 1 for SHA-256; output length check for the others.
    fn validate_hkdf_provider(&self, hashes: &[HashAlgorithm]) -> Result<(), Error> {
        let ikm = [0x0b; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        for &hash in hashes {
            let mut prk = Buf::new();
            self.hkdf_provider
                .hkdf_extract(hash, &salt, &ikm, &mut prk)
                .map_err(|e| Error::ConfigError(format!("HKDF extract failed: {}", e)))?;

            let mut okm = Buf::new();
            self.hkdf_provider
                .hkdf_expand(hash, &prk, &info, &mut okm, 42)
                .map_err(|e| Error::ConfigError(format!("HKDF expand failed: {}", e)))?;

            let ok = match hash {
                HashAlgorithm::SHA256 => {
                    prk.as_ref() == HKDF_SHA256_PRK && okm.as_ref() == HKDF_SHA256_OKM
                }
                HashAlgorithm::SHA384 => prk.len() == 48 && okm.len() == 42,
            };
            if !ok {
                return Err(Error::ConfigError(format!(
                    "HKDF provider {:?} produced incorrect result",
                    hash
                )));
            }
        }
        Ok(())
    }
}

const HASH_TEST_VECTORS: &[(HashAlgorithm, &[u8])] = &[
    (
        HashAlgorithm::SHA256,
        &[
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ],
    ),
    (
        HashAlgorithm::SHA384,
        &[
            0x38, 0xb0, 0x60, 0xa7, 0x51, 0xac, 0x96, 0x38, 0x4c, 0xd9, 0x32, 0x7e, 0xb1, 0xb1,
            0xe3, 0x6a, 0x21, 0xfd, 0xb7, 0x11, 0x14, 0xbe, 0x07, 0x43, 0x4c, 0x0c, 0xc7, 0xbf,
            0x63, 0xf6, 0xe1, 0xda, 0x27, 0x4e, 0xde, 0xbf, 0xe7, 0x6f, 0x65, 0xfb, 0xd5, 0x1a,
            0xd2, 0xf1, 0x48, 0x98, 0xb9, 0x5b,
        ],
    ),
];

const HMAC_SHA256_TEST_VECTOR: &[u8] = &[
    0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f, 0xb1, 0x43,
    0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, 0x2d, 0x1a, 0x3c, 0xd8,
];

const HKDF_SHA256_PRK: &[u8] = &[
    0x07, 0x77, 0x09, 0x36, 0x2c, 0x2e, 0x32, 0xdf, 0x0d, 0xdc, 0x3f, 0x0d, 0xc4, 0x7b, 0xba, 0x63,
    0x90, 0xb6, 0xc7, 0x3b, 0xb5, 0x0f, 0x9c, 0x31, 0x22, 0xec, 0x84, 0x4a, 0xd7, 0xc2, 0xb3, 0xe5,
];

const HKDF_SHA256_OKM: &[u8] = &[
    0x3c, 0xb2, 0x5f, 0x25, 0xfa, 0xac, 0xd5, 0x7a, 0x90, 0x43, 0x4f, 0x64, 0xd0, 0x36, 0x2f, 0x2a,
    0x2d, 0x2d, 0x0a, 0x90, 0xcf, 0x1a, 0x5a, 0x4c, 0x5d, 0xb0, 0x2d, 0x56, 0xec, 0xc4, 0xc5, 0xbf,
    0x34, 0x00, 0x72, 0x08, 0xd5, 0xb8, 0x87, 0x18, 0x58, 0x65,
];
