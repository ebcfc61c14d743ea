//! HKDF implementation using RustCrypto crates for TLS 1.3 key derivation.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HkdfProvider;
use crate::types::HashAlgorithm;

/// HKDF provider implementation using RustCrypto.
#[derive(Debug)]
pub(super) struct RustCryptoHkdfProvider;

impl HkdfProvider for RustCryptoHkdfProvider {
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();

        // An empty salt is the same as a zero-filled one of hash length (RFC 5869 2.2).
        let salt = if salt.is_empty() { None } else { Some(salt) };
        match hash {
            HashAlgorithm::SHA256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            HashAlgorithm::SHA384 => {
                let (prk, _) = Hkdf::<Sha384>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
        }

        Ok(())
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        out.clear();
        out.resize(output_len, 0);

        let result = match hash {
            HashAlgorithm::SHA256 => Hkdf::<Sha256>::from_prk(prk)
                .map_err(|e| format!("Invalid PRK: {:?}", e))?
                .expand(info, out),
            HashAlgorithm::SHA384 => Hkdf::<Sha384>::from_prk(prk)
                .map_err(|e| format!("Invalid PRK: {:?}", e))?
                .expand(info, out),
        };

        result.map_err(|e| {
            out.wipe();
            format!("HKDF expand failed: {:?}", e)
        })
    }
}

/// Static instance of the HKDF provider.
pub(super) static HKDF_PROVIDER: RustCryptoHkdfProvider = RustCryptoHkdfProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_too_long_fails() {
        let prk = [1u8; 32];
        let mut out = Buf::new();
        let res =
            HKDF_PROVIDER.hkdf_expand(HashAlgorithm::SHA256, &prk, b"", &mut out, 255 * 32 + 1);
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn extract_lengths() {
        let mut out = Buf::new();
        HKDF_PROVIDER
            .hkdf_extract(HashAlgorithm::SHA384, &[], &[0u8; 48], &mut out)
            .unwrap();
        assert_eq!(out.len(), 48);
    }
}
