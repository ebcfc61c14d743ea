//! Cipher suite implementations using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key};
use chacha20poly1305::ChaCha20Poly1305;

use crate::buffer::Buf;
use crate::crypto::provider::{Cipher, SupportedCipherSuite};
use crate::crypto::{Aad, Nonce, TAG_LEN};
use crate::types::{CipherSuite, HashAlgorithm};

/// AES-GCM cipher implementation using RustCrypto.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            32 => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        }
    }
}

impl Cipher for AesGcm {
    fn encrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        let result = match self {
            AesGcm::Aes128(cipher) => cipher.encrypt_in_place(nonce, &aad, data),
            AesGcm::Aes256(cipher) => cipher.encrypt_in_place(nonce, &aad, data),
        };
        result.map_err(|_| "AES-GCM encryption failed".to_string())
    }

    fn decrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if data.len() < TAG_LEN {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        // decrypt_in_place removes the tag and shortens the buffer
        let result = match self {
            AesGcm::Aes128(cipher) => cipher.decrypt_in_place(nonce, &aad, data),
            AesGcm::Aes256(cipher) => cipher.decrypt_in_place(nonce, &aad, data),
        };
        result.map_err(|_| "AES-GCM decryption failed".to_string())
    }
}

/// ChaCha20-Poly1305 cipher implementation using RustCrypto.
struct ChaCha(Box<ChaCha20Poly1305>);

impl std::fmt::Debug for ChaCha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChaCha20Poly1305").finish()
    }
}

impl ChaCha {
    fn new(key: &[u8]) -> Result<Self, String> {
        if key.len() != 32 {
            return Err(format!(
                "Invalid key size for ChaCha20-Poly1305: {}",
                key.len()
            ));
        }
        let key = chacha20poly1305::Key::from_slice(key);
        Ok(ChaCha(Box::new(ChaCha20Poly1305::new(key))))
    }
}

impl Cipher for ChaCha {
    fn encrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        let nonce = chacha20poly1305::Nonce::from_slice(&nonce.0);
        self.0
            .encrypt_in_place(nonce, &aad, data)
            .map_err(|_| "ChaCha20-Poly1305 encryption failed".to_string())
    }

    fn decrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if data.len() < TAG_LEN {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }
        let nonce = chacha20poly1305::Nonce::from_slice(&nonce.0);
        self.0
            .decrypt_in_place(nonce, &aad, data)
            .map_err(|_| "ChaCha20-Poly1305 decryption failed".to_string())
    }
}

/// TLS_AES_128_GCM_SHA256 cipher suite.
#[derive(Debug)]
struct Aes128GcmSha256;

impl SupportedCipherSuite for Aes128GcmSha256 {
    fn suite(&self) -> CipherSuite {
        CipherSuite::AES_128_GCM_SHA256
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA256
    }

    fn key_len(&self) -> usize {
        16
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesGcm::new(key)?))
    }
}

/// TLS_AES_256_GCM_SHA384 cipher suite.
#[derive(Debug)]
struct Aes256GcmSha384;

impl SupportedCipherSuite for Aes256GcmSha384 {
    fn suite(&self) -> CipherSuite {
        CipherSuite::AES_256_GCM_SHA384
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA384
    }

    fn key_len(&self) -> usize {
        32
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesGcm::new(key)?))
    }
}

/// TLS_CHACHA20_POLY1305_SHA256 cipher suite.
#[derive(Debug)]
struct ChaCha20Poly1305Sha256;

impl SupportedCipherSuite for ChaCha20Poly1305Sha256 {
    fn suite(&self) -> CipherSuite {
        CipherSuite::CHACHA20_POLY1305_SHA256
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA256
    }

    fn key_len(&self) -> usize {
        32
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(ChaCha::new(key)?))
    }
}

static AES_128_GCM_SHA256: Aes128GcmSha256 = Aes128GcmSha256;
static AES_256_GCM_SHA384: Aes256GcmSha384 = Aes256GcmSha384;
static CHACHA20_POLY1305_SHA256: ChaCha20Poly1305Sha256 = ChaCha20Poly1305Sha256;

/// All supported cipher suites, in default preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] = &[
    &AES_128_GCM_SHA256,
    &AES_256_GCM_SHA384,
    &CHACHA20_POLY1305_SHA256,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_every_suite() {
        for cs in ALL_CIPHER_SUITES {
            let key = vec![0x42; cs.key_len()];
            let mut sealer = cs.create_cipher(&key).unwrap();
            let mut opener = cs.create_cipher(&key).unwrap();
            let aad = Aad::new([23, 3, 3, 0, 21]);
            let nonce = Nonce([1; 12]);

            let mut buf = Buf::from_slice(b"hello");
            sealer.encrypt(&mut buf, aad.clone(), nonce).unwrap();
            assert_eq!(buf.len(), 5 + TAG_LEN);

            opener.decrypt(&mut buf, aad, nonce).unwrap();
            assert_eq!(&*buf, b"hello");
        }
    }

    #[test]
    fn wrong_aad_fails() {
        let cs = &AES_128_GCM_SHA256;
        let mut cipher = cs.create_cipher(&[0u8; 16]).unwrap();
        let mut buf = Buf::from_slice(b"data");
        let nonce = Nonce([0; 12]);
        cipher
            .encrypt(&mut buf, Aad::new([23, 3, 3, 0, 20]), nonce)
            .unwrap();
        assert!(cipher
            .decrypt(&mut buf, Aad::new([23, 3, 3, 0, 21]), nonce)
            .is_err());
    }

    #[test]
    fn bad_key_length() {
        assert!(CHACHA20_POLY1305_SHA256.create_cipher(&[0u8; 16]).is_err());
        assert!(AES_128_GCM_SHA256.create_cipher(&[0u8; 24]).is_err());
    }
}
