//! SHA-256 and SHA-384 transcript hashing over `sha2`.

use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Running SHA-2 state. Cloned whenever the transcript hash is read.
enum Sha2Context {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl std::fmt::Debug for Sha2Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sha2Context::Sha256(_) => f.debug_tuple("Sha256").finish(),
            Sha2Context::Sha384(_) => f.debug_tuple("Sha384").finish(),
        }
    }
}

impl HashContext for Sha2Context {
    fn update(&mut self, data: &[u8]) {
        match self {
            Sha2Context::Sha256(ctx) => ctx.update(data),
            Sha2Context::Sha384(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self {
            Sha2Context::Sha256(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            Sha2Context::Sha384(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
        }
    }
}

/// Maps a suite hash to its `sha2` context.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        match algorithm {
            HashAlgorithm::SHA256 => Box::new(Sha2Context::Sha256(Sha256::new())),
            HashAlgorithm::SHA384 => Box::new(Sha2Context::Sha384(Sha384::new())),
        }
    }
}

pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;
