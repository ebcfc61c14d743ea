//! Running handshake transcript hash (RFC 8446 Section 4.4.1).
//!
//! The client sends ClientHello before it knows which hash the cipher suite
//! will use, so raw message bytes are buffered until [`Transcript::set_hash`]
//! is called.

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::message::HandshakeType;
use crate::types::HashAlgorithm;
use crate::Error;

pub struct Transcript {
    hasher: &'static dyn HashProvider,
    hash: Option<HashAlgorithm>,
    ctx: Option<Box<dyn HashContext>>,
    pending: Buf,
}

impl Transcript {
    pub fn new(hasher: &'static dyn HashProvider) -> Self {
        Transcript {
            hasher,
            hash: None,
            ctx: None,
            pending: Buf::new(),
        }
    }

    /// Fix the hash algorithm and feed everything absorbed so far.
    ///
    /// Calling it again with the same algorithm is a no-op. A different
    /// algorithm after the first choice is refused.
    pub fn set_hash(&mut self, hash: HashAlgorithm) -> Result<(), Error> {
        match self.hash {
            Some(h) if h == hash => return Ok(()),
            Some(h) => {
                return Err(Error::IllegalParameter(format!(
                    "Transcript hash change {:?} -> {:?}",
                    h, hash
                )))
            }
            None => {}
        }

        let mut ctx = self.hasher.create_hash(hash);
        ctx.update(&self.pending);
        self.pending.wipe();

        self.hash = Some(hash);
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Add the exact bytes of one handshake message, header included.
    pub fn absorb(&mut self, message: &[u8]) {
        match &mut self.ctx {
            Some(ctx) => ctx.update(message),
            None => self.pending.extend_from_slice(message),
        }
    }

    /// Hash over every message absorbed so far.
    pub fn current_hash(&self) -> Result<Buf, Error> {
        let Some(ctx) = &self.ctx else {
            return Err(Error::InvalidState(
                "Transcript hash not yet selected".to_string(),
            ));
        };
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        Ok(out)
    }

    /// Replace the transcript so far by a synthetic `message_hash` message
    /// wrapping the hash of ClientHello1, as required after a
    /// HelloRetryRequest.
    pub fn replace_with_message_hash(&mut self) -> Result<(), Error> {
        let Some(hash) = self.hash else {
            return Err(Error::InvalidState(
                "Transcript hash not yet selected".to_string(),
            ));
        };
        let ch1_hash = self.current_hash()?;

        let mut ctx = self.hasher.create_hash(hash);
        ctx.update(&[
            HandshakeType::MessageHash.as_u8(),
            0,
            0,
            ch1_hash.len() as u8,
        ]);
        ctx.update(&ch1_hash);
        self.ctx = Some(ctx);
        Ok(())
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("hash", &self.hash)
            .field("pending", &self.pending.len())
            .finish()
    }
}
