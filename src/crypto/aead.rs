//! Record protection inputs: per-record nonce and associated data.

use std::ops::Deref;

use arrayvec::ArrayVec;

/// AEAD tag length for every TLS 1.3 cipher suite this crate supports.
pub const TAG_LEN: usize = 16;

/// Static IV / nonce length (RFC 8446 Section 5.3).
pub const IV_LEN: usize = 12;

/// Per-record AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; IV_LEN]);

impl Nonce {
    /// Combine the static IV with the record sequence number.
    ///
    /// Per RFC 8446 Section 5.3: nonce = iv XOR pad_left(seq, iv_len)
    pub fn xor(iv: &[u8; IV_LEN], seq: u64) -> Self {
        let mut nonce = *iv;
        let seq_bytes = seq.to_be_bytes();
        for (n, s) in nonce[IV_LEN - 8..].iter_mut().zip(seq_bytes.iter()) {
            *n ^= s;
        }
        Self(nonce)
    }
}

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Additional authenticated data: the 5 byte record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aad(pub ArrayVec<u8, 5>);

impl Aad {
    pub fn new(header: [u8; 5]) -> Self {
        Aad(ArrayVec::from(header))
    }
}

impl Deref for Aad {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_xor_left_pads_sequence() {
        let iv = [0xAA; IV_LEN];
        let nonce = Nonce::xor(&iv, 1);
        let mut expected = [0xAA; IV_LEN];
        expected[11] ^= 1;
        assert_eq!(nonce.0, expected);

        let nonce = Nonce::xor(&iv, 0x0102_0304_0506_0708);
        assert_eq!(&nonce[..4], &[0xAA; 4]);
        assert_eq!(nonce[4], 0xAA ^ 0x01);
        assert_eq!(nonce[11], 0xAA ^ 0x08);
    }

    #[test]
    fn nonce_zero_sequence_is_iv() {
        let iv = [7u8; IV_LEN];
        assert_eq!(Nonce::xor(&iv, 0).0, iv);
    }
}
