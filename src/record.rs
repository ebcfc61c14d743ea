//! Record layer (RFC 8446 Section 5).
//!
//! ```text
//! content_type:u8 | legacy_version:u16 = 0x0303 | length:u16 | fragment
//! ```
//!
//! Protected records always carry `application_data` on the wire. The real
//! content type is the last non-zero byte of the decrypted inner plaintext,
//! optionally followed by zero padding.

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::crypto::{Aad, Cipher, Nonce, SupportedCipherSuite, IV_LEN, TAG_LEN};
use crate::key_schedule::KeySchedule;
use crate::types::{CipherSuite, ContentType, ProtocolVersion};
use crate::Error;

/// Length of the record header.
pub const RECORD_HEADER_LEN: usize = 5;

/// Largest plaintext fragment (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Largest inner plaintext: content plus the content type byte.
pub const MAX_INNER_PLAINTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 1;

/// Largest record payload accepted on the wire (2^14 + 256).
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub legacy_version: ProtocolVersion,
    pub length: u16,
}

impl RecordHeader {
    pub fn new(content_type: ContentType, length: usize) -> Self {
        RecordHeader {
            content_type,
            legacy_version: ProtocolVersion::TLS1_2,
            length: length as u16,
        }
    }

    fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = be_u8(input)?;
        let (input, legacy_version) = be_u16(input)?;
        let (input, length) = be_u16(input)?;
        Ok((
            input,
            RecordHeader {
                content_type: ContentType::from_u8(content_type),
                legacy_version: ProtocolVersion::from_u16(legacy_version),
                length,
            },
        ))
    }

    /// Total wire length, header included.
    pub fn record_len(&self) -> usize {
        RECORD_HEADER_LEN + self.length as usize
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LEN] {
        let v = self.legacy_version.as_u16().to_be_bytes();
        let l = self.length.to_be_bytes();
        [self.content_type.as_u8(), v[0], v[1], l[0], l[1]]
    }
}

/// Parse the header at the start of `buf`.
///
/// `Ok(None)` means the record is not complete yet: either fewer than five
/// bytes are available or the payload the header announces has not all
/// arrived. The content type and length are checked first, so an oversize
/// record is refused without waiting for its payload.
pub fn parse_header(buf: &[u8]) -> Result<Option<RecordHeader>, Error> {
    if buf.len() < RECORD_HEADER_LEN {
        return Ok(None);
    }
    let (_, header) = RecordHeader::parse(buf)?;

    if matches!(header.content_type, ContentType::Unknown(_)) {
        return Err(Error::UnexpectedMessage(format!(
            "record content type {}",
            header.content_type
        )));
    }
    if header.length as usize > MAX_CIPHERTEXT_LEN {
        return Err(Error::RecordOverflow(header.length as usize));
    }
    if buf.len() < header.record_len() {
        return Ok(None);
    }
    Ok(Some(header))
}

/// `iv XOR pad_left(seq, 12)` (RFC 8446 Section 5.3).
pub fn build_nonce(iv: &[u8; IV_LEN], seq: u64) -> Nonce {
    Nonce::xor(iv, seq)
}

/// Protection state for one direction of one phase.
///
/// The AEAD key lives inside the cipher instance. The sequence number is
/// bumped once per successful seal or open and never wraps.
pub struct RecordKeys {
    cipher: Box<dyn Cipher>,
    iv: [u8; IV_LEN],
    suite: CipherSuite,
    seq: u64,
}

impl RecordKeys {
    pub fn new(
        suite: &dyn SupportedCipherSuite,
        key: &[u8],
        iv: [u8; IV_LEN],
    ) -> Result<Self, Error> {
        let cipher = suite.create_cipher(key).map_err(Error::CryptoError)?;
        Ok(RecordKeys {
            cipher,
            iv,
            suite: suite.suite(),
            seq: 0,
        })
    }

    /// Expand a traffic secret into key and IV and build the cipher.
    pub fn from_secret(
        key_schedule: &KeySchedule,
        suite: &dyn SupportedCipherSuite,
        secret: &[u8],
    ) -> Result<Self, Error> {
        let (mut key, iv) = key_schedule.derive_traffic_keys(secret, suite.key_len())?;
        let keys = Self::new(suite, &key, iv);
        key.wipe();
        keys
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn sequence(&self) -> u64 {
        self.seq
    }

    fn next_nonce(&self) -> Result<Nonce, Error> {
        if self.seq == u64::MAX {
            return Err(Error::CryptoError("record sequence exhausted".to_string()));
        }
        Ok(build_nonce(&self.iv, self.seq))
    }
}

impl Drop for RecordKeys {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for RecordKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordKeys")
            .field("suite", &self.suite)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Seal `plaintext` as one protected record appended to `out`.
pub fn encrypt(
    plaintext: &[u8],
    content_type: ContentType,
    keys: &mut RecordKeys,
    out: &mut Buf,
) -> Result<(), Error> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(Error::RecordOverflow(plaintext.len()));
    }
    let nonce = keys.next_nonce()?;

    let mut inner = Buf::with_capacity(plaintext.len() + 1 + TAG_LEN);
    inner.extend_from_slice(plaintext);
    inner.push(content_type.as_u8());

    let header = RecordHeader::new(ContentType::ApplicationData, inner.len() + TAG_LEN);
    let header_bytes = header.to_bytes();

    keys.cipher
        .encrypt(&mut inner, Aad::new(header_bytes), nonce)
        .map_err(Error::CryptoError)?;
    keys.seq += 1;

    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&inner);
    Ok(())
}

/// Seal data of any length as a run of protected records.
pub fn encrypt_fragmented(
    data: &[u8],
    content_type: ContentType,
    keys: &mut RecordKeys,
    out: &mut Buf,
) -> Result<(), Error> {
    if data.is_empty() {
        return encrypt(data, content_type, keys, out);
    }
    for chunk in data.chunks(MAX_PLAINTEXT_LEN) {
        encrypt(chunk, content_type, keys, out)?;
    }
    Ok(())
}

/// Open one complete protected record (header included).
///
/// The returned buffer holds the content with padding and type removed.
/// On any failure the sequence number is unchanged and decrypted bytes are
/// wiped.
pub fn decrypt(record: &[u8], keys: &mut RecordKeys) -> Result<(ContentType, Buf), Error> {
    let Some(header) = parse_header(record)? else {
        return Err(Error::DecodeError("truncated record".to_string()));
    };
    if header.content_type != ContentType::ApplicationData {
        return Err(Error::UnexpectedMessage(format!(
            "protected record with outer type {}",
            header.content_type
        )));
    }
    if record.len() != header.record_len() {
        return Err(Error::DecodeError(format!(
            "record length {} does not match header {}",
            record.len(),
            header.record_len()
        )));
    }
    let nonce = keys.next_nonce()?;

    let mut aad = [0; RECORD_HEADER_LEN];
    aad.copy_from_slice(&record[..RECORD_HEADER_LEN]);

    let mut buf = Buf::from_slice(&record[RECORD_HEADER_LEN..]);
    if let Err(e) = keys.cipher.decrypt(&mut buf, Aad::new(aad), nonce) {
        buf.wipe();
        debug!("Record open failed at seq {}: {}", keys.seq, e);
        return Err(Error::BadRecordMac);
    }

    if buf.len() > MAX_INNER_PLAINTEXT_LEN {
        buf.wipe();
        return Err(Error::RecordOverflow(buf.len()));
    }

    let Some(type_pos) = buf.iter().rposition(|b| *b != 0) else {
        buf.wipe();
        return Err(Error::UnexpectedMessage(
            "protected record without content type".to_string(),
        ));
    };
    let content_type = ContentType::from_u8(buf[type_pos]);
    if matches!(content_type, ContentType::Unknown(_)) {
        buf.wipe();
        return Err(Error::UnexpectedMessage(format!(
            "inner content type {}",
            content_type
        )));
    }
    buf.truncate(type_pos);

    keys.seq += 1;
    Ok((content_type, buf))
}

/// Append unprotected records carrying `payload`, split at 2^14 bytes.
pub fn write_plaintext(content_type: ContentType, payload: &[u8], out: &mut Buf) {
    if payload.is_empty() {
        out.extend_from_slice(&RecordHeader::new(content_type, 0).to_bytes());
        return;
    }
    for chunk in payload.chunks(MAX_PLAINTEXT_LEN) {
        out.extend_from_slice(&RecordHeader::new(content_type, chunk.len()).to_bytes());
        out.extend_from_slice(chunk);
    }
}
