use nom::number::complete::{be_u24, be_u8};
use nom::IResult;

use super::util::write_prefixed;
use crate::buffer::Buf;
use crate::Error;

/// Handshake header length: `msg_type:u8 | length:u24`.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    ClientHello,
    ServerHello,
    NewSessionTicket,
    EndOfEarlyData,
    EncryptedExtensions,
    Certificate,
    CertificateRequest,
    CertificateVerify,
    Finished,
    KeyUpdate,
    /// Synthetic message replacing ClientHello1 in the transcript after a
    /// HelloRetryRequest. Never sent.
    MessageHash,
    Unknown(u8),
}

impl Default for HandshakeType {
    fn default() -> Self {
        HandshakeType::Unknown(0)
    }
}

impl HandshakeType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            4 => HandshakeType::NewSessionTicket,
            5 => HandshakeType::EndOfEarlyData,
            8 => HandshakeType::EncryptedExtensions,
            11 => HandshakeType::Certificate,
            13 => HandshakeType::CertificateRequest,
            15 => HandshakeType::CertificateVerify,
            20 => HandshakeType::Finished,
            24 => HandshakeType::KeyUpdate,
            254 => HandshakeType::MessageHash,
            _ => HandshakeType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EndOfEarlyData => 5,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::Finished => 20,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::MessageHash => 254,
            HandshakeType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Handshake message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub msg_type: HandshakeType,
    pub length: u32,
}

impl Header {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        Ok((input, Header { msg_type, length }))
    }
}

/// One complete handshake message as it appeared on the wire.
///
/// `raw` is header plus body, which is what goes into the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake<'a> {
    pub msg_type: HandshakeType,
    pub body: &'a [u8],
    pub raw: &'a [u8],
}

impl<'a> Handshake<'a> {
    /// Split the first complete message off `input`.
    ///
    /// Returns `Ok(None)` while the message is still incomplete. A declared
    /// length above `max_len` is an error, so a peer cannot make us buffer
    /// without bound.
    pub fn next(input: &'a [u8], max_len: usize) -> Result<Option<(Handshake<'a>, usize)>, Error> {
        if input.len() < HANDSHAKE_HEADER_LEN {
            return Ok(None);
        }
        let (_, header) = Header::parse(input)?;
        let length = header.length as usize;
        if length > max_len {
            return Err(Error::DecodeError(format!(
                "{:?} of {} bytes exceeds limit",
                header.msg_type, length
            )));
        }

        let total = HANDSHAKE_HEADER_LEN + length;
        if input.len() < total {
            return Ok(None);
        }

        Ok(Some((
            Handshake {
                msg_type: header.msg_type,
                body: &input[HANDSHAKE_HEADER_LEN..total],
                raw: &input[..total],
            },
            total,
        )))
    }
}

/// Write a handshake header followed by the body produced by `f`.
pub fn write_handshake(
    out: &mut Buf,
    msg_type: HandshakeType,
    f: impl FnOnce(&mut Buf) -> Result<(), Error>,
) -> Result<(), Error> {
    out.push(msg_type.as_u8());
    write_prefixed(out, 3, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut out = Buf::new();
        write_handshake(&mut out, HandshakeType::Finished, |out| {
            out.extend_from_slice(&[0xAA; 3]);
            Ok(())
        })
        .unwrap();
        assert_eq!(&*out, &[20, 0, 0, 3, 0xAA, 0xAA, 0xAA]);

        let (msg, used) = Handshake::next(&out, 1024).unwrap().unwrap();
        assert_eq!(used, 7);
        assert_eq!(msg.msg_type, HandshakeType::Finished);
        assert_eq!(msg.body, &[0xAA; 3]);
        assert_eq!(msg.raw, &*out);
    }

    #[test]
    fn incomplete() {
        assert!(Handshake::next(&[20, 0, 0], 1024).unwrap().is_none());
        assert!(Handshake::next(&[20, 0, 0, 4, 1, 2], 1024).unwrap().is_none());
    }

    #[test]
    fn oversize() {
        let res = Handshake::next(&[11, 0x10, 0, 0], 1024);
        assert!(matches!(res, Err(Error::DecodeError(_))));
    }

    #[test]
    fn message_hash_code() {
        assert_eq!(HandshakeType::MessageHash.as_u8(), 0xFE);
        assert_eq!(HandshakeType::from_u8(24), HandshakeType::KeyUpdate);
        assert_eq!(HandshakeType::from_u8(99), HandshakeType::Unknown(99));
    }
}
