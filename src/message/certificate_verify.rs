use nom::IResult;

use super::util::{decode_all, vec16, write_opaque};
use crate::buffer::Buf;
use crate::types::SignatureScheme;
use crate::Error;

/// CertificateVerify (RFC 8446 Section 4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateVerify<'a> {
    pub scheme: SignatureScheme,
    pub signature: &'a [u8],
}

impl<'a> CertificateVerify<'a> {
    fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateVerify<'a>> {
        let (input, scheme) = SignatureScheme::parse(input)?;
        let (input, signature) = vec16(input)?;
        Ok((input, CertificateVerify { scheme, signature }))
    }

    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        decode_all(body, Self::parse)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        output.extend_from_slice(&self.scheme.as_u16().to_be_bytes());
        write_opaque(output, 2, self.signature)
    }
}

/// Content covered by a CertificateVerify signature:
/// 64 spaces, the context string, a zero byte, then the transcript hash.
pub fn signed_content(server: bool, transcript_hash: &[u8], out: &mut Buf) {
    const SERVER: &[u8] = b"TLS 1.3, server CertificateVerify";
    const CLIENT: &[u8] = b"TLS 1.3, client CertificateVerify";

    out.clear();
    out.extend_from_slice(&[0x20; 64]);
    out.extend_from_slice(if server { SERVER } else { CLIENT });
    out.push(0x00);
    out.extend_from_slice(transcript_hash);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let body: &[u8] = &[0x08, 0x07, 0x00, 0x03, 0x01, 0x02, 0x03];
        let cv = CertificateVerify::decode(body).unwrap();
        assert_eq!(cv.scheme, SignatureScheme::ED25519);
        assert_eq!(cv.signature, &[1, 2, 3]);

        let mut out = Buf::new();
        cv.serialize(&mut out).unwrap();
        assert_eq!(&*out, body);
    }

    #[test]
    fn content_layout() {
        let mut out = Buf::new();
        signed_content(true, &[0xAB; 32], &mut out);
        assert_eq!(out.len(), 64 + 33 + 1 + 32);
        assert_eq!(&out[..64], &[0x20; 64]);
        assert_eq!(&out[64..97], b"TLS 1.3, server CertificateVerify");
        assert_eq!(out[97], 0);

        let mut client = Buf::new();
        signed_content(false, &[0xAB; 32], &mut client);
        assert_ne!(out, client);
    }
}
