use arrayvec::ArrayVec;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{bounded_list, decode_all, vec16, write_prefixed};
use crate::message::MAX_SIGNATURE_SCHEMES;
use crate::types::SignatureScheme;
use crate::Error;

/// signature_algorithms (RFC 8446 Section 4.2.3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureAlgorithmsExtension {
    pub schemes: ArrayVec<SignatureScheme, MAX_SIGNATURE_SCHEMES>,
}

impl SignatureAlgorithmsExtension {
    pub fn new(schemes: &[SignatureScheme]) -> Self {
        SignatureAlgorithmsExtension {
            schemes: schemes
                .iter()
                .copied()
                .take(MAX_SIGNATURE_SCHEMES)
                .collect(),
        }
    }

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, list) = vec16(input)?;
        let (_, schemes) = bounded_list(list, SignatureScheme::parse)?;
        Ok((input, SignatureAlgorithmsExtension { schemes }))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let ext = decode_all(data, Self::parse)?;
        if ext.schemes.is_empty() {
            return Err(Error::DecodeError("empty signature_algorithms".to_string()));
        }
        Ok(ext)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 2, |out| {
            for s in &self.schemes {
                out.extend_from_slice(&s.as_u16().to_be_bytes());
            }
            Ok(())
        })
    }
}
