use arrayvec::ArrayVec;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{bounded_list, decode_all, vec8, write_prefixed};
use crate::types::ProtocolVersion;
use crate::Error;

/// Most versions accepted in a ClientHello list.
pub const MAX_VERSIONS: usize = 16;

/// supported_versions in ClientHello (RFC 8446 Section 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportedVersionsClientHello {
    pub versions: ArrayVec<ProtocolVersion, MAX_VERSIONS>,
}

impl SupportedVersionsClientHello {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, list) = vec8(input)?;
        let (_, versions) = bounded_list(list, ProtocolVersion::parse)?;
        Ok((input, SupportedVersionsClientHello { versions }))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let ext = decode_all(data, Self::parse)?;
        if ext.versions.is_empty() {
            return Err(Error::DecodeError("empty supported_versions".to_string()));
        }
        Ok(ext)
    }

    pub fn contains(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 1, |out| {
            for v in &self.versions {
                out.extend_from_slice(&v.as_u16().to_be_bytes());
            }
            Ok(())
        })
    }
}

/// supported_versions in ServerHello / HelloRetryRequest: the selected version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedVersionsServerHello {
    pub selected_version: ProtocolVersion,
}

impl SupportedVersionsServerHello {
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let selected_version = decode_all(data, ProtocolVersion::parse)?;
        Ok(SupportedVersionsServerHello { selected_version })
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.selected_version.as_u16().to_be_bytes());
    }
}
