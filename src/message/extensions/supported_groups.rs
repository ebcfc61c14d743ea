use arrayvec::ArrayVec;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{bounded_list, decode_all, vec16, write_prefixed};
use crate::types::NamedGroup;
use crate::Error;

/// Most groups accepted in a supported_groups list.
pub const MAX_NAMED_GROUPS: usize = 32;

/// supported_groups (RFC 8446 Section 4.2.7).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportedGroupsExtension {
    pub groups: ArrayVec<NamedGroup, MAX_NAMED_GROUPS>,
}

impl SupportedGroupsExtension {
    pub fn new(groups: &[NamedGroup]) -> Self {
        SupportedGroupsExtension {
            groups: groups.iter().copied().take(MAX_NAMED_GROUPS).collect(),
        }
    }

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, list) = vec16(input)?;
        let (_, groups) = bounded_list(list, NamedGroup::parse)?;
        Ok((input, SupportedGroupsExtension { groups }))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        decode_all(data, Self::parse)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 2, |out| {
            for g in &self.groups {
                out.extend_from_slice(&g.as_u16().to_be_bytes());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data: &[u8] = &[
            0x00, 0x06, // list length
            0x00, 0x1D, // X25519
            0x00, 0x17, // P-256
            0x1A, 0x1A, // GREASE
        ];
        let ext = SupportedGroupsExtension::decode(data).unwrap();
        assert_eq!(
            &ext.groups[..],
            &[
                NamedGroup::X25519,
                NamedGroup::Secp256r1,
                NamedGroup::Unknown(0x1A1A)
            ]
        );

        let mut out = Buf::new();
        ext.serialize(&mut out).unwrap();
        assert_eq!(&*out, data);
    }
}
