use arrayvec::ArrayVec;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{bounded_list, decode_all, vec16, write_opaque, write_prefixed};
use crate::message::MAX_KEY_SHARES;
use crate::types::NamedGroup;
use crate::Error;

/// A single KeyShareEntry (RFC 8446 Section 4.2.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShareEntry<'a> {
    pub group: NamedGroup,
    pub key_exchange: &'a [u8],
}

impl<'a> KeyShareEntry<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], KeyShareEntry<'a>> {
        let (input, group) = NamedGroup::parse(input)?;
        let (input, key_exchange) = vec16(input)?;
        Ok((
            input,
            KeyShareEntry {
                group,
                key_exchange,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        output.extend_from_slice(&self.group.as_u16().to_be_bytes());
        write_opaque(output, 2, self.key_exchange)
    }
}

/// KeyShare extension in ClientHello.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyShareClientHello<'a> {
    pub entries: ArrayVec<KeyShareEntry<'a>, MAX_KEY_SHARES>,
}

impl<'a> KeyShareClientHello<'a> {
    fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        let (input, list) = vec16(input)?;
        let (_, entries) = bounded_list(list, KeyShareEntry::parse)?;
        Ok((input, KeyShareClientHello { entries }))
    }

    /// Each group may appear at most once (RFC 8446 Section 4.2.8).
    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let ext = decode_all(data, Self::parse)?;
        for (i, e) in ext.entries.iter().enumerate() {
            if ext.entries[..i].iter().any(|o| o.group == e.group) {
                return Err(Error::IllegalParameter(format!(
                    "Duplicate key share for {:?}",
                    e.group
                )));
            }
        }
        Ok(ext)
    }

    pub fn find(&self, group: NamedGroup) -> Option<&KeyShareEntry<'a>> {
        self.entries.iter().find(|e| e.group == group)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 2, |out| {
            for entry in &self.entries {
                entry.serialize(out)?;
            }
            Ok(())
        })
    }
}

/// KeyShare extension in ServerHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShareServerHello<'a> {
    pub entry: KeyShareEntry<'a>,
}

impl<'a> KeyShareServerHello<'a> {
    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let entry = decode_all(data, KeyShareEntry::parse)?;
        Ok(KeyShareServerHello { entry })
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        self.entry.serialize(output)
    }
}

/// KeyShare extension in HelloRetryRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShareHelloRetryRequest {
    pub selected_group: NamedGroup,
}

impl KeyShareHelloRetryRequest {
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let selected_group = decode_all(data, NamedGroup::parse)?;
        Ok(KeyShareHelloRetryRequest { selected_group })
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.selected_group.as_u16().to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_share_client_hello_roundtrip() {
        let message: &[u8] = &[
            0x00, 0x08, // client_shares length (8)
            0x00, 0x1D, // NamedGroup::X25519
            0x00, 0x04, // key_exchange length
            0x01, 0x02, 0x03, 0x04, // key_exchange data
        ];

        let parsed = KeyShareClientHello::decode(message).unwrap();
        assert_eq!(
            parsed.find(NamedGroup::X25519).map(|e| e.key_exchange),
            Some(&[1, 2, 3, 4][..])
        );

        let mut serialized = Buf::new();
        parsed.serialize(&mut serialized).unwrap();
        assert_eq!(&*serialized, message);
    }

    #[test]
    fn duplicate_group() {
        let message: &[u8] = &[
            0x00, 0x0A, //
            0x00, 0x1D, 0x00, 0x01, 0xAA, //
            0x00, 0x1D, 0x00, 0x01, 0xBB,
        ];
        assert!(matches!(
            KeyShareClientHello::decode(message),
            Err(Error::IllegalParameter(_))
        ));
    }

    #[test]
    fn key_share_server_hello_roundtrip() {
        let message: &[u8] = &[
            0x00, 0x17, // NamedGroup::Secp256r1
            0x00, 0x02, // key_exchange length
            0x04, 0x05,
        ];

        let parsed = KeyShareServerHello::decode(message).unwrap();
        assert_eq!(parsed.entry.group, NamedGroup::Secp256r1);

        let mut serialized = Buf::new();
        parsed.serialize(&mut serialized).unwrap();
        assert_eq!(&*serialized, message);
    }

    #[test]
    fn key_share_hrr() {
        let parsed = KeyShareHelloRetryRequest::decode(&[0x00, 0x17]).unwrap();
        assert_eq!(parsed.selected_group, NamedGroup::Secp256r1);
        assert!(KeyShareHelloRetryRequest::decode(&[0x00]).is_err());
    }
}
