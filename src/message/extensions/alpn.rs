use arrayvec::ArrayVec;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{bounded_list, decode_all, vec16, vec8, write_opaque, write_prefixed};
use crate::message::MAX_ALPN_PROTOCOLS;
use crate::Error;

/// application_layer_protocol_negotiation (RFC 7301).
///
/// In ClientHello a preference-ordered list; in EncryptedExtensions
/// exactly one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlpnExtension<'a> {
    pub protocols: ArrayVec<&'a [u8], MAX_ALPN_PROTOCOLS>,
}

impl<'a> AlpnExtension<'a> {
    pub fn new(protocols: impl IntoIterator<Item = &'a [u8]>) -> Self {
        AlpnExtension {
            protocols: protocols.into_iter().take(MAX_ALPN_PROTOCOLS).collect(),
        }
    }

    fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        let (input, list) = vec16(input)?;
        let (_, protocols) = bounded_list(list, vec8)?;
        Ok((input, AlpnExtension { protocols }))
    }

    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let ext = decode_all(data, Self::parse)?;
        if ext.protocols.is_empty() || ext.protocols.iter().any(|p| p.is_empty()) {
            return Err(Error::DecodeError("empty ALPN protocol".to_string()));
        }
        Ok(ext)
    }

    /// The single protocol the server selected.
    pub fn selected(&self) -> Result<&'a [u8], Error> {
        match &self.protocols[..] {
            [one] => Ok(*one),
            _ => Err(Error::DecodeError(format!(
                "ALPN selection with {} protocols",
                self.protocols.len()
            ))),
        }
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 2, |out| {
            for p in &self.protocols {
                write_opaque(out, 1, p)?;
            }
            Ok(())
        })
    }
}

/// First of `ours` that the peer also offers: server preference order.
pub fn select_protocol<'a, T: AsRef<[u8]>>(ours: &'a [T], theirs: &[&[u8]]) -> Option<&'a [u8]> {
    ours.iter()
        .map(|p| p.as_ref())
        .find(|p| theirs.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = &[
        0x00, 0x0C, // list length
        0x02, b'h', b'2', // h2
        0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
    ];

    #[test]
    fn roundtrip() {
        let ext = AlpnExtension::decode(DATA).unwrap();
        assert_eq!(&ext.protocols[..], &[&b"h2"[..], &b"http/1.1"[..]]);

        let mut out = Buf::new();
        ext.serialize(&mut out).unwrap();
        assert_eq!(&*out, DATA);
    }

    #[test]
    fn server_preference_wins() {
        let ours = vec![b"http/1.1".to_vec(), b"h2".to_vec()];
        let theirs: [&[u8]; 2] = [b"h2", b"http/1.1"];
        assert_eq!(select_protocol(&ours, &theirs), Some(&b"http/1.1"[..]));

        let none: [&[u8]; 1] = [b"spdy/3"];
        assert_eq!(select_protocol(&ours, &none), None);
    }

    #[test]
    fn selected_must_be_single() {
        let ext = AlpnExtension::decode(DATA).unwrap();
        assert!(ext.selected().is_err());

        let one = AlpnExtension::new([&b"h2"[..]]);
        assert_eq!(one.selected().unwrap(), b"h2");
    }

    #[test]
    fn empty_name() {
        assert!(AlpnExtension::decode(&[0x00, 0x01, 0x00]).is_err());
    }
}
