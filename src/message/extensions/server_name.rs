use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::message::util::{decode_all, ensure_empty, vec16, write_opaque, write_prefixed};
use crate::Error;

const HOST_NAME: u8 = 0;

/// server_name extension (RFC 6066 Section 3), host_name entries only.
///
/// The server's acknowledgement in EncryptedExtensions has empty data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerNameExtension<'a> {
    pub host_name: Option<&'a str>,
}

impl<'a> ServerNameExtension<'a> {
    pub fn new(host_name: &'a str) -> Self {
        ServerNameExtension {
            host_name: Some(host_name),
        }
    }

    fn parse(input: &'a [u8]) -> IResult<&'a [u8], Option<&'a [u8]>> {
        let (input, list) = vec16(input)?;
        let mut host_name = None;
        let mut rest = list;
        while !rest.is_empty() {
            let (r, name_type) = be_u8(rest)?;
            let (r, name) = vec16(r)?;
            if name_type == HOST_NAME && host_name.is_none() {
                host_name = Some(name);
            }
            rest = r;
        }
        ensure_empty(rest)?;
        Ok((input, host_name))
    }

    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        if data.is_empty() {
            return Ok(ServerNameExtension { host_name: None });
        }
        let host_name = decode_all(data, Self::parse)?;
        let host_name = match host_name {
            Some(name) => {
                let name = std::str::from_utf8(name)
                    .map_err(|_| Error::DecodeError("server_name is not UTF-8".to_string()))?;
                if name.is_empty() || !name.is_ascii() {
                    return Err(Error::DecodeError(format!(
                        "server_name {:?} is not a host name",
                        name
                    )));
                }
                Some(name)
            }
            None => None,
        };
        Ok(ServerNameExtension { host_name })
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        let Some(name) = self.host_name else {
            return Ok(());
        };
        write_prefixed(output, 2, |out| {
            out.push(HOST_NAME);
            write_opaque(out, 2, name.as_bytes())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = &[
        0x00, 0x0E, // list length
        0x00, // host_name
        0x00, 0x0B, // name length
        b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm',
    ];

    #[test]
    fn roundtrip() {
        let sni = ServerNameExtension::decode(DATA).unwrap();
        assert_eq!(sni.host_name, Some("example.com"));

        let mut out = Buf::new();
        sni.serialize(&mut out).unwrap();
        assert_eq!(&*out, DATA);
    }

    #[test]
    fn empty_ack() {
        let sni = ServerNameExtension::decode(&[]).unwrap();
        assert_eq!(sni.host_name, None);
    }

    #[test]
    fn trailing_garbage() {
        let mut data = DATA.to_vec();
        data.push(0);
        assert!(ServerNameExtension::decode(&data).is_err());
    }
}
