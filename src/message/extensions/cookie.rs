use crate::buffer::Buf;
use crate::message::util::{decode_all, vec16, write_opaque};
use crate::Error;

/// cookie extension (RFC 8446 Section 4.2.2): `opaque cookie<1..2^16-1>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieExtension<'a> {
    pub cookie: &'a [u8],
}

impl<'a> CookieExtension<'a> {
    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let cookie = decode_all(data, vec16)?;
        if cookie.is_empty() {
            return Err(Error::DecodeError("empty cookie".to_string()));
        }
        Ok(CookieExtension { cookie })
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_opaque(output, 2, self.cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data: &[u8] = &[0x00, 0x03, 0xC0, 0x0C, 0x1E];
        let ext = CookieExtension::decode(data).unwrap();
        assert_eq!(ext.cookie, &[0xC0, 0x0C, 0x1E]);

        let mut out = Buf::new();
        ext.serialize(&mut out).unwrap();
        assert_eq!(&*out, data);
    }

    #[test]
    fn empty_rejected() {
        assert!(CookieExtension::decode(&[0x00, 0x00]).is_err());
    }
}
