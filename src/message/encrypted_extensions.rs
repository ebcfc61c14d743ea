use super::extension::{ExtensionContext, ExtensionType, Extensions};
use super::extensions::alpn::AlpnExtension;
use super::util::decode_all;
use crate::buffer::Buf;
use crate::Error;

/// EncryptedExtensions (RFC 8446 Section 4.3.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptedExtensions<'a> {
    pub extensions: Extensions<'a>,
}

impl<'a> EncryptedExtensions<'a> {
    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        let extensions = decode_all(body, Extensions::parse)?;
        extensions.check(ExtensionContext::EncryptedExtensions)?;
        Ok(EncryptedExtensions { extensions })
    }

    pub fn alpn(&self) -> Result<Option<AlpnExtension<'a>>, Error> {
        self.extensions
            .get(ExtensionType::ApplicationLayerProtocolNegotiation)
            .map(AlpnExtension::decode)
            .transpose()
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        self.extensions.serialize(output)
    }
}
