use arrayvec::ArrayVec;
use nom::number::complete::be_u16;
use nom::IResult;

use super::util::{bounded_list, decode_all, ensure_empty, vec16, write_opaque, write_prefixed};
use crate::buffer::Buf;
use crate::Error;

/// Most extensions accepted in a single block. RFC 8446 defines about
/// twenty types and browsers add GREASE and padding on top, so 64 leaves room
/// for several times a real ClientHello.
pub const MAX_EXTENSIONS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, data) = vec16(input)?;
        Ok((
            input,
            Extension {
                extension_type,
                data,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        write_opaque(output, 2, self.data)
    }
}

/// Where an extension block appears. Decides which known extensions are
/// legal (RFC 8446 Section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionContext {
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    EncryptedExtensions,
    Certificate,
    CertificateRequest,
    NewSessionTicket,
}

/// An extension block: `Extension extensions<0..2^16-1>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extensions<'a> {
    list: ArrayVec<Extension<'a>, MAX_EXTENSIONS>,
}

impl<'a> Extensions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a length-prefixed extension block.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extensions<'a>> {
        let (input, block) = vec16(input)?;
        let (rest, list) = bounded_list(block, Extension::parse)?;
        ensure_empty(rest)?;
        Ok((input, Extensions { list }))
    }

    /// Parse the optional trailing extension block of a hello message.
    pub fn parse_trailing(input: &'a [u8]) -> IResult<&'a [u8], Extensions<'a>> {
        if input.is_empty() {
            return Ok((input, Extensions::new()));
        }
        Self::parse(input)
    }

    /// Check a block whose length prefix was already consumed, as the
    /// extensions of a CertificateEntry are.
    pub fn check_block(block: &'a [u8], context: ExtensionContext) -> Result<(), Error> {
        let list = decode_all(block, |b| bounded_list(b, Extension::parse))?;
        Extensions { list }.check(context)
    }

    /// Duplicates and known extensions in the wrong message are both
    /// `illegal_parameter`. Unknown types pass and are ignored later.
    pub fn check(&self, context: ExtensionContext) -> Result<(), Error> {
        for (i, ext) in self.list.iter().enumerate() {
            if self.list[..i]
                .iter()
                .any(|e| e.extension_type == ext.extension_type)
            {
                return Err(Error::IllegalParameter(format!(
                    "Duplicate extension {:?}",
                    ext.extension_type
                )));
            }
            if !ext.extension_type.permitted_in(context) {
                return Err(Error::IllegalParameter(format!(
                    "Extension {:?} not allowed in {:?}",
                    ext.extension_type, context
                )));
            }
        }
        Ok(())
    }

    pub fn push(&mut self, ext: Extension<'a>) -> Result<(), Error> {
        self.list
            .try_push(ext)
            .map_err(|_| Error::Encode("too many extensions".to_string()))
    }

    pub fn get(&self, extension_type: ExtensionType) -> Option<&'a [u8]> {
        self.list
            .iter()
            .find(|e| e.extension_type == extension_type)
            .map(|e| e.data)
    }

    pub fn contains(&self, extension_type: ExtensionType) -> bool {
        self.get(extension_type).is_some()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Extension<'a>> {
        self.list.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_prefixed(output, 2, |out| {
            for ext in &self.list {
                ext.serialize(out)?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    SignatureAlgorithms,
    ApplicationLayerProtocolNegotiation,
    PreSharedKey,
    EarlyData,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    CertificateAuthorities,
    PostHandshakeAuth,
    SignatureAlgorithmsCert,
    KeyShare,
    Unknown(u16),
}

impl Default for ExtensionType {
    fn default() -> Self {
        ExtensionType::Unknown(0)
    }
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x000A => ExtensionType::SupportedGroups,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0029 => ExtensionType::PreSharedKey,
            0x002A => ExtensionType::EarlyData,
            0x002B => ExtensionType::SupportedVersions,
            0x002C => ExtensionType::Cookie,
            0x002D => ExtensionType::PskKeyExchangeModes,
            0x002F => ExtensionType::CertificateAuthorities,
            0x0031 => ExtensionType::PostHandshakeAuth,
            0x0032 => ExtensionType::SignatureAlgorithmsCert,
            0x0033 => ExtensionType::KeyShare,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::PreSharedKey => 0x0029,
            ExtensionType::EarlyData => 0x002A,
            ExtensionType::SupportedVersions => 0x002B,
            ExtensionType::Cookie => 0x002C,
            ExtensionType::PskKeyExchangeModes => 0x002D,
            ExtensionType::CertificateAuthorities => 0x002F,
            ExtensionType::PostHandshakeAuth => 0x0031,
            ExtensionType::SignatureAlgorithmsCert => 0x0032,
            ExtensionType::KeyShare => 0x0033,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }

    /// The RFC 8446 Section 4.2 table.
    pub fn permitted_in(&self, context: ExtensionContext) -> bool {
        use ExtensionContext::*;
        match self {
            ExtensionType::ServerName
            | ExtensionType::SupportedGroups
            | ExtensionType::ApplicationLayerProtocolNegotiation => {
                matches!(context, ClientHello | EncryptedExtensions)
            }
            ExtensionType::SignatureAlgorithms
            | ExtensionType::CertificateAuthorities
            | ExtensionType::SignatureAlgorithmsCert => {
                matches!(context, ClientHello | CertificateRequest)
            }
            ExtensionType::PreSharedKey => matches!(context, ClientHello | ServerHello),
            ExtensionType::EarlyData => {
                matches!(context, ClientHello | EncryptedExtensions | NewSessionTicket)
            }
            ExtensionType::SupportedVersions | ExtensionType::KeyShare => {
                matches!(context, ClientHello | ServerHello | HelloRetryRequest)
            }
            ExtensionType::Cookie => matches!(context, ClientHello | HelloRetryRequest),
            ExtensionType::PskKeyExchangeModes | ExtensionType::PostHandshakeAuth => {
                context == ClientHello
            }
            ExtensionType::Unknown(_) => true,
        }
    }
}
