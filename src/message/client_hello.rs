use arrayvec::ArrayVec;
use nom::IResult;

use super::extension::{ExtensionContext, ExtensionType, Extensions};
use super::extensions::alpn::AlpnExtension;
use super::extensions::cookie::CookieExtension;
use super::extensions::key_share::KeyShareClientHello;
use super::extensions::server_name::ServerNameExtension;
use super::extensions::signature_algorithms::SignatureAlgorithmsExtension;
use super::extensions::supported_groups::SupportedGroupsExtension;
use super::extensions::supported_versions::SupportedVersionsClientHello;
use super::random::{Random, SessionId};
use super::util::{bounded_list, decode_all, vec16, vec8, write_prefixed};
use super::MAX_CIPHER_SUITES;
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub legacy_session_id: SessionId,
    pub cipher_suites: ArrayVec<CipherSuite, MAX_CIPHER_SUITES>,
    pub legacy_compression_methods: &'a [u8],
    pub extensions: Extensions<'a>,
}

impl<'a> ClientHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, legacy_session_id) = SessionId::parse(input)?;
        let (input, suites) = vec16(input)?;
        let (_, cipher_suites) = bounded_list(suites, CipherSuite::parse)?;
        let (input, legacy_compression_methods) = vec8(input)?;
        let (input, extensions) = Extensions::parse_trailing(input)?;

        Ok((
            input,
            ClientHello {
                legacy_version,
                random,
                legacy_session_id,
                cipher_suites,
                legacy_compression_methods,
                extensions,
            },
        ))
    }

    /// Decode a ClientHello body and check its extension block.
    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        let ch = decode_all(body, Self::parse)?;
        if ch.cipher_suites.is_empty() {
            return Err(Error::DecodeError("no cipher suites".to_string()));
        }
        if ch.legacy_compression_methods.is_empty() {
            return Err(Error::DecodeError("no compression methods".to_string()));
        }
        ch.extensions.check(ExtensionContext::ClientHello)?;
        Ok(ch)
    }

    /// TLS 1.3 requires exactly the null compression method.
    pub fn has_only_null_compression(&self) -> bool {
        self.legacy_compression_methods == [CompressionMethod::Null.as_u8()]
    }

    pub fn supported_versions(&self) -> Result<Option<SupportedVersionsClientHello>, Error> {
        self.extensions
            .get(ExtensionType::SupportedVersions)
            .map(SupportedVersionsClientHello::decode)
            .transpose()
    }

    pub fn supported_groups(&self) -> Result<Option<SupportedGroupsExtension>, Error> {
        self.extensions
            .get(ExtensionType::SupportedGroups)
            .map(SupportedGroupsExtension::decode)
            .transpose()
    }

    pub fn signature_algorithms(&self) -> Result<Option<SignatureAlgorithmsExtension>, Error> {
        self.extensions
            .get(ExtensionType::SignatureAlgorithms)
            .map(SignatureAlgorithmsExtension::decode)
            .transpose()
    }

    pub fn key_share(&self) -> Result<Option<KeyShareClientHello<'a>>, Error> {
        self.extensions
            .get(ExtensionType::KeyShare)
            .map(KeyShareClientHello::decode)
            .transpose()
    }

    pub fn server_name(&self) -> Result<Option<ServerNameExtension<'a>>, Error> {
        self.extensions
            .get(ExtensionType::ServerName)
            .map(ServerNameExtension::decode)
            .transpose()
    }

    pub fn alpn(&self) -> Result<Option<AlpnExtension<'a>>, Error> {
        self.extensions
            .get(ExtensionType::ApplicationLayerProtocolNegotiation)
            .map(AlpnExtension::decode)
            .transpose()
    }

    pub fn cookie(&self) -> Result<Option<CookieExtension<'a>>, Error> {
        self.extensions
            .get(ExtensionType::Cookie)
            .map(CookieExtension::decode)
            .transpose()
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        output.extend_from_slice(&self.legacy_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        self.legacy_session_id.serialize(output);
        write_prefixed(output, 2, |out| {
            for suite in &self.cipher_suites {
                out.extend_from_slice(&suite.as_u16().to_be_bytes());
            }
            Ok(())
        })?;
        super::util::write_opaque(output, 1, self.legacy_compression_methods)?;
        self.extensions.serialize(output)
    }
}
