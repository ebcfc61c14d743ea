use nom::IResult;

use super::extension::{ExtensionContext, ExtensionType, Extensions};
use super::extensions::cookie::CookieExtension;
use super::extensions::key_share::{KeyShareHelloRetryRequest, KeyShareServerHello};
use super::extensions::supported_versions::SupportedVersionsServerHello;
use super::random::{Random, SessionId};
use super::util::decode_all;
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::Error;

/// ServerHello and HelloRetryRequest share one wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub legacy_session_id_echo: SessionId,
    pub cipher_suite: CipherSuite,
    pub legacy_compression_method: CompressionMethod,
    pub extensions: Extensions<'a>,
}

/// A decoded ServerHello-typed message, tagged by what it really is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerHelloKind<'a> {
    ServerHello(ServerHello<'a>),
    HelloRetryRequest(ServerHello<'a>),
}

impl<'a> ServerHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, legacy_session_id_echo) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, legacy_compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extensions::parse_trailing(input)?;

        Ok((
            input,
            ServerHello {
                legacy_version,
                random,
                legacy_session_id_echo,
                cipher_suite,
                legacy_compression_method,
                extensions,
            },
        ))
    }

    /// Decode and classify by the HelloRetryRequest sentinel random.
    pub fn decode(body: &'a [u8]) -> Result<ServerHelloKind<'a>, Error> {
        let sh = decode_all(body, Self::parse)?;
        if sh.random.is_hello_retry_request() {
            sh.extensions.check(ExtensionContext::HelloRetryRequest)?;
            Ok(ServerHelloKind::HelloRetryRequest(sh))
        } else {
            sh.extensions.check(ExtensionContext::ServerHello)?;
            Ok(ServerHelloKind::ServerHello(sh))
        }
    }

    pub fn supported_versions(&self) -> Result<Option<SupportedVersionsServerHello>, Error> {
        self.extensions
            .get(ExtensionType::SupportedVersions)
            .map(SupportedVersionsServerHello::decode)
            .transpose()
    }

    pub fn key_share(&self) -> Result<Option<KeyShareServerHello<'a>>, Error> {
        self.extensions
            .get(ExtensionType::KeyShare)
            .map(KeyShareServerHello::decode)
            .transpose()
    }

    /// The key_share of a HelloRetryRequest only names a group.
    pub fn retry_group(&self) -> Result<Option<KeyShareHelloRetryRequest>, Error> {
        self.extensions
            .get(ExtensionType::KeyShare)
            .map(KeyShareHelloRetryRequest::decode)
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
        self.legacy_session_id_echo.serialize(output);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.legacy_compression_method.as_u8());
        self.extensions.serialize(output)
    }
}
