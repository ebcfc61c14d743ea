use std::net::IpAddr;

use crate::buffer::Buf;
use crate::certificate::TlsCertificate;
use crate::crypto::{rust_crypto, CryptoProvider, SigningKey, SupportedCipherSuite};
use crate::crypto::SupportedKxGroup;
use crate::message::{MAX_ALPN_PROTOCOLS, MAX_CERTIFICATE_CHAIN_LEN, MAX_CIPHER_SUITES};
use crate::types::{CipherSuite, NamedGroup, SignatureScheme};
use crate::Error;

/// Groups a client offers in supported_groups unless told otherwise.
const DEFAULT_CLIENT_GROUPS: &[NamedGroup] = &[NamedGroup::X25519, NamedGroup::Secp256r1];

/// Whether a server asks for a client certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// CertificateRequest is sent, an empty client Certificate is accepted.
    Optional,
    /// CertificateRequest is sent, an empty client Certificate fails the
    /// handshake with `certificate_required`.
    Required,
}

/// A certificate chain with the private key of its end-entity certificate.
#[derive(Clone)]
pub struct CertifiedKey {
    chain: Vec<Buf>,
    private_key: Buf,
    schemes: &'static [SignatureScheme],
}

impl CertifiedKey {
    fn load(
        provider: &CryptoProvider,
        chain: Vec<Vec<u8>>,
        private_key: Vec<u8>,
    ) -> Result<Self, Error> {
        if chain.is_empty() {
            return Err(Error::ConfigError("Empty certificate chain".to_string()));
        }
        if chain.len() > MAX_CERTIFICATE_CHAIN_LEN {
            return Err(Error::ConfigError(format!(
                "Certificate chain of {} exceeds {}",
                chain.len(),
                MAX_CERTIFICATE_CHAIN_LEN
            )));
        }
        if chain.iter().any(|c| c.is_empty() || c.len() >= 1 << 24) {
            return Err(Error::ConfigError(
                "Certificate with invalid length".to_string(),
            ));
        }

        let key = provider
            .key_provider
            .load_private_key(&private_key)
            .map_err(|e| Error::ConfigError(format!("Private key: {}", e)))?;
        let schemes = key.schemes();
        if !schemes.iter().any(|s| s.is_valid_for_certificate_verify()) {
            return Err(Error::ConfigError(
                "Private key has no TLS 1.3 signature scheme".to_string(),
            ));
        }

        Ok(CertifiedKey {
            chain: chain.iter().map(|c| Buf::from_slice(c)).collect(),
            private_key: Buf::from_slice(&private_key),
            schemes,
        })
    }

    /// DER certificates, end-entity first.
    #[inline(always)]
    pub fn chain(&self) -> &[Buf] {
        &self.chain
    }

    /// Schemes the private key can sign with, most preferred first.
    #[inline(always)]
    pub fn schemes(&self) -> &'static [SignatureScheme] {
        self.schemes
    }

    /// First of our schemes the peer also accepts.
    pub(crate) fn select_scheme(&self, peer: &[SignatureScheme]) -> Option<SignatureScheme> {
        self.schemes
            .iter()
            .copied()
            .filter(|s| s.is_valid_for_certificate_verify())
            .find(|s| peer.contains(s))
    }

    pub(crate) fn signing_key(
        &self,
        provider: &CryptoProvider,
    ) -> Result<Box<dyn SigningKey>, Error> {
        provider
            .key_provider
            .load_private_key(&self.private_key)
            .map_err(Error::CryptoError)
    }
}

impl std::fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("chain", &self.chain.len())
            .field("schemes", &self.schemes)
            .finish()
    }
}

/// Client configuration.
///
/// Shared between connections via `Arc`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<&'static dyn SupportedCipherSuite>,
    kx_groups: Vec<&'static dyn SupportedKxGroup>,
    server_name: Option<String>,
    alpn_protocols: Vec<Vec<u8>>,
    trust_anchors: Vec<Buf>,
    verify_server: bool,
    certificate: Option<CertifiedKey>,
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            common: CommonBuilder::default(),
            server_name: None,
            verify_server: true,
            certificate: None,
        }
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Cipher suites offered, most preferred first.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[&'static dyn SupportedCipherSuite] {
        &self.cipher_suites
    }

    /// Groups offered in supported_groups. A key share is sent for the first.
    #[inline(always)]
    pub fn kx_groups(&self) -> &[&'static dyn SupportedKxGroup] {
        &self.kx_groups
    }

    /// Name the server certificate must be valid for.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// The server_name sent in SNI. IP addresses are verified but never
    /// sent (RFC 6066 Section 3).
    pub(crate) fn sni_name(&self) -> Option<&str> {
        self.server_name()
            .filter(|name| name.parse::<IpAddr>().is_err())
    }

    /// ALPN protocols offered, most preferred first.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// DER certificates the server chain must lead to.
    #[inline(always)]
    pub fn trust_anchors(&self) -> &[Buf] {
        &self.trust_anchors
    }

    /// Whether the server chain is validated.
    ///
    /// The CertificateVerify signature is always checked.
    #[inline(always)]
    pub fn verify_server(&self) -> bool {
        self.verify_server
    }

    /// Certificate presented when the server asks for one.
    #[inline(always)]
    pub fn certificate(&self) -> Option<&CertifiedKey> {
        self.certificate.as_ref()
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    common: CommonBuilder,
    server_name: Option<String>,
    verify_server: bool,
    certificate: Option<(Vec<Vec<u8>>, Vec<u8>)>,
}

impl ClientConfigBuilder {
    /// Set a custom crypto provider.
    ///
    /// Defaults to [`rust_crypto::default_provider`].
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.common.crypto_provider = Some(provider);
        self
    }

    /// Restrict and order the cipher suites offered.
    ///
    /// Defaults to every suite of the provider, in provider order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.common.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Restrict and order the groups offered.
    ///
    /// Defaults to X25519 then P-256.
    pub fn kx_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.common.kx_groups = Some(groups.to_vec());
        self
    }

    /// Set the server name, sent as SNI and checked against the server
    /// certificate.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Offer these ALPN protocols, most preferred first.
    pub fn alpn_protocols<P: AsRef<[u8]>>(mut self, protocols: &[P]) -> Self {
        self.common.alpn_protocols = protocols.iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// Trust a DER certificate as the root of server chains.
    pub fn add_trust_anchor(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.common.trust_anchors.push(der.into());
        self
    }

    /// Accept any server chain. The CertificateVerify signature is still
    /// checked against the presented certificate.
    ///
    /// Defaults to false.
    pub fn dangerous_skip_verification(mut self, skip: bool) -> Self {
        self.verify_server = !skip;
        self
    }

    /// Certificate chain (end-entity first) and private key presented when
    /// the server requests client authentication.
    pub fn with_certificate_chain(mut self, chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        self.certificate = Some((chain, private_key));
        self
    }

    /// Single self-contained certificate, see [`Self::with_certificate_chain`].
    pub fn with_certificate(self, certificate: TlsCertificate) -> Self {
        self.with_certificate_chain(vec![certificate.certificate], certificate.private_key)
    }

    /// Build the configuration.
    ///
    /// Validates the crypto provider and every setting. Returns
    /// `Error::ConfigError` on the first problem found.
    pub fn build(self) -> Result<ClientConfig, Error> {
        let common = self.common.build(DEFAULT_CLIENT_GROUPS)?;

        if let Some(name) = &self.server_name {
            validate_server_name(name)?;
        }
        if self.verify_server && common.trust_anchors.is_empty() {
            return Err(Error::ConfigError(
                "No trust anchors for server verification".to_string(),
            ));
        }
        let certificate = self
            .certificate
            .map(|(chain, key)| CertifiedKey::load(&common.crypto_provider, chain, key))
            .transpose()?;

        Ok(ClientConfig {
            crypto_provider: common.crypto_provider,
            cipher_suites: common.cipher_suites,
            kx_groups: common.kx_groups,
            server_name: self.server_name,
            alpn_protocols: common.alpn_protocols,
            trust_anchors: common.trust_anchors,
            verify_server: self.verify_server,
            certificate,
        })
    }
}

/// Server configuration.
///
/// Shared between connections via `Arc`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<&'static dyn SupportedCipherSuite>,
    kx_groups: Vec<&'static dyn SupportedKxGroup>,
    alpn_protocols: Vec<Vec<u8>>,
    certificate: CertifiedKey,
    client_auth: ClientAuth,
    trust_anchors: Vec<Buf>,
    verify_client: bool,
}

impl ServerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            common: CommonBuilder::default(),
            certificate: None,
            client_auth: ClientAuth::None,
            verify_client: true,
        }
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Cipher suites accepted, in server preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[&'static dyn SupportedCipherSuite] {
        &self.cipher_suites
    }

    /// Groups accepted, in server preference order.
    #[inline(always)]
    pub fn kx_groups(&self) -> &[&'static dyn SupportedKxGroup] {
        &self.kx_groups
    }

    /// ALPN protocols, in server preference order.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// The server's certificate chain and key.
    #[inline(always)]
    pub fn certificate(&self) -> &CertifiedKey {
        &self.certificate
    }

    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// DER certificates client chains must lead to.
    #[inline(always)]
    pub fn trust_anchors(&self) -> &[Buf] {
        &self.trust_anchors
    }

    /// Whether client chains are validated.
    #[inline(always)]
    pub fn verify_client(&self) -> bool {
        self.verify_client
    }
}

/// Builder for [`ServerConfig`].
pub struct ServerConfigBuilder {
    common: CommonBuilder,
    certificate: Option<(Vec<Vec<u8>>, Vec<u8>)>,
    client_auth: ClientAuth,
    verify_client: bool,
}

impl ServerConfigBuilder {
    /// Set a custom crypto provider.
    ///
    /// Defaults to [`rust_crypto::default_provider`].
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.common.crypto_provider = Some(provider);
        self
    }

    /// Restrict and order the cipher suites accepted.
    ///
    /// Defaults to every suite of the provider, in provider order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.common.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Restrict and order the groups accepted.
    ///
    /// Defaults to every group of the provider, in provider order.
    pub fn kx_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.common.kx_groups = Some(groups.to_vec());
        self
    }

    /// Accept these ALPN protocols, in preference order.
    pub fn alpn_protocols<P: AsRef<[u8]>>(mut self, protocols: &[P]) -> Self {
        self.common.alpn_protocols = protocols.iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// Certificate chain (end-entity first) and its private key.
    pub fn with_certificate_chain(mut self, chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        self.certificate = Some((chain, private_key));
        self
    }

    /// Single self-contained certificate, see [`Self::with_certificate_chain`].
    pub fn with_certificate(self, certificate: TlsCertificate) -> Self {
        self.with_certificate_chain(vec![certificate.certificate], certificate.private_key)
    }

    /// Ask clients for a certificate.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Trust a DER certificate as the root of client chains.
    pub fn add_trust_anchor(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.common.trust_anchors.push(der.into());
        self
    }

    /// Accept any client chain. The CertificateVerify signature is still
    /// checked.
    ///
    /// Defaults to false.
    pub fn dangerous_skip_verification(mut self, skip: bool) -> Self {
        self.verify_client = !skip;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ServerConfig, Error> {
        let common = self.common.build(&[])?;

        let Some((chain, key)) = self.certificate else {
            return Err(Error::ConfigError("Server needs a certificate".to_string()));
        };
        let certificate = CertifiedKey::load(&common.crypto_provider, chain, key)?;

        if self.client_auth != ClientAuth::None
            && self.verify_client
            && common.trust_anchors.is_empty()
        {
            return Err(Error::ConfigError(
                "No trust anchors for client verification".to_string(),
            ));
        }

        Ok(ServerConfig {
            crypto_provider: common.crypto_provider,
            cipher_suites: common.cipher_suites,
            kx_groups: common.kx_groups,
            alpn_protocols: common.alpn_protocols,
            certificate,
            client_auth: self.client_auth,
            trust_anchors: common.trust_anchors,
            verify_client: self.verify_client,
        })
    }
}

/// Settings shared by both builders.
#[derive(Default)]
struct CommonBuilder {
    crypto_provider: Option<CryptoProvider>,
    cipher_suites: Option<Vec<CipherSuite>>,
    kx_groups: Option<Vec<NamedGroup>>,
    alpn_protocols: Vec<Vec<u8>>,
    trust_anchors: Vec<Vec<u8>>,
}

struct Common {
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<&'static dyn SupportedCipherSuite>,
    kx_groups: Vec<&'static dyn SupportedKxGroup>,
    alpn_protocols: Vec<Vec<u8>>,
    trust_anchors: Vec<Buf>,
}

impl CommonBuilder {
    /// `default_groups` empty means every group of the provider.
    fn build(self, default_groups: &[NamedGroup]) -> Result<Common, Error> {
        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(rust_crypto::default_provider);

        // Always validate the crypto provider
        crypto_provider.validate()?;

        let cipher_suites: Vec<_> = match self.cipher_suites {
            Some(wanted) => wanted
                .iter()
                .map(|cs| {
                    crypto_provider.find_cipher_suite(*cs).ok_or_else(|| {
                        Error::ConfigError(format!("Cipher suite {:?} not available", cs))
                    })
                })
                .collect::<Result<_, _>>()?,
            None => crypto_provider.supported_cipher_suites().collect(),
        };
        if cipher_suites.is_empty() || cipher_suites.len() > MAX_CIPHER_SUITES {
            return Err(Error::ConfigError(format!(
                "Need 1..={} cipher suites, got {}",
                MAX_CIPHER_SUITES,
                cipher_suites.len()
            )));
        }

        let kx_groups: Vec<_> = match (self.kx_groups, default_groups) {
            (Some(wanted), _) => wanted
                .iter()
                .map(|g| {
                    crypto_provider.find_kx_group(*g).ok_or_else(|| {
                        Error::ConfigError(format!("Group {:?} not available", g))
                    })
                })
                .collect::<Result<_, _>>()?,
            (None, []) => crypto_provider.supported_kx_groups().collect(),
            (None, defaults) => defaults
                .iter()
                .filter_map(|g| crypto_provider.find_kx_group(*g))
                .collect(),
        };
        if kx_groups.is_empty() {
            return Err(Error::ConfigError("No key exchange groups".to_string()));
        }
        for (i, g) in kx_groups.iter().enumerate() {
            if kx_groups[..i].iter().any(|o| o.name() == g.name()) {
                return Err(Error::ConfigError(format!(
                    "Duplicate group {:?}",
                    g.name()
                )));
            }
        }

        if self.alpn_protocols.len() > MAX_ALPN_PROTOCOLS {
            return Err(Error::ConfigError(format!(
                "More than {} ALPN protocols",
                MAX_ALPN_PROTOCOLS
            )));
        }
        if self
            .alpn_protocols
            .iter()
            .any(|p| p.is_empty() || p.len() > 255)
        {
            return Err(Error::ConfigError(
                "ALPN protocol must be 1..=255 bytes".to_string(),
            ));
        }

        if self.trust_anchors.iter().any(|a| a.is_empty()) {
            return Err(Error::ConfigError("Empty trust anchor".to_string()));
        }

        Ok(Common {
            crypto_provider,
            cipher_suites,
            kx_groups,
            alpn_protocols: self.alpn_protocols,
            trust_anchors: self
                .trust_anchors
                .iter()
                .map(|a| Buf::from_slice(a))
                .collect(),
        })
    }
}

fn validate_server_name(name: &str) -> Result<(), Error> {
    if name.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let valid = !name.is_empty()
        && name.len() <= 253
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_');
    if !valid {
        return Err(Error::ConfigError(format!("Invalid server name {:?}", name)));
    }
    Ok(())
}
