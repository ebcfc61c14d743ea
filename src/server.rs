// TLS 1.3 Server Handshake Flow (RFC 8446):
//
// 1. Client sends ClientHello
//    - Server picks suite, group, signature scheme and ALPN
//    - No key share for the chosen group: HelloRetryRequest with a cookie,
//      client answers with ClientHello2 (once)
// 2. Server sends ServerHello (plaintext) and ChangeCipherSpec
//    - Handshake keys installed both ways
// 3. Server sends EncryptedExtensions
// 4. Server sends CertificateRequest (if client auth is configured)
// 5. Server sends Certificate
// 6. Server sends CertificateVerify
// 7. Server sends Finished
//    - Application secrets derived, writes switch to application keys
// 8. Client sends Certificate and CertificateVerify (if requested)
// 9. Client sends Finished
//    - Reads switch to application keys, application data flows
//
// This implementation is a Sans-IO TLS 1.3 server.

use std::sync::Arc;
use std::time::SystemTime;

use subtle::ConstantTimeEq;

use crate::alert::Alert;
use crate::buffer::Buf;
use crate::config::{ClientAuth, ServerConfig};
use crate::crypto::{SupportedCipherSuite, SupportedKxGroup};
use crate::engine::{Decrypted, Engine};
use crate::message::extensions::alpn::{select_protocol, AlpnExtension};
use crate::message::extensions::cookie::CookieExtension;
use crate::message::extensions::key_share::{
    KeyShareEntry, KeyShareHelloRetryRequest, KeyShareServerHello,
};
use crate::message::extensions::signature_algorithms::SignatureAlgorithmsExtension;
use crate::message::extensions::supported_versions::SupportedVersionsServerHello;
use crate::message::{
    signed_content, Certificate, CertificateEntry, CertificateRequest, CertificateVerify,
    ClientHello, EncryptedExtensions, Extension, ExtensionType, Extensions, Finished,
    HandshakeType, Random, ServerHello, SessionId, HRR_RANDOM,
};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion, SignatureScheme};
use crate::Error;

/// TLS 1.3 server
pub struct Server {
    config: Arc<ServerConfig>,

    /// Current server state.
    state: ServerState,

    /// Engine in common between server and client.
    engine: Engine,

    /// What the ClientHello settled on.
    negotiated: Option<Negotiated>,

    /// Cookie sent in our HelloRetryRequest, ClientHello2 must echo it.
    hrr_cookie: Option<Buf>,

    /// Host name from the client's SNI.
    server_name: Option<String>,

    /// Client certificates, end-entity first.
    client_certificates: Vec<Buf>,
}

/// Parameters chosen from a ClientHello.
struct Negotiated {
    suite: &'static dyn SupportedCipherSuite,
    kx_group: &'static dyn SupportedKxGroup,
    scheme: SignatureScheme,
    session_id: SessionId,
    /// The client's share for `kx_group`, if it sent one.
    client_share: Option<Buf>,
    alpn: Option<Vec<u8>>,
}

/// Where a [`Server`] is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Start,
    /// After a HelloRetryRequest.
    WaitClientHello2,
    RecvdClientHello,
    Negotiated,
    WaitFlight2,
    WaitClientCert,
    WaitCertVerify,
    WaitFinished,
    Connected,
    /// Terminal. The alert is what we sent, or what the peer sent us.
    Error(Alert),
}

impl Server {
    /// Create a new TLS 1.3 server.
    pub fn new(config: Arc<ServerConfig>) -> Server {
        let engine = Engine::new(config.crypto_provider().clone(), false);
        Server {
            config,
            state: ServerState::Start,
            engine,
            negotiated: None,
            hrr_cookie: None,
            server_name: None,
            client_certificates: Vec::new(),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Feed bytes from the client, returning bytes to send back.
    ///
    /// Any error is fatal: the state moves to [`ServerState::Error`] and the
    /// alert to send is available from [`Server::alert_record`].
    pub fn process(&mut self, input: &[u8]) -> Result<Vec<u8>, Error> {
        self.engine.check_failed()?;
        if self.state == ServerState::Connected {
            return Err(Error::InvalidState(
                "Handshake complete, use decrypt()".to_string(),
            ));
        }

        self.engine.feed(input);
        match self.make_progress() {
            Ok(()) => Ok(self.engine.take_outgoing()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Protect application data. Only when connected.
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.guard(|engine| engine.encrypt(data))
    }

    /// Feed bytes from the client and handle at most one record.
    ///
    /// Call again with an empty slice until [`Decrypted::NeedMoreData`] to
    /// drain everything buffered.
    pub fn decrypt(&mut self, input: &[u8]) -> Result<Decrypted, Error> {
        self.guard(|engine| {
            if !engine.is_connected() {
                return Err(Error::InvalidState("Handshake not complete".to_string()));
            }
            engine.decrypt(input)
        })
    }

    /// Records queued in response to a peer KeyUpdate.
    pub fn take_pending(&mut self) -> Option<Vec<u8>> {
        self.engine.take_pending()
    }

    /// Rotate our sending keys, optionally asking the client to do the same.
    pub fn key_update(&mut self, request_peer: bool) -> Result<Vec<u8>, Error> {
        self.guard(|engine| engine.key_update(request_peer))
    }

    /// Encrypted `close_notify`.
    pub fn close(&mut self) -> Result<Vec<u8>, Error> {
        self.guard(|engine| engine.close())
    }

    /// The fatal alert record to send after an error, once.
    pub fn alert_record(&mut self) -> Option<Vec<u8>> {
        self.engine.alert_record()
    }

    pub fn is_peer_closed(&self) -> bool {
        self.engine.is_peer_closed()
    }

    /// Host name the client asked for via SNI.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// The negotiated ALPN protocol (if any)
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.negotiated.as_ref().and_then(|n| n.alpn.as_deref())
    }

    /// Client certificate chain, end-entity first. Empty without client
    /// authentication.
    pub fn peer_certificates(&self) -> &[Buf] {
        &self.client_certificates
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.engine.cipher_suite()
    }

    /// RFC 8446 Section 7.5 exporter.
    pub fn export_keying_material(
        &self,
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Buf, Error> {
        self.engine.export_keying_material(label, context, len)
    }

    /// Current client and server application traffic secrets.
    ///
    /// For key logging and diagnostics.
    pub fn application_traffic_secrets(&self) -> Option<(&[u8], &[u8])> {
        if self.state != ServerState::Connected {
            return None;
        }
        let secrets = self.engine.secrets();
        Some((&secrets.client_application, &secrets.server_application))
    }

    fn make_progress(&mut self) -> Result<(), Error> {
        loop {
            let prev_state = self.state;

            let new_state = prev_state.make_progress(self)?;
            if prev_state != new_state {
                self.state = new_state;
                trace!("{:?} -> {:?}", prev_state, new_state);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Engine) -> Result<T, Error>) -> Result<T, Error> {
        self.engine.check_failed()?;
        match f(&mut self.engine) {
            Ok(v) => Ok(v),
            // Misuse of the API leaves the connection intact.
            Err(e @ Error::InvalidState(_)) => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, e: Error) -> Error {
        let alert = self.engine.fail(&e);
        let new_state = ServerState::Error(alert);
        trace!("{:?} -> {:?}", self.state, new_state);
        self.state = new_state;
        e
    }

    fn negotiated(&self) -> Result<&Negotiated, Error> {
        self.negotiated
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Nothing negotiated".to_string()))
    }

    /// Pick parameters from a ClientHello, in server preference order.
    fn negotiate(&self, ch: &ClientHello) -> Result<Negotiated, Error> {
        if ch.legacy_version.as_u16() < ProtocolVersion::TLS1_2.as_u16() {
            return Err(Error::ProtocolVersion(format!(
                "legacy_version {}",
                ch.legacy_version
            )));
        }
        if !ch.has_only_null_compression() {
            return Err(Error::IllegalParameter(
                "Compression methods other than null".to_string(),
            ));
        }
        match ch.supported_versions()? {
            Some(v) if v.contains(ProtocolVersion::TLS1_3) => {}
            _ => {
                return Err(Error::ProtocolVersion(
                    "Client does not offer TLS 1.3".to_string(),
                ))
            }
        }

        let suite = self
            .config
            .cipher_suites()
            .iter()
            .copied()
            .find(|cs| ch.cipher_suites.contains(&cs.suite()))
            .ok_or_else(|| Error::HandshakeFailure("No common cipher suite".to_string()))?;

        let Some(groups) = ch.supported_groups()? else {
            return Err(Error::MissingExtension("supported_groups".to_string()));
        };
        let kx_group = self
            .config
            .kx_groups()
            .iter()
            .copied()
            .find(|g| groups.groups.contains(&g.name()))
            .ok_or_else(|| Error::HandshakeFailure("No common group".to_string()))?;

        let Some(key_shares) = ch.key_share()? else {
            return Err(Error::MissingExtension("key_share".to_string()));
        };
        for entry in &key_shares.entries {
            if !groups.groups.contains(&entry.group) {
                return Err(Error::IllegalParameter(format!(
                    "Key share for {:?} not in supported_groups",
                    entry.group
                )));
            }
        }
        let client_share = key_shares
            .find(kx_group.name())
            .map(|e| Buf::from_slice(e.key_exchange));

        let Some(signature_algorithms) = ch.signature_algorithms()? else {
            return Err(Error::MissingExtension("signature_algorithms".to_string()));
        };
        let scheme = self
            .config
            .certificate()
            .select_scheme(&signature_algorithms.schemes)
            .ok_or_else(|| {
                Error::HandshakeFailure("No common signature scheme".to_string())
            })?;

        let alpn = match ch.alpn()? {
            Some(offered) if !self.config.alpn_protocols().is_empty() => {
                let selected = select_protocol(self.config.alpn_protocols(), &offered.protocols)
                    .ok_or(Error::NoApplicationProtocol)?;
                Some(selected.to_vec())
            }
            _ => None,
        };

        debug!(
            "Negotiated {:?}, {:?}, {:?}, share {}",
            suite.suite(),
            kx_group.name(),
            scheme,
            client_share.is_some()
        );

        Ok(Negotiated {
            suite,
            kx_group,
            scheme,
            session_id: ch.legacy_session_id.clone(),
            client_share,
            alpn,
        })
    }

    fn send_hello_retry_request(&mut self) -> Result<(), Error> {
        let negotiated = self.negotiated()?;
        let suite = negotiated.suite;
        let group = negotiated.kx_group.name();
        let session_id = negotiated.session_id.clone();

        // Cookie = HMAC(per-connection key, Hash(ClientHello1))
        let ch1_hash = self.engine.transcript_hash()?;
        let mut key = Buf::new();
        key.resize(suite.hash_algorithm().output_len(), 0);
        self.engine.fill_random(&mut key)?;
        let mut cookie = Buf::new();
        self.engine
            .provider()
            .hmac_provider
            .hmac(suite.hash_algorithm(), &key, &ch1_hash, &mut cookie)
            .map_err(Error::CryptoError)?;

        self.engine.transcript().replace_with_message_hash()?;

        let mut versions = Buf::new();
        SupportedVersionsServerHello {
            selected_version: ProtocolVersion::TLS1_3,
        }
        .serialize(&mut versions);
        let mut key_share = Buf::new();
        KeyShareHelloRetryRequest {
            selected_group: group,
        }
        .serialize(&mut key_share);
        let mut cookie_data = Buf::new();
        CookieExtension { cookie: &cookie }.serialize(&mut cookie_data)?;

        let mut extensions = Extensions::new();
        extensions.push(Extension::new(ExtensionType::SupportedVersions, &versions))?;
        extensions.push(Extension::new(ExtensionType::KeyShare, &key_share))?;
        extensions.push(Extension::new(ExtensionType::Cookie, &cookie_data))?;

        let hrr = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: Random(HRR_RANDOM),
            legacy_session_id_echo: session_id,
            cipher_suite: suite.suite(),
            legacy_compression_method: CompressionMethod::Null,
            extensions,
        };

        debug!("Sending HelloRetryRequest for {:?}", group);
        self.engine
            .write_handshake(HandshakeType::ServerHello, |out| hrr.serialize(out))?;
        self.engine.flush_plaintext();
        self.engine.send_change_cipher_spec();

        self.hrr_cookie = Some(cookie);
        Ok(())
    }

    fn send_server_hello(&mut self) -> Result<(), Error> {
        let negotiated = self.negotiated()?;
        let Some(client_share) = negotiated.client_share.as_ref() else {
            return Err(Error::InvalidState("No client key share".to_string()));
        };

        let key_exchange = negotiated
            .kx_group
            .start_exchange(Buf::new(), self.engine.provider().secure_random)
            .map_err(|e| Error::CryptoError(format!("Failed to start key exchange: {}", e)))?;
        let group = key_exchange.group();
        let pub_key = Buf::from_slice(key_exchange.pub_key());

        let mut shared = Buf::new();
        key_exchange
            .complete(client_share, &mut shared)
            .map_err(|e| Error::IllegalParameter(format!("Client key share: {}", e)))?;

        let mut random = [0; 32];
        self.engine.fill_random(&mut random)?;

        let mut versions = Buf::new();
        SupportedVersionsServerHello {
            selected_version: ProtocolVersion::TLS1_3,
        }
        .serialize(&mut versions);
        let mut key_share = Buf::new();
        KeyShareServerHello {
            entry: KeyShareEntry {
                group,
                key_exchange: &pub_key,
            },
        }
        .serialize(&mut key_share)?;

        let mut extensions = Extensions::new();
        extensions.push(Extension::new(ExtensionType::SupportedVersions, &versions))?;
        extensions.push(Extension::new(ExtensionType::KeyShare, &key_share))?;

        let server_hello = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: Random(random),
            legacy_session_id_echo: negotiated.session_id.clone(),
            cipher_suite: negotiated.suite.suite(),
            legacy_compression_method: CompressionMethod::Null,
            extensions,
        };

        self.engine
            .write_handshake(HandshakeType::ServerHello, |out| server_hello.serialize(out))?;
        self.engine.flush_plaintext();
        self.engine.send_change_cipher_spec();

        self.engine.derive_handshake_secrets(&shared)
    }

    fn send_server_flight(&mut self) -> Result<(), Error> {
        let config = Arc::clone(&self.config);
        let (scheme, alpn) = {
            let negotiated = self.negotiated()?;
            (negotiated.scheme, negotiated.alpn.clone())
        };

        let mut alpn_data = Buf::new();
        let mut extensions = Extensions::new();
        if let Some(protocol) = &alpn {
            AlpnExtension::new([&protocol[..]]).serialize(&mut alpn_data)?;
            extensions.push(Extension::new(
                ExtensionType::ApplicationLayerProtocolNegotiation,
                &alpn_data,
            ))?;
        }
        let encrypted_extensions = EncryptedExtensions { extensions };
        self.engine
            .write_handshake(HandshakeType::EncryptedExtensions, |out| {
                encrypted_extensions.serialize(out)
            })?;

        if config.client_auth() != ClientAuth::None {
            let mut schemes = Buf::new();
            SignatureAlgorithmsExtension::new(SignatureScheme::supported())
                .serialize(&mut schemes)?;
            let mut extensions = Extensions::new();
            extensions.push(Extension::new(ExtensionType::SignatureAlgorithms, &schemes))?;
            let request = CertificateRequest {
                context: &[],
                extensions,
            };
            debug!("Requesting client certificate ({:?})", config.client_auth());
            self.engine
                .write_handshake(HandshakeType::CertificateRequest, |out| {
                    request.serialize(out)
                })?;
        }

        let certified = config.certificate();
        let certificate = Certificate {
            context: &[],
            certificate_list: certified
                .chain()
                .iter()
                .map(|der| CertificateEntry::new(der))
                .collect(),
        };
        self.engine
            .write_handshake(HandshakeType::Certificate, |out| certificate.serialize(out))?;

        let hash = self.engine.transcript_hash()?;
        let mut content = Buf::new();
        signed_content(true, &hash, &mut content);
        let mut key = certified.signing_key(self.engine.provider())?;
        let mut signature = Buf::new();
        key.sign(scheme, &content, &mut signature)
            .map_err(Error::CryptoError)?;
        let verify = CertificateVerify {
            scheme,
            signature: &signature,
        };
        self.engine
            .write_handshake(HandshakeType::CertificateVerify, |out| verify.serialize(out))?;

        let verify_data = self.engine.finished_verify_data()?;
        self.engine.write_handshake(HandshakeType::Finished, |out| {
            Finished {
                verify_data: &verify_data,
            }
            .serialize(out);
            Ok(())
        })?;
        self.engine.flush_encrypted()?;

        // Transcript now ends with server Finished.
        self.engine.derive_application_secrets()?;
        self.engine.install_application_write_keys()
    }
}

impl ServerState {
    fn make_progress(self, server: &mut Server) -> Result<Self, Error> {
        match self {
            ServerState::Start => self.await_client_hello(server),
            ServerState::WaitClientHello2 => self.await_client_hello2(server),
            ServerState::RecvdClientHello => self.send_server_hello(server),
            ServerState::Negotiated => self.send_server_flight(server),
            ServerState::WaitFlight2 => self.await_flight2(server),
            ServerState::WaitClientCert => self.await_client_certificate(server),
            ServerState::WaitCertVerify => self.await_certificate_verify(server),
            ServerState::WaitFinished => self.await_finished(server),
            ServerState::Connected | ServerState::Error(_) => Ok(self),
        }
    }

    fn await_client_hello(self, server: &mut Server) -> Result<Self, Error> {
        let Some(msg) = server.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::ClientHello)?;
        let ch = ClientHello::decode(msg.body())?;

        if let Some(sni) = ch.server_name()? {
            server.server_name = sni.host_name.map(|n| n.to_string());
            debug!("SNI: {:?}", server.server_name);
        }

        let negotiated = server.negotiate(&ch)?;
        let needs_retry = negotiated.client_share.is_none();

        server.engine.transcript().absorb(msg.raw());
        server.engine.set_cipher_suite(negotiated.suite)?;
        server.negotiated = Some(negotiated);

        if needs_retry {
            server.send_hello_retry_request()?;
            return Ok(ServerState::WaitClientHello2);
        }
        Ok(ServerState::RecvdClientHello)
    }

    fn await_client_hello2(self, server: &mut Server) -> Result<Self, Error> {
        let Some(msg) = server.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::ClientHello)?;
        let ch = ClientHello::decode(msg.body())?;

        let Some(expected) = server.hrr_cookie.take() else {
            return Err(Error::InvalidState("No cookie sent".to_string()));
        };
        let echoed = ch.cookie()?.map(|c| c.cookie).unwrap_or_default();
        let ok: bool = echoed.ct_eq(&expected[..]).into();
        if !ok {
            return Err(Error::IllegalParameter(
                "ClientHello2 does not echo the cookie".to_string(),
            ));
        }

        let negotiated = server.negotiate(&ch)?;
        let previous = server.negotiated()?;
        if negotiated.suite.suite() != previous.suite.suite()
            || negotiated.kx_group.name() != previous.kx_group.name()
        {
            return Err(Error::IllegalParameter(
                "ClientHello2 changed the negotiation".to_string(),
            ));
        }
        if negotiated.client_share.is_none() {
            return Err(Error::IllegalParameter(format!(
                "ClientHello2 lacks a key share for {:?}",
                negotiated.kx_group.name()
            )));
        }

        server.engine.transcript().absorb(msg.raw());
        server.negotiated = Some(negotiated);
        Ok(ServerState::RecvdClientHello)
    }

    fn send_server_hello(self, server: &mut Server) -> Result<Self, Error> {
        server.send_server_hello()?;
        Ok(ServerState::Negotiated)
    }

    fn send_server_flight(self, server: &mut Server) -> Result<Self, Error> {
        server.send_server_flight()?;
        Ok(ServerState::WaitFlight2)
    }

    fn await_flight2(self, server: &mut Server) -> Result<Self, Error> {
        if server.config.client_auth() == ClientAuth::None {
            Ok(ServerState::WaitFinished)
        } else {
            Ok(ServerState::WaitClientCert)
        }
    }

    fn await_client_certificate(self, server: &mut Server) -> Result<Self, Error> {
        let Some(msg) = server.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::Certificate)?;
        let certificate = Certificate::decode(msg.body())?;

        if !certificate.context.is_empty() {
            return Err(Error::IllegalParameter(
                "Client Certificate context mismatch".to_string(),
            ));
        }

        server.engine.transcript().absorb(msg.raw());

        if certificate.certificate_list.is_empty() {
            if server.config.client_auth() == ClientAuth::Required {
                warn!("Client sent no certificate");
                return Err(Error::CertificateRequired);
            }
            debug!("Client sent no certificate");
            return Ok(ServerState::WaitFinished);
        }

        server.client_certificates = certificate.to_owned_chain();
        Ok(ServerState::WaitCertVerify)
    }

    fn await_certificate_verify(self, server: &mut Server) -> Result<Self, Error> {
        let Some(msg) = server.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::CertificateVerify)?;
        let verify = CertificateVerify::decode(msg.body())?;

        if !verify.scheme.is_valid_for_certificate_verify()
            || !SignatureScheme::supported().contains(&verify.scheme)
        {
            return Err(Error::IllegalParameter(format!(
                "CertificateVerify scheme {:?} not requested",
                verify.scheme
            )));
        }

        let Some(end_entity) = server.client_certificates.first() else {
            return Err(Error::InvalidState("No client certificate".to_string()));
        };

        let hash = server.engine.transcript_hash()?;
        let mut content = Buf::new();
        signed_content(false, &hash, &mut content);

        let provider = server.engine.provider();
        provider
            .signature_verification
            .verify_signature(end_entity, &content, verify.signature, verify.scheme)
            .map_err(|e| {
                warn!("Client CertificateVerify rejected: {}", e);
                Error::from(e)
            })?;
        trace!("Client CertificateVerify verified: {:?}", verify.scheme);

        if server.config.verify_client() {
            let chain: Vec<&[u8]> = server.client_certificates.iter().map(|c| &c[..]).collect();
            provider.certificate_verification.verify_chain(
                &chain,
                server.config.trust_anchors(),
                None,
                SystemTime::now(),
            )?;
            debug!("Client certificate chain verified");
        }

        server.engine.transcript().absorb(msg.raw());
        Ok(ServerState::WaitFinished)
    }

    fn await_finished(self, server: &mut Server) -> Result<Self, Error> {
        let Some(msg) = server.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::Finished)?;
        let finished = Finished::decode(msg.body());
        server.engine.verify_peer_finished(finished.verify_data)?;
        trace!("Client Finished verified successfully");

        server.engine.transcript().absorb(msg.raw());
        server.engine.install_application_read_keys()?;
        server.engine.wipe_handshake_secrets();
        server.engine.set_connected();
        debug!("Handshake complete: {:?}", server.engine.cipher_suite());
        Ok(ServerState::Connected)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("cipher_suite", &self.engine.cipher_suite())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDescription;
    use crate::certificate::generate_self_signed_certificate;
    use crate::config::ClientConfig;
    use crate::message::{write_handshake, Handshake, ServerHelloKind};
    use crate::record::{self, RECORD_HEADER_LEN};
    use crate::types::{ContentType, NamedGroup};
    use crate::Client;

    fn server(f: impl FnOnce(crate::ServerConfigBuilder) -> crate::ServerConfigBuilder) -> Server {
        let cert = generate_self_signed_certificate().unwrap();
        let config = f(ServerConfig::builder().with_certificate(cert))
            .build()
            .unwrap();
        Server::new(Arc::new(config))
    }

    fn client(f: impl FnOnce(crate::ClientConfigBuilder) -> crate::ClientConfigBuilder) -> Client {
        let config = f(ClientConfig::builder().dangerous_skip_verification(true))
            .build()
            .unwrap();
        Client::new(Arc::new(config))
    }

    fn records(mut wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while !wire.is_empty() {
            let len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
            out.push((wire[0], wire[RECORD_HEADER_LEN..RECORD_HEADER_LEN + len].to_vec()));
            wire = &wire[RECORD_HEADER_LEN + len..];
        }
        out
    }

    /// Re-encode a ClientHello record without one extension.
    fn without_extension(wire: &[u8], drop: ExtensionType) -> Vec<u8> {
        let (_, payload) = records(wire).pop().unwrap();
        let (msg, _) = Handshake::next(&payload, 1 << 17).unwrap().unwrap();
        let mut ch = ClientHello::decode(msg.body).unwrap();
        let mut extensions = Extensions::new();
        for ext in ch.extensions.iter().filter(|e| e.extension_type != drop) {
            extensions.push(*ext).unwrap();
        }
        ch.extensions = extensions;

        let mut msg = Buf::new();
        write_handshake(&mut msg, HandshakeType::ClientHello, |b| ch.serialize(b)).unwrap();
        let mut out = Buf::new();
        record::write_plaintext(ContentType::Handshake, &msg, &mut out);
        out.into_vec()
    }

    #[test]
    fn flight_after_client_hello() {
        let _ = env_logger::try_init();
        let mut client = client(|b| b);
        let mut server = server(|b| b);

        let out = server.process(&client.start().unwrap()).unwrap();
        assert_eq!(server.state(), ServerState::WaitFinished);

        // ServerHello, ChangeCipherSpec, one protected record.
        let recs = records(&out);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].0, 22);
        assert_eq!(recs[1], (20, vec![1]));
        assert_eq!(recs[2].0, 23);
    }

    #[test]
    fn hello_retry_request_for_p256_only_server() {
        let _ = env_logger::try_init();
        let mut client = client(|b| b);
        let mut server = server(|b| b.kx_groups(&[NamedGroup::Secp256r1]));

        let out = server.process(&client.start().unwrap()).unwrap();
        assert_eq!(server.state(), ServerState::WaitClientHello2);

        let recs = records(&out);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1], (20, vec![1]));
        let (msg, _) = Handshake::next(&recs[0].1, 1 << 17).unwrap().unwrap();
        let ServerHelloKind::HelloRetryRequest(hrr) = ServerHello::decode(msg.body).unwrap()
        else {
            panic!("expected HelloRetryRequest");
        };
        assert_eq!(
            hrr.retry_group().unwrap().unwrap().selected_group,
            NamedGroup::Secp256r1
        );
        assert_eq!(hrr.cookie().unwrap().unwrap().cookie.len(), 32);
    }

    #[test]
    fn client_hello2_must_echo_cookie() {
        let mut client = client(|b| b);
        let mut server = server(|b| b.kx_groups(&[NamedGroup::Secp256r1]));

        let hrr = server.process(&client.start().unwrap()).unwrap();
        let ch2 = client.process(&hrr).unwrap();
        // Drop the change_cipher_spec in front and the cookie inside.
        let ch2 = without_extension(&ch2[6..], ExtensionType::Cookie);

        assert!(matches!(
            server.process(&ch2),
            Err(Error::IllegalParameter(_))
        ));
        assert_eq!(
            server.state(),
            ServerState::Error(Alert::fatal(AlertDescription::IllegalParameter))
        );
    }

    #[test]
    fn no_common_cipher_suite() {
        let mut client = client(|b| b.cipher_suites(&[CipherSuite::CHACHA20_POLY1305_SHA256]));
        let mut server = server(|b| b.cipher_suites(&[CipherSuite::AES_128_GCM_SHA256]));

        assert!(matches!(
            server.process(&client.start().unwrap()),
            Err(Error::HandshakeFailure(_))
        ));
        let alert = server.alert_record().unwrap();
        assert_eq!(alert, vec![21, 3, 3, 0, 2, 2, 40]);
    }

    #[test]
    fn no_common_group() {
        let mut client = client(|b| b.kx_groups(&[NamedGroup::X25519]));
        let mut server = server(|b| b.kx_groups(&[NamedGroup::Secp384r1]));

        assert!(matches!(
            server.process(&client.start().unwrap()),
            Err(Error::HandshakeFailure(_))
        ));
    }

    #[test]
    fn alpn_mismatch() {
        let mut client = client(|b| b.alpn_protocols(&["h2"]));
        let mut server = server(|b| b.alpn_protocols(&["http/1.1"]));

        assert_eq!(
            server.process(&client.start().unwrap()),
            Err(Error::NoApplicationProtocol)
        );
        assert_eq!(
            server.state(),
            ServerState::Error(Alert::fatal(AlertDescription::NoApplicationProtocol))
        );
    }

    #[test]
    fn client_without_tls13() {
        let mut client = client(|b| b);
        let mut server = server(|b| b);

        let ch = without_extension(&client.start().unwrap(), ExtensionType::SupportedVersions);
        assert!(matches!(
            server.process(&ch),
            Err(Error::ProtocolVersion(_))
        ));
    }

    #[test]
    fn client_without_signature_algorithms() {
        let mut client = client(|b| b);
        let mut server = server(|b| b);

        let ch = without_extension(&client.start().unwrap(), ExtensionType::SignatureAlgorithms);
        assert!(matches!(
            server.process(&ch),
            Err(Error::MissingExtension(_))
        ));
    }

    #[test]
    fn application_data_before_handshake() {
        let mut server = server(|b| b);
        assert!(matches!(
            server.process(&[23, 3, 3, 0, 1, 0]),
            Err(Error::UnexpectedMessage(_))
        ));
        assert!(matches!(
            server.process(&[]),
            Err(Error::ConnectionFailed(_))
        ));
    }

    #[test]
    fn oversized_record_rejected() {
        let mut server = server(|b| b);
        let len = (16640u16 + 1).to_be_bytes();
        assert_eq!(
            server.process(&[22, 3, 3, len[0], len[1]]),
            Err(Error::RecordOverflow(16641))
        );
        assert_eq!(
            server.state(),
            ServerState::Error(Alert::fatal(AlertDescription::RecordOverflow))
        );
    }
}
