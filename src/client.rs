// TLS 1.3 Client Handshake Flow (RFC 8446):
//
// 1. Client sends ClientHello (plaintext)
// 2. Server may respond with HelloRetryRequest (ServerHello with the sentinel random)
//    - Client replaces the transcript with message_hash and sends ClientHello2
// 3. Server sends ServerHello (plaintext)
//    - Client derives handshake secrets, installs handshake keys both ways
// 4. Server sends EncryptedExtensions
// 5. Server sends CertificateRequest (optional)
// 6. Server sends Certificate
// 7. Server sends CertificateVerify
// 8. Server sends Finished
//    - Client derives application secrets, reads switch to application keys
// 9. Client sends Certificate (if requested)
// 10. Client sends CertificateVerify (if it had a certificate to send)
// 11. Client sends Finished
// 12. Writes switch to application keys, application data flows
//
// ChangeCipherSpec records are sent and tolerated for middlebox
// compatibility (RFC 8446 Appendix D.4), and otherwise meaningless.
//
// This implementation is a Sans-IO TLS 1.3 client.

use std::sync::Arc;
use std::time::SystemTime;

use arrayvec::ArrayVec;

use crate::alert::Alert;
use crate::buffer::Buf;
use crate::config::ClientConfig;
use crate::crypto::{ActiveKeyExchange, SupportedCipherSuite, SupportedKxGroup};
use crate::engine::{Decrypted, Engine};
use crate::message::extensions::alpn::AlpnExtension;
use crate::message::extensions::cookie::CookieExtension;
use crate::message::extensions::key_share::{KeyShareClientHello, KeyShareEntry};
use crate::message::extensions::server_name::ServerNameExtension;
use crate::message::extensions::signature_algorithms::SignatureAlgorithmsExtension;
use crate::message::extensions::supported_groups::SupportedGroupsExtension;
use crate::message::extensions::supported_versions::SupportedVersionsClientHello;
use crate::message::{
    signed_content, Certificate, CertificateEntry, CertificateRequest, CertificateVerify,
    ClientHello, EncryptedExtensions, Extension, ExtensionType, Extensions, Finished,
    HandshakeType, Random, ServerHello, ServerHelloKind, SessionId, MAX_CIPHER_SUITES,
    MAX_SIGNATURE_SCHEMES,
};
use crate::types::{CipherSuite, CompressionMethod, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

/// TLS 1.3 client
pub struct Client {
    config: Arc<ClientConfig>,

    /// Current client state.
    state: ClientState,

    /// Engine in common between server and client.
    engine: Engine,

    /// Random unique data. Used for both ClientHellos.
    random: Random,

    /// legacy_session_id, echoed by the server.
    session_id: SessionId,

    /// Active key exchange state (ECDHE)
    active_key_exchange: Option<Box<dyn ActiveKeyExchange>>,

    /// Suite chosen by a HelloRetryRequest, ServerHello must agree.
    hrr_suite: Option<CipherSuite>,

    /// Cookie to echo in ClientHello2.
    hrr_cookie: Option<Buf>,

    /// Set when the server asked for a client certificate.
    certificate_request: Option<RequestedCertificate>,

    /// Server certificates, end-entity first.
    server_certificates: Vec<Buf>,

    /// The negotiated ALPN protocol (if any)
    alpn_protocol: Option<Vec<u8>>,
}

struct RequestedCertificate {
    context: Buf,
    schemes: ArrayVec<SignatureScheme, MAX_SIGNATURE_SCHEMES>,
}

/// Where a [`Client`] is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Start,
    WaitServerHello,
    /// After a HelloRetryRequest.
    WaitServerHello2,
    WaitEncryptedExtensions,
    WaitCertificateOrCertRequest,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,
    Connected,
    /// Terminal. The alert is what we sent, or what the peer sent us.
    Error(Alert),
}

impl Client {
    /// Create a new TLS 1.3 client.
    pub fn new(config: Arc<ClientConfig>) -> Client {
        let engine = Engine::new(config.crypto_provider().clone(), true);
        Client {
            config,
            state: ClientState::Start,
            engine,
            random: Random([0; 32]),
            session_id: SessionId::empty(),
            active_key_exchange: None,
            hrr_suite: None,
            hrr_cookie: None,
            certificate_request: None,
            server_certificates: Vec::new(),
            alpn_protocol: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Begin the handshake, returning the ClientHello record.
    pub fn start(&mut self) -> Result<Vec<u8>, Error> {
        self.engine.check_failed()?;
        if self.state != ClientState::Start {
            return Err(Error::InvalidState("Handshake already started".to_string()));
        }

        self.drive(|client| {
            let mut random = [0; 32];
            client.engine.fill_random(&mut random)?;
            client.random = Random(random);

            let mut session_id = [0; 32];
            client.engine.fill_random(&mut session_id)?;
            client.session_id = SessionId::try_new(&session_id).unwrap_or_default();

            let Some(group) = client.config.kx_groups().first().copied() else {
                return Err(Error::ConfigError("No key exchange groups".to_string()));
            };
            client.send_client_hello(group)?;
            Ok(ClientState::WaitServerHello)
        })
    }

    /// Feed bytes from the server, returning bytes to send back.
    ///
    /// The returned vector may be empty while more input is needed.
    /// Any error is fatal: the state moves to [`ClientState::Error`] and the
    /// alert to send is available from [`Client::alert_record`].
    pub fn process(&mut self, input: &[u8]) -> Result<Vec<u8>, Error> {
        self.engine.check_failed()?;
        match self.state {
            ClientState::Start => {
                return Err(Error::InvalidState("start() not called".to_string()))
            }
            ClientState::Connected => {
                return Err(Error::InvalidState(
                    "Handshake complete, use decrypt()".to_string(),
                ))
            }
            _ => {}
        }

        self.engine.feed(input);
        self.drive(|client| client.make_progress())
    }

    /// Protect application data. Only when connected.
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.guard(|engine| engine.encrypt(data))
    }

    /// Feed bytes from the server and handle at most one record.
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

    /// Records queued in response to a peer KeyUpdate, if no application
    /// data went out to carry them.
    pub fn take_pending(&mut self) -> Option<Vec<u8>> {
        self.engine.take_pending()
    }

    /// Rotate our sending keys, optionally asking the server to do the same.
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

    /// The protocol selected by the server, if ALPN was negotiated.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.alpn_protocol.as_deref()
    }

    /// Server certificate chain, end-entity first.
    pub fn peer_certificates(&self) -> &[Buf] {
        &self.server_certificates
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
        if self.state != ClientState::Connected {
            return None;
        }
        let secrets = self.engine.secrets();
        Some((&secrets.client_application, &secrets.server_application))
    }

    fn make_progress(&mut self) -> Result<ClientState, Error> {
        loop {
            let prev_state = self.state;

            let new_state = prev_state.make_progress(self)?;
            if prev_state != new_state {
                self.state = new_state;
                trace!("{:?} -> {:?}", prev_state, new_state);
            } else {
                return Ok(new_state);
            }
        }
    }

    fn drive(
        &mut self,
        f: impl FnOnce(&mut Client) -> Result<ClientState, Error>,
    ) -> Result<Vec<u8>, Error> {
        match f(self) {
            Ok(state) => {
                self.transition(state);
                Ok(self.engine.take_outgoing())
            }
            Err(e) => Err(self.fail(e)),
        }
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
        self.transition(ClientState::Error(alert));
        e
    }

    fn transition(&mut self, new_state: ClientState) {
        if self.state != new_state {
            trace!("{:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }

    fn offers_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.config
            .kx_groups()
            .iter()
            .copied()
            .find(|g| g.name() == group)
    }

    fn send_client_hello(&mut self, kx_group: &'static dyn SupportedKxGroup) -> Result<(), Error> {
        let random = self.engine.provider().secure_random;
        let key_exchange = kx_group
            .start_exchange(Buf::new(), random)
            .map_err(|e| Error::CryptoError(format!("Failed to start key exchange: {}", e)))?;
        let pub_key = Buf::from_slice(key_exchange.pub_key());
        let group = key_exchange.group();
        self.active_key_exchange = Some(key_exchange);

        let config = &self.config;
        let mut data: Vec<(ExtensionType, Buf)> = Vec::new();

        if let Some(name) = config.sni_name() {
            data.push((
                ExtensionType::ServerName,
                extension_data(|b| ServerNameExtension::new(name).serialize(b))?,
            ));
        }
        data.push((
            ExtensionType::SupportedVersions,
            extension_data(|b| {
                SupportedVersionsClientHello {
                    versions: [ProtocolVersion::TLS1_3].into_iter().collect(),
                }
                .serialize(b)
            })?,
        ));
        let groups: Vec<NamedGroup> = config.kx_groups().iter().map(|g| g.name()).collect();
        data.push((
            ExtensionType::SupportedGroups,
            extension_data(|b| SupportedGroupsExtension::new(&groups).serialize(b))?,
        ));
        data.push((
            ExtensionType::SignatureAlgorithms,
            extension_data(|b| {
                SignatureAlgorithmsExtension::new(SignatureScheme::supported()).serialize(b)
            })?,
        ));
        data.push((
            ExtensionType::KeyShare,
            extension_data(|b| {
                KeyShareClientHello {
                    entries: [KeyShareEntry {
                        group,
                        key_exchange: &pub_key,
                    }]
                    .into_iter()
                    .collect(),
                }
                .serialize(b)
            })?,
        ));
        if let Some(cookie) = &self.hrr_cookie {
            data.push((
                ExtensionType::Cookie,
                extension_data(|b| CookieExtension { cookie }.serialize(b))?,
            ));
        }
        if !config.alpn_protocols().is_empty() {
            data.push((
                ExtensionType::ApplicationLayerProtocolNegotiation,
                extension_data(|b| {
                    AlpnExtension::new(config.alpn_protocols().iter().map(|p| &p[..])).serialize(b)
                })?,
            ));
        }

        let mut extensions = Extensions::new();
        for (extension_type, buf) in &data {
            extensions.push(Extension::new(*extension_type, buf))?;
        }

        let client_hello = ClientHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: self.random,
            legacy_session_id: self.session_id.clone(),
            cipher_suites: config
                .cipher_suites()
                .iter()
                .map(|cs| cs.suite())
                .take(MAX_CIPHER_SUITES)
                .collect(),
            legacy_compression_methods: &[CompressionMethod::Null.as_u8()],
            extensions,
        };

        debug!(
            "Sending ClientHello: key share {:?}, {} suites, cookie {}",
            group,
            client_hello.cipher_suites.len(),
            self.hrr_cookie.is_some()
        );
        self.engine
            .write_handshake(HandshakeType::ClientHello, |out| client_hello.serialize(out))?;
        self.engine.flush_plaintext();
        Ok(())
    }

    /// Checks shared by ServerHello and HelloRetryRequest.
    fn check_server_hello(
        &self,
        sh: &ServerHello,
    ) -> Result<&'static dyn SupportedCipherSuite, Error> {
        if sh.legacy_version != ProtocolVersion::TLS1_2 {
            return Err(Error::ProtocolVersion(format!(
                "legacy_version {:?}",
                sh.legacy_version
            )));
        }
        match sh.supported_versions()? {
            Some(v) if v.selected_version == ProtocolVersion::TLS1_3 => {}
            Some(v) => {
                return Err(Error::ProtocolVersion(format!(
                    "Server selected {:?}",
                    v.selected_version
                )))
            }
            None => {
                return Err(Error::ProtocolVersion(
                    "Server did not select TLS 1.3".to_string(),
                ))
            }
        }
        if sh.legacy_session_id_echo != self.session_id {
            return Err(Error::IllegalParameter(
                "legacy_session_id_echo mismatch".to_string(),
            ));
        }
        if sh.legacy_compression_method != CompressionMethod::Null {
            return Err(Error::IllegalParameter(format!(
                "Compression {:?}",
                sh.legacy_compression_method
            )));
        }
        self.config
            .cipher_suites()
            .iter()
            .copied()
            .find(|cs| cs.suite() == sh.cipher_suite)
            .ok_or_else(|| {
                Error::IllegalParameter(format!("Cipher suite {:?} not offered", sh.cipher_suite))
            })
    }

    fn handle_hello_retry_request(&mut self, hrr: &ServerHello, raw: &[u8]) -> Result<(), Error> {
        let suite = self.check_server_hello(hrr)?;
        let selected = hrr.retry_group()?.map(|ks| ks.selected_group);
        let cookie = hrr.cookie()?;

        if selected.is_none() && cookie.is_none() {
            return Err(Error::IllegalParameter(
                "HelloRetryRequest changes nothing".to_string(),
            ));
        }

        let current = self
            .active_key_exchange
            .as_ref()
            .map(|kx| kx.group())
            .ok_or_else(|| Error::InvalidState("No key exchange in progress".to_string()))?;

        let kx_group = match selected {
            Some(group) if group == current => {
                return Err(Error::IllegalParameter(format!(
                    "HelloRetryRequest selected {:?}, already shared",
                    group
                )))
            }
            Some(group) => self.offers_group(group).ok_or_else(|| {
                Error::IllegalParameter(format!(
                    "HelloRetryRequest selected {:?}, not offered",
                    group
                ))
            })?,
            None => self.offers_group(current).ok_or_else(|| {
                Error::InvalidState(format!("Group {:?} vanished", current))
            })?,
        };

        debug!(
            "HelloRetryRequest: suite {:?}, group {:?}, cookie {}",
            suite.suite(),
            selected,
            cookie.is_some()
        );

        // Transcript: message_hash(CH1) || HRR || CH2 ...
        self.engine.set_cipher_suite(suite)?;
        self.engine.transcript().replace_with_message_hash()?;
        self.engine.transcript().absorb(raw);

        self.hrr_suite = Some(suite.suite());
        self.hrr_cookie = cookie.map(|c| Buf::from_slice(c.cookie));

        self.engine.send_change_cipher_spec();
        self.send_client_hello(kx_group)
    }

    fn handle_server_hello(&mut self, sh: &ServerHello, raw: &[u8]) -> Result<(), Error> {
        let suite = self.check_server_hello(sh)?;
        if let Some(hrr_suite) = self.hrr_suite {
            if hrr_suite != suite.suite() {
                return Err(Error::IllegalParameter(format!(
                    "ServerHello suite {:?} differs from HelloRetryRequest {:?}",
                    suite.suite(),
                    hrr_suite
                )));
            }
        }

        let Some(key_share) = sh.key_share()? else {
            return Err(Error::MissingExtension("key_share".to_string()));
        };
        let Some(key_exchange) = self.active_key_exchange.take() else {
            return Err(Error::InvalidState("No key exchange in progress".to_string()));
        };
        if key_share.entry.group != key_exchange.group() {
            return Err(Error::IllegalParameter(format!(
                "Server key share {:?}, offered {:?}",
                key_share.entry.group,
                key_exchange.group()
            )));
        }

        self.engine.set_cipher_suite(suite)?;
        self.engine.transcript().absorb(raw);

        let mut shared = Buf::new();
        key_exchange
            .complete(key_share.entry.key_exchange, &mut shared)
            .map_err(|e| Error::IllegalParameter(format!("Server key share: {}", e)))?;

        debug!(
            "ServerHello: {:?} with {:?}",
            suite.suite(),
            key_share.entry.group
        );
        self.engine.derive_handshake_secrets(&shared)
    }

    fn send_client_flight(&mut self) -> Result<(), Error> {
        if let Some(request) = self.certificate_request.take() {
            let certified = self
                .config
                .certificate()
                .and_then(|c| c.select_scheme(&request.schemes).map(|s| (c, s)));

            match &certified {
                Some((c, _)) => debug!("Sending client certificate chain of {}", c.chain().len()),
                None => debug!("No suitable client certificate, sending empty Certificate"),
            }

            let certificate = Certificate {
                context: &request.context,
                certificate_list: certified
                    .iter()
                    .flat_map(|(c, _)| c.chain().iter())
                    .map(|der| CertificateEntry::new(der))
                    .collect(),
            };
            self.engine
                .write_handshake(HandshakeType::Certificate, |out| certificate.serialize(out))?;

            if let Some((certified, scheme)) = certified {
                let hash = self.engine.transcript_hash()?;
                let mut content = Buf::new();
                signed_content(false, &hash, &mut content);

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
            }
        }

        let verify_data = self.engine.finished_verify_data()?;
        self.engine.write_handshake(HandshakeType::Finished, |out| {
            Finished {
                verify_data: &verify_data,
            }
            .serialize(out);
            Ok(())
        })?;

        self.engine.send_change_cipher_spec();
        self.engine.flush_encrypted()?;
        self.engine.install_application_write_keys()?;
        self.engine.wipe_handshake_secrets();
        Ok(())
    }
}

/// Serialize one extension body on its own.
fn extension_data(f: impl FnOnce(&mut Buf) -> Result<(), Error>) -> Result<Buf, Error> {
    let mut data = Buf::new();
    f(&mut data)?;
    Ok(data)
}

impl ClientState {
    fn make_progress(self, client: &mut Client) -> Result<Self, Error> {
        match self {
            ClientState::WaitServerHello | ClientState::WaitServerHello2 => {
                self.await_server_hello(client)
            }
            ClientState::WaitEncryptedExtensions => self.await_encrypted_extensions(client),
            ClientState::WaitCertificateOrCertRequest => {
                self.await_certificate_or_cert_request(client)
            }
            ClientState::WaitCertificate => self.await_certificate(client),
            ClientState::WaitCertificateVerify => self.await_certificate_verify(client),
            ClientState::WaitFinished => self.await_finished(client),
            ClientState::Start | ClientState::Connected | ClientState::Error(_) => Ok(self),
        }
    }

    fn await_server_hello(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::ServerHello)?;
        let kind = ServerHello::decode(msg.body())?;

        match kind {
            ServerHelloKind::HelloRetryRequest(hrr) => {
                if self == ClientState::WaitServerHello2 {
                    return Err(Error::UnexpectedMessage(
                        "Second HelloRetryRequest".to_string(),
                    ));
                }
                client.handle_hello_retry_request(&hrr, msg.raw())?;
                Ok(ClientState::WaitServerHello2)
            }
            ServerHelloKind::ServerHello(sh) => {
                client.handle_server_hello(&sh, msg.raw())?;
                Ok(ClientState::WaitEncryptedExtensions)
            }
        }
    }

    fn await_encrypted_extensions(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::EncryptedExtensions)?;
        let ee = EncryptedExtensions::decode(msg.body())?;

        if let Some(alpn) = ee.alpn()? {
            let selected = alpn.selected()?;
            if !client.config.alpn_protocols().iter().any(|p| p[..] == *selected) {
                return Err(Error::IllegalParameter(format!(
                    "Server selected ALPN {:?}, not offered",
                    String::from_utf8_lossy(selected)
                )));
            }
            debug!("ALPN: {}", String::from_utf8_lossy(selected));
            client.alpn_protocol = Some(selected.to_vec());
        }

        client.engine.transcript().absorb(msg.raw());
        Ok(ClientState::WaitCertificateOrCertRequest)
    }

    fn await_certificate_or_cert_request(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };

        match msg.msg_type {
            HandshakeType::CertificateRequest => {
                let request = CertificateRequest::decode(msg.body())?;
                let schemes = request.signature_algorithms()?.schemes;
                debug!("Server requested a client certificate");
                client.certificate_request = Some(RequestedCertificate {
                    context: Buf::from_slice(request.context),
                    schemes,
                });
                client.engine.transcript().absorb(msg.raw());
                Ok(ClientState::WaitCertificate)
            }
            HandshakeType::Certificate => {
                client.handle_server_certificate(msg.body())?;
                client.engine.transcript().absorb(msg.raw());
                Ok(ClientState::WaitCertificateVerify)
            }
            other => Err(Error::UnexpectedMessage(format!(
                "{:?} while waiting for Certificate",
                other
            ))),
        }
    }

    fn await_certificate(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::Certificate)?;
        client.handle_server_certificate(msg.body())?;
        client.engine.transcript().absorb(msg.raw());
        Ok(ClientState::WaitCertificateVerify)
    }

    fn await_certificate_verify(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::CertificateVerify)?;
        let verify = CertificateVerify::decode(msg.body())?;

        if !verify.scheme.is_valid_for_certificate_verify()
            || !SignatureScheme::supported().contains(&verify.scheme)
        {
            return Err(Error::IllegalParameter(format!(
                "CertificateVerify scheme {:?} not offered",
                verify.scheme
            )));
        }

        let Some(end_entity) = client.server_certificates.first() else {
            return Err(Error::InvalidState("No server certificate".to_string()));
        };

        // Signature covers the transcript up to, not including, this message.
        let hash = client.engine.transcript_hash()?;
        let mut content = Buf::new();
        signed_content(true, &hash, &mut content);

        let provider = client.engine.provider();
        provider
            .signature_verification
            .verify_signature(end_entity, &content, verify.signature, verify.scheme)
            .map_err(|e| {
                warn!("Server CertificateVerify rejected: {}", e);
                Error::from(e)
            })?;
        trace!("Server CertificateVerify verified: {:?}", verify.scheme);

        if client.config.verify_server() {
            let chain: Vec<&[u8]> = client.server_certificates.iter().map(|c| &c[..]).collect();
            provider.certificate_verification.verify_chain(
                &chain,
                client.config.trust_anchors(),
                client.config.server_name(),
                SystemTime::now(),
            )?;
            debug!("Server certificate chain verified");
        }

        client.engine.transcript().absorb(msg.raw());
        Ok(ClientState::WaitFinished)
    }

    fn await_finished(self, client: &mut Client) -> Result<Self, Error> {
        let Some(msg) = client.engine.next_handshake()? else {
            return Ok(self);
        };
        msg.expect(HandshakeType::Finished)?;
        let finished = Finished::decode(msg.body());
        client.engine.verify_peer_finished(finished.verify_data)?;
        trace!("Server Finished verified successfully");

        client.engine.transcript().absorb(msg.raw());
        client.engine.derive_application_secrets()?;
        client.engine.install_application_read_keys()?;

        client.send_client_flight()?;
        client.engine.set_connected();
        debug!(
            "Handshake complete: {:?}",
            client.engine.cipher_suite()
        );
        Ok(ClientState::Connected)
    }
}

impl Client {
    fn handle_server_certificate(&mut self, body: &[u8]) -> Result<(), Error> {
        let certificate = Certificate::decode(body)?;
        if !certificate.context.is_empty() {
            return Err(Error::IllegalParameter(
                "Server Certificate with request context".to_string(),
            ));
        }
        if certificate.certificate_list.is_empty() {
            return Err(Error::DecodeError("Empty server certificate".to_string()));
        }
        for (i, entry) in certificate.certificate_list.iter().enumerate() {
            trace!("Certificate #{} size: {} bytes", i + 1, entry.cert_data.len());
        }
        self.server_certificates = certificate.to_owned_chain();
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("cipher_suite", &self.engine.cipher_suite())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDescription;
    use crate::message::extensions::key_share::{KeyShareHelloRetryRequest, KeyShareServerHello};
    use crate::message::extensions::supported_versions::SupportedVersionsServerHello;
    use crate::message::{write_handshake, Handshake, HRR_RANDOM};
    use crate::record::{self, RECORD_HEADER_LEN};
    use crate::types::ContentType;

    fn config() -> Arc<ClientConfig> {
        Arc::new(
            ClientConfig::builder()
                .dangerous_skip_verification(true)
                .server_name("example.com")
                .alpn_protocols(&["h2", "http/1.1"])
                .build()
                .unwrap(),
        )
    }

    /// Records split into (content type, payload).
    fn records(mut wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while !wire.is_empty() {
            let len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
            out.push((wire[0], wire[RECORD_HEADER_LEN..RECORD_HEADER_LEN + len].to_vec()));
            wire = &wire[RECORD_HEADER_LEN + len..];
        }
        out
    }

    fn client_hello_of(wire: &[u8]) -> Vec<u8> {
        let (ct, payload) = records(wire).pop().unwrap();
        assert_eq!(ct, 22);
        payload
    }

    fn session_id_of(ch: &[u8]) -> SessionId {
        let (msg, _) = Handshake::next(ch, 1 << 17).unwrap().unwrap();
        ClientHello::decode(msg.body).unwrap().legacy_session_id
    }

    fn server_hello_record(
        random: [u8; 32],
        session_id: SessionId,
        extensions: &[(ExtensionType, Vec<u8>)],
    ) -> Vec<u8> {
        let mut list = Extensions::new();
        for (t, d) in extensions {
            list.push(Extension::new(*t, d)).unwrap();
        }
        let sh = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: Random(random),
            legacy_session_id_echo: session_id,
            cipher_suite: CipherSuite::AES_128_GCM_SHA256,
            legacy_compression_method: CompressionMethod::Null,
            extensions: list,
        };
        let mut msg = Buf::new();
        write_handshake(&mut msg, HandshakeType::ServerHello, |b| sh.serialize(b)).unwrap();
        let mut wire = Buf::new();
        record::write_plaintext(ContentType::Handshake, &msg, &mut wire);
        wire.into_vec()
    }

    fn versions_tls13() -> (ExtensionType, Vec<u8>) {
        let mut b = Buf::new();
        SupportedVersionsServerHello {
            selected_version: ProtocolVersion::TLS1_3,
        }
        .serialize(&mut b);
        (ExtensionType::SupportedVersions, b.into_vec())
    }

    fn retry_group(group: NamedGroup) -> (ExtensionType, Vec<u8>) {
        let mut b = Buf::new();
        KeyShareHelloRetryRequest {
            selected_group: group,
        }
        .serialize(&mut b);
        (ExtensionType::KeyShare, b.into_vec())
    }

    #[test]
    fn client_hello_contents() {
        let _ = env_logger::try_init();
        let mut client = Client::new(config());
        let wire = client.start().unwrap();
        assert_eq!(client.state(), ClientState::WaitServerHello);

        let payload = client_hello_of(&wire);
        let (msg, _) = Handshake::next(&payload, 1 << 17).unwrap().unwrap();
        assert_eq!(msg.msg_type, HandshakeType::ClientHello);
        let ch = ClientHello::decode(msg.body).unwrap();

        assert_eq!(ch.legacy_version, ProtocolVersion::TLS1_2);
        assert_eq!(ch.legacy_session_id.len(), 32);
        assert_eq!(ch.cipher_suites.len(), 3);
        assert!(ch
            .supported_versions()
            .unwrap()
            .unwrap()
            .contains(ProtocolVersion::TLS1_3));
        assert_eq!(
            &ch.supported_groups().unwrap().unwrap().groups[..],
            &[NamedGroup::X25519, NamedGroup::Secp256r1]
        );
        let shares = ch.key_share().unwrap().unwrap();
        assert_eq!(shares.entries.len(), 1);
        assert_eq!(shares.entries[0].group, NamedGroup::X25519);
        assert_eq!(shares.entries[0].key_exchange.len(), 32);
        assert_eq!(
            ch.server_name().unwrap().unwrap().host_name,
            Some("example.com")
        );
        assert_eq!(ch.alpn().unwrap().unwrap().protocols.len(), 2);
        assert!(ch.cookie().unwrap().is_none());
    }

    #[test]
    fn misuse_is_not_fatal() {
        let mut client = Client::new(config());
        assert!(matches!(client.process(&[]), Err(Error::InvalidState(_))));
        client.start().unwrap();
        assert!(matches!(client.start(), Err(Error::InvalidState(_))));
        assert!(matches!(client.encrypt(b"x"), Err(Error::InvalidState(_))));
        assert_eq!(client.state(), ClientState::WaitServerHello);
    }

    #[test]
    fn hello_retry_request_for_p256() {
        let _ = env_logger::try_init();
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let cookie = (ExtensionType::Cookie, vec![0, 3, 1, 2, 3]);
        let hrr = server_hello_record(
            HRR_RANDOM,
            session_id_of(&ch1),
            &[versions_tls13(), retry_group(NamedGroup::Secp256r1), cookie],
        );
        let out = client.process(&hrr).unwrap();
        assert_eq!(client.state(), ClientState::WaitServerHello2);

        let recs = records(&out);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], (20, vec![1]));

        let (msg, _) = Handshake::next(&recs[1].1, 1 << 17).unwrap().unwrap();
        let ch2 = ClientHello::decode(msg.body).unwrap();
        let shares = ch2.key_share().unwrap().unwrap();
        assert_eq!(shares.entries[0].group, NamedGroup::Secp256r1);
        assert_eq!(shares.entries[0].key_exchange.len(), 65);
        assert_eq!(ch2.cookie().unwrap().unwrap().cookie, &[1, 2, 3]);
        assert_eq!(ch2.legacy_session_id, session_id_of(&ch1));
    }

    #[test]
    fn hello_retry_request_for_shared_group() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let hrr = server_hello_record(
            HRR_RANDOM,
            session_id_of(&ch1),
            &[versions_tls13(), retry_group(NamedGroup::X25519)],
        );
        assert!(matches!(
            client.process(&hrr),
            Err(Error::IllegalParameter(_))
        ));
        assert_eq!(
            client.state(),
            ClientState::Error(Alert::fatal(AlertDescription::IllegalParameter))
        );
        assert_eq!(client.alert_record().unwrap(), vec![21, 3, 3, 0, 2, 2, 47]);
        assert!(client.alert_record().is_none());
        assert!(matches!(
            client.process(&[]),
            Err(Error::ConnectionFailed(_))
        ));
    }

    #[test]
    fn hello_retry_request_for_group_not_offered() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let hrr = server_hello_record(
            HRR_RANDOM,
            session_id_of(&ch1),
            &[versions_tls13(), retry_group(NamedGroup::Secp384r1)],
        );
        assert!(matches!(
            client.process(&hrr),
            Err(Error::IllegalParameter(_))
        ));
    }

    #[test]
    fn second_hello_retry_request() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());
        let session_id = session_id_of(&ch1);

        let hrr = server_hello_record(
            HRR_RANDOM,
            session_id.clone(),
            &[versions_tls13(), retry_group(NamedGroup::Secp256r1)],
        );
        client.process(&hrr).unwrap();

        let cookie = (ExtensionType::Cookie, vec![0, 1, 9]);
        let again = server_hello_record(HRR_RANDOM, session_id, &[versions_tls13(), cookie]);
        assert!(matches!(
            client.process(&again),
            Err(Error::UnexpectedMessage(_))
        ));
    }

    #[test]
    fn server_hello_without_tls13() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let sh = server_hello_record([7; 32], session_id_of(&ch1), &[]);
        assert!(matches!(
            client.process(&sh),
            Err(Error::ProtocolVersion(_))
        ));
        assert_eq!(
            client.state(),
            ClientState::Error(Alert::fatal(AlertDescription::ProtocolVersion))
        );
    }

    #[test]
    fn server_hello_wrong_session_echo() {
        let mut client = Client::new(config());
        client.start().unwrap();

        let sh = server_hello_record([7; 32], SessionId::empty(), &[versions_tls13()]);
        assert!(matches!(
            client.process(&sh),
            Err(Error::IllegalParameter(_))
        ));
    }

    #[test]
    fn server_hello_wrong_key_share_group() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let mut share = Buf::new();
        KeyShareServerHello {
            entry: KeyShareEntry {
                group: NamedGroup::Secp256r1,
                key_exchange: &[4; 65],
            },
        }
        .serialize(&mut share)
        .unwrap();
        let sh = server_hello_record(
            [7; 32],
            session_id_of(&ch1),
            &[versions_tls13(), (ExtensionType::KeyShare, share.into_vec())],
        );
        assert!(matches!(
            client.process(&sh),
            Err(Error::IllegalParameter(_))
        ));
    }

    #[test]
    fn server_hello_missing_key_share() {
        let mut client = Client::new(config());
        let ch1 = client_hello_of(&client.start().unwrap());

        let sh = server_hello_record([7; 32], session_id_of(&ch1), &[versions_tls13()]);
        assert!(matches!(
            client.process(&sh),
            Err(Error::MissingExtension(_))
        ));
    }

    #[test]
    fn peer_alert_is_not_echoed() {
        let mut client = Client::new(config());
        client.start().unwrap();

        let err = client.process(&[21, 3, 3, 0, 2, 2, 40]).unwrap_err();
        assert_eq!(
            err,
            Error::PeerAlert(Alert::fatal(AlertDescription::HandshakeFailure))
        );
        assert_eq!(
            client.state(),
            ClientState::Error(Alert::fatal(AlertDescription::HandshakeFailure))
        );
        assert!(client.alert_record().is_none());
    }
}
