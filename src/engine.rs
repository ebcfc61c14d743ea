//! Machinery shared by the client and server state machines.
//!
//! The engine owns everything that is not specific to one side of the
//! handshake: inbound record parsing and decryption, handshake message
//! reassembly, the transcript, the key schedule and the record keys for
//! both directions, outbound flight staging, and post-handshake traffic
//! (application data, KeyUpdate, NewSessionTicket, alerts).
//!
//! Inbound bytes are buffered as given. Records are only taken off the
//! buffer when the state machine asks for the next handshake message, so a
//! record is never decrypted before the keys it needs are installed.

use std::mem;

use subtle::ConstantTimeEq;

use crate::alert::{Alert, AlertDescription};
use crate::buffer::Buf;
use crate::crypto::{CryptoProvider, SupportedCipherSuite};
use crate::key_schedule::{KeySchedule, TrafficSecrets};
use crate::message::util::decode_all;
use crate::message::{
    write_handshake, Handshake, HandshakeType, KeyUpdateRequest, NewSessionTicket,
    HANDSHAKE_HEADER_LEN, MAX_HANDSHAKE_MESSAGE_LEN,
};
use crate::record::{self, parse_header, RecordKeys, MAX_PLAINTEXT_LEN, RECORD_HEADER_LEN};
use crate::transcript::Transcript;
use crate::types::{CipherSuite, ContentType};
use crate::Error;

/// Outcome of feeding bytes to `decrypt` on a connected endpoint.
#[derive(Debug, PartialEq, Eq)]
pub enum Decrypted {
    /// The content of one application data record.
    ApplicationData(Buf),

    /// A record was consumed that carried no application data, such as a
    /// KeyUpdate or a session ticket. More records may be buffered, call
    /// `decrypt` again with an empty slice.
    NoApplicationData,

    /// No complete record is buffered.
    NeedMoreData,

    /// The peer sent `close_notify`.
    Closed,
}

/// One complete handshake message, copied out of the reassembly buffer.
#[derive(Debug)]
pub(crate) struct HandshakeMessage {
    pub msg_type: HandshakeType,
    raw: Buf,
}

impl HandshakeMessage {
    /// Header and body, as absorbed into the transcript.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn body(&self) -> &[u8] {
        &self.raw[HANDSHAKE_HEADER_LEN..]
    }

    pub fn expect(&self, wanted: HandshakeType) -> Result<(), Error> {
        if self.msg_type != wanted {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} while waiting for {:?}",
                self.msg_type, wanted
            )));
        }
        Ok(())
    }
}

pub(crate) struct Engine {
    provider: CryptoProvider,

    /// Whether this engine is for a client (true) or server (false).
    is_client: bool,

    /// Received bytes not yet split into records.
    incoming: Buf,

    /// Handshake bytes not yet split into messages.
    handshake: Buf,

    /// Handshake messages written but not yet put in records.
    flight: Buf,

    /// Records ready to hand to the caller.
    outgoing: Buf,

    /// KeyUpdate response waiting for the next outbound data.
    pending: Buf,

    transcript: Transcript,

    /// Set once the cipher suite is negotiated.
    suite: Option<&'static dyn SupportedCipherSuite>,
    key_schedule: Option<KeySchedule>,

    secrets: TrafficSecrets,
    read_keys: Option<RecordKeys>,
    write_keys: Option<RecordKeys>,

    sent_change_cipher_spec: bool,
    connected: bool,
    peer_closed: bool,
    close_sent: bool,

    /// Terminal failure, if any.
    failed: Option<Alert>,

    /// Alert still to be rendered by `alert_record`.
    alert_out: Option<Alert>,
}

impl Engine {
    pub fn new(provider: CryptoProvider, is_client: bool) -> Self {
        let transcript = Transcript::new(provider.hash_provider);
        Engine {
            provider,
            is_client,
            incoming: Buf::new(),
            handshake: Buf::new(),
            flight: Buf::new(),
            outgoing: Buf::new(),
            pending: Buf::new(),
            transcript,
            suite: None,
            key_schedule: None,
            secrets: TrafficSecrets::default(),
            read_keys: None,
            write_keys: None,
            sent_change_cipher_spec: false,
            connected: false,
            peer_closed: false,
            close_sent: false,
            failed: None,
            alert_out: None,
        }
    }

    pub fn provider(&self) -> &CryptoProvider {
        &self.provider
    }

    pub fn fill_random(&self, buf: &mut [u8]) -> Result<(), Error> {
        self.provider
            .secure_random
            .fill(buf)
            .map_err(Error::CryptoError)
    }

    pub fn feed(&mut self, input: &[u8]) {
        self.incoming.extend_from_slice(input);
    }

    pub fn transcript(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn transcript_hash(&self) -> Result<Buf, Error> {
        self.transcript.current_hash()
    }

    // ------------------------------------------------------------------
    // Negotiated parameters and secrets
    // ------------------------------------------------------------------

    /// Fix the cipher suite. This also fixes the transcript hash.
    pub fn set_cipher_suite(
        &mut self,
        suite: &'static dyn SupportedCipherSuite,
    ) -> Result<(), Error> {
        if let Some(current) = self.suite {
            if current.suite() != suite.suite() {
                return Err(Error::IllegalParameter(format!(
                    "Cipher suite changed {:?} -> {:?}",
                    current.suite(),
                    suite.suite()
                )));
            }
            return Ok(());
        }
        self.transcript.set_hash(suite.hash_algorithm())?;
        self.key_schedule = Some(KeySchedule::new(&self.provider, suite.hash_algorithm()));
        self.suite = Some(suite);
        Ok(())
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.suite.map(|s| s.suite())
    }

    fn negotiated(&self) -> Result<(KeySchedule, &'static dyn SupportedCipherSuite), Error> {
        match (self.key_schedule, self.suite) {
            (Some(ks), Some(suite)) => Ok((ks, suite)),
            _ => Err(Error::InvalidState(
                "Cipher suite not negotiated".to_string(),
            )),
        }
    }

    pub fn secrets(&self) -> &TrafficSecrets {
        &self.secrets
    }

    /// Derive the handshake traffic secrets at the ServerHello checkpoint
    /// and install handshake keys in both directions.
    pub fn derive_handshake_secrets(&mut self, ecdhe: &[u8]) -> Result<(), Error> {
        let (ks, suite) = self.negotiated()?;
        let hello_hash = self.transcript.current_hash()?;
        ks.handshake_secrets(&mut self.secrets, ecdhe, &hello_hash)?;

        let (read, write) = if self.is_client {
            (&self.secrets.server_handshake, &self.secrets.client_handshake)
        } else {
            (&self.secrets.client_handshake, &self.secrets.server_handshake)
        };
        let read = RecordKeys::from_secret(&ks, suite, read)?;
        let write = RecordKeys::from_secret(&ks, suite, write)?;
        self.install_read_keys(read)?;
        self.write_keys = Some(write);
        debug!("Handshake keys installed for {:?}", suite.suite());
        Ok(())
    }

    /// Derive application and exporter secrets at the server Finished
    /// checkpoint. Keys are installed separately, since each side switches
    /// its two directions at different points.
    pub fn derive_application_secrets(&mut self) -> Result<(), Error> {
        let (ks, _) = self.negotiated()?;
        let finished_hash = self.transcript.current_hash()?;
        ks.application_secrets(&mut self.secrets, &finished_hash)
    }

    pub fn install_application_read_keys(&mut self) -> Result<(), Error> {
        let (ks, suite) = self.negotiated()?;
        let secret = if self.is_client {
            &self.secrets.server_application
        } else {
            &self.secrets.client_application
        };
        let keys = RecordKeys::from_secret(&ks, suite, secret)?;
        self.install_read_keys(keys)
    }

    pub fn install_application_write_keys(&mut self) -> Result<(), Error> {
        let (ks, suite) = self.negotiated()?;
        let secret = if self.is_client {
            &self.secrets.client_application
        } else {
            &self.secrets.server_application
        };
        self.write_keys = Some(RecordKeys::from_secret(&ks, suite, secret)?);
        Ok(())
    }

    /// A handshake message may not straddle a key change.
    fn install_read_keys(&mut self, keys: RecordKeys) -> Result<(), Error> {
        if !self.handshake.is_empty() {
            return Err(Error::UnexpectedMessage(
                "Handshake message spans a key change".to_string(),
            ));
        }
        self.read_keys = Some(keys);
        Ok(())
    }

    /// verify_data for our own Finished over the current transcript.
    pub fn finished_verify_data(&self) -> Result<Buf, Error> {
        let secret = if self.is_client {
            &self.secrets.client_handshake
        } else {
            &self.secrets.server_handshake
        };
        self.verify_data_for(secret)
    }

    /// Check the peer's Finished against the current transcript.
    pub fn verify_peer_finished(&self, verify_data: &[u8]) -> Result<(), Error> {
        let secret = if self.is_client {
            &self.secrets.server_handshake
        } else {
            &self.secrets.client_handshake
        };
        let expected = self.verify_data_for(secret)?;

        let ok: bool = verify_data.ct_eq(&expected[..]).into();
        if !ok {
            warn!("Peer Finished verify_data mismatch");
            return Err(Error::DecryptError("Finished verification failed".to_string()));
        }
        Ok(())
    }

    fn verify_data_for(&self, secret: &[u8]) -> Result<Buf, Error> {
        let (ks, _) = self.negotiated()?;
        let hash = self.transcript.current_hash()?;
        ks.finished_verify_data(secret, &hash)
    }

    /// Handshake traffic secrets are done with once both Finished are through.
    pub fn wipe_handshake_secrets(&mut self) {
        self.secrets.client_handshake.wipe();
        self.secrets.server_handshake.wipe();
    }

    pub fn export_keying_material(
        &self,
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Buf, Error> {
        if !self.connected || self.secrets.exporter_master.is_empty() {
            return Err(Error::InvalidState(
                "Keying material is only available when connected".to_string(),
            ));
        }
        let (ks, _) = self.negotiated()?;
        ks.export_keying_material(&self.secrets.exporter_master, label, context, len)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Take the next complete record off the inbound buffer.
    fn next_record(&mut self) -> Result<Option<(ContentType, Buf)>, Error> {
        let Some(header) = parse_header(&self.incoming)? else {
            return Ok(None);
        };
        let len = header.record_len();
        let record = Buf::from_slice(&self.incoming[..len]);
        self.incoming.consume(len);

        match (header.content_type, self.read_keys.as_mut()) {
            (ContentType::ChangeCipherSpec, _) => {
                if self.connected || record[RECORD_HEADER_LEN..] != [0x01] {
                    return Err(Error::UnexpectedMessage(
                        "Unexpected change_cipher_spec".to_string(),
                    ));
                }
                Ok(Some((ContentType::ChangeCipherSpec, Buf::new())))
            }
            (ContentType::ApplicationData, Some(keys)) => {
                let (content_type, data) = record::decrypt(&record, keys)?;
                if content_type == ContentType::ChangeCipherSpec {
                    return Err(Error::UnexpectedMessage(
                        "Protected change_cipher_spec".to_string(),
                    ));
                }
                Ok(Some((content_type, data)))
            }
            (content_type, Some(_)) => Err(Error::UnexpectedMessage(format!(
                "Plaintext {} record after keys are installed",
                content_type
            ))),
            (ContentType::ApplicationData, None) => Err(Error::UnexpectedMessage(
                "Application data before keys are installed".to_string(),
            )),
            (content_type, None) => {
                let payload = &record[RECORD_HEADER_LEN..];
                if payload.len() > MAX_PLAINTEXT_LEN {
                    return Err(Error::RecordOverflow(payload.len()));
                }
                Ok(Some((content_type, Buf::from_slice(payload))))
            }
        }
    }

    fn take_handshake_message(&mut self) -> Result<Option<HandshakeMessage>, Error> {
        let next = Handshake::next(&self.handshake, MAX_HANDSHAKE_MESSAGE_LEN)?
            .map(|(h, used)| (h.msg_type, used));
        let Some((msg_type, used)) = next else {
            return Ok(None);
        };
        let raw = Buf::from_slice(&self.handshake[..used]);
        self.handshake.consume(used);
        Ok(Some(HandshakeMessage { msg_type, raw }))
    }

    fn append_handshake(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if fragment.is_empty() {
            return Err(Error::UnexpectedMessage(
                "Empty handshake record".to_string(),
            ));
        }
        self.handshake.extend_from_slice(fragment);
        Ok(())
    }

    /// Next complete handshake message during the handshake.
    ///
    /// Pulls as many records as needed. `change_cipher_spec` is dropped,
    /// alerts end the handshake, application data is out of place.
    pub fn next_handshake(&mut self) -> Result<Option<HandshakeMessage>, Error> {
        loop {
            if let Some(msg) = self.take_handshake_message()? {
                trace!("Received {:?} ({} bytes)", msg.msg_type, msg.raw.len());
                return Ok(Some(msg));
            }

            let Some((content_type, fragment)) = self.next_record()? else {
                return Ok(None);
            };

            match content_type {
                ContentType::Handshake => self.append_handshake(&fragment)?,
                ContentType::ChangeCipherSpec => {
                    trace!("Ignoring change_cipher_spec");
                }
                ContentType::Alert => {
                    let alert = decode_all(&fragment, Alert::parse)?;
                    warn!("Peer sent alert during handshake: {}", alert);
                    return Err(Error::PeerAlert(alert));
                }
                _ => {
                    return Err(Error::UnexpectedMessage(format!(
                        "{} record during handshake",
                        content_type
                    )))
                }
            }
        }
    }

    /// Handle one inbound record on a connected endpoint.
    pub fn decrypt(&mut self, input: &[u8]) -> Result<Decrypted, Error> {
        self.feed(input);
        if self.peer_closed {
            return Ok(Decrypted::Closed);
        }

        let Some((content_type, data)) = self.next_record()? else {
            return Ok(Decrypted::NeedMoreData);
        };

        match content_type {
            ContentType::ApplicationData => {
                if !self.handshake.is_empty() {
                    return Err(Error::UnexpectedMessage(
                        "Application data interleaved with a handshake message".to_string(),
                    ));
                }
                Ok(Decrypted::ApplicationData(data))
            }
            ContentType::Handshake => {
                self.append_handshake(&data)?;
                self.process_post_handshake()?;
                Ok(Decrypted::NoApplicationData)
            }
            ContentType::Alert => {
                let alert = decode_all(&data, Alert::parse)?;
                if alert.description == AlertDescription::CloseNotify {
                    debug!("Peer sent close_notify");
                    self.peer_closed = true;
                    return Ok(Decrypted::Closed);
                }
                warn!("Peer sent alert: {}", alert);
                Err(Error::PeerAlert(alert))
            }
            _ => Err(Error::UnexpectedMessage(format!(
                "{} record after handshake",
                content_type
            ))),
        }
    }

    fn process_post_handshake(&mut self) -> Result<(), Error> {
        while let Some(msg) = self.take_handshake_message()? {
            match msg.msg_type {
                HandshakeType::KeyUpdate => {
                    let request = KeyUpdateRequest::decode(msg.body())?;
                    if !self.handshake.is_empty() {
                        return Err(Error::UnexpectedMessage(
                            "KeyUpdate not at a record boundary".to_string(),
                        ));
                    }
                    self.rotate_read_keys()?;
                    debug!("Peer KeyUpdate {:?}", request);

                    if request == KeyUpdateRequest::UpdateRequested && self.pending.is_empty() {
                        let mut pending = mem::take(&mut self.pending);
                        let result =
                            self.write_key_update(KeyUpdateRequest::UpdateNotRequested, &mut pending);
                        self.pending = pending;
                        result?;
                    }
                }
                HandshakeType::NewSessionTicket if self.is_client => {
                    let ticket = NewSessionTicket::decode(msg.body())?;
                    debug!(
                        "Ignoring session ticket, lifetime {}s",
                        ticket.ticket_lifetime
                    );
                }
                other => {
                    return Err(Error::UnexpectedMessage(format!(
                        "{:?} after handshake",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    fn rotate_read_keys(&mut self) -> Result<(), Error> {
        let (ks, suite) = self.negotiated()?;
        let secret = if self.is_client {
            &mut self.secrets.server_application
        } else {
            &mut self.secrets.client_application
        };
        *secret = ks.update_traffic_secret(secret)?;
        self.read_keys = Some(RecordKeys::from_secret(&ks, suite, secret)?);
        Ok(())
    }

    fn rotate_write_keys(&mut self) -> Result<(), Error> {
        let (ks, suite) = self.negotiated()?;
        let secret = if self.is_client {
            &mut self.secrets.client_application
        } else {
            &mut self.secrets.server_application
        };
        *secret = ks.update_traffic_secret(secret)?;
        self.write_keys = Some(RecordKeys::from_secret(&ks, suite, secret)?);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Append a handshake message to the current flight and the transcript.
    pub fn write_handshake(
        &mut self,
        msg_type: HandshakeType,
        f: impl FnOnce(&mut Buf) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let start = self.flight.len();
        write_handshake(&mut self.flight, msg_type, f)?;
        self.transcript.absorb(&self.flight[start..]);
        trace!("Sending {:?} ({} bytes)", msg_type, self.flight.len() - start);
        Ok(())
    }

    /// Send the staged flight as plaintext handshake records.
    pub fn flush_plaintext(&mut self) {
        record::write_plaintext(ContentType::Handshake, &self.flight, &mut self.outgoing);
        self.flight.wipe();
    }

    /// Send the staged flight under the current write keys.
    pub fn flush_encrypted(&mut self) -> Result<(), Error> {
        let Some(keys) = self.write_keys.as_mut() else {
            return Err(Error::InvalidState("No write keys installed".to_string()));
        };
        record::encrypt_fragmented(
            &self.flight,
            ContentType::Handshake,
            keys,
            &mut self.outgoing,
        )?;
        self.flight.wipe();
        Ok(())
    }

    /// Middlebox compatibility change_cipher_spec (RFC 8446 Appendix D.4),
    /// sent at most once.
    pub fn send_change_cipher_spec(&mut self) {
        if self.sent_change_cipher_spec {
            return;
        }
        self.sent_change_cipher_spec = true;
        record::write_plaintext(ContentType::ChangeCipherSpec, &[0x01], &mut self.outgoing);
    }

    pub fn take_outgoing(&mut self) -> Vec<u8> {
        mem::take(&mut self.outgoing).into_vec()
    }

    pub fn set_connected(&mut self) {
        self.connected = true;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_can_send(&self) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::InvalidState("Handshake not complete".to_string()));
        }
        if self.close_sent {
            return Err(Error::InvalidState("close_notify already sent".to_string()));
        }
        Ok(())
    }

    /// Protect application data. A queued KeyUpdate response goes first.
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.ensure_can_send()?;
        let mut out = mem::take(&mut self.pending);
        let Some(keys) = self.write_keys.as_mut() else {
            return Err(Error::InvalidState("No write keys installed".to_string()));
        };
        record::encrypt_fragmented(data, ContentType::ApplicationData, keys, &mut out)?;
        Ok(out.into_vec())
    }

    pub fn take_pending(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(mem::take(&mut self.pending).into_vec())
    }

    /// Send a KeyUpdate and move our write direction to the next secret.
    pub fn key_update(&mut self, request_peer: bool) -> Result<Vec<u8>, Error> {
        self.ensure_can_send()?;
        let request = if request_peer {
            KeyUpdateRequest::UpdateRequested
        } else {
            KeyUpdateRequest::UpdateNotRequested
        };
        let mut out = mem::take(&mut self.pending);
        self.write_key_update(request, &mut out)?;
        debug!("Sent KeyUpdate {:?}", request);
        Ok(out.into_vec())
    }

    fn write_key_update(&mut self, request: KeyUpdateRequest, out: &mut Buf) -> Result<(), Error> {
        let mut msg = Buf::new();
        write_handshake(&mut msg, HandshakeType::KeyUpdate, |b| {
            request.serialize(b);
            Ok(())
        })?;
        let Some(keys) = self.write_keys.as_mut() else {
            return Err(Error::InvalidState("No write keys installed".to_string()));
        };
        record::encrypt(&msg, ContentType::Handshake, keys, out)?;
        self.rotate_write_keys()
    }

    /// Encrypted `close_notify`. Further sends are refused.
    pub fn close(&mut self) -> Result<Vec<u8>, Error> {
        self.ensure_can_send()?;
        let mut out = mem::take(&mut self.pending);
        self.write_alert(Alert::close_notify(), &mut out)?;
        self.close_sent = true;
        Ok(out.into_vec())
    }

    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }

    fn write_alert(&mut self, alert: Alert, out: &mut Buf) -> Result<(), Error> {
        let mut payload = Buf::new();
        alert.serialize(&mut payload);
        match self.write_keys.as_mut() {
            Some(keys) => record::encrypt(&payload, ContentType::Alert, keys, out),
            None => {
                record::write_plaintext(ContentType::Alert, &payload, out);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Failure
    // ------------------------------------------------------------------

    pub fn check_failed(&self) -> Result<(), Error> {
        match self.failed {
            Some(alert) => Err(Error::ConnectionFailed(alert)),
            None => Ok(()),
        }
    }

    /// Enter the terminal failure state and wipe secret material.
    ///
    /// Write keys are kept so the alert can still be protected.
    pub fn fail(&mut self, error: &Error) -> Alert {
        let alert = match error {
            Error::PeerAlert(alert) => *alert,
            e => {
                let alert = e
                    .alert()
                    .unwrap_or_else(|| Alert::fatal(AlertDescription::InternalError));
                self.alert_out = Some(alert);
                alert
            }
        };
        debug!("Connection failed: {} ({})", error, alert);

        self.failed = Some(alert);
        self.secrets = TrafficSecrets::default();
        self.read_keys = None;
        self.incoming.wipe();
        self.handshake.wipe();
        self.flight.wipe();
        self.pending.wipe();
        self.outgoing.wipe();
        alert
    }

    /// The record carrying our fatal alert, once.
    pub fn alert_record(&mut self) -> Option<Vec<u8>> {
        let alert = self.alert_out.take()?;
        let mut out = Buf::new();
        if let Err(e) = self.write_alert(alert, &mut out) {
            debug!("Unable to protect alert: {}", e);
            return None;
        }
        self.write_keys = None;
        Some(out.into_vec())
    }
}
