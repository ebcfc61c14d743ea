//! TLS 1.3 Key Schedule (RFC 8446 Section 7.1)
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic",
//!              |                     ClientHello...ServerHello)
//!              |                     = client_handshake_traffic_secret
//!              |
//!              +-----> Derive-Secret(., "s hs traffic",
//!              |                     ClientHello...ServerHello)
//!              |                     = server_handshake_traffic_secret
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic",
//!              |                     ClientHello...server Finished)
//!              |                     = client_application_traffic_secret_0
//!              |
//!              +-----> Derive-Secret(., "s ap traffic",
//!              |                     ClientHello...server Finished)
//!              |                     = server_application_traffic_secret_0
//!              |
//!              +-----> Derive-Secret(., "exp master",
//!                                    ClientHello...server Finished)
//!                                    = exporter_master_secret
//! ```
//!
//! Without PSK support the early secret is always `HKDF-Extract(0, 0)`.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HashProvider, HkdfProvider, HmacProvider};
use crate::crypto::IV_LEN;
use crate::types::HashAlgorithm;
use crate::Error;

const LABEL_PREFIX: &[u8] = b"tls13 ";

/// Longest label accepted by HKDF-Expand-Label: the prefixed label must fit
/// its one byte length field.
pub const MAX_LABEL_LEN: usize = 255 - LABEL_PREFIX.len();

/// Key derivation for one connection, bound to the negotiated hash.
///
/// Stateless apart from the hash choice: every derived secret is returned to
/// the caller, who keeps them in [`TrafficSecrets`].
#[derive(Debug, Clone, Copy)]
pub struct KeySchedule {
    hkdf: &'static dyn HkdfProvider,
    hmac: &'static dyn HmacProvider,
    hasher: &'static dyn HashProvider,
    hash: HashAlgorithm,
}

/// Every secret derived during a handshake.
///
/// Each field is a [`Buf`], so a secret is zeroized when it is replaced or
/// when the struct is dropped.
#[derive(Debug, Default)]
pub struct TrafficSecrets {
    pub early: Buf,
    pub handshake: Buf,
    pub master: Buf,
    pub client_handshake: Buf,
    pub server_handshake: Buf,
    pub client_application: Buf,
    pub server_application: Buf,
    pub exporter_master: Buf,
}

impl KeySchedule {
    pub fn new(provider: &CryptoProvider, hash: HashAlgorithm) -> Self {
        KeySchedule {
            hkdf: provider.hkdf_provider,
            hmac: provider.hmac_provider,
            hasher: provider.hash_provider,
            hash,
        }
    }

    #[inline(always)]
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    #[inline(always)]
    pub fn hash_len(&self) -> usize {
        self.hash.output_len()
    }

    /// Hash of `data` with the negotiated hash.
    pub fn digest(&self, data: &[u8]) -> Buf {
        let mut ctx = self.hasher.create_hash(self.hash);
        ctx.update(data);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        out
    }

    /// HKDF-Expand-Label(Secret, Label, Context, Length)
    ///
    /// ```text
    /// struct {
    ///     uint16 length = Length;
    ///     opaque label<7..255> = "tls13 " + Label;
    ///     opaque context<0..255> = Context;
    /// } HkdfLabel;
    /// ```
    pub fn hkdf_expand_label(
        &self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        out_len: usize,
    ) -> Result<Buf, Error> {
        if out_len > 255 {
            return Err(Error::CryptoError(format!(
                "HKDF-Expand-Label length too large: {}",
                out_len
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::CryptoError(format!(
                "HKDF-Expand-Label label too long: {}",
                label.len()
            )));
        }
        if context.len() > 255 {
            return Err(Error::CryptoError(format!(
                "HKDF-Expand-Label context too long: {}",
                context.len()
            )));
        }

        let mut info =
            Buf::with_capacity(2 + 1 + LABEL_PREFIX.len() + label.len() + 1 + context.len());
        info.extend_from_slice(&(out_len as u16).to_be_bytes());
        info.push((LABEL_PREFIX.len() + label.len()) as u8);
        info.extend_from_slice(LABEL_PREFIX);
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        let mut out = Buf::new();
        self.hkdf
            .hkdf_expand(self.hash, secret, &info, &mut out, out_len)
            .map_err(Error::CryptoError)?;
        Ok(out)
    }

    /// Derive-Secret(Secret, Label, Messages)
    ///
    /// `transcript_hash` is the hash of the messages, `None` meaning no
    /// messages at all, i.e. `Hash("")`.
    pub fn derive_secret(
        &self,
        secret: &[u8],
        label: &[u8],
        transcript_hash: Option<&[u8]>,
    ) -> Result<Buf, Error> {
        match transcript_hash {
            Some(hash) => self.hkdf_expand_label(secret, label, hash, self.hash_len()),
            None => {
                let empty = self.digest(&[]);
                self.hkdf_expand_label(secret, label, &empty, self.hash_len())
            }
        }
    }

    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Result<Buf, Error> {
        let mut out = Buf::new();
        self.hkdf
            .hkdf_extract(self.hash, salt, ikm, &mut out)
            .map_err(Error::CryptoError)?;
        Ok(out)
    }

    /// Early Secret = HKDF-Extract(0, PSK), with an all-zero PSK when none.
    pub fn derive_early_secret(&self, psk: Option<&[u8]>) -> Result<Buf, Error> {
        let zeros = vec![0; self.hash_len()];
        self.extract(&zeros, psk.unwrap_or(&zeros[..]))
    }

    /// Handshake Secret = HKDF-Extract(Derive-Secret(early, "derived", ""), ECDHE)
    pub fn derive_handshake_secret(&self, early: &[u8], ecdhe: &[u8]) -> Result<Buf, Error> {
        let derived = self.derive_secret(early, b"derived", None)?;
        self.extract(&derived, ecdhe)
    }

    /// Master Secret = HKDF-Extract(Derive-Secret(handshake, "derived", ""), 0)
    pub fn derive_master_secret(&self, handshake: &[u8]) -> Result<Buf, Error> {
        let derived = self.derive_secret(handshake, b"derived", None)?;
        let zeros = vec![0; self.hash_len()];
        self.extract(&derived, &zeros)
    }

    /// Write key and IV for a traffic secret.
    pub fn derive_traffic_keys(
        &self,
        secret: &[u8],
        key_len: usize,
    ) -> Result<(Buf, [u8; IV_LEN]), Error> {
        let key = self.hkdf_expand_label(secret, b"key", &[], key_len)?;
        let mut iv_buf = self.hkdf_expand_label(secret, b"iv", &[], IV_LEN)?;

        let mut iv = [0; IV_LEN];
        iv.copy_from_slice(&iv_buf);
        iv_buf.wipe();

        Ok((key, iv))
    }

    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    pub fn derive_finished_key(&self, secret: &[u8]) -> Result<Buf, Error> {
        self.hkdf_expand_label(secret, b"finished", &[], self.hash_len())
    }

    /// verify_data = HMAC(finished_key, Transcript-Hash(...))
    pub fn compute_finished(&self, finished_key: &[u8], transcript_hash: &[u8]) -> Result<Buf, Error> {
        let mut out = Buf::new();
        self.hmac
            .hmac(self.hash, finished_key, transcript_hash, &mut out)
            .map_err(Error::CryptoError)?;
        Ok(out)
    }

    /// Finished verify_data for a handshake traffic secret.
    pub fn finished_verify_data(&self, secret: &[u8], transcript_hash: &[u8]) -> Result<Buf, Error> {
        let finished_key = self.derive_finished_key(secret)?;
        self.compute_finished(&finished_key, transcript_hash)
    }

    /// application_traffic_secret_N+1 =
    ///     HKDF-Expand-Label(application_traffic_secret_N, "traffic upd", "", Hash.length)
    pub fn update_traffic_secret(&self, current: &[u8]) -> Result<Buf, Error> {
        self.hkdf_expand_label(current, b"traffic upd", &[], self.hash_len())
    }

    /// Fill in early, handshake and both handshake traffic secrets.
    ///
    /// `hello_hash` is Transcript-Hash(ClientHello...ServerHello).
    pub fn handshake_secrets(
        &self,
        secrets: &mut TrafficSecrets,
        ecdhe: &[u8],
        hello_hash: &[u8],
    ) -> Result<(), Error> {
        secrets.early = self.derive_early_secret(None)?;
        secrets.handshake = self.derive_handshake_secret(&secrets.early, ecdhe)?;
        secrets.client_handshake =
            self.derive_secret(&secrets.handshake, b"c hs traffic", Some(hello_hash))?;
        secrets.server_handshake =
            self.derive_secret(&secrets.handshake, b"s hs traffic", Some(hello_hash))?;
        Ok(())
    }

    /// Fill in master, application traffic and exporter master secrets.
    ///
    /// `finished_hash` is Transcript-Hash(ClientHello...server Finished).
    pub fn application_secrets(
        &self,
        secrets: &mut TrafficSecrets,
        finished_hash: &[u8],
    ) -> Result<(), Error> {
        secrets.master = self.derive_master_secret(&secrets.handshake)?;
        secrets.client_application =
            self.derive_secret(&secrets.master, b"c ap traffic", Some(finished_hash))?;
        secrets.server_application =
            self.derive_secret(&secrets.master, b"s ap traffic", Some(finished_hash))?;
        secrets.exporter_master =
            self.derive_exporter_master_secret(&secrets.master, finished_hash)?;

        // Handshake-phase secrets are not needed past this point.
        secrets.early.wipe();
        secrets.handshake.wipe();
        Ok(())
    }

    /// exporter_master_secret = Derive-Secret(Master Secret, "exp master", CH..SF)
    pub fn derive_exporter_master_secret(
        &self,
        master: &[u8],
        finished_hash: &[u8],
    ) -> Result<Buf, Error> {
        self.derive_secret(master, b"exp master", Some(finished_hash))
    }

    /// TLS 1.3 Exporter (RFC 8446 Section 7.5)
    ///
    /// ```text
    /// TLS-Exporter(label, context_value, key_length) =
    ///     HKDF-Expand-Label(Derive-Secret(Secret, label, ""),
    ///                       "exporter", Hash(context_value), key_length)
    /// ```
    pub fn export_keying_material(
        &self,
        exporter_master: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Buf, Error> {
        let derived = self.derive_secret(exporter_master, label, None)?;
        let context_hash = self.digest(context);
        self.hkdf_expand_label(&derived, b"exporter", &context_hash, len)
    }
}
