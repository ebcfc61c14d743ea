//! CertificateVerify signatures and unusable end-entity certificates.

use timpl::certificate::{generate_certificate, generate_self_signed_certificate, KeyType};
use timpl::crypto::{rust_crypto, CryptoProvider, KeyProvider, SigningKey};
use timpl::crypto::{Buf, CertificateError, SignatureScheme};
use timpl::{AlertDescription, ClientAuth, ClientState, Error, ServerState};

use crate::common::*;

/// Loads keys with the default provider, then corrupts every signature.
#[derive(Debug)]
struct FlippingKeyProvider;

impl KeyProvider for FlippingKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        let inner = rust_crypto::default_provider()
            .key_provider
            .load_private_key(key_der)?;
        Ok(Box::new(FlippingKey(inner)))
    }
}

#[derive(Debug)]
struct FlippingKey(Box<dyn SigningKey>);

impl SigningKey for FlippingKey {
    fn sign(&mut self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String> {
        self.0.sign(scheme, data, out)?;
        let last = out.len() - 1;
        out[last] ^= 0x01;
        Ok(())
    }

    fn schemes(&self) -> &'static [SignatureScheme] {
        self.0.schemes()
    }
}

static FLIPPING_KEY_PROVIDER: FlippingKeyProvider = FlippingKeyProvider;

fn flipping_provider() -> CryptoProvider {
    CryptoProvider {
        key_provider: &FLIPPING_KEY_PROVIDER,
        ..rust_crypto::default_provider()
    }
}

#[test]
fn bad_server_signature() {
    let _ = env_logger::try_init();

    for key_type in [KeyType::EcdsaP256, KeyType::Ed25519] {
        let cert = generate_certificate(key_type, &["localhost"]).expect("gen cert");
        let mut client = client();
        let mut server = server_with(|b| {
            b.with_certificate(cert)
                .with_crypto_provider(flipping_provider())
        });

        let err = connect(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, Error::DecryptError(_)), "{:?}: {:?}", key_type, err);
        assert!(matches!(
            client.state(),
            ClientState::Error(a) if a.description == AlertDescription::DecryptError
        ));

        let alert = client.alert_record().expect("alert record");
        assert!(matches!(
            server.process(&alert),
            Err(Error::PeerAlert(a)) if a.description == AlertDescription::DecryptError
        ));
    }
}

#[test]
fn bad_client_signature() {
    let _ = env_logger::try_init();

    let client_cert = generate_self_signed_certificate().expect("gen client cert");
    let mut client = client_with(|b| {
        b.with_certificate(client_cert)
            .with_crypto_provider(flipping_provider())
    });
    let mut server = server_with(|b| {
        b.client_auth(ClientAuth::Required)
            .dangerous_skip_verification(true)
    });

    let err = connect(&mut client, &mut server).unwrap_err();
    assert!(matches!(err, Error::DecryptError(_)), "{:?}", err);
    assert!(matches!(
        server.state(),
        ServerState::Error(a) if a.description == AlertDescription::DecryptError
    ));

    let alert = server.alert_record().expect("alert record");
    assert!(matches!(
        client.decrypt(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::DecryptError
    ));
}

#[test]
fn malformed_server_certificate() {
    let _ = env_logger::try_init();

    let key = generate_self_signed_certificate().expect("gen cert").private_key;
    let mut client = client();
    let mut server =
        server_with(|b| b.with_certificate_chain(vec![vec![0xde, 0xad, 0xbe, 0xef]], key));

    let err = connect(&mut client, &mut server).unwrap_err();
    assert!(
        matches!(err, Error::Certificate(CertificateError::BadEncoding(_))),
        "{:?}",
        err
    );
    assert!(matches!(
        client.state(),
        ClientState::Error(a) if a.description == AlertDescription::BadCertificate
    ));

    let alert = client.alert_record().expect("alert record");
    assert!(matches!(
        server.process(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::BadCertificate
    ));
}

#[test]
fn malformed_client_certificate() {
    let _ = env_logger::try_init();

    let key = generate_self_signed_certificate().expect("gen cert").private_key;
    let mut client = client_with(|b| b.with_certificate_chain(vec![vec![0x30, 0x00]], key));
    let mut server = server_with(|b| {
        b.client_auth(ClientAuth::Required)
            .dangerous_skip_verification(true)
    });

    let err = connect(&mut client, &mut server).unwrap_err();
    assert!(
        matches!(err, Error::Certificate(CertificateError::BadEncoding(_))),
        "{:?}",
        err
    );

    let alert = server.alert_record().expect("alert record");
    assert!(matches!(
        client.decrypt(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::BadCertificate
    ));
}
