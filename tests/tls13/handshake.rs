//! Full client/server handshakes.

use std::sync::Arc;

use timpl::certificate::{generate_ca, generate_certificate, KeyType};
use timpl::crypto::CertificateError;
use timpl::{AlertDescription, CipherSuite, ClientConfig, ClientState, Decrypted, Error};
use timpl::{NamedGroup, Server, ServerConfig, ServerState};

use crate::common::*;

#[test]
fn handshake_default() {
    let _ = env_logger::try_init();

    let mut client = client();
    let mut server = server();

    connect(&mut client, &mut server).expect("handshake");

    assert_eq!(client.cipher_suite(), Some(CipherSuite::AES_128_GCM_SHA256));
    assert_eq!(server.cipher_suite(), Some(CipherSuite::AES_128_GCM_SHA256));
    assert_same_secrets(&client, &server);
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn handshake_every_cipher_suite() {
    let _ = env_logger::try_init();

    for suite in [
        CipherSuite::AES_128_GCM_SHA256,
        CipherSuite::AES_256_GCM_SHA384,
        CipherSuite::CHACHA20_POLY1305_SHA256,
    ] {
        let mut client = client_with(|b| b.cipher_suites(&[suite]));
        let mut server = server();

        connect(&mut client, &mut server).expect("handshake");

        assert_eq!(server.cipher_suite(), Some(suite));
        assert_same_secrets(&client, &server);
        exchange(&mut client, &mut server, b"hello");
    }
}

#[test]
fn server_preference_wins() {
    let mut client = client_with(|b| {
        b.cipher_suites(&[
            CipherSuite::AES_128_GCM_SHA256,
            CipherSuite::CHACHA20_POLY1305_SHA256,
        ])
    });
    let mut server = server_with(|b| {
        b.cipher_suites(&[
            CipherSuite::CHACHA20_POLY1305_SHA256,
            CipherSuite::AES_128_GCM_SHA256,
        ])
    });

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(
        client.cipher_suite(),
        Some(CipherSuite::CHACHA20_POLY1305_SHA256)
    );
}

#[test]
fn handshake_every_group() {
    let _ = env_logger::try_init();

    for group in [NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Secp384r1] {
        let mut client = client_with(|b| b.kx_groups(&[group]));
        let mut server = server();

        connect(&mut client, &mut server).expect("handshake");
        assert_same_secrets(&client, &server);
    }
}

#[test]
fn handshake_every_key_type() {
    let _ = env_logger::try_init();

    for key_type in [
        KeyType::EcdsaP256,
        KeyType::EcdsaP384,
        KeyType::Ed25519,
        KeyType::Rsa,
    ] {
        let cert = generate_certificate(key_type, &["localhost"]).expect("gen cert");
        let config = ServerConfig::builder()
            .with_certificate(cert)
            .build()
            .expect("server config");
        let mut server = Server::new(Arc::new(config));
        let mut client = client();

        connect(&mut client, &mut server).expect("handshake");
        exchange(&mut client, &mut server, b"hello");
    }
}

#[test]
fn flights_are_one_record_each() {
    let mut client = client();
    let mut server = server();

    let client_hello = client.start().unwrap();
    assert_eq!(records(&client_hello).len(), 1);
    assert_eq!(client.state(), ClientState::WaitServerHello);

    // ServerHello, change_cipher_spec, then everything else encrypted.
    let flight = server.process(&client_hello).unwrap();
    let types: Vec<u8> = records(&flight).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![22, 20, 23]);
    assert_eq!(server.state(), ServerState::WaitFinished);

    let flight = client.process(&flight).unwrap();
    let types: Vec<u8> = records(&flight).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![20, 23]);
    assert_eq!(client.state(), ClientState::Connected);

    assert!(server.process(&flight).unwrap().is_empty());
    assert_eq!(server.state(), ServerState::Connected);
}

#[test]
fn byte_at_a_time() {
    let _ = env_logger::try_init();

    let mut client = client();
    let mut server = server();

    let client_hello = client.start().unwrap();
    let mut flight = Vec::new();
    for b in &client_hello {
        flight.extend(server.process(&[*b]).unwrap());
    }

    let mut reply = Vec::new();
    for b in &flight {
        reply.extend(client.process(&[*b]).unwrap());
    }
    assert_eq!(client.state(), ClientState::Connected);

    for b in &reply {
        server.process(&[*b]).unwrap();
    }
    assert_eq!(server.state(), ServerState::Connected);
    assert_same_secrets(&client, &server);
}

#[test]
fn verified_chain() {
    let _ = env_logger::try_init();

    let ca = generate_ca(KeyType::EcdsaP256).expect("gen ca");
    let leaf = ca
        .issue(KeyType::EcdsaP256, &["server.test"])
        .expect("issue");

    let server_config = ServerConfig::builder()
        .with_certificate_chain(
            vec![leaf.certificate.clone(), ca.certificate.certificate.clone()],
            leaf.private_key.clone(),
        )
        .build()
        .expect("server config");
    let client_config = ClientConfig::builder()
        .server_name("server.test")
        .add_trust_anchor(ca.certificate.certificate.clone())
        .build()
        .expect("client config");

    let mut client = timpl::Client::new(Arc::new(client_config));
    let mut server = Server::new(Arc::new(server_config));

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(client.peer_certificates().len(), 2);
    assert_eq!(&client.peer_certificates()[0][..], &leaf.certificate[..]);
    assert_eq!(server.server_name(), Some("server.test"));
}

#[test]
fn rsa_chain() {
    let _ = env_logger::try_init();

    let ca = generate_ca(KeyType::Rsa).expect("gen ca");
    let leaf = ca.issue(KeyType::Rsa, &["server.test"]).expect("issue");

    let server_config = ServerConfig::builder()
        .with_certificate_chain(vec![leaf.certificate.clone()], leaf.private_key.clone())
        .build()
        .expect("server config");
    let client_config = ClientConfig::builder()
        .server_name("server.test")
        .add_trust_anchor(ca.certificate.certificate.clone())
        .build()
        .expect("client config");

    let mut client = timpl::Client::new(Arc::new(client_config));
    let mut server = Server::new(Arc::new(server_config));

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(client.peer_certificates().len(), 1);
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn wrong_server_name() {
    let ca = generate_ca(KeyType::EcdsaP256).expect("gen ca");
    let leaf = ca.issue(KeyType::EcdsaP256, &["server.test"]).expect("issue");

    let server_config = ServerConfig::builder()
        .with_certificate_chain(vec![leaf.certificate.clone()], leaf.private_key.clone())
        .build()
        .unwrap();
    let client_config = ClientConfig::builder()
        .server_name("other.test")
        .add_trust_anchor(ca.certificate.certificate.clone())
        .build()
        .unwrap();

    let mut client = timpl::Client::new(Arc::new(client_config));
    let mut server = Server::new(Arc::new(server_config));

    let err = connect(&mut client, &mut server).unwrap_err();
    assert!(matches!(
        err,
        Error::Certificate(CertificateError::NameMismatch(_))
    ));
    assert!(matches!(client.state(), ClientState::Error(_)));

    // The alert reaches the server, which reports it without answering.
    let alert = client.alert_record().expect("alert record");
    assert!(matches!(
        server.process(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::BadCertificate
    ));
    assert!(server.alert_record().is_none());
}

#[test]
fn untrusted_server() {
    let other_ca = generate_ca(KeyType::EcdsaP256).expect("gen ca");
    let mut client = client_with(|b| {
        b.dangerous_skip_verification(false)
            .server_name("localhost")
            .add_trust_anchor(other_ca.certificate.certificate.clone())
    });
    let mut server = server();

    let err = connect(&mut client, &mut server).unwrap_err();
    assert_eq!(err, Error::Certificate(CertificateError::UnknownIssuer));
    assert!(matches!(
        client.state(),
        ClientState::Error(a) if a.description == AlertDescription::UnknownCa
    ));
}

#[test]
fn exporter_agrees() {
    let mut client = client();
    let mut server = server();

    assert!(client.export_keying_material(b"EXPERIMENTAL test", b"", 32).is_err());

    connect(&mut client, &mut server).expect("handshake");

    let c = client
        .export_keying_material(b"EXPERIMENTAL test", b"context", 32)
        .unwrap();
    let s = server
        .export_keying_material(b"EXPERIMENTAL test", b"context", 32)
        .unwrap();
    assert_eq!(c, s);
    assert_eq!(c.len(), 32);

    let other = server
        .export_keying_material(b"EXPERIMENTAL test", b"other", 32)
        .unwrap();
    assert_ne!(c, other);
}

#[test]
fn close_notify_ends_stream() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let wire = client.close().unwrap();
    assert_eq!(server.decrypt(&wire).unwrap(), Decrypted::Closed);
    assert!(server.is_peer_closed());

    // Client may no longer send; that misuse does not poison it.
    assert!(matches!(client.encrypt(b"late"), Err(Error::InvalidState(_))));

    // The server can still answer before closing its half.
    let wire = server.encrypt(b"bye").unwrap();
    assert_eq!(drain_client(&mut client, &wire), vec![b"bye".to_vec()]);
}

#[test]
fn data_before_connected_is_refused() {
    let mut client = client();
    let mut server = server();

    assert!(matches!(client.encrypt(b"early"), Err(Error::InvalidState(_))));
    let client_hello = client.start().unwrap();
    assert!(matches!(server.encrypt(b"early"), Err(Error::InvalidState(_))));

    // Neither side is poisoned by the misuse.
    server.process(&client_hello).unwrap();
    assert_eq!(server.state(), ServerState::WaitFinished);
}
