//! Client certificate authentication.

use timpl::certificate::{generate_ca, generate_self_signed_certificate, KeyType};
use timpl::{AlertDescription, ClientAuth, ClientState, Error, ServerState};

use crate::common::*;

#[test]
fn required_and_presented() {
    let _ = env_logger::try_init();

    let client_cert = generate_self_signed_certificate().expect("gen client cert");
    let anchor = client_cert.certificate.clone();

    let mut client = client_with(|b| b.with_certificate(client_cert.clone()));
    let mut server = server_with(|b| {
        b.client_auth(ClientAuth::Required)
            .add_trust_anchor(anchor)
    });

    connect(&mut client, &mut server).expect("handshake");

    assert_eq!(server.peer_certificates().len(), 1);
    assert_eq!(
        &server.peer_certificates()[0][..],
        &client_cert.certificate[..]
    );
    assert_same_secrets(&client, &server);
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn required_chain_from_ca() {
    let _ = env_logger::try_init();

    let ca = generate_ca(KeyType::Ed25519).expect("gen ca");
    let leaf = ca.issue(KeyType::Ed25519, &["client"]).expect("issue");

    let mut client = client_with(|b| {
        b.with_certificate_chain(vec![leaf.certificate.clone()], leaf.private_key.clone())
    });
    let mut server = server_with(|b| {
        b.client_auth(ClientAuth::Required)
            .add_trust_anchor(ca.certificate.certificate.clone())
    });

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(server.peer_certificates().len(), 1);
}

#[test]
fn required_but_missing() {
    let _ = env_logger::try_init();

    let anchor = generate_self_signed_certificate().unwrap().certificate;
    let mut client = client();
    let mut server = server_with(|b| b.client_auth(ClientAuth::Required).add_trust_anchor(anchor));

    assert_eq!(
        connect(&mut client, &mut server),
        Err(Error::CertificateRequired)
    );
    // The client already thinks it is done.
    assert_eq!(client.state(), ClientState::Connected);
    assert!(matches!(
        server.state(),
        ServerState::Error(a) if a.description == AlertDescription::CertificateRequired
    ));

    // The alert is protected under the server's application keys, which
    // the client already reads with.
    let alert = server.alert_record().expect("alert record");
    assert!(matches!(
        client.decrypt(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::CertificateRequired
    ));
    assert!(matches!(
        client.encrypt(b"late"),
        Err(Error::ConnectionFailed(_))
    ));
}

#[test]
fn optional_and_missing() {
    let anchor = generate_self_signed_certificate().unwrap().certificate;
    let mut client = client();
    let mut server = server_with(|b| b.client_auth(ClientAuth::Optional).add_trust_anchor(anchor));

    connect(&mut client, &mut server).expect("handshake");
    assert!(server.peer_certificates().is_empty());
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn optional_and_presented() {
    let client_cert = generate_self_signed_certificate().unwrap();
    let anchor = client_cert.certificate.clone();

    let mut client = client_with(|b| b.with_certificate(client_cert));
    let mut server = server_with(|b| b.client_auth(ClientAuth::Optional).add_trust_anchor(anchor));

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(server.peer_certificates().len(), 1);
}

#[test]
fn untrusted_client() {
    let other = generate_self_signed_certificate().unwrap().certificate;
    let client_cert = generate_self_signed_certificate().unwrap();

    let mut client = client_with(|b| b.with_certificate(client_cert));
    let mut server = server_with(|b| b.client_auth(ClientAuth::Required).add_trust_anchor(other));

    assert!(matches!(
        connect(&mut client, &mut server),
        Err(Error::Certificate(_))
    ));
    assert!(matches!(
        server.state(),
        ServerState::Error(a) if a.description == AlertDescription::UnknownCa
    ));
}

#[test]
fn unverified_client_accepted() {
    let client_cert = generate_self_signed_certificate().unwrap();

    let mut client = client_with(|b| b.with_certificate(client_cert));
    let mut server = server_with(|b| {
        b.client_auth(ClientAuth::Required)
            .dangerous_skip_verification(true)
    });

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(server.peer_certificates().len(), 1);
}

#[test]
fn certificate_ignored_when_not_requested() {
    let client_cert = generate_self_signed_certificate().unwrap();

    let mut client = client_with(|b| b.with_certificate(client_cert));
    let mut server = server();

    connect(&mut client, &mut server).expect("handshake");
    assert!(server.peer_certificates().is_empty());
}
