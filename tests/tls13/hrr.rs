//! HelloRetryRequest between a client guessing X25519 and servers that
//! want something else.

use timpl::{ClientState, NamedGroup, ServerState};

use crate::common::*;

#[test]
fn p256_only_server() {
    let _ = env_logger::try_init();

    let mut client = client();
    let mut server = server_with(|b| b.kx_groups(&[NamedGroup::Secp256r1]));

    let client_hello = client.start().unwrap();
    let hrr = server.process(&client_hello).unwrap();
    assert_eq!(server.state(), ServerState::WaitClientHello2);

    // HelloRetryRequest and change_cipher_spec, both plaintext.
    let types: Vec<u8> = records(&hrr).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![22, 20]);

    let client_hello2 = client.process(&hrr).unwrap();
    assert_eq!(client.state(), ClientState::WaitServerHello2);

    // The client's change_cipher_spec goes out once, ahead of ClientHello2.
    let types: Vec<u8> = records(&client_hello2).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![20, 22]);

    let flight = server.process(&client_hello2).unwrap();
    assert_eq!(server.state(), ServerState::WaitFinished);
    // No second change_cipher_spec from the server.
    let types: Vec<u8> = records(&flight).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![22, 23]);

    let finished = client.process(&flight).unwrap();
    assert_eq!(client.state(), ClientState::Connected);
    let types: Vec<u8> = records(&finished).iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![23]);

    server.process(&finished).unwrap();
    assert_eq!(server.state(), ServerState::Connected);

    // Equal secrets mean both transcripts went through the same
    // message_hash rewrite.
    assert_same_secrets(&client, &server);
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn retry_for_every_suite() {
    let _ = env_logger::try_init();

    for suite in [
        timpl::CipherSuite::AES_128_GCM_SHA256,
        timpl::CipherSuite::AES_256_GCM_SHA384,
        timpl::CipherSuite::CHACHA20_POLY1305_SHA256,
    ] {
        let mut client = client_with(|b| {
            b.cipher_suites(&[suite])
                .kx_groups(&[NamedGroup::X25519, NamedGroup::Secp384r1])
        });
        let mut server = server_with(|b| b.kx_groups(&[NamedGroup::Secp384r1]));

        connect(&mut client, &mut server).expect("handshake");
        assert_eq!(client.cipher_suite(), Some(suite));
        assert_same_secrets(&client, &server);
    }
}

#[test]
fn no_retry_when_share_matches() {
    let mut client = client_with(|b| b.kx_groups(&[NamedGroup::Secp256r1, NamedGroup::X25519]));
    let mut server = server_with(|b| b.kx_groups(&[NamedGroup::Secp256r1]));

    let flight = server.process(&client.start().unwrap()).unwrap();
    assert_eq!(server.state(), ServerState::WaitFinished);
    assert_eq!(records(&flight).len(), 3);
}

#[test]
fn group_unknown_to_client() {
    let mut client = client_with(|b| b.kx_groups(&[NamedGroup::X25519]));
    let mut server = server_with(|b| b.kx_groups(&[NamedGroup::Secp256r1]));

    // The server can only pick among groups the client listed.
    assert!(matches!(
        server.process(&client.start().unwrap()),
        Err(timpl::Error::HandshakeFailure(_))
    ));
}
