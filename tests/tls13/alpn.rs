//! Application-layer protocol negotiation.

use timpl::{AlertDescription, ClientState, Error, ServerState};

use crate::common::*;

#[test]
fn server_preference_order() {
    let _ = env_logger::try_init();

    let mut client = client_with(|b| b.alpn_protocols(&["http/1.1", "h2"]));
    let mut server = server_with(|b| b.alpn_protocols(&["h2", "http/1.1"]));

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(client.alpn_protocol(), Some(&b"h2"[..]));
    assert_eq!(server.alpn_protocol(), Some(&b"h2"[..]));
}

#[test]
fn no_overlap() {
    let mut client = client_with(|b| b.alpn_protocols(&["h2"]));
    let mut server = server_with(|b| b.alpn_protocols(&["http/1.1"]));

    assert_eq!(
        connect(&mut client, &mut server),
        Err(Error::NoApplicationProtocol)
    );

    // Plaintext alert, the server never got to keys.
    let alert = server.alert_record().expect("alert record");
    assert_eq!(alert, vec![21, 3, 3, 0, 2, 2, 120]);
    assert!(matches!(
        client.process(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::NoApplicationProtocol
    ));
    assert!(matches!(client.state(), ClientState::Error(_)));
}

#[test]
fn only_client_offers() {
    let mut client = client_with(|b| b.alpn_protocols(&["h2"]));
    let mut server = server();

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(client.alpn_protocol(), None);
    assert_eq!(server.alpn_protocol(), None);
}

#[test]
fn only_server_offers() {
    let mut client = client();
    let mut server = server_with(|b| b.alpn_protocols(&["h2"]));

    connect(&mut client, &mut server).expect("handshake");
    assert_eq!(client.alpn_protocol(), None);
    assert_eq!(server.state(), ServerState::Connected);
}
