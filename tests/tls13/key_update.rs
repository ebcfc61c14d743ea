//! Post-handshake KeyUpdate.

use timpl::{Decrypted, Error};

use crate::common::*;

#[test]
fn requested_update_is_answered() {
    let _ = env_logger::try_init();

    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let before = client
        .application_traffic_secrets()
        .map(|(c, s)| (c.to_vec(), s.to_vec()))
        .unwrap();

    let wire = client.key_update(true).unwrap();
    assert_eq!(server.decrypt(&wire).unwrap(), Decrypted::NoApplicationData);

    // The server queued its own update, not requesting another.
    let response = server.take_pending().expect("queued KeyUpdate");
    assert!(server.take_pending().is_none());
    assert_eq!(client.decrypt(&response).unwrap(), Decrypted::NoApplicationData);
    assert!(client.take_pending().is_none());

    let after = client.application_traffic_secrets().unwrap();
    assert_ne!(before.0, after.0);
    assert_ne!(before.1, after.1);
    assert_same_secrets(&client, &server);
    exchange(&mut client, &mut server, b"hello");
}

#[test]
fn queued_response_precedes_data() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let wire = server.key_update(true).unwrap();
    assert_eq!(client.decrypt(&wire).unwrap(), Decrypted::NoApplicationData);

    // No take_pending: the response rides in front of the next data.
    let wire = client.encrypt(b"after").unwrap();
    assert_eq!(records(&wire).len(), 2);
    assert_eq!(drain_server(&mut server, &wire), vec![b"after".to_vec()]);
    assert_same_secrets(&client, &server);
}

#[test]
fn unrequested_update() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let wire = server.key_update(false).unwrap();
    assert_eq!(client.decrypt(&wire).unwrap(), Decrypted::NoApplicationData);
    assert!(client.take_pending().is_none());

    let wire = server.encrypt(b"new keys").unwrap();
    assert_eq!(drain_client(&mut client, &wire), vec![b"new keys".to_vec()]);

    // Client sending keys are untouched.
    let wire = client.encrypt(b"old keys").unwrap();
    assert_eq!(drain_server(&mut server, &wire), vec![b"old keys".to_vec()]);
}

#[test]
fn many_updates() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    for i in 0..20u8 {
        let mut wire = client.key_update(i % 2 == 0).unwrap();
        wire.extend(client.encrypt(&[i]).unwrap());
        assert_eq!(drain_server(&mut server, &wire), vec![vec![i]]);
        if let Some(response) = server.take_pending() {
            drain_client(&mut client, &response);
        }
    }
    assert_same_secrets(&client, &server);
}

#[test]
fn update_before_connected() {
    let mut client = client();
    assert!(matches!(client.key_update(false), Err(Error::InvalidState(_))));
}
