//! Record protection on an established connection.

use timpl::{AlertDescription, Decrypted, Error, ServerState};

use crate::common::*;

#[test]
fn tampered_record() {
    let _ = env_logger::try_init();

    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let mut wire = client.encrypt(b"hello").unwrap();
    let last = wire.len() - 1;
    wire[last] ^= 0x01;

    assert_eq!(server.decrypt(&wire), Err(Error::BadRecordMac));
    assert!(matches!(
        server.state(),
        ServerState::Error(a) if a.description == AlertDescription::BadRecordMac
    ));
    assert!(matches!(
        server.decrypt(&[]),
        Err(Error::ConnectionFailed(_))
    ));

    // The client learns why, under the server's keys.
    let alert = server.alert_record().expect("alert record");
    assert!(server.alert_record().is_none());
    assert!(matches!(
        client.decrypt(&alert),
        Err(Error::PeerAlert(a)) if a.description == AlertDescription::BadRecordMac
    ));
}

#[test]
fn replayed_record() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let wire = client.encrypt(b"once").unwrap();
    assert_eq!(drain_server(&mut server, &wire), vec![b"once".to_vec()]);

    // Sequence number moved on, the same record no longer opens.
    assert_eq!(server.decrypt(&wire), Err(Error::BadRecordMac));
}

#[test]
fn large_write_is_fragmented() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let data: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();
    let wire = client.encrypt(&data).unwrap();

    let recs = records(&wire);
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|(t, p)| *t == 23 && p.len() <= 16384 + 256));

    let received: Vec<u8> = drain_server(&mut server, &wire).concat();
    assert_eq!(received, data);
}

#[test]
fn split_records() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let mut wire = client.encrypt(b"first").unwrap();
    wire.extend(client.encrypt(b"second").unwrap());

    let (a, b) = wire.split_at(7);
    assert_eq!(server.decrypt(a).unwrap(), Decrypted::NeedMoreData);
    assert_eq!(
        drain_server(&mut server, b),
        vec![b"first".to_vec(), b"second".to_vec()]
    );
}

#[test]
fn oversized_record_header() {
    let mut server = server();
    let len = 16641u16.to_be_bytes();

    assert_eq!(
        server.process(&[23, 3, 3, len[0], len[1]]),
        Err(Error::RecordOverflow(16641))
    );
    assert!(matches!(
        server.state(),
        ServerState::Error(a) if a.description == AlertDescription::RecordOverflow
    ));
}

#[test]
fn plaintext_after_handshake() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    // An unprotected handshake record.
    assert!(matches!(
        server.decrypt(&[22, 3, 3, 0, 4, 24, 0, 0, 0]),
        Err(Error::UnexpectedMessage(_))
    ));
}

#[test]
fn unknown_content_type() {
    let mut server = server();
    assert!(matches!(
        server.process(&[99, 3, 3, 0, 1, 0]),
        Err(Error::UnexpectedMessage(_))
    ));
}

#[test]
fn empty_application_data() {
    let mut client = client();
    let mut server = server();
    connect(&mut client, &mut server).expect("handshake");

    let wire = client.encrypt(b"").unwrap();
    assert_eq!(
        server.decrypt(&wire).unwrap(),
        Decrypted::ApplicationData(timpl::Buf::new())
    );
}
