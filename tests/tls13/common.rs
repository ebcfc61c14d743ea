//! Shared helpers for TLS 1.3 integration tests.

#![allow(unused)]

use std::sync::Arc;

use timpl::certificate::{generate_certificate, generate_self_signed_certificate, KeyType};
use timpl::{Client, ClientConfig, ClientConfigBuilder, ClientState, Decrypted, Error};
use timpl::{Server, ServerConfig, ServerConfigBuilder, ServerState};

/// Server presenting a self-signed P-256 certificate for `localhost`.
pub fn server_with(f: impl FnOnce(ServerConfigBuilder) -> ServerConfigBuilder) -> Server {
    let cert = generate_self_signed_certificate().expect("gen server cert");
    let config = f(ServerConfig::builder().with_certificate(cert))
        .build()
        .expect("build server config");
    Server::new(Arc::new(config))
}

/// Client that does not validate the server chain.
pub fn client_with(f: impl FnOnce(ClientConfigBuilder) -> ClientConfigBuilder) -> Client {
    let config = f(ClientConfig::builder().dangerous_skip_verification(true))
        .build()
        .expect("build client config");
    Client::new(Arc::new(config))
}

pub fn server() -> Server {
    server_with(|b| b)
}

pub fn client() -> Client {
    client_with(|b| b)
}

/// Shuttle flights between the two until both are connected.
///
/// Stops at the first error on either side.
pub fn connect(client: &mut Client, server: &mut Server) -> Result<(), Error> {
    let mut to_server = client.start()?;
    for _ in 0..4 {
        let to_client = server.process(&to_server)?;
        if is_connected(client, server) {
            return Ok(());
        }
        to_server = client.process(&to_client)?;
    }
    if is_connected(client, server) {
        Ok(())
    } else {
        panic!(
            "Handshake stalled: {:?} / {:?}",
            client.state(),
            server.state()
        );
    }
}

fn is_connected(client: &Client, server: &Server) -> bool {
    client.state() == ClientState::Connected && server.state() == ServerState::Connected
}

/// Decrypt everything in `wire`, returning the application data in order.
pub fn drain_client(client: &mut Client, wire: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut input = wire;
    loop {
        match client.decrypt(input).expect("client decrypt") {
            Decrypted::ApplicationData(data) => out.push(data.to_vec()),
            Decrypted::NoApplicationData => {}
            Decrypted::NeedMoreData | Decrypted::Closed => break,
        }
        input = &[];
    }
    out
}

/// Decrypt everything in `wire`, returning the application data in order.
pub fn drain_server(server: &mut Server, wire: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut input = wire;
    loop {
        match server.decrypt(input).expect("server decrypt") {
            Decrypted::ApplicationData(data) => out.push(data.to_vec()),
            Decrypted::NoApplicationData => {}
            Decrypted::NeedMoreData | Decrypted::Closed => break,
        }
        input = &[];
    }
    out
}

/// Both sides hold the same application traffic secrets.
pub fn assert_same_secrets(client: &Client, server: &Server) {
    let (c_client, c_server) = client
        .application_traffic_secrets()
        .expect("client secrets");
    let (s_client, s_server) = server
        .application_traffic_secrets()
        .expect("server secrets");
    assert_eq!(c_client, s_client);
    assert_eq!(c_server, s_server);
}

/// Send `data` both ways and check it arrives intact.
pub fn exchange(client: &mut Client, server: &mut Server, data: &[u8]) {
    let wire = client.encrypt(data).expect("client encrypt");
    assert_eq!(drain_server(server, &wire), vec![data.to_vec()]);

    let wire = server.encrypt(data).expect("server encrypt");
    assert_eq!(drain_client(client, &wire), vec![data.to_vec()]);
}

/// Records split into (content type, payload).
pub fn records(mut wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    while wire.len() >= 5 {
        let len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
        out.push((wire[0], wire[5..5 + len].to_vec()));
        wire = &wire[5 + len..];
    }
    out
}
