#![no_main]

//! Fuzz target for TLS 1.3 record layer parsing.
//!
//! Feeds raw bytes to a server before the handshake and, with a TLS-like
//! header prepended, to the record opener of an established connection.
//!
//! TLS record format:
//! - ContentType: 1 byte (20-23 valid values)
//! - ProtocolVersion: 2 bytes (0x0303)
//! - Length: 2 bytes (at most 16640)
//! - Fragment: variable

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use timpl::certificate::generate_self_signed_certificate;
use timpl::record::{parse_header, MAX_CIPHERTEXT_LEN, RECORD_HEADER_LEN};
use timpl::{Client, ClientConfig, Server, ServerConfig};

fuzz_target!(|data: &[u8]| {
    let _ = parse_header(data);

    let cert = match generate_self_signed_certificate() {
        Ok(c) => c,
        Err(_) => return,
    };
    let Ok(server_config) = ServerConfig::builder().with_certificate(cert).build() else {
        return;
    };
    let server_config = Arc::new(server_config);

    // Raw input against the first flight.
    let mut server = Server::new(Arc::clone(&server_config));
    let _ = server.process(data);

    // Connect, then hand the input to decrypt() as one protected record.
    let Ok(client_config) = ClientConfig::builder()
        .dangerous_skip_verification(true)
        .build()
    else {
        return;
    };
    let mut client = Client::new(Arc::new(client_config));
    let mut server = Server::new(server_config);

    let Ok(hello) = client.start() else { return };
    let Ok(flight) = server.process(&hello) else { return };
    let Ok(finished) = client.process(&flight) else { return };
    if server.process(&finished).is_err() {
        return;
    }

    let frag_len = data.len().min(MAX_CIPHERTEXT_LEN);
    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + frag_len);
    record.push(23u8); // ContentType::ApplicationData
    record.extend_from_slice(&[0x03, 0x03]);
    record.extend_from_slice(&(frag_len as u16).to_be_bytes());
    record.extend_from_slice(&data[..frag_len]);

    let _ = server.decrypt(&record);
});
