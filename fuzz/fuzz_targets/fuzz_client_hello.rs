#![no_main]

//! Fuzz target for ClientHello parsing and server negotiation.
//!
//! The input is wrapped as the body of a ClientHello handshake message in
//! a plaintext handshake record, so the fuzzer spends its time inside the
//! message codec instead of the record framing.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use timpl::certificate::generate_self_signed_certificate;
use timpl::{Server, ServerConfig};

/// Largest body that still fits a single plaintext record.
const MAX_BODY: usize = 16384 - 4;

fuzz_target!(|data: &[u8]| {
    let cert = match generate_self_signed_certificate() {
        Ok(c) => c,
        Err(_) => return,
    };
    let Ok(config) = ServerConfig::builder().with_certificate(cert).build() else {
        return;
    };
    let mut server = Server::new(Arc::new(config));

    let body = &data[..data.len().min(MAX_BODY)];
    let msg_len = (body.len() as u32).to_be_bytes();
    let record_len = ((body.len() + 4) as u16).to_be_bytes();

    let mut record = Vec::with_capacity(9 + body.len());
    record.push(22u8); // ContentType::Handshake
    record.extend_from_slice(&[0x03, 0x01]);
    record.extend_from_slice(&record_len);
    record.push(1u8); // HandshakeType::ClientHello
    record.extend_from_slice(&msg_len[1..]);
    record.extend_from_slice(body);

    let _ = server.process(&record);
    let _ = server.alert_record();
});
