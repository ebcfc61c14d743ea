#![no_main]

//! Fuzz target for the client's handling of the server's first flight.
//!
//! A real ClientHello is produced first so the client sits in
//! WaitServerHello, then the input is delivered as-is.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use timpl::{Client, ClientConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(config) = ClientConfig::builder()
        .dangerous_skip_verification(true)
        .server_name("localhost")
        .alpn_protocols(&["h2"])
        .build()
    else {
        return;
    };
    let mut client = Client::new(Arc::new(config));
    if client.start().is_err() {
        return;
    }

    let _ = client.process(data);
    let _ = client.alert_record();
});
