//! timpl is a Sans-IO TLS 1.3 (RFC 8446) protocol engine.
//!
//! The crate never touches a socket. Bytes read from the transport are fed
//! into a [`Client`] or [`Server`], which returns the bytes that must be
//! written back. Timing, retries and I/O belong to the caller.
//!
//! Supported:
//!
//! - Cipher suites `TLS_AES_128_GCM_SHA256`, `TLS_AES_256_GCM_SHA384` and
//!   `TLS_CHACHA20_POLY1305_SHA256`.
//! - Key exchange over X25519, P-256 and P-384, with HelloRetryRequest when
//!   the client guessed the wrong group.
//! - Ed25519, ECDSA (P-256, P-384) and RSA-PSS/PKCS#1 certificates.
//! - ALPN, SNI, client certificate authentication, KeyUpdate and the
//!   keying material exporter.
//!
//! Not supported: other TLS versions, PSK resumption and 0-RTT. Session
//! tickets are accepted and ignored.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use timpl::certificate::generate_self_signed_certificate;
//! use timpl::{Buf, Client, ClientConfig, Decrypted, Server, ServerConfig};
//!
//! let server_config = ServerConfig::builder()
//!     .with_certificate(generate_self_signed_certificate().unwrap())
//!     .build()
//!     .unwrap();
//! let client_config = ClientConfig::builder()
//!     .dangerous_skip_verification(true)
//!     .build()
//!     .unwrap();
//!
//! let mut client = Client::new(Arc::new(client_config));
//! let mut server = Server::new(Arc::new(server_config));
//!
//! let client_hello = client.start().unwrap();
//! let server_flight = server.process(&client_hello).unwrap();
//! let client_flight = client.process(&server_flight).unwrap();
//! server.process(&client_flight).unwrap();
//!
//! let record = client.encrypt(b"hello").unwrap();
//! let data = server.decrypt(&record).unwrap();
//! assert_eq!(data, Decrypted::ApplicationData(Buf::from_slice(b"hello")));
//! ```
#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod alert;
pub use alert::{Alert, AlertDescription, AlertLevel};

mod buffer;
pub use buffer::Buf;

pub mod certificate;

mod client;
pub use client::{Client, ClientState};

mod config;
pub use config::{CertifiedKey, ClientAuth, ClientConfig, ClientConfigBuilder};
pub use config::{ServerConfig, ServerConfigBuilder};

pub mod crypto;

mod engine;
pub use engine::Decrypted;

mod error;
pub use error::Error;

pub mod key_schedule;

pub(crate) mod message;
pub use message::{
    MAX_ALPN_PROTOCOLS, MAX_CERTIFICATE_CHAIN_LEN, MAX_CIPHER_SUITES, MAX_HANDSHAKE_MESSAGE_LEN,
    MAX_KEY_SHARES, MAX_SIGNATURE_SCHEMES,
};

pub mod record;

mod server;
pub use server::{Server, ServerState};

mod transcript;

mod types;
pub use types::{CipherSuite, ContentType, HashAlgorithm, NamedGroup, ProtocolVersion};
pub use types::SignatureScheme;
