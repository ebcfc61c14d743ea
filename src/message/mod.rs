//! Handshake message codec (RFC 8446 Section 4).
//!
//! Parsing is `nom` over borrowed slices: every parsed message is a view
//! into the reassembled handshake buffer and is consumed before the buffer
//! moves on. Lists the peer controls are bounded by the caps below; going
//! over a cap is a `decode_error`.

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod encrypted_extensions;
mod extension;
pub mod extensions;
mod finished;
mod handshake;
mod key_update;
mod new_session_ticket;
mod random;
mod server_hello;
pub(crate) mod util;

pub use certificate::{Certificate, CertificateEntry};
pub use certificate_request::CertificateRequest;
pub use certificate_verify::{signed_content, CertificateVerify};
pub use client_hello::ClientHello;
pub use encrypted_extensions::EncryptedExtensions;
pub use extension::{Extension, ExtensionType, Extensions};
pub use finished::Finished;
pub use handshake::{write_handshake, Handshake, HandshakeType, HANDSHAKE_HEADER_LEN};
pub use key_update::KeyUpdateRequest;
pub use new_session_ticket::NewSessionTicket;
pub use random::{Random, SessionId, HRR_RANDOM};
pub use server_hello::{ServerHello, ServerHelloKind};

/// Longest certificate chain accepted from a peer.
pub const MAX_CERTIFICATE_CHAIN_LEN: usize = 10;

/// Most signature schemes read from one signature_algorithms extension.
/// Common stacks offer 10 to 30, post-quantum ones a few more; a longer list
/// is refused with `decode_error`.
pub const MAX_SIGNATURE_SCHEMES: usize = 64;

/// Most key shares read from one ClientHello.
pub const MAX_KEY_SHARES: usize = 8;

/// Most cipher suites read from one ClientHello.
pub const MAX_CIPHER_SUITES: usize = 64;

/// Most protocol names in one ALPN extension.
pub const MAX_ALPN_PROTOCOLS: usize = 16;

/// Largest handshake message body we are willing to reassemble.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 131072;
