mod common;

mod alpn;
mod certificate_verify;
mod handshake;
mod hrr;
mod key_update;
mod mtls;
mod record;
