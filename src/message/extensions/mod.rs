//! Typed views of the extensions this crate interprets.
//!
//! Each type decodes from the `extension_data` of an [`Extension`] and
//! serializes back into it.
//!
//! [`Extension`]: super::Extension

pub mod alpn;
pub mod cookie;
pub mod key_share;
pub mod server_name;
pub mod signature_algorithms;
pub mod supported_groups;
pub mod supported_versions;
