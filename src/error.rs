use thiserror::Error;

use crate::alert::{Alert, AlertDescription};
use crate::crypto::{CertificateError, SignatureError};

/// Errors raised by the protocol engine.
///
/// Every variant that originates from peer input maps to the fatal alert
/// that must be sent back, see [`Error::alert`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Record too large: {0}")]
    RecordOverflow(usize),

    #[error("Record failed authentication")]
    BadRecordMac,

    #[error("Decrypt error: {0}")]
    DecryptError(String),

    #[error("Handshake failure: {0}")]
    HandshakeFailure(String),

    #[error("Unsupported protocol version: {0}")]
    ProtocolVersion(String),

    #[error("Illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("Missing extension: {0}")]
    MissingExtension(String),

    #[error("No common application protocol")]
    NoApplicationProtocol,

    #[error("Peer certificate required")]
    CertificateRequired,

    #[error("Certificate rejected: {0}")]
    Certificate(#[from] CertificateError),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Peer sent alert: {0}")]
    PeerAlert(Alert),

    #[error("Connection already failed: {0}")]
    ConnectionFailed(Alert),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// The alert to report to the peer for this error.
    ///
    /// `None` for errors that are not the peer's fault to hear about: the
    /// peer's own alert, API misuse, or a connection that already failed.
    pub fn alert(&self) -> Option<Alert> {
        let description = match self {
            Error::DecodeError(_) => AlertDescription::DecodeError,
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::RecordOverflow(_) => AlertDescription::RecordOverflow,
            Error::BadRecordMac => AlertDescription::BadRecordMac,
            Error::DecryptError(_) => AlertDescription::DecryptError,
            Error::HandshakeFailure(_) => AlertDescription::HandshakeFailure,
            Error::ProtocolVersion(_) => AlertDescription::ProtocolVersion,
            Error::IllegalParameter(_) => AlertDescription::IllegalParameter,
            Error::MissingExtension(_) => AlertDescription::MissingExtension,
            Error::NoApplicationProtocol => AlertDescription::NoApplicationProtocol,
            Error::CertificateRequired => AlertDescription::CertificateRequired,
            Error::Certificate(e) => e.alert_description(),
            Error::CryptoError(_) | Error::Encode(_) => AlertDescription::InternalError,
            Error::ConfigError(_)
            | Error::PeerAlert(_)
            | Error::ConnectionFailed(_)
            | Error::InvalidState(_) => return None,
        };
        Some(Alert::fatal(description))
    }
}

impl From<SignatureError> for Error {
    fn from(value: SignatureError) -> Self {
        match value {
            SignatureError::Certificate(e) => Error::Certificate(e),
            SignatureError::Mismatch(e) => Error::DecryptError(format!("CertificateVerify: {}", e)),
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::DecodeError("truncated".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::DecodeError(format!("{:?} with {} bytes left", e.code, e.input.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_mapping() {
        assert_eq!(
            Error::BadRecordMac.alert(),
            Some(Alert::fatal(AlertDescription::BadRecordMac))
        );
        assert_eq!(
            Error::RecordOverflow(16641).alert().map(|a| a.description),
            Some(AlertDescription::RecordOverflow)
        );
        assert_eq!(
            Error::Certificate(CertificateError::Expired).alert(),
            Some(Alert::fatal(AlertDescription::CertificateExpired))
        );
        assert_eq!(Error::InvalidState("x".into()).alert(), None);
    }

    #[test]
    fn certificate_verify_failures() {
        let unparsable = SignatureError::Certificate(CertificateError::BadEncoding("x".into()));
        assert_eq!(
            Error::from(unparsable).alert(),
            Some(Alert::fatal(AlertDescription::BadCertificate))
        );
        let mismatch = SignatureError::Mismatch("x".into());
        assert_eq!(
            Error::from(mismatch).alert(),
            Some(Alert::fatal(AlertDescription::DecryptError))
        );
    }
}
