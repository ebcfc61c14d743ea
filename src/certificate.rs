//! Certificate generation and formatting utilities exposed via the public `certificate` module.
//!
//! Helpers to generate self-signed certificates and small CA hierarchies
//! for TLS 1.3 endpoints, compute fingerprints and format them for display.

use rcgen::{
    BasicConstraints, Certificate as RcgenCertificate, CertificateParams, DistinguishedName,
    DnType, IsCa, KeyPair, SignatureAlgorithm, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384,
    PKCS_ED25519, PKCS_RSA_SHA256,
};
use rand::rngs::OsRng;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::fmt;

/// Certificate utility error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// Certificate generation failed
    GenerationFailed,
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::GenerationFailed => write!(f, "Certificate generation failed"),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Key algorithm for generated certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    EcdsaP256,
    EcdsaP384,
    Ed25519,
    /// 2048-bit RSA. The key signs CertificateVerify with RSA-PSS.
    Rsa,
}

impl KeyType {
    fn algorithm(&self) -> &'static SignatureAlgorithm {
        match self {
            KeyType::EcdsaP256 => &PKCS_ECDSA_P256_SHA256,
            KeyType::EcdsaP384 => &PKCS_ECDSA_P384_SHA384,
            KeyType::Ed25519 => &PKCS_ED25519,
            KeyType::Rsa => &PKCS_RSA_SHA256,
        }
    }

    fn key_pair(&self) -> Result<KeyPair, GenerateError> {
        match self {
            // rcgen cannot generate RSA keys itself.
            KeyType::Rsa => {
                let key = RsaPrivateKey::new(&mut OsRng, 2048)
                    .map_err(|_| GenerateError::GenerationFailed)?;
                let der = key
                    .to_pkcs8_der()
                    .map_err(|_| GenerateError::GenerationFailed)?;
                KeyPair::from_der(der.as_bytes()).map_err(|_| GenerateError::GenerationFailed)
            }
            _ => KeyPair::generate(self.algorithm()).map_err(|_| GenerateError::GenerationFailed),
        }
    }
}

/// Certificate and private key pair
#[derive(Clone)]
pub struct TlsCertificate {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// Private key in PKCS#8 DER format
    pub private_key: Vec<u8>,
}

/// Generate a self-signed P-256 certificate for `localhost`.
pub fn generate_self_signed_certificate() -> Result<TlsCertificate, GenerateError> {
    generate_certificate(KeyType::EcdsaP256, &["localhost"])
}

/// Generate a self-signed end-entity certificate with the given DNS names
/// as subject alternative names.
pub fn generate_certificate(
    key_type: KeyType,
    names: &[&str],
) -> Result<TlsCertificate, GenerateError> {
    let params = params(key_type, names, IsCa::NoCa)?;
    let cert =
        RcgenCertificate::from_params(params).map_err(|_| GenerateError::GenerationFailed)?;

    let cert_der = cert
        .serialize_der()
        .map_err(|_| GenerateError::GenerationFailed)?;

    Ok(TlsCertificate {
        certificate: cert_der,
        private_key: cert.serialize_private_key_der(),
    })
}

/// A certificate authority able to issue end-entity certificates.
pub struct CertificateAuthority {
    /// The CA certificate itself, usable as a trust anchor.
    pub certificate: TlsCertificate,
    inner: RcgenCertificate,
}

/// Generate a self-signed CA certificate.
pub fn generate_ca(key_type: KeyType) -> Result<CertificateAuthority, GenerateError> {
    let params = params(
        key_type,
        &[],
        IsCa::Ca(BasicConstraints::Unconstrained),
    )?;
    let inner =
        RcgenCertificate::from_params(params).map_err(|_| GenerateError::GenerationFailed)?;

    let certificate = TlsCertificate {
        certificate: inner
            .serialize_der()
            .map_err(|_| GenerateError::GenerationFailed)?,
        private_key: inner.serialize_private_key_der(),
    };

    Ok(CertificateAuthority { certificate, inner })
}

impl CertificateAuthority {
    /// Issue an end-entity certificate for `names`, signed by this CA.
    pub fn issue(&self, key_type: KeyType, names: &[&str]) -> Result<TlsCertificate, GenerateError> {
        let params = params(key_type, names, IsCa::NoCa)?;
        let cert =
            RcgenCertificate::from_params(params).map_err(|_| GenerateError::GenerationFailed)?;

        let cert_der = cert
            .serialize_der_with_signer(&self.inner)
            .map_err(|_| GenerateError::GenerationFailed)?;

        Ok(TlsCertificate {
            certificate: cert_der,
            private_key: cert.serialize_private_key_der(),
        })
    }
}

fn params(key_type: KeyType, names: &[&str], is_ca: IsCa) -> Result<CertificateParams, GenerateError> {
    let alg = key_type.algorithm();
    let key_pair = key_type.key_pair()?;

    let mut params = CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>());

    let common_name = match (&is_ca, names.first()) {
        (IsCa::Ca(_), _) => "timpl test CA",
        (_, Some(name)) => name,
        (_, None) => "timpl peer",
    };
    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::OrganizationName, "timpl".to_string());
    distinguished_name.push(DnType::CommonName, common_name.to_string());
    params.distinguished_name = distinguished_name;

    params.is_ca = is_ca;
    params.alg = alg;
    params.key_pair = Some(key_pair);

    // One year
    let not_before = time::OffsetDateTime::now_utc() - time::Duration::minutes(5);
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(365);

    Ok(params)
}

/// Calculate a certificate fingerprint using SHA-256
pub fn calculate_fingerprint(cert_der: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hasher.finalize().to_vec()
}

/// Format a fingerprint as a colon-separated hex string
/// Example: "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

impl TlsCertificate {
    /// Returns the SHA-256 fingerprint of the DER certificate.
    pub fn fingerprint(&self) -> Vec<u8> {
        calculate_fingerprint(&self.certificate)
    }

    /// Returns the fingerprint as uppercase hex pairs separated by colons.
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for TlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCertificate")
            .field("certificate", &self.certificate.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("certificate", &self.certificate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_signed_certificate() {
        let cert = generate_self_signed_certificate().unwrap();

        assert!(!cert.certificate.is_empty());
        assert!(!cert.private_key.is_empty());

        // SHA-256
        assert_eq!(cert.fingerprint().len(), 32);
    }

    #[test]
    fn test_every_key_type() {
        for key_type in [
            KeyType::EcdsaP256,
            KeyType::EcdsaP384,
            KeyType::Ed25519,
            KeyType::Rsa,
        ] {
            let cert = generate_certificate(key_type, &["example.com"]).unwrap();
            assert!(!cert.certificate.is_empty());
        }
    }

    #[test]
    fn test_fingerprint_formatting() {
        let test_fingerprint = vec![0xAF, 0x12, 0xF6, 0x38, 0x2A];
        let formatted = format_fingerprint(&test_fingerprint);
        assert_eq!(formatted, "AF:12:F6:38:2A");

        let cert = generate_self_signed_certificate().unwrap();
        let formatted = format_fingerprint(&cert.fingerprint());

        // 32 hex pairs with : between them
        assert_eq!(formatted.len(), 95);
        for segment in formatted.split(':') {
            assert_eq!(segment.len(), 2);
            assert!(u8::from_str_radix(segment, 16).is_ok());
        }
    }
}
