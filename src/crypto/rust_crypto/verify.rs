//! Certificate chain validation using `x509-cert`.
//!
//! Deliberately small: validity windows, issuer signatures up to a trust
//! anchor, the CA flag on intermediates and DNS/IP subject alternative
//! names. No revocation, name constraints or policy processing.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use der::{Decode, Encode};
use spki::ObjectIdentifier;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, SubjectAltName};
use x509_cert::Certificate as X509Certificate;

use super::sign::{verify_with_spki, DigestAlg, VerifyAlg};
use crate::buffer::Buf;
use crate::crypto::provider::{CertificateError, CertificateVerifier};

const OID_SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
const OID_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");

const OID_ECDSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const OID_RSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_RSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const OID_RSA_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

#[derive(Debug)]
pub(super) struct RustCryptoCertificateVerifier;

impl CertificateVerifier for RustCryptoCertificateVerifier {
    fn verify_chain(
        &self,
        chain: &[&[u8]],
        trust_anchors: &[Buf],
        server_name: Option<&str>,
        now: SystemTime,
    ) -> Result<(), CertificateError> {
        if chain.is_empty() {
            return Err(CertificateError::BadEncoding("empty chain".to_string()));
        }

        let certs = chain
            .iter()
            .map(|der| parse(der))
            .collect::<Result<Vec<_>, _>>()?;
        let anchors = trust_anchors
            .iter()
            .map(|der| parse(der))
            .collect::<Result<Vec<_>, _>>()?;

        for cert in &certs {
            check_validity(cert, now)?;
        }

        if let Some(name) = server_name {
            check_name(&certs[0], name)?;
        }

        for (i, cert) in certs.iter().enumerate() {
            // A pinned certificate terminates the path.
            if trust_anchors.iter().any(|a| a.as_ref() == chain[i]) {
                return Ok(());
            }

            for anchor in &anchors {
                if anchor.tbs_certificate.subject == cert.tbs_certificate.issuer
                    && verify_issued_by(cert, anchor).is_ok()
                {
                    check_validity(anchor, now)?;
                    return Ok(());
                }
            }

            let Some(issuer) = certs.get(i + 1) else {
                return Err(CertificateError::UnknownIssuer);
            };
            if issuer.tbs_certificate.subject != cert.tbs_certificate.issuer {
                return Err(CertificateError::UnknownIssuer);
            }
            if !is_ca(issuer)? {
                return Err(CertificateError::BadSignature(
                    "issuer is not a CA".to_string(),
                ));
            }
            verify_issued_by(cert, issuer)?;
        }

        Err(CertificateError::UnknownIssuer)
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate, CertificateError> {
    X509Certificate::from_der(der).map_err(|e| CertificateError::BadEncoding(e.to_string()))
}

fn check_validity(cert: &X509Certificate, now: SystemTime) -> Result<(), CertificateError> {
    let now = now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CertificateError::Expired)?;
    let validity = &cert.tbs_certificate.validity;
    if now < validity.not_before.to_unix_duration() || now > validity.not_after.to_unix_duration()
    {
        return Err(CertificateError::Expired);
    }
    Ok(())
}

fn is_ca(cert: &X509Certificate) -> Result<bool, CertificateError> {
    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return Ok(false);
    };
    for ext in extensions {
        if ext.extn_id == OID_BASIC_CONSTRAINTS {
            let bc = BasicConstraints::from_der(ext.extn_value.as_bytes())
                .map_err(|e| CertificateError::BadEncoding(e.to_string()))?;
            return Ok(bc.ca);
        }
    }
    Ok(false)
}

fn verify_issued_by(
    cert: &X509Certificate,
    issuer: &X509Certificate,
) -> Result<(), CertificateError> {
    let alg = match cert.signature_algorithm.oid {
        OID_ECDSA_SHA256 => VerifyAlg::Ecdsa(DigestAlg::Sha256, None),
        OID_ECDSA_SHA384 => VerifyAlg::Ecdsa(DigestAlg::Sha384, None),
        OID_ED25519 => VerifyAlg::Ed25519,
        OID_RSA_SHA256 => VerifyAlg::RsaPkcs1(DigestAlg::Sha256),
        OID_RSA_SHA384 => VerifyAlg::RsaPkcs1(DigestAlg::Sha384),
        OID_RSA_SHA512 => VerifyAlg::RsaPkcs1(DigestAlg::Sha512),
        oid => {
            return Err(CertificateError::Unsupported(format!(
                "signature algorithm {}",
                oid
            )))
        }
    };

    let tbs = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| CertificateError::BadEncoding(e.to_string()))?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| CertificateError::BadEncoding("signature bit string".to_string()))?;

    verify_with_spki(
        &issuer.tbs_certificate.subject_public_key_info,
        alg,
        &tbs,
        signature,
    )
    .map_err(CertificateError::BadSignature)
}

fn check_name(cert: &X509Certificate, name: &str) -> Result<(), CertificateError> {
    let ip = name.parse::<IpAddr>().ok();

    let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or_default();
    for ext in extensions {
        if ext.extn_id != OID_SUBJECT_ALT_NAME {
            continue;
        }
        let san = SubjectAltName::from_der(ext.extn_value.as_bytes())
            .map_err(|e| CertificateError::BadEncoding(e.to_string()))?;

        for general_name in san.0.iter() {
            let matched = match (general_name, ip) {
                (GeneralName::DnsName(dns), None) => dns_name_matches(&dns.to_string(), name),
                (GeneralName::IpAddress(octets), Some(ip)) => match ip {
                    IpAddr::V4(v4) => octets.as_bytes() == v4.octets(),
                    IpAddr::V6(v6) => octets.as_bytes() == v6.octets(),
                },
                _ => false,
            };
            if matched {
                return Ok(());
            }
        }
    }

    Err(CertificateError::NameMismatch(name.to_string()))
}

/// Case-insensitive DNS match with a single leftmost `*` label.
fn dns_name_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    let name = name.trim_end_matches('.');

    if let Some(suffix) = pattern.strip_prefix("*.") {
        let Some((first, rest)) = name.split_once('.') else {
            return false;
        };
        return !first.is_empty() && rest.eq_ignore_ascii_case(suffix);
    }

    pattern.eq_ignore_ascii_case(name)
}

/// Static instance of the certificate verifier.
pub(super) static CERTIFICATE_VERIFIER: RustCryptoCertificateVerifier =
    RustCryptoCertificateVerifier;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{generate_ca, generate_certificate, KeyType};
    use std::time::Duration;

    #[test]
    fn wildcard_matching() {
        assert!(dns_name_matches("*.example.com", "www.example.com"));
        assert!(dns_name_matches("WWW.Example.com", "www.example.com"));
        assert!(!dns_name_matches("*.example.com", "example.com"));
        assert!(!dns_name_matches("*.example.com", "a.b.example.com"));
        assert!(!dns_name_matches("example.com", "www.example.com"));
    }

    #[test]
    fn pinned_self_signed() {
        let cert = generate_certificate(KeyType::EcdsaP256, &["localhost"]).unwrap();
        let anchors = [Buf::from_slice(&cert.certificate)];
        CERTIFICATE_VERIFIER
            .verify_chain(
                &[&cert.certificate],
                &anchors,
                Some("localhost"),
                SystemTime::now(),
            )
            .unwrap();
    }

    #[test]
    fn wrong_name() {
        let cert = generate_certificate(KeyType::EcdsaP256, &["localhost"]).unwrap();
        let anchors = [Buf::from_slice(&cert.certificate)];
        let err = CERTIFICATE_VERIFIER
            .verify_chain(
                &[&cert.certificate],
                &anchors,
                Some("example.org"),
                SystemTime::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CertificateError::NameMismatch(_)));
    }

    #[test]
    fn untrusted() {
        let cert = generate_certificate(KeyType::EcdsaP256, &["localhost"]).unwrap();
        let other = generate_certificate(KeyType::EcdsaP256, &["localhost"]).unwrap();
        let anchors = [Buf::from_slice(&other.certificate)];
        let err = CERTIFICATE_VERIFIER
            .verify_chain(&[&cert.certificate], &anchors, None, SystemTime::now())
            .unwrap_err();
        assert_eq!(err, CertificateError::UnknownIssuer);
    }

    #[test]
    fn expired() {
        let cert = generate_certificate(KeyType::EcdsaP256, &["localhost"]).unwrap();
        let anchors = [Buf::from_slice(&cert.certificate)];
        let later = SystemTime::now() + Duration::from_secs(3 * 365 * 24 * 3600);
        let err = CERTIFICATE_VERIFIER
            .verify_chain(&[&cert.certificate], &anchors, None, later)
            .unwrap_err();
        assert_eq!(err, CertificateError::Expired);
    }

    #[test]
    fn issued_by_ca() {
        let ca = generate_ca(KeyType::EcdsaP256).unwrap();
        let leaf = ca.issue(KeyType::Ed25519, &["*.example.com"]).unwrap();
        let anchors = [Buf::from_slice(&ca.certificate.certificate)];
        CERTIFICATE_VERIFIER
            .verify_chain(
                &[&leaf.certificate],
                &anchors,
                Some("api.example.com"),
                SystemTime::now(),
            )
            .unwrap();
    }
}
