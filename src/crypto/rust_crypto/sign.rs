//! Signing, key loading and signature verification using RustCrypto.

use std::str;

use der::asn1::{AnyRef, OctetStringRef};
use der::{Decode, Encode, Reader, SliceReader, Tag, Tagged};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::NistP256;
use p384::NistP384;
use pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned};
use x509_cert::Certificate as X509Certificate;

use crate::buffer::Buf;
use crate::crypto::provider::{CertificateError, KeyProvider, SignatureError, SignatureVerifier};
use crate::crypto::provider::SigningKey as SigningKeyTrait;
use crate::types::{NamedGroup, SignatureScheme};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Digest paired with a signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DigestAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlg {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlg::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlg::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlg::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// A signature algorithm independent of where it appears
/// (CertificateVerify or an X.509 signature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum VerifyAlg {
    /// ECDSA, optionally pinned to the curve the TLS scheme names.
    Ecdsa(DigestAlg, Option<NamedGroup>),
    Ed25519,
    RsaPss(DigestAlg),
    RsaPkcs1(DigestAlg),
}

impl VerifyAlg {
    pub(super) fn from_scheme(scheme: SignatureScheme) -> Option<VerifyAlg> {
        let alg = match scheme {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => {
                VerifyAlg::Ecdsa(DigestAlg::Sha256, Some(NamedGroup::Secp256r1))
            }
            SignatureScheme::ECDSA_SECP384R1_SHA384 => {
                VerifyAlg::Ecdsa(DigestAlg::Sha384, Some(NamedGroup::Secp384r1))
            }
            SignatureScheme::ED25519 => VerifyAlg::Ed25519,
            SignatureScheme::RSA_PSS_RSAE_SHA256 => VerifyAlg::RsaPss(DigestAlg::Sha256),
            SignatureScheme::RSA_PSS_RSAE_SHA384 => VerifyAlg::RsaPss(DigestAlg::Sha384),
            SignatureScheme::RSA_PSS_RSAE_SHA512 => VerifyAlg::RsaPss(DigestAlg::Sha512),
            SignatureScheme::RSA_PKCS1_SHA256 => VerifyAlg::RsaPkcs1(DigestAlg::Sha256),
            SignatureScheme::RSA_PKCS1_SHA384 => VerifyAlg::RsaPkcs1(DigestAlg::Sha384),
            SignatureScheme::RSA_PKCS1_SHA512 => VerifyAlg::RsaPkcs1(DigestAlg::Sha512),
            _ => return None,
        };
        Some(alg)
    }
}

/// Verify `signature` over `data` with the key in `spki`.
pub(super) fn verify_with_spki(
    spki: &SubjectPublicKeyInfoOwned,
    alg: VerifyAlg,
    data: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    let pubkey_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?;
    let key_oid = spki.algorithm.oid;

    match alg {
        VerifyAlg::Ecdsa(digest, required_group) => {
            if key_oid != OID_EC_PUBLIC_KEY {
                return Err(format!("ECDSA signature with {} key", key_oid));
            }
            let curve_oid: ObjectIdentifier = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or("Missing EC curve parameter")?
                .decode_as()
                .map_err(|_| "Invalid EC curve parameter".to_string())?;

            let group = match curve_oid {
                OID_P256 => NamedGroup::Secp256r1,
                OID_P384 => NamedGroup::Secp384r1,
                _ => return Err(format!("Unsupported EC curve: {}", curve_oid)),
            };
            if let Some(required) = required_group {
                if required != group {
                    return Err(format!("Scheme requires {:?} key, got {:?}", required, group));
                }
            }

            // PrehashVerifier expects a hash digest
            let hash = digest.digest(data);
            match group {
                NamedGroup::Secp256r1 => {
                    let verifying_key = VerifyingKey::<NistP256>::from_sec1_bytes(pubkey_bytes)
                        .map_err(|_| "Invalid P-256 public key".to_string())?;
                    let sig = Signature::<NistP256>::from_der(signature)
                        .map_err(|_| "Invalid signature format".to_string())?;
                    verifying_key
                        .verify_prehash(&hash, &sig)
                        .map_err(|_| "ECDSA P-256 signature verification failed".to_string())
                }
                _ => {
                    let verifying_key = VerifyingKey::<NistP384>::from_sec1_bytes(pubkey_bytes)
                        .map_err(|_| "Invalid P-384 public key".to_string())?;
                    let sig = Signature::<NistP384>::from_der(signature)
                        .map_err(|_| "Invalid signature format".to_string())?;
                    verifying_key
                        .verify_prehash(&hash, &sig)
                        .map_err(|_| "ECDSA P-384 signature verification failed".to_string())
                }
            }
        }
        VerifyAlg::Ed25519 => {
            if key_oid != OID_ED25519 {
                return Err(format!("Ed25519 signature with {} key", key_oid));
            }
            let key: [u8; 32] = pubkey_bytes
                .try_into()
                .map_err(|_| "Invalid Ed25519 public key length".to_string())?;
            let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key)
                .map_err(|_| "Invalid Ed25519 public key".to_string())?;
            let sig = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| "Invalid Ed25519 signature length".to_string())?;
            verifying_key
                .verify_strict(data, &sig)
                .map_err(|_| "Ed25519 signature verification failed".to_string())
        }
        VerifyAlg::RsaPss(digest) | VerifyAlg::RsaPkcs1(digest) => {
            if key_oid != OID_RSA_ENCRYPTION {
                return Err(format!("RSA signature with {} key", key_oid));
            }
            let public_key = RsaPublicKey::from_pkcs1_der(pubkey_bytes)
                .map_err(|_| "Invalid RSA public key".to_string())?;
            let pss = matches!(alg, VerifyAlg::RsaPss(_));
            verify_rsa(public_key, pss, digest, data, signature)
        }
    }
}

fn verify_rsa(
    public_key: RsaPublicKey,
    pss: bool,
    digest: DigestAlg,
    data: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    let failed = |_: rsa::signature::Error| "RSA signature verification failed".to_string();
    if pss {
        let sig = rsa::pss::Signature::try_from(signature)
            .map_err(|_| "Invalid RSA signature".to_string())?;
        let result = match digest {
            DigestAlg::Sha256 => {
                rsa::pss::VerifyingKey::<Sha256>::new(public_key).verify(data, &sig)
            }
            DigestAlg::Sha384 => {
                rsa::pss::VerifyingKey::<Sha384>::new(public_key).verify(data, &sig)
            }
            DigestAlg::Sha512 => {
                rsa::pss::VerifyingKey::<Sha512>::new(public_key).verify(data, &sig)
            }
        };
        result.map_err(failed)
    } else {
        let sig = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|_| "Invalid RSA signature".to_string())?;
        let result = match digest {
            DigestAlg::Sha256 => {
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key).verify(data, &sig)
            }
            DigestAlg::Sha384 => {
                rsa::pkcs1v15::VerifyingKey::<Sha384>::new(public_key).verify(data, &sig)
            }
            DigestAlg::Sha512 => {
                rsa::pkcs1v15::VerifyingKey::<Sha512>::new(public_key).verify(data, &sig)
            }
        };
        result.map_err(failed)
    }
}

/// Private key implementation.
enum RustCryptoSigningKey {
    EcdsaP256(SigningKey<NistP256>),
    EcdsaP384(SigningKey<NistP384>),
    Ed25519(Box<ed25519_dalek::SigningKey>),
    Rsa(Box<RsaPrivateKey>),
}

impl std::fmt::Debug for RustCryptoSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RustCryptoSigningKey::EcdsaP256(_) => "SigningKey::EcdsaP256",
            RustCryptoSigningKey::EcdsaP384(_) => "SigningKey::EcdsaP384",
            RustCryptoSigningKey::Ed25519(_) => "SigningKey::Ed25519",
            RustCryptoSigningKey::Rsa(_) => "SigningKey::Rsa",
        };
        f.debug_tuple(name).finish()
    }
}

impl SigningKeyTrait for RustCryptoSigningKey {
    fn sign(&mut self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String> {
        if !self.schemes().contains(&scheme) {
            return Err(format!("Key cannot sign with {:?}", scheme));
        }
        out.clear();

        match self {
            RustCryptoSigningKey::EcdsaP256(key) => {
                let hash = Sha256::digest(data);
                let signature: Signature<NistP256> = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            RustCryptoSigningKey::EcdsaP384(key) => {
                let hash = Sha384::digest(data);
                let signature: Signature<NistP384> = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            RustCryptoSigningKey::Ed25519(key) => {
                let signature = ed25519_dalek::Signer::sign(&**key, data);
                out.extend_from_slice(&signature.to_bytes());
            }
            RustCryptoSigningKey::Rsa(key) => {
                let private_key = RsaPrivateKey::clone(&**key);
                let signature = match scheme {
                    SignatureScheme::RSA_PSS_RSAE_SHA256 => {
                        rsa::pss::BlindedSigningKey::<Sha256>::new(private_key)
                            .try_sign_with_rng(&mut OsRng, data)
                    }
                    SignatureScheme::RSA_PSS_RSAE_SHA384 => {
                        rsa::pss::BlindedSigningKey::<Sha384>::new(private_key)
                            .try_sign_with_rng(&mut OsRng, data)
                    }
                    _ => rsa::pss::BlindedSigningKey::<Sha512>::new(private_key)
                        .try_sign_with_rng(&mut OsRng, data),
                }
                .map_err(|_| "RSA signing failed".to_string())?;
                out.extend_from_slice(&signature.to_bytes());
            }
        }
        Ok(())
    }

    fn schemes(&self) -> &'static [SignatureScheme] {
        match self {
            RustCryptoSigningKey::EcdsaP256(_) => &[SignatureScheme::ECDSA_SECP256R1_SHA256],
            RustCryptoSigningKey::EcdsaP384(_) => &[SignatureScheme::ECDSA_SECP384R1_SHA384],
            RustCryptoSigningKey::Ed25519(_) => &[SignatureScheme::ED25519],
            RustCryptoSigningKey::Rsa(_) => &[
                SignatureScheme::RSA_PSS_RSAE_SHA256,
                SignatureScheme::RSA_PSS_RSAE_SHA384,
                SignatureScheme::RSA_PSS_RSAE_SHA512,
            ],
        }
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKeyTrait>, String> {
        // Try PKCS#8 DER format first (most common)
        if let Ok(key) = SigningKey::<NistP256>::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::EcdsaP256(key)));
        }
        if let Ok(key) = SigningKey::<NistP384>::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::EcdsaP384(key)));
        }
        if let Some(key) = load_ed25519(key_der)? {
            return Ok(Box::new(RustCryptoSigningKey::Ed25519(Box::new(key))));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::Rsa(Box::new(key))));
        }

        // PKCS#1 RSAPrivateKey
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::Rsa(Box::new(key))));
        }

        // SEC1 DER format (OpenSSL EC private key format)
        if let Some(key) = load_sec1(key_der)? {
            return Ok(key);
        }

        // Check if it's a PEM encoded key
        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Re-wrap a SEC1 EC key as PKCS#8 so the curve crates can load it.
fn load_sec1(key_der: &[u8]) -> Result<Option<Box<dyn SigningKeyTrait>>, String> {
    let Ok(ec_key) = sec1::EcPrivateKey::try_from(key_der) else {
        return Ok(None);
    };

    let curve_oid = match &ec_key.parameters {
        Some(sec1::EcParameters::NamedCurve(oid)) => *oid,
        None if ec_key.private_key.len() == 32 => OID_P256,
        None if ec_key.private_key.len() == 48 => OID_P384,
        None => return Ok(None),
    };

    let curve_params_der = curve_oid
        .to_der()
        .map_err(|_| "Failed to encode curve OID".to_string())?;
    let curve_params_any = der::asn1::AnyRef::try_from(curve_params_der.as_slice())
        .map_err(|_| "Failed to create AnyRef".to_string())?;

    let pkcs8 = pkcs8::PrivateKeyInfo {
        algorithm: spki::AlgorithmIdentifierRef {
            oid: OID_EC_PUBLIC_KEY,
            parameters: Some(curve_params_any),
        },
        private_key: key_der,
        public_key: None,
    };
    let pkcs8_der = pkcs8
        .to_der()
        .map_err(|_| "Failed to encode PKCS#8".to_string())?;

    if curve_oid == OID_P256 {
        if let Ok(key) = SigningKey::<NistP256>::from_pkcs8_der(&pkcs8_der) {
            return Ok(Some(Box::new(RustCryptoSigningKey::EcdsaP256(key))));
        }
    }
    if curve_oid == OID_P384 {
        if let Ok(key) = SigningKey::<NistP384>::from_pkcs8_der(&pkcs8_der) {
            return Ok(Some(Box::new(RustCryptoSigningKey::EcdsaP384(key))));
        }
    }
    Ok(None)
}

/// Ed25519 PKCS#8, v1 or v2 (RFC 5958 OneAsymmetricKey).
///
/// Some encoders wrap the v2 public key in an explicit `[1]` around the bit
/// string instead of tagging it implicitly, which the `pkcs8` crate refuses.
/// Both layouts are read here, and the embedded public key must match the
/// seed.
fn load_ed25519(key_der: &[u8]) -> Result<Option<ed25519_dalek::SigningKey>, String> {
    let Ok(outer) = AnyRef::from_der(key_der) else {
        return Ok(None);
    };
    if outer.tag() != Tag::Sequence {
        return Ok(None);
    }

    let mut reader = SliceReader::new(outer.value()).map_err(|e| e.to_string())?;
    let fields = (
        AnyRef::decode(&mut reader),
        AnyRef::decode(&mut reader),
        AnyRef::decode(&mut reader),
    );
    let (Ok(version), Ok(algorithm), Ok(private_key)) = fields else {
        return Ok(None);
    };
    if version.tag() != Tag::Integer || algorithm.tag() != Tag::Sequence {
        return Ok(None);
    }
    // Ed25519 carries no algorithm parameters, so the identifier is the bare OID.
    match ObjectIdentifier::from_der(algorithm.value()) {
        Ok(oid) if oid == OID_ED25519 => {}
        _ => return Ok(None),
    }

    // CurvePrivateKey ::= OCTET STRING, nested inside the privateKey field.
    let seed = OctetStringRef::from_der(private_key.value())
        .map_err(|_| "Invalid Ed25519 private key".to_string())?;
    let seed: [u8; 32] = seed
        .as_bytes()
        .try_into()
        .map_err(|_| "Invalid Ed25519 seed length".to_string())?;
    let key = ed25519_dalek::SigningKey::from_bytes(&seed);

    while !reader.is_finished() {
        let field = AnyRef::decode(&mut reader).map_err(|e| e.to_string())?;
        let is_public_key = matches!(
            field.tag(),
            Tag::ContextSpecific { number, .. } if number.value() == 1
        );
        if !is_public_key {
            continue;
        }
        let value = field.value();
        let Some(public) = value.get(value.len().saturating_sub(32)..) else {
            return Err("Invalid Ed25519 public key".to_string());
        };
        if value.len() < 33 || public != key.verifying_key().as_bytes() {
            return Err("Ed25519 public key does not match private key".to_string());
        }
    }

    Ok(Some(key))
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), SignatureError> {
        let cert = X509Certificate::from_der(cert_der)
            .map_err(|e| CertificateError::BadEncoding(e.to_string()))?;

        let alg = VerifyAlg::from_scheme(scheme).ok_or_else(|| {
            CertificateError::Unsupported(format!("signature scheme {:?}", scheme))
        })?;

        verify_with_spki(
            &cert.tbs_certificate.subject_public_key_info,
            alg,
            data,
            signature,
        )
        .map_err(SignatureError::Mismatch)
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
