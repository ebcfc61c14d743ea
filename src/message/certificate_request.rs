use nom::IResult;

use super::extension::{ExtensionContext, ExtensionType, Extensions};
use super::extensions::signature_algorithms::SignatureAlgorithmsExtension;
use super::util::{decode_all, vec8, write_opaque};
use crate::buffer::Buf;
use crate::Error;

/// CertificateRequest (RFC 8446 Section 4.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub context: &'a [u8],
    pub extensions: Extensions<'a>,
}

impl<'a> CertificateRequest<'a> {
    fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, context) = vec8(input)?;
        let (input, extensions) = Extensions::parse(input)?;
        Ok((
            input,
            CertificateRequest {
                context,
                extensions,
            },
        ))
    }

    /// signature_algorithms is mandatory.
    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        let cr = decode_all(body, Self::parse)?;
        cr.extensions.check(ExtensionContext::CertificateRequest)?;
        if !cr.extensions.contains(ExtensionType::SignatureAlgorithms) {
            return Err(Error::MissingExtension(
                "signature_algorithms in CertificateRequest".to_string(),
            ));
        }
        Ok(cr)
    }

    pub fn signature_algorithms(&self) -> Result<SignatureAlgorithmsExtension, Error> {
        let data = self
            .extensions
            .get(ExtensionType::SignatureAlgorithms)
            .ok_or_else(|| Error::MissingExtension("signature_algorithms".to_string()))?;
        SignatureAlgorithmsExtension::decode(data)
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_opaque(output, 1, self.context)?;
        self.extensions.serialize(output)
    }
}
