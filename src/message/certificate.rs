use arrayvec::ArrayVec;
use nom::IResult;

use super::extension::{ExtensionContext, Extensions};
use super::util::{bounded_list, decode_all, vec16, vec24, vec8, write_opaque, write_prefixed};
use super::MAX_CERTIFICATE_CHAIN_LEN;
use crate::buffer::Buf;
use crate::Error;

/// CertificateEntry (RFC 8446 Section 4.4.2), X.509 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateEntry<'a> {
    pub cert_data: &'a [u8],
    pub extensions: &'a [u8],
}

impl<'a> CertificateEntry<'a> {
    pub fn new(cert_data: &'a [u8]) -> Self {
        CertificateEntry {
            cert_data,
            extensions: &[],
        }
    }

    fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateEntry<'a>> {
        let (input, cert_data) = vec24(input)?;
        let (input, extensions) = vec16(input)?;
        Ok((
            input,
            CertificateEntry {
                cert_data,
                extensions,
            },
        ))
    }
}

/// Certificate message. The end-entity certificate comes first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate<'a> {
    pub context: &'a [u8],
    pub certificate_list: ArrayVec<CertificateEntry<'a>, MAX_CERTIFICATE_CHAIN_LEN>,
}

impl<'a> Certificate<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, context) = vec8(input)?;
        let (input, list) = vec24(input)?;
        let (_, certificate_list) = bounded_list(list, CertificateEntry::parse)?;
        Ok((
            input,
            Certificate {
                context,
                certificate_list,
            },
        ))
    }

    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        let cert = decode_all(body, Self::parse)?;
        for entry in &cert.certificate_list {
            if entry.cert_data.is_empty() {
                return Err(Error::DecodeError("empty cert_data".to_string()));
            }
            Extensions::check_block(entry.extensions, ExtensionContext::Certificate)?;
        }
        Ok(cert)
    }

    /// Copy the DER certificates out of the message.
    pub fn to_owned_chain(&self) -> Vec<Buf> {
        self.certificate_list
            .iter()
            .map(|e| Buf::from_slice(e.cert_data))
            .collect()
    }

    pub fn serialize(&self, output: &mut Buf) -> Result<(), Error> {
        write_opaque(output, 1, self.context)?;
        write_prefixed(output, 3, |out| {
            for entry in &self.certificate_list {
                write_opaque(out, 3, entry.cert_data)?;
                write_opaque(out, 2, entry.extensions)?;
            }
            Ok(())
        })
    }
}
