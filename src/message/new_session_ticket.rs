use nom::number::complete::be_u32;
use nom::IResult;

use super::extension::{ExtensionContext, Extensions};
use super::util::{decode_all, vec16, vec8};
use crate::Error;

/// NewSessionTicket (RFC 8446 Section 4.6.1).
///
/// Resumption is not supported; tickets are parsed so malformed ones are
/// still rejected, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket<'a> {
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: &'a [u8],
    pub ticket: &'a [u8],
    pub extensions: Extensions<'a>,
}

impl<'a> NewSessionTicket<'a> {
    fn parse(input: &'a [u8]) -> IResult<&'a [u8], NewSessionTicket<'a>> {
        let (input, ticket_lifetime) = be_u32(input)?;
        let (input, ticket_age_add) = be_u32(input)?;
        let (input, ticket_nonce) = vec8(input)?;
        let (input, ticket) = vec16(input)?;
        let (input, extensions) = Extensions::parse(input)?;
        Ok((
            input,
            NewSessionTicket {
                ticket_lifetime,
                ticket_age_add,
                ticket_nonce,
                ticket,
                extensions,
            },
        ))
    }

    pub fn decode(body: &'a [u8]) -> Result<Self, Error> {
        let nst = decode_all(body, Self::parse)?;
        if nst.ticket.is_empty() {
            return Err(Error::DecodeError("empty session ticket".to_string()));
        }
        nst.extensions.check(ExtensionContext::NewSessionTicket)?;
        Ok(nst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ticket() {
        let body: &[u8] = &[
            0x00, 0x00, 0x1C, 0x20, // lifetime 7200
            0x01, 0x02, 0x03, 0x04, // age add
            0x01, 0x00, // nonce
            0x00, 0x02, 0xAB, 0xCD, // ticket
            0x00, 0x00, // extensions
        ];
        let nst = NewSessionTicket::decode(body).unwrap();
        assert_eq!(nst.ticket_lifetime, 7200);
        assert_eq!(nst.ticket, &[0xAB, 0xCD]);
    }

    #[test]
    fn empty_ticket() {
        let body: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(NewSessionTicket::decode(body).is_err());
    }
}
