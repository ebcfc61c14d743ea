use nom::number::complete::be_u8;

use super::util::decode_all;
use crate::buffer::Buf;
use crate::Error;

/// KeyUpdate (RFC 8446 Section 4.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdateRequest {
    UpdateNotRequested,
    UpdateRequested,
}

impl KeyUpdateRequest {
    /// Any value other than 0 or 1 is `illegal_parameter`.
    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        match decode_all(body, be_u8)? {
            0 => Ok(KeyUpdateRequest::UpdateNotRequested),
            1 => Ok(KeyUpdateRequest::UpdateRequested),
            v => Err(Error::IllegalParameter(format!("KeyUpdate request {}", v))),
        }
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(match self {
            KeyUpdateRequest::UpdateNotRequested => 0,
            KeyUpdateRequest::UpdateRequested => 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values() {
        assert_eq!(
            KeyUpdateRequest::decode(&[1]).unwrap(),
            KeyUpdateRequest::UpdateRequested
        );
        assert_eq!(
            KeyUpdateRequest::decode(&[0]).unwrap(),
            KeyUpdateRequest::UpdateNotRequested
        );
        assert!(matches!(
            KeyUpdateRequest::decode(&[2]),
            Err(Error::IllegalParameter(_))
        ));
        assert!(KeyUpdateRequest::decode(&[0, 0]).is_err());
        assert!(KeyUpdateRequest::decode(&[]).is_err());
    }
}
