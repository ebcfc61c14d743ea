use std::ops::Deref;

use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use crate::buffer::Buf;

/// ServerHello.random of a HelloRetryRequest: SHA-256("HelloRetryRequest").
pub const HRR_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = take(32_usize)(input)?;
        let mut random = [0; 32];
        random.copy_from_slice(bytes);
        Ok((input, Random(random)))
    }

    pub fn is_hello_retry_request(&self) -> bool {
        self.0 == HRR_RANDOM
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.0);
    }
}

/// legacy_session_id, at most 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionId(ArrayVec<u8, 32>);

impl SessionId {
    pub fn empty() -> Self {
        SessionId(ArrayVec::new())
    }

    pub fn try_new(data: &[u8]) -> Option<Self> {
        let mut v = ArrayVec::new();
        v.try_extend_from_slice(data).ok()?;
        Some(SessionId(v))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SessionId> {
        let (input, len) = be_u8(input)?;
        if len > 32 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, data) = take(len)(input)?;
        Ok((input, SessionId(data.iter().copied().collect())))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.0.len() as u8);
        output.extend_from_slice(&self.0);
    }
}

impl Deref for SessionId {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
