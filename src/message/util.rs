//! Parsing and writing helpers shared by the message codecs.

use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

use crate::buffer::Buf;
use crate::Error;

/// `opaque data<0..2^8-1>`
pub fn vec8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len)(input)
}

/// `opaque data<0..2^16-1>`
pub fn vec16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len)(input)
}

/// `opaque data<0..2^24-1>`
pub fn vec24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len)(input)
}

/// Parse `f` repeatedly until `input` is exhausted.
///
/// More than `N` items is a failure, as is an item parser that stops short
/// of the end of the block.
pub fn bounded_list<'a, O, const N: usize>(
    mut input: &'a [u8],
    mut f: impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
) -> IResult<&'a [u8], ArrayVec<O, N>> {
    let mut acc = ArrayVec::new();
    while !input.is_empty() {
        let (rest, item) = f(input).map_err(fail)?;
        if acc.try_push(item).is_err() {
            return Err(Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
        }
        input = rest;
    }
    Ok((input, acc))
}

/// Require that a length-delimited block was consumed entirely.
pub fn ensure_empty(rest: &[u8]) -> IResult<&[u8], ()> {
    if rest.is_empty() {
        Ok((rest, ()))
    } else {
        Err(Err::Failure(NomError::new(rest, ErrorKind::LengthValue)))
    }
}

/// Promote a recoverable nom error to a failure.
fn fail(e: Err<NomError<&[u8]>>) -> Err<NomError<&[u8]>> {
    match e {
        Err::Error(e) => Err::Failure(e),
        e => e,
    }
}

/// Run a complete-input parser over a whole message body.
pub fn decode_all<'a, O>(
    body: &'a [u8],
    parser: impl FnOnce(&'a [u8]) -> IResult<&'a [u8], O>,
) -> Result<O, Error> {
    let (rest, out) = parser(body).map_err(|e| {
        let too_large = matches!(
            &e,
            Err::Error(inner) | Err::Failure(inner) if inner.code == ErrorKind::TooLarge
        );
        if too_large {
            Error::DecodeError("list exceeds limit".to_string())
        } else {
            Error::from(e)
        }
    })?;
    if !rest.is_empty() {
        return Err(Error::DecodeError(format!(
            "{} trailing bytes after message",
            rest.len()
        )));
    }
    Ok(out)
}

/// Write `f`'s output behind a big-endian length prefix of `width` bytes.
pub fn write_prefixed(
    out: &mut Buf,
    width: usize,
    f: impl FnOnce(&mut Buf) -> Result<(), Error>,
) -> Result<(), Error> {
    let start = out.len();
    out.resize(start + width, 0);
    f(out)?;

    let len = out.len() - start - width;
    if len >= 1 << (8 * width) {
        return Err(Error::Encode(format!(
            "length {} does not fit in {} bytes",
            len, width
        )));
    }
    let bytes = (len as u32).to_be_bytes();
    out[start..start + width].copy_from_slice(&bytes[4 - width..]);
    Ok(())
}

/// Write a byte string with a length prefix of `width` bytes.
pub fn write_opaque(out: &mut Buf, width: usize, data: &[u8]) -> Result<(), Error> {
    write_prefixed(out, width, |out| {
        out.extend_from_slice(data);
        Ok(())
    })
}
