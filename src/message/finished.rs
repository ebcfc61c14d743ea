use crate::buffer::Buf;

/// Finished (RFC 8446 Section 4.4.4). The body is verify_data alone; its
/// length is the hash length of the negotiated suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    pub fn decode(body: &'a [u8]) -> Self {
        Finished { verify_data: body }
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(self.verify_data);
    }
}
