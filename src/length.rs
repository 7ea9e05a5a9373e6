//! The length octets of an encoded value.
//!
//! This is a private module. Its public items are re-exported by the parent.

use crate::error::Error;
use crate::target::Target;


//------------ Length --------------------------------------------------------

/// The length octets of an encoded value.
///
/// Since this layer re-encodes values deterministically, only the definite
/// form is ever produced: lengths below 128 are encoded in a single octet,
/// larger lengths use the long form with the minimal number of big-endian
/// octets preceded by an octet carrying their count.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Length(pub usize);

impl Length {
    /// Returns the number of octets of the encoded length.
    pub fn encoded_len(self) -> usize {
        if self.0 < 0x80 {
            1
        }
        else {
            // One octet for the count plus the minimal big-endian octets.
            let bits = usize::BITS - self.0.leading_zeros();
            1 + ((bits as usize) + 7) / 8
        }
    }

    /// Writes the length octets to the given target.
    pub fn write_encoded(self, target: &mut dyn Target) -> Result<(), Error> {
        if self.0 < 0x80 {
            return target.append(&[self.0 as u8])
        }
        let count = self.encoded_len() - 1;
        target.append(&[0x80 | count as u8])?;
        let mut shift = (count - 1) * 8;
        loop {
            target.append(&[(self.0 >> shift) as u8])?;
            if shift == 0 {
                break
            }
            shift -= 8;
        }
        Ok(())
    }
}


//--- From

impl From<usize> for Length {
    fn from(len: usize) -> Self {
        Length(len)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn encoded(len: usize) -> Vec<u8> {
        let mut target = Vec::new();
        Length(len).write_encoded(&mut target).unwrap();
        assert_eq!(target.len(), Length(len).encoded_len());
        target
    }

    #[test]
    fn short_form() {
        assert_eq!(encoded(0), b"\x00");
        assert_eq!(encoded(1), b"\x01");
        assert_eq!(encoded(0x7f), b"\x7f");
    }

    #[test]
    fn long_form() {
        assert_eq!(encoded(0x80), b"\x81\x80");
        assert_eq!(encoded(0xff), b"\x81\xff");
        assert_eq!(encoded(0x100), b"\x82\x01\x00");
        assert_eq!(encoded(0xffff), b"\x82\xff\xff");
        assert_eq!(encoded(0x1_0000), b"\x83\x01\x00\x00");
    }
}
