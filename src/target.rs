//! Targets for encoding.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! A [`Target`] is the byte sink the encoding pass serializes into. The
//! trait is object safe so the dispatch layer can hand a `&mut dyn Target`
//! through the capability table. Apart from the growing `Vec<u8>` target,
//! there is a fixed-buffer target that fails with
//! [`Error::BufferOverflow`], a counting target, and the comparison target
//! used by cache-validity checks to detect a mismatch without copying.

use crate::error::Error;


//------------ Target --------------------------------------------------------

/// A target for encoding.
///
/// This is a simplified version of `io::Write` with a single, fixed error
/// type so that it can be used as a trait object.
pub trait Target {
    /// Appends the data to the target.
    fn append(&mut self, data: &[u8]) -> Result<(), Error>;
}

impl<T: Target + ?Sized> Target for &mut T {
    fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        (**self).append(data)
    }
}

impl Target for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(data);
        Ok(())
    }
}


//------------ SliceTarget ---------------------------------------------------

/// A target writing into a caller-supplied fixed buffer.
///
/// Writing past the end of the buffer fails with
/// [`Error::BufferOverflow`].
#[derive(Debug)]
pub struct SliceTarget<'a> {
    /// The buffer to write into.
    buf: &'a mut [u8],

    /// The number of bytes written so far.
    pos: usize,
}

impl<'a> SliceTarget<'a> {
    /// Creates a new target writing into the given buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        SliceTarget { buf, pos: 0 }
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    /// Returns whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }
}

impl<'a> Target for SliceTarget<'a> {
    fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        let end = self.pos.checked_add(data.len())
            .ok_or(Error::BufferOverflow)?;
        match self.buf.get_mut(self.pos..end) {
            Some(dest) => {
                dest.copy_from_slice(data);
                self.pos = end;
                Ok(())
            }
            None => Err(Error::BufferOverflow)
        }
    }
}


//------------ CompareTarget -------------------------------------------------

/// A target that compares written bytes against an expected image.
///
/// Instead of storing anything, the target checks each chunk against the
/// expected bytes and fails fast with [`Error::NotEqual`] on the first
/// mismatching byte. After the write completed, [`finish`][Self::finish]
/// checks that the expected image was consumed entirely.
#[derive(Debug)]
pub struct CompareTarget<'a> {
    /// The still unconsumed part of the expected image.
    expected: &'a [u8],
}

impl<'a> CompareTarget<'a> {
    /// Creates a new target expecting the given bytes.
    pub fn new(expected: &'a [u8]) -> Self {
        CompareTarget { expected }
    }

    /// Checks that the expected image was fully consumed.
    pub fn finish(self) -> Result<(), Error> {
        if self.expected.is_empty() {
            Ok(())
        }
        else {
            Err(Error::NotEqual)
        }
    }
}

impl<'a> Target for CompareTarget<'a> {
    fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        match self.expected.get(..data.len()) {
            Some(head) if head == data => {
                self.expected = &self.expected[data.len()..];
                Ok(())
            }
            _ => Err(Error::NotEqual)
        }
    }
}


//------------ LenTarget -----------------------------------------------------

/// A target that merely counts the bytes written to it.
#[derive(Debug, Default)]
pub struct LenTarget {
    /// The number of bytes written.
    len: usize,
}

impl LenTarget {
    /// Creates a new counting target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Target for LenTarget {
    fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        self.len += data.len();
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slice_target_overflow() {
        let mut buf = [0u8; 4];
        let mut target = SliceTarget::new(&mut buf);
        target.append(b"ab").unwrap();
        target.append(b"cd").unwrap();
        assert_eq!(target.append(b"e"), Err(Error::BufferOverflow));
        assert_eq!(target.len(), 4);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn compare_target_matches() {
        let mut target = CompareTarget::new(b"abcdef");
        target.append(b"abc").unwrap();
        target.append(b"def").unwrap();
        target.finish().unwrap();
    }

    #[test]
    fn compare_target_mismatch() {
        let mut target = CompareTarget::new(b"abcdef");
        target.append(b"abc").unwrap();
        assert_eq!(target.append(b"dxf"), Err(Error::NotEqual));
    }

    #[test]
    fn compare_target_short_expected() {
        let mut target = CompareTarget::new(b"ab");
        assert_eq!(target.append(b"abc"), Err(Error::NotEqual));
    }

    #[test]
    fn compare_target_unconsumed() {
        let mut target = CompareTarget::new(b"abcd");
        target.append(b"ab").unwrap();
        assert_eq!(target.finish(), Err(Error::NotEqual));
    }

    #[test]
    fn len_target_counts() {
        let mut target = LenTarget::new();
        target.append(b"abc").unwrap();
        target.append(b"").unwrap();
        target.append(b"de").unwrap();
        assert_eq!(target.len(), 5);
    }
}
