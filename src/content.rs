//! Borrowed and owned value content.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! The raw content octets of a value either borrow from the buffer the
//! value was decoded from or live in a heap buffer owned by the value.
//! The overwhelming majority of values in a decoded certificate chain
//! borrow, which is why [`Content`] keeps that case as a cheap [`Bytes`]
//! handle and only owned content carries an allocation record.

use bytes::Bytes;
use crate::alloc::{same_allocator, AllocRef, TrackedBuf};
use crate::error::Error;


//------------ Content -------------------------------------------------------

/// The content octets of a value.
#[derive(Debug, Default)]
pub enum Content {
    /// There are no content octets.
    #[default]
    Empty,

    /// The content borrows from a buffer owned by someone else.
    ///
    /// Typically this is the original decode buffer. The `Bytes` handle
    /// keeps that buffer alive for as long as the value borrows from it.
    Borrowed(Bytes),

    /// The content lives in a buffer owned by this value.
    Owned(TrackedBuf),
}

impl Content {
    /// Creates content borrowing the given bytes.
    pub fn borrowed(bytes: Bytes) -> Self {
        Content::Borrowed(bytes)
    }

    /// Returns the content octets.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Content::Empty => b"",
            Content::Borrowed(bytes) => bytes.as_ref(),
            Content::Owned(buf) => buf.bytes(),
        }
    }

    /// Returns the number of content octets.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Returns whether there are no content octets.
    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    /// Returns whether the content is owned.
    pub fn is_owned(&self) -> bool {
        matches!(self, Content::Owned(_))
    }

    /// Returns the owned buffer for modification.
    ///
    /// Fails with [`Error::InvalidState`] for empty or borrowed content.
    pub fn owned_mut(&mut self) -> Result<&mut TrackedBuf, Error> {
        match self {
            Content::Owned(buf) => Ok(buf),
            _ => Err(Error::InvalidState)
        }
    }

    /// Allocates zero-filled owned content of the given size.
    ///
    /// Fails with [`Error::InvalidState`] if the content is already owned.
    /// Already owned content has to go through
    /// [`reallocate`][Self::reallocate] instead so its allocation record
    /// stays consistent. Borrowed content is simply replaced.
    pub fn allocate_zeroed(
        &mut self, size: usize, allocator: &AllocRef
    ) -> Result<(), Error> {
        if self.is_owned() {
            return Err(Error::InvalidState)
        }
        *self = Content::Owned(TrackedBuf::new(size, allocator)?);
        Ok(())
    }

    /// Allocates owned content holding a copy of the given bytes.
    pub fn duplicate(
        &mut self, src: &[u8], allocator: &AllocRef
    ) -> Result<(), Error> {
        if self.is_owned() {
            return Err(Error::InvalidState)
        }
        *self = Content::Owned(TrackedBuf::duplicate(src, allocator)?);
        Ok(())
    }

    /// Reallocates the content to the given size.
    ///
    /// There are four cases:
    ///
    /// * a new size of zero frees the content,
    /// * content that is not yet owned becomes freshly allocated,
    ///   zero-filled owned content,
    /// * owned content reallocated under its own allocator (or with no
    ///   allocator override) resizes in place, zero-extending,
    /// * owned content reallocated under a *different* allocator is
    ///   migrated: a fresh buffer is allocated from the new allocator, the
    ///   bytes are copied over (zero-extending), and the old buffer is
    ///   released to its own allocator. Allocation records are
    ///   allocator-specific and cannot be silently handed over.
    pub fn reallocate(
        &mut self, new_size: usize, allocator: Option<&AllocRef>
    ) -> Result<(), Error> {
        if new_size == 0 {
            self.free();
            return Ok(())
        }
        let owned = match self {
            Content::Owned(buf) => buf,
            _ => {
                let allocator = match allocator {
                    Some(allocator) => allocator.clone(),
                    None => crate::alloc::heap(),
                };
                return self.allocate_zeroed(new_size, &allocator)
            }
        };
        match allocator {
            Some(new_alloc) if !same_allocator(owned.allocator(), new_alloc)
            => {
                log::trace!(
                    "migrating {} bytes of content to a new allocator",
                    owned.len()
                );
                let mut fresh = TrackedBuf::new(new_size, new_alloc)?;
                let copy = new_size.min(owned.len());
                fresh.bytes_mut()[..copy]
                    .copy_from_slice(&owned.bytes()[..copy]);
                *self = Content::Owned(fresh);
                Ok(())
            }
            _ => owned.resize(new_size)
        }
    }

    /// Frees owned content.
    ///
    /// This is a no-op for empty or borrowed content; a value must never
    /// free a buffer it merely borrows from.
    pub fn free(&mut self) {
        if self.is_owned() {
            *self = Content::Empty
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::fmt;
    use std::rc::Rc;
    use crate::alloc::{heap, Allocator, Heap};
    use super::*;

    /// An allocator that counts its calls.
    #[derive(Default)]
    pub struct Counting {
        pub allocs: Cell<u32>,
        pub reallocs: Cell<u32>,
        pub releases: Cell<u32>,
    }

    impl fmt::Debug for Counting {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("Counting")
        }
    }

    impl Allocator for Counting {
        fn allocate(&self, size: usize) -> Result<Vec<u8>, Error> {
            self.allocs.set(self.allocs.get() + 1);
            Heap.allocate(size)
        }

        fn reallocate(
            &self, buf: Vec<u8>, new_size: usize
        ) -> Result<Vec<u8>, Error> {
            self.reallocs.set(self.reallocs.get() + 1);
            Heap.reallocate(buf, new_size)
        }

        fn release(&self, buf: Vec<u8>) {
            self.releases.set(self.releases.get() + 1);
            Heap.release(buf)
        }
    }

    #[test]
    fn allocate_over_owned_fails() {
        let alloc = heap();
        let mut content = Content::Empty;
        content.allocate_zeroed(4, &alloc).unwrap();
        assert_eq!(
            content.allocate_zeroed(4, &alloc),
            Err(Error::InvalidState)
        );
        assert_eq!(
            content.duplicate(b"ab", &alloc),
            Err(Error::InvalidState)
        );
    }

    #[test]
    fn reallocate_to_zero_frees() {
        let alloc = heap();
        let mut content = Content::Empty;
        content.duplicate(b"abcd", &alloc).unwrap();
        content.reallocate(0, None).unwrap();
        assert!(content.is_empty());
        assert!(!content.is_owned());
    }

    #[test]
    fn reallocate_borrowed_allocates_fresh() {
        let mut content = Content::borrowed(Bytes::from_static(b"abcd"));
        content.reallocate(2, None).unwrap();
        assert!(content.is_owned());
        // Fresh allocation, not a copy of the borrowed bytes.
        assert_eq!(content.bytes(), b"\0\0");
    }

    #[test]
    fn reallocate_in_place_zero_extends() {
        let alloc = heap();
        let mut content = Content::Empty;
        content.duplicate(b"abcd", &alloc).unwrap();
        content.reallocate(6, Some(&alloc)).unwrap();
        assert_eq!(content.bytes(), b"abcd\0\0");
        content.reallocate(3, None).unwrap();
        assert_eq!(content.bytes(), b"abc");
    }

    #[test]
    fn reallocate_migrates_allocators() {
        let a = Rc::new(Counting::default());
        let b = Rc::new(Counting::default());
        let a_ref: AllocRef = a.clone();
        let b_ref: AllocRef = b.clone();

        let mut content = Content::Empty;
        content.duplicate(b"abcd", &a_ref).unwrap();
        assert_eq!(a.allocs.get(), 1);

        content.reallocate(6, Some(&b_ref)).unwrap();
        assert_eq!(content.bytes(), b"abcd\0\0");
        assert_eq!(b.allocs.get(), 1);
        // A's buffer was fully released, nothing leaked.
        assert_eq!(a.releases.get(), 1);
        assert_eq!(a.reallocs.get(), 0);

        // The content now belongs to B.
        match &content {
            Content::Owned(buf) => {
                assert!(same_allocator(buf.allocator(), &b_ref));
            }
            _ => panic!("content should be owned"),
        }

        content.free();
        assert_eq!(b.releases.get(), 1);
    }

    #[test]
    fn free_keeps_borrowed() {
        let mut content = Content::borrowed(Bytes::from_static(b"abcd"));
        content.free();
        assert_eq!(content.bytes(), b"abcd");
    }
}
