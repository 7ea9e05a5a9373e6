//! The allocator interface and allocation tracking.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! All memory-owning operations of the value layer go through an
//! [`Allocator`]. The default [`Heap`] allocator simply wraps the process
//! heap, but callers can supply their own, for instance to pool content
//! buffers or to account for memory use. Owned content remembers which
//! allocator produced it in a [`TrackedBuf`]; growable arrays of sub-values
//! use a [`TrackedArray`].
//!
//! The allocator carries no concurrency contract. Values and their
//! allocators are meant to stay on one thread, which is why allocator
//! references are plain [`Rc`]s.

use std::fmt;
use std::mem;
use std::rc::Rc;
use crate::error::Error;


//------------ Allocator -----------------------------------------------------

/// An allocator for value content.
///
/// The three operations mirror the classic allocate/reallocate/free
/// contract. All buffers handed out are zero-filled, and reallocation
/// zero-fills any newly exposed tail. Reallocation may relocate the buffer.
pub trait Allocator: fmt::Debug {
    /// Allocates a zero-filled buffer of the given size.
    fn allocate(&self, size: usize) -> Result<Vec<u8>, Error>;

    /// Grows or shrinks a previously allocated buffer.
    ///
    /// Growing zero-fills the newly exposed tail. The returned buffer may
    /// or may not be the same allocation as the one passed in.
    fn reallocate(
        &self, buf: Vec<u8>, new_size: usize
    ) -> Result<Vec<u8>, Error>;

    /// Releases a previously allocated buffer.
    fn release(&self, buf: Vec<u8>);
}

/// A shared reference to an allocator.
///
/// Allocator identity matters: reallocating owned content under a
/// different allocator migrates the content instead of resizing in place.
/// Identity is decided via [`same_allocator`].
pub type AllocRef = Rc<dyn Allocator>;

/// Returns whether two references point to the same allocator.
pub fn same_allocator(left: &AllocRef, right: &AllocRef) -> bool {
    // Compare the data pointers only. Comparing fat pointers would also
    // compare vtable addresses which are not unique across codegen units.
    std::ptr::eq(
        Rc::as_ptr(left) as *const u8, Rc::as_ptr(right) as *const u8
    )
}


//------------ Heap ----------------------------------------------------------

/// The default heap-backed allocator.
#[derive(Debug)]
pub struct Heap;

impl Allocator for Heap {
    fn allocate(&self, size: usize) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
        buf.resize(size, 0);
        Ok(buf)
    }

    fn reallocate(
        &self, mut buf: Vec<u8>, new_size: usize
    ) -> Result<Vec<u8>, Error> {
        if new_size > buf.len() {
            buf.try_reserve_exact(
                new_size - buf.len()
            ).map_err(|_| Error::OutOfMemory)?;
        }
        buf.resize(new_size, 0);
        Ok(buf)
    }

    fn release(&self, buf: Vec<u8>) {
        drop(buf)
    }
}

thread_local! {
    /// The shared default allocator of this thread.
    static HEAP: AllocRef = Rc::new(Heap);
}

/// Returns a reference to the default heap allocator.
///
/// All calls on the same thread return the same allocator, so content
/// allocated through it reallocates in place rather than migrating.
pub fn heap() -> AllocRef {
    HEAP.with(Clone::clone)
}


//------------ TrackedBuf ----------------------------------------------------

/// An owned content buffer together with its allocation record.
///
/// A `TrackedBuf` exists exactly as long as its allocation is live; its
/// drop returns the buffer to the allocator that produced it. Besides the
/// buffer itself it records the allocator and the number of reallocations
/// the buffer has been through.
pub struct TrackedBuf {
    /// The allocator the buffer came from.
    allocator: AllocRef,

    /// The buffer itself.
    buf: Vec<u8>,

    /// How often the buffer has been reallocated.
    reallocs: u32,
}

impl TrackedBuf {
    /// Allocates a new zero-filled buffer of the given size.
    pub fn new(size: usize, allocator: &AllocRef) -> Result<Self, Error> {
        Ok(TrackedBuf {
            allocator: allocator.clone(),
            buf: allocator.allocate(size)?,
            reallocs: 0,
        })
    }

    /// Allocates a new buffer holding a copy of the given bytes.
    pub fn duplicate(
        src: &[u8], allocator: &AllocRef
    ) -> Result<Self, Error> {
        let mut res = Self::new(src.len(), allocator)?;
        res.buf.copy_from_slice(src);
        Ok(res)
    }

    /// Grows or shrinks the buffer through its own allocator.
    ///
    /// Growing zero-fills the tail. The reallocation counter is bumped
    /// even if the size did not change.
    pub fn resize(&mut self, new_size: usize) -> Result<(), Error> {
        let buf = mem::take(&mut self.buf);
        self.buf = self.allocator.reallocate(buf, new_size)?;
        self.reallocs = self.reallocs.saturating_add(1);
        Ok(())
    }

    /// Returns the bytes of the buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the bytes of the buffer for modification.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Returns the number of allocated bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the number of reallocations the buffer has been through.
    pub fn reallocs(&self) -> u32 {
        self.reallocs
    }

    /// Returns a reference to the owning allocator.
    pub fn allocator(&self) -> &AllocRef {
        &self.allocator
    }
}


//--- Drop

impl Drop for TrackedBuf {
    fn drop(&mut self) {
        self.allocator.release(mem::take(&mut self.buf))
    }
}


//--- Debug

impl fmt::Debug for TrackedBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrackedBuf")
            .field("len", &self.buf.len())
            .field("reallocs", &self.reallocs)
            .finish()
    }
}


//------------ TrackedArray --------------------------------------------------

/// A growable array of sub-values with resize tracking.
///
/// The array remembers the allocator it is associated with and counts its
/// resizes. Shrinking drops the surplus entries, so growing back later
/// re-initializes the tail with default entries rather than resurrecting
/// stale ones.
pub struct TrackedArray<T> {
    /// The associated allocator.
    allocator: AllocRef,

    /// The entries of the array.
    entries: Vec<T>,

    /// How often the array has been resized.
    resizes: u32,
}

impl<T> TrackedArray<T> {
    /// Creates a new, empty array.
    pub fn new(allocator: &AllocRef) -> Self {
        TrackedArray {
            allocator: allocator.clone(),
            entries: Vec::new(),
            resizes: 0,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entry slots currently allocated.
    pub fn slots(&self) -> usize {
        self.entries.capacity()
    }

    /// Returns the number of resizes the array has been through.
    pub fn resizes(&self) -> u32 {
        self.resizes
    }

    /// Returns a reference to the associated allocator.
    pub fn allocator(&self) -> &AllocRef {
        &self.allocator
    }

    /// Appends an entry to the array.
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry)
    }

    /// Returns the entries as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Returns the entries as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.entries
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.entries.iter()
    }

    /// Returns an iterator over mutable entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<T> {
        self.entries.iter_mut()
    }
}

impl<T: Default> TrackedArray<T> {
    /// Resizes the array to the given number of entries.
    ///
    /// Growing appends default entries, shrinking drops the tail.
    pub fn resize(&mut self, new_len: usize) {
        if new_len == self.entries.len() {
            return
        }
        if new_len < self.entries.len() {
            self.entries.truncate(new_len);
        }
        else {
            self.entries.resize_with(new_len, T::default);
        }
        self.resizes = self.resizes.saturating_add(1);
    }
}


//--- Debug

impl<T: fmt::Debug> fmt::Debug for TrackedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrackedArray")
            .field("entries", &self.entries)
            .field("resizes", &self.resizes)
            .finish()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn heap_allocate_zero_fills() {
        let alloc = heap();
        let buf = TrackedBuf::new(8, &alloc).unwrap();
        assert_eq!(buf.bytes(), &[0u8; 8]);
        assert_eq!(buf.reallocs(), 0);
    }

    #[test]
    fn resize_zero_extends() {
        let alloc = heap();
        let mut buf = TrackedBuf::duplicate(b"abcd", &alloc).unwrap();
        buf.resize(6).unwrap();
        assert_eq!(buf.bytes(), b"abcd\0\0");
        buf.resize(2).unwrap();
        assert_eq!(buf.bytes(), b"ab");
        assert_eq!(buf.reallocs(), 2);
    }

    #[test]
    fn heap_identity_is_stable() {
        let a = heap();
        let b = heap();
        assert!(same_allocator(&a, &b));
        let other: AllocRef = Rc::new(Heap);
        assert!(!same_allocator(&a, &other));
    }

    #[test]
    fn tracked_array_shrink_reinitializes() {
        let alloc = heap();
        let mut arr = TrackedArray::<u32>::new(&alloc);
        arr.resize(3);
        arr.as_mut_slice().copy_from_slice(&[1, 2, 3]);
        arr.resize(5);
        assert_eq!(arr.as_slice(), &[1, 2, 3, 0, 0]);
        arr.resize(2);
        assert_eq!(arr.as_slice(), &[1, 2]);
        arr.resize(5);
        // The tail must come back zeroed, not with the old entries.
        assert_eq!(arr.as_slice(), &[1, 2, 0, 0, 0]);
        assert_eq!(arr.resizes(), 4);
        assert!(arr.len() <= arr.slots());
    }
}
