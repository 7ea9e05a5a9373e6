//! Generic container shapes.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! Concrete SEQUENCE and SET record types are generated elsewhere and embed
//! a pre-tagged [`Header`] directly. The reusable shapes defined here are
//! the collections those generators build on: [`SequenceOf`] and [`SetOf`]
//! hold a uniform, growable list of element values, and [`ContextTagged`]
//! wraps a single value under the n-th context tag (an explicitly tagged
//! field).

use std::any::Any;
use std::cmp::Ordering;
use crate::alloc::{AllocRef, TrackedArray};
use crate::error::{fail, reborrow, report, Diag, Error};
use crate::tag::Tag;
use crate::target::Target;
use crate::value::{
    clone_value, compare, encode_prepare, total_len, write_value,
    CheckFlags, EncodeFlags, Flow, Header, TypeInfo, Value,
};


//------------ SequenceOf and SetOf ------------------------------------------

/// A SEQUENCE OF value: a uniform, ordered list of element values.
pub struct SequenceOf<V> {
    /// The common header, tagged SEQUENCE.
    header: Header,

    /// The element values.
    elements: TrackedArray<V>,
}

/// A SET OF value: a uniform, unordered list of element values.
///
/// Elements are kept and written in insertion order; canonical DER
/// reordering is left to the generated types that know their element
/// encodings.
pub struct SetOf<V> {
    /// The common header, tagged SET.
    header: Header,

    /// The element values.
    elements: TrackedArray<V>,
}

/// The static descriptor shared by all SEQUENCE OF instantiations.
static SEQUENCE_OF_INFO: TypeInfo = TypeInfo {
    name: "SEQUENCE OF", tag: Tag::SEQUENCE,
};

/// The static descriptor shared by all SET OF instantiations.
static SET_OF_INFO: TypeInfo = TypeInfo {
    name: "SET OF", tag: Tag::SET,
};

/// Implements a collection shape for both list types.
///
/// The two types only differ in their tag and descriptor, so the inherent
/// methods and the `Value` impl are stamped out by this macro.
macro_rules! collection_impl {
    ( $type:ident, $info:ident, $header:ident ) => {
        impl<V> $type<V> {
            /// Creates a new, empty but present collection.
            pub fn new(allocator: &AllocRef) -> Self {
                $type {
                    header: Header::$header(),
                    elements: TrackedArray::new(allocator),
                }
            }

            /// Creates a new absent collection.
            pub fn absent(allocator: &AllocRef) -> Self {
                let mut res = Self::new(allocator);
                res.header.set_present(false);
                res
            }

            /// Returns the number of elements.
            pub fn len(&self) -> usize {
                self.elements.len()
            }

            /// Returns whether the collection has no elements.
            pub fn is_empty(&self) -> bool {
                self.elements.is_empty()
            }

            /// Returns the element at the given index.
            pub fn get(&self, index: usize) -> Option<&V> {
                self.elements.as_slice().get(index)
            }

            /// Returns the element at the given index for modification.
            ///
            /// Invalidates a previously prepared encoding.
            pub fn get_mut(&mut self, index: usize) -> Option<&mut V> {
                self.header.clear_prepared();
                self.elements.as_mut_slice().get_mut(index)
            }

            /// Appends an element to the collection.
            pub fn push(&mut self, element: V) {
                self.header.clear_prepared();
                self.header.set_present(true);
                self.elements.push(element)
            }

            /// Returns an iterator over the elements.
            pub fn iter(&self) -> std::slice::Iter<V> {
                self.elements.iter()
            }

            /// Returns the underlying element array.
            pub fn elements(&self) -> &TrackedArray<V> {
                &self.elements
            }

            /// Returns the underlying element array for modification.
            ///
            /// Invalidates a previously prepared encoding.
            pub fn elements_mut(&mut self) -> &mut TrackedArray<V> {
                self.header.clear_prepared();
                &mut self.elements
            }
        }

        impl<V: Value + Default> Value for $type<V> {
            fn info(&self) -> &'static TypeInfo {
                &$info
            }

            fn header(&self) -> &Header {
                &self.header
            }

            fn header_mut(&mut self) -> &mut Header {
                &mut self.header
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn destroy(&mut self) {
                for element in self.elements.iter_mut() {
                    element.destroy()
                }
                self.elements.resize(0);
                self.header.clear();
            }

            fn visit_children(
                &self,
                op: &mut dyn FnMut(
                    &dyn Value, &str
                ) -> Result<Flow, Error>,
            ) -> Result<Flow, Error> {
                for element in self.elements.iter() {
                    if op(element, "element")? == Flow::Stop {
                        return Ok(Flow::Stop)
                    }
                }
                Ok(Flow::Continue)
            }

            fn clone_from_value(
                &mut self, src: &dyn Value, allocator: &AllocRef
            ) -> Result<(), Error> {
                let src = match src.as_any().downcast_ref::<Self>() {
                    Some(src) => src,
                    None => return Err(Error::InvalidState),
                };
                self.header = Header::present(src.header.tag());
                for src_element in src.elements.iter() {
                    let mut element = V::default();
                    clone_value(&mut element, src_element, allocator)?;
                    self.elements.push(element);
                }
                Ok(())
            }

            fn clone_boxed(
                &self, allocator: &AllocRef
            ) -> Result<Box<dyn Value>, Error> {
                let mut res = Box::new(Self::new(allocator));
                if self.header.is_present() {
                    res.clone_from_value(self, allocator)?;
                }
                else {
                    res.header.set_present(false);
                }
                Ok(res)
            }

            fn compare_with(&self, other: &dyn Value) -> Ordering {
                let other = match other.as_any().downcast_ref::<Self>() {
                    Some(other) => other,
                    None => {
                        // Same descriptor but a different element type.
                        return self.type_id().cmp(&other.as_any().type_id())
                    }
                };
                for (left, right) in self.iter().zip(other.iter()) {
                    match compare(left, right) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                self.len().cmp(&other.len())
            }

            fn check_sanity(
                &self, flags: CheckFlags, mut diag: Diag
            ) -> Result<(), Error> {
                for (index, element) in self.iter().enumerate() {
                    if let Err(err) = crate::value::check_sanity(
                        element, flags, reborrow(&mut diag), None
                    ) {
                        report(&mut diag, err, format_args!(
                            "{}: element {} failed its sanity check",
                            self.info().name, index
                        ));
                        return Err(err)
                    }
                }
                Ok(())
            }

            fn measure_content(&self) -> Result<usize, Error> {
                let mut len = 0;
                for element in self.iter() {
                    len += total_len(element)?;
                }
                Ok(len)
            }

            fn prepare_content(
                &mut self, flags: EncodeFlags, mut diag: Diag
            ) -> Result<usize, Error> {
                for element in self.elements.iter_mut() {
                    encode_prepare(element, flags, reborrow(&mut diag))?;
                }
                self.measure_content()
            }

            fn write_content(
                &self, flags: EncodeFlags, target: &mut dyn Target,
                mut diag: Diag,
            ) -> Result<(), Error> {
                for element in self.iter() {
                    write_value(
                        element, flags, &mut *target, reborrow(&mut diag)
                    )?;
                }
                Ok(())
            }
        }

        impl<V> Default for $type<V> {
            fn default() -> Self {
                Self::absent(&crate::alloc::heap())
            }
        }
    }
}

collection_impl!(SequenceOf, SEQUENCE_OF_INFO, sequence_of);
collection_impl!(SetOf, SET_OF_INFO, set_of);


//------------ ContextTagged -------------------------------------------------

/// A value explicitly tagged with the n-th context tag.
///
/// The inner value keeps its own tag; its complete encoding becomes the
/// content of a constructed value tagged `[n]`.
pub struct ContextTagged<V> {
    /// The common header, tagged `[n]`.
    header: Header,

    /// The wrapped value.
    inner: V,
}

/// The static descriptor shared by all context-tagged instantiations.
static CONTEXT_TAGGED_INFO: TypeInfo = TypeInfo {
    name: "CONTEXT TAGGED", tag: Tag::ctx(0),
};

impl<V> ContextTagged<V> {
    /// Creates a new present value wrapping `inner` under tag `[number]`.
    pub fn new(number: u32, inner: V) -> Self {
        ContextTagged {
            header: Header::context(number),
            inner,
        }
    }

    /// Creates a new absent value with tag `[number]`.
    pub fn absent(number: u32) -> Self
    where V: Default {
        let mut res = Self::new(number, V::default());
        res.header.set_present(false);
        res
    }

    /// Returns the wrapped value.
    pub fn inner(&self) -> &V {
        &self.inner
    }

    /// Returns the wrapped value for modification.
    ///
    /// Invalidates a previously prepared encoding.
    pub fn inner_mut(&mut self) -> &mut V {
        self.header.clear_prepared();
        &mut self.inner
    }
}

impl<V: Value + Default> Value for ContextTagged<V> {
    fn info(&self) -> &'static TypeInfo {
        &CONTEXT_TAGGED_INFO
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn destroy(&mut self) {
        self.inner.destroy();
        self.header.clear();
    }

    fn visit_children(
        &self,
        op: &mut dyn FnMut(&dyn Value, &str) -> Result<Flow, Error>,
    ) -> Result<Flow, Error> {
        op(&self.inner, "inner")
    }

    fn clone_from_value(
        &mut self, src: &dyn Value, allocator: &AllocRef
    ) -> Result<(), Error> {
        let src = match src.as_any().downcast_ref::<Self>() {
            Some(src) => src,
            None => return Err(Error::InvalidState),
        };
        self.header = Header::present(src.header.tag());
        clone_value(&mut self.inner, &src.inner, allocator)
    }

    fn clone_boxed(
        &self, allocator: &AllocRef
    ) -> Result<Box<dyn Value>, Error> {
        let mut res = Box::new(
            Self::absent(self.header.tag().number())
        );
        if self.header.is_present() {
            res.clone_from_value(self, allocator)?;
        }
        Ok(res)
    }

    fn compare_with(&self, other: &dyn Value) -> Ordering {
        let other = match other.as_any().downcast_ref::<Self>() {
            Some(other) => other,
            None => {
                return self.type_id().cmp(&other.as_any().type_id())
            }
        };
        match self.header.tag().number().cmp(&other.header.tag().number()) {
            Ordering::Equal => compare(&self.inner, &other.inner),
            other => other,
        }
    }

    fn check_sanity(
        &self, flags: CheckFlags, mut diag: Diag
    ) -> Result<(), Error> {
        if let Err(err) = crate::value::check_sanity(
            &self.inner, flags, reborrow(&mut diag), None
        ) {
            return Err(fail(&mut diag, err, format_args!(
                "{}: inner value of {} failed its sanity check",
                self.info().name, self.header.tag()
            )))
        }
        Ok(())
    }

    fn measure_content(&self) -> Result<usize, Error> {
        total_len(&self.inner)
    }

    fn prepare_content(
        &mut self, flags: EncodeFlags, mut diag: Diag
    ) -> Result<usize, Error> {
        encode_prepare(&mut self.inner, flags, reborrow(&mut diag))?;
        self.measure_content()
    }

    fn write_content(
        &self, flags: EncodeFlags, target: &mut dyn Target, diag: Diag
    ) -> Result<(), Error> {
        write_value(&self.inner, flags, target, diag)
    }
}

impl<V: Default> Default for ContextTagged<V> {
    fn default() -> Self {
        Self::absent(0)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use crate::alloc::heap;
    use crate::oid::Oid;
    use crate::value::{
        self, enumerate, CheckFlags, EncodeFlags, Flow, Order,
    };
    use super::*;

    fn oid(text: &str) -> Oid {
        Oid::from_dotted(text, &heap()).unwrap()
    }

    fn sample() -> SequenceOf<Oid> {
        let mut seq = SequenceOf::new(&heap());
        seq.push(oid("1.2.840.113549.1.1"));
        seq.push(oid("1.3.6.1.4.1.311.2.3.1"));
        seq
    }

    #[test]
    fn encode_sequence_of() {
        let mut seq = sample();
        encode_prepare(&mut seq, EncodeFlags::default(), None).unwrap();
        let mut target = Vec::new();
        value::encode_write(
            &seq, EncodeFlags::default(), &mut target, None
        ).unwrap();
        assert_eq!(
            target,
            b"\x30\x16\
              \x06\x08\x2a\x86\x48\x86\xf7\x0d\x01\x01\
              \x06\x0a\x2b\x06\x01\x04\x01\x82\x37\x02\x03\x01"
        );
    }

    #[test]
    fn enumerate_visits_elements() {
        let seq = sample();
        let mut names = Vec::new();
        enumerate(&seq, Order::Pre, &mut |child, name, depth| {
            names.push((name.to_string(), depth, child.info().name));
            Ok(Flow::Continue)
        }).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], (
            "element".to_string(), 0, "OBJECT IDENTIFIER"
        ));
    }

    #[test]
    fn enumerate_stops_early() {
        let seq = sample();
        let mut visited = 0;
        let flow = enumerate(&seq, Order::Pre, &mut |_, _, _| {
            visited += 1;
            Ok(Flow::Stop)
        }).unwrap();
        assert_eq!(flow, Flow::Stop);
        assert_eq!(visited, 1);
    }

    #[test]
    fn clone_and_compare() {
        let src = sample();
        let mut dst = SequenceOf::<Oid>::default();
        clone_value(&mut dst, &src, &heap()).unwrap();
        assert_eq!(compare(&dst, &src), Ordering::Equal);

        let mut shorter = SequenceOf::new(&heap());
        shorter.push(oid("1.2.840.113549.1.1"));
        assert_eq!(compare(&shorter, &src), Ordering::Less);
    }

    #[test]
    fn sanity_checks_elements() {
        let seq = sample();
        value::check_sanity(
            &seq, CheckFlags::default(), None, Some(Tag::SEQUENCE)
        ).unwrap();
    }

    #[test]
    fn context_tagged_wraps_encoding() {
        let mut tagged = ContextTagged::new(0, oid("1.2"));
        encode_prepare(&mut tagged, EncodeFlags::default(), None).unwrap();
        let mut target = Vec::new();
        value::encode_write(
            &tagged, EncodeFlags::default(), &mut target, None
        ).unwrap();
        assert_eq!(target, b"\xa0\x03\x06\x01\x2a");
    }

    #[test]
    fn set_of_uses_set_tag() {
        let mut set = SetOf::new(&heap());
        set.push(oid("1.2"));
        encode_prepare(&mut set, EncodeFlags::default(), None).unwrap();
        let mut target = Vec::new();
        value::encode_write(
            &set, EncodeFlags::default(), &mut target, None
        ).unwrap();
        assert_eq!(target, b"\x31\x03\x06\x01\x2a");
    }
}
