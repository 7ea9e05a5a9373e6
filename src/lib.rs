//! A framework for building and encoding DER values.
//!
//! This crate provides the building blocks for assembling ASN.1 values in
//! memory and writing them out in the Distinguished Encoding Rules. Every
//! concrete value type embeds a common [`Header`] and implements the
//! [`Value`] trait through which the generic entry points in [`value`]
//! clone, compare, enumerate, sanity-check and encode values of any type.
//!
//! Content octets either borrow from a decode buffer or live in buffers
//! requested from a pluggable [`Allocator`], so a caller can route all
//! allocations of a value tree through an arena or a counting allocator.
//!
//! Two codecs ship with the framework: [`Oid`] for OBJECT IDENTIFIER
//! values convertible to and from dotted-decimal text, and [`BitString`]
//! which can either carry plain bits or encapsulate the DER encoding of
//! another value behind an explicitly managed content cache. The generic
//! containers [`SequenceOf`] and [`SetOf`] and the explicit tagging
//! wrapper [`ContextTagged`] combine values into structures.

pub use self::alloc::{heap, AllocRef, Allocator, Heap};
pub use self::bitstring::BitString;
pub use self::container::{ContextTagged, SequenceOf, SetOf};
pub use self::content::Content;
pub use self::error::{Diag, DiagSink, Error, RecordedDiag};
pub use self::oid::Oid;
pub use self::tag::{Class, Tag};
pub use self::target::Target;
pub use self::value::{
    CheckFlags, EncodeFlags, Flow, Header, Order, TypeInfo, Value,
};

pub mod alloc;
pub mod bitstring;
pub mod container;
pub mod content;
pub mod error;
pub mod length;
pub mod oid;
pub mod tag;
pub mod target;
pub mod value;
