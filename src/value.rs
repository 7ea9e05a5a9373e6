//! The common value header and the generic dispatch layer.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! Every concrete ASN.1 value embeds a [`Header`] carrying its tag, its
//! presence flag and its raw content octets. The concrete types plug into
//! the generic machinery by implementing the [`Value`] trait, the crate's
//! single polymorphism mechanism: seven operations that let arbitrarily
//! many concrete types share the clone, compare, sanity-check and encode
//! entry points defined at the bottom of this module.
//!
//! The entry points give absent values defined, vacuous results: destroying,
//! cloning or enumerating an absent value never faults, an absent value
//! compares before any present one, and encoding one writes nothing. Only
//! [`check_sanity`] insists on a present value.

use std::any::Any;
use std::cmp::Ordering;
use crate::alloc::AllocRef;
use crate::content::Content;
use crate::error::{fail, Diag, Error, reborrow};
use crate::length::Length;
use crate::tag::Tag;
use crate::target::Target;


//------------ Header --------------------------------------------------------

/// The common header of every concrete value.
///
/// The header carries the tag the value encodes under, whether the value is
/// present at all (ASN.1 OPTIONAL fields are represented by absent values),
/// its raw content octets and, once an encoding pass has run, the prepared
/// content length.
#[derive(Debug, Default)]
pub struct Header {
    /// The tag of the value.
    ///
    /// A default header carries the end-of-content tag UNIVERSAL 0 which
    /// no real value uses.
    tag: Tag,

    /// Whether the value is present.
    present: bool,

    /// The raw content octets.
    content: Content,

    /// The content length computed by the last successful prepare pass.
    prepared: Option<usize>,
}

impl Header {
    /// Creates an absent header with the given tag.
    pub fn absent(tag: Tag) -> Self {
        Header { tag, present: false, content: Content::Empty, prepared: None }
    }

    /// Creates a present header with the given tag and no content yet.
    pub fn present(tag: Tag) -> Self {
        Header { tag, present: true, content: Content::Empty, prepared: None }
    }

    /// Creates a present header with the given tag and content.
    pub fn with_content(tag: Tag, content: Content) -> Self {
        Header { tag, present: true, content, prepared: None }
    }

    /// Creates a present SEQUENCE header.
    pub fn sequence() -> Self {
        Self::present(Tag::SEQUENCE)
    }

    /// Creates a present SET header.
    pub fn set() -> Self {
        Self::present(Tag::SET)
    }

    /// Creates a present SEQUENCE OF header.
    ///
    /// SEQUENCE and SEQUENCE OF share their universal tag; the distinct
    /// constructor only keeps call sites honest about the shape they build.
    pub fn sequence_of() -> Self {
        Self::present(Tag::SEQUENCE)
    }

    /// Creates a present SET OF header.
    pub fn set_of() -> Self {
        Self::present(Tag::SET)
    }

    /// Creates a present header for the n-th context tag.
    pub fn context(number: u32) -> Self {
        Self::present(Tag::ctx(number))
    }

    /// Returns the tag of the value.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Changes the tag of the value.
    ///
    /// This is used by implicit tagging where a field keeps its type but
    /// encodes under a context tag.
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
        self.prepared = None;
    }

    /// Returns whether the value is present.
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Changes the presence of the value.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
        self.prepared = None;
    }

    /// Returns the content octets.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Returns the content octets for modification.
    ///
    /// Modifying the content invalidates a previously prepared encoding.
    pub fn content_mut(&mut self) -> &mut Content {
        self.prepared = None;
        &mut self.content
    }

    /// Returns the number of content octets currently stored.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    /// Returns the content length of the last successful prepare pass.
    pub fn prepared(&self) -> Option<usize> {
        self.prepared
    }

    /// Records the content length computed by a prepare pass.
    pub fn set_prepared(&mut self, len: usize) {
        self.prepared = Some(len)
    }

    /// Forgets a previously prepared encoding.
    pub fn clear_prepared(&mut self) {
        self.prepared = None
    }

    /// Resets the header to absent, freeing owned content.
    ///
    /// Borrowed content is dropped as well; the backing buffer stays with
    /// its owner.
    pub fn clear(&mut self) {
        self.content = Content::Empty;
        self.present = false;
        self.prepared = None;
    }
}


//------------ TypeInfo ------------------------------------------------------

/// The static descriptor of a concrete value type.
///
/// Every concrete type exposes one `static` of this type. The descriptor
/// provides the type's name for diagnostics and the cross-type ordering,
/// and the default tag the type encodes under.
#[derive(Debug)]
pub struct TypeInfo {
    /// The name of the type.
    pub name: &'static str,

    /// The tag the type encodes under by default.
    pub tag: Tag,
}


//------------ Value ---------------------------------------------------------

/// A concrete ASN.1 value type.
///
/// This trait is the capability table of the crate: seven operations the
/// generic entry points below route through, plus access to the value's
/// [`Header`] and [`TypeInfo`]. Implementations can rely on the entry
/// points to have handled absent values and type mismatches already; see
/// each method for the exact guarantees.
pub trait Value: Any {
    /// Returns the static descriptor of this type.
    fn info(&self) -> &'static TypeInfo;

    /// Returns the value's header.
    fn header(&self) -> &Header;

    /// Returns the value's header for modification.
    fn header_mut(&mut self) -> &mut Header;

    /// Returns the value as a `dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Destroys the value.
    ///
    /// Frees all owned content and owned sub-values and leaves the value
    /// absent. Must be safe to call on an already absent value.
    fn destroy(&mut self);

    /// Visits the direct children of this value.
    ///
    /// Leaf types keep the default which reports no children. Containers
    /// and encapsulating types call `op` with each child and its field
    /// name in order, stopping early if `op` says so.
    fn visit_children(
        &self,
        op: &mut dyn FnMut(&dyn Value, &str) -> Result<Flow, Error>,
    ) -> Result<Flow, Error> {
        let _ = op;
        Ok(Flow::Continue)
    }

    /// Makes this value a copy of `src`.
    ///
    /// The caller guarantees that `src` is present and of the same
    /// concrete type as `self`, and that `self` has been destroyed. All
    /// owned sub-content must be allocated through `allocator`.
    fn clone_from_value(
        &mut self, src: &dyn Value, allocator: &AllocRef
    ) -> Result<(), Error>;

    /// Returns a boxed copy of this value.
    ///
    /// This is what cloning an owned sub-value behind a `dyn Value`
    /// reference goes through. An absent value clones to an absent boxed
    /// value. All owned sub-content must be allocated through `allocator`.
    fn clone_boxed(
        &self, allocator: &AllocRef
    ) -> Result<Box<dyn Value>, Error>;

    /// Compares this value against `other`.
    ///
    /// The caller guarantees that both values are present and share a
    /// type descriptor. Implementations still have to tolerate a failed
    /// downcast (generic shapes share one descriptor across their element
    /// types) and fall back to an arbitrary but stable order then.
    fn compare_with(&self, other: &dyn Value) -> Ordering;

    /// Checks the structural invariants of this value.
    ///
    /// The caller guarantees the value is present and has verified the
    /// expected tag. The default errors with
    /// [`Error::NoCheckSanityMethod`]: every shipped type must supply its
    /// own check, and hitting the default indicates a defect in the type,
    /// not in the data.
    fn check_sanity(
        &self, flags: CheckFlags, diag: Diag
    ) -> Result<(), Error> {
        let _ = flags;
        let mut diag = diag;
        Err(fail(
            &mut diag, Error::NoCheckSanityMethod,
            format_args!("{} supplies no sanity check", self.info().name)
        ))
    }

    /// Returns the encoded content length of the value as it stands.
    ///
    /// This must not mutate the value; it is the measurement the
    /// cache-validity checks and the serializer rely on. For containers it
    /// recurses over the children's total lengths.
    fn measure_content(&self) -> Result<usize, Error>;

    /// Prepares the value for encoding, returning its content length.
    ///
    /// This is the bottom-up pass: containers prepare their children
    /// first, and types with derived content may free and rebuild stale
    /// caches here. The default simply measures.
    fn prepare_content(
        &mut self, flags: EncodeFlags, diag: Diag
    ) -> Result<usize, Error> {
        let _ = (flags, diag);
        self.measure_content()
    }

    /// Writes the content octets of the value to the target.
    ///
    /// The generic layer has already written the identifier and length
    /// octets. This must not mutate the value and must write exactly the
    /// number of octets reported by
    /// [`measure_content`][Self::measure_content].
    fn write_content(
        &self, flags: EncodeFlags, target: &mut dyn Target, diag: Diag
    ) -> Result<(), Error>;
}


//------------ Flow, Order, Flags --------------------------------------------

/// Whether an enumeration should continue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Keep visiting.
    Continue,

    /// Stop the enumeration without an error.
    Stop,
}

/// The visiting order of an enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// Visit a value before its children.
    Pre,

    /// Visit a value after its children.
    Post,
}

/// Options for sanity checking.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CheckFlags {
    /// Enforce canonical DER details beyond structural validity.
    ///
    /// With this set, a bit string with set unused bits or content that
    /// deviates from the value's canonical re-encoding fails the check.
    pub strict: bool,
}

/// Options for the encoding passes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncodeFlags {
    /// Allow the prepare pass to rebuild stale derived content.
    ///
    /// When cleared, a value whose cached content is out of date fails
    /// preparation with [`Error::InvalidState`] instead of refreshing it.
    pub refresh_caches: bool,
}

impl Default for EncodeFlags {
    fn default() -> Self {
        EncodeFlags { refresh_caches: true }
    }
}


//============ Generic Entry Points ==========================================

/// Destroys a value through its type's destructor.
///
/// Safe to call on an absent value; the value ends up absent either way.
pub fn destroy(value: &mut dyn Value) {
    value.destroy()
}

/// Enumerates the children of a value depth-first.
///
/// The visitor is invoked with every child, its field name and its depth
/// (direct children are at depth zero), either before (`Order::Pre`) or
/// after (`Order::Post`) the child's own children. An absent value has
/// nothing to visit.
pub fn enumerate(
    value: &dyn Value,
    order: Order,
    visitor: &mut dyn FnMut(&dyn Value, &str, usize) -> Result<Flow, Error>,
) -> Result<Flow, Error> {
    if !value.header().is_present() {
        return Ok(Flow::Continue)
    }
    walk_children(value, 0, order, visitor)
}

/// Walks the children of `value` at the given depth.
fn walk_children(
    value: &dyn Value,
    depth: usize,
    order: Order,
    visitor: &mut dyn FnMut(&dyn Value, &str, usize) -> Result<Flow, Error>,
) -> Result<Flow, Error> {
    value.visit_children(&mut |child, name| {
        if order == Order::Pre {
            if visitor(child, name, depth)? == Flow::Stop {
                return Ok(Flow::Stop)
            }
        }
        if walk_children(child, depth + 1, order, visitor)? == Flow::Stop {
            return Ok(Flow::Stop)
        }
        if order == Order::Post {
            if visitor(child, name, depth)? == Flow::Stop {
                return Ok(Flow::Stop)
            }
        }
        Ok(Flow::Continue)
    })
}

/// Makes `dst` a copy of `src`.
///
/// Cloning an absent value yields an absent value; this is not an error.
/// The destination is destroyed first, so a failed clone leaves it absent
/// rather than partially populated. Both values must be of the same
/// concrete type.
pub fn clone_value(
    dst: &mut dyn Value, src: &dyn Value, allocator: &AllocRef
) -> Result<(), Error> {
    dst.destroy();
    if !src.header().is_present() {
        return Ok(())
    }
    if dst.as_any().type_id() != src.as_any().type_id() {
        return Err(Error::InvalidState)
    }
    dst.clone_from_value(src, allocator)
}

/// Compares two values.
///
/// Absent orders before present and equal to absent. Present values of
/// different type descriptors order by descriptor — stable, but otherwise
/// arbitrary. Present values of the same descriptor delegate to the type's
/// comparator.
pub fn compare(left: &dyn Value, right: &dyn Value) -> Ordering {
    match (left.header().is_present(), right.header().is_present()) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => {
            if std::ptr::eq(left.info(), right.info()) {
                left.compare_with(right)
            }
            else {
                match left.info().name.cmp(right.info().name) {
                    Ordering::Equal => left.compare_with(right),
                    other => other,
                }
            }
        }
    }
}

/// Checks the structural invariants of a value.
///
/// Fails with [`Error::NotPresent`] for an absent value. If an expected
/// tag is given, the value's tag has to match it. Everything else is up to
/// the type's own check.
pub fn check_sanity(
    value: &dyn Value,
    flags: CheckFlags,
    mut diag: Diag,
    expected: Option<Tag>,
) -> Result<(), Error> {
    if !value.header().is_present() {
        return Err(fail(
            &mut diag, Error::NotPresent,
            format_args!("{}: value is absent", value.info().name)
        ))
    }
    if let Some(expected) = expected {
        if value.header().tag() != expected {
            return Err(fail(
                &mut diag, Error::OutOfRange,
                format_args!(
                    "{}: tag is {}, expected {}",
                    value.info().name, value.header().tag(), expected
                )
            ))
        }
    }
    value.check_sanity(flags, diag)
}

/// Prepares a value for encoding.
///
/// This is the bottom-up pass: it computes and validates the content
/// length of the value, recursing into children first, and may rebuild
/// cached content that has gone stale. An absent value prepares trivially
/// since it encodes as nothing.
pub fn encode_prepare(
    value: &mut dyn Value, flags: EncodeFlags, diag: Diag
) -> Result<(), Error> {
    if !value.header().is_present() {
        value.header_mut().clear_prepared();
        return Ok(())
    }
    let len = value.prepare_content(flags, diag)?;
    value.header_mut().set_prepared(len);
    Ok(())
}

/// Writes the complete encoding of a prepared value.
///
/// This is the top-down pass. It must only be called after
/// [`encode_prepare`] succeeded and fails with [`Error::InvalidState`]
/// otherwise. An absent value writes nothing.
pub fn encode_write(
    value: &dyn Value,
    flags: EncodeFlags,
    target: &mut dyn Target,
    mut diag: Diag,
) -> Result<(), Error> {
    if !value.header().is_present() {
        return Ok(())
    }
    if value.header().prepared().is_none() {
        return Err(fail(
            &mut diag, Error::InvalidState,
            format_args!(
                "{}: encoding was not prepared", value.info().name
            )
        ))
    }
    write_value(value, flags, target, diag)
}

/// Returns the total encoded length of a value as it currently stands.
///
/// This covers identifier, length and content octets. An absent value has
/// length zero. Unlike [`encode_prepare`], this never mutates the value.
pub fn total_len(value: &dyn Value) -> Result<usize, Error> {
    if !value.header().is_present() {
        return Ok(0)
    }
    let content = value.measure_content()?;
    Ok(
        value.header().tag().encoded_len()
        + Length(content).encoded_len()
        + content
    )
}

/// Serializes a value in its current state.
///
/// Writes identifier and length octets followed by the content through the
/// type's content writer. This is the one serializer in the crate; the
/// encode pass, the cache-validity replay and byte-level comparison all
/// funnel through it.
pub fn write_value(
    value: &dyn Value,
    flags: EncodeFlags,
    target: &mut dyn Target,
    mut diag: Diag,
) -> Result<(), Error> {
    if !value.header().is_present() {
        return Ok(())
    }
    let content = value.measure_content()?;
    value.header().tag().write_identifier(&mut *target)?;
    Length(content).write_encoded(&mut *target)?;
    value.write_content(flags, target, reborrow(&mut diag))
}


//============ Tests =========================================================
