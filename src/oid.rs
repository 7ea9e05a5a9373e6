//! ASN.1 Object Identifiers.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! An [`Oid`] keeps an object identifier in all three of its
//! representations at once: the component array, the canonical
//! dotted-decimal text, and the base-128 encoded content octets. The three
//! are derived from one another at construction time and stay consistent
//! afterwards since object identifiers are immutable once parsed — unlike
//! bit string content, the encoded octets are never a cache that can go
//! stale.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use bytes::Bytes;
use smallvec::SmallVec;
use crate::alloc::AllocRef;
use crate::content::Content;
use crate::error::{fail, Diag, Error};
use crate::tag::Tag;
use crate::target::Target;
use crate::value::{CheckFlags, EncodeFlags, Header, TypeInfo, Value};


//------------ Constants -----------------------------------------------------

/// The maximum number of components of an object identifier.
///
/// The component count has to stay below this value.
pub const MAX_COMPONENTS: usize = 128;

/// The capacity of the inline dotted-string buffer.
pub const DOTTED_CAPACITY: usize = 64;

/// The dotted form of the default object identifier.
///
/// Freshly initialized values carry this identifier until a real value is
/// assigned.
pub const DEFAULT_OID: &str = "2.16.840.1.113894";

/// The components of the default object identifier.
const DEFAULT_COMPONENTS: [u32; 5] = [2, 16, 840, 1, 113894];

/// The encoded content octets of the default object identifier.
const DEFAULT_CONTENT: [u8; 7] = [0x60, 0x86, 0x48, 0x01, 0x86, 0xf9, 0x66];

/// The decimal literal one above the largest permitted component.
///
/// Components are limited to 2^32 − 81 so that the combined first
/// subidentifier `c0·40 + c1` still fits 32 bits even for the unbounded
/// second component under a first component of 2. The limit is enforced
/// on the textual form by length and lexicographic comparison against
/// this literal, before any arithmetic happens.
const COMPONENT_LIMIT: &str = "4294967216";

/// The component array type.
type Components = SmallVec<[u32; 12]>;

/// The static descriptor of the object identifier type.
static OID_INFO: TypeInfo = TypeInfo {
    name: "OBJECT IDENTIFIER", tag: Tag::OID,
};


//------------ Oid -----------------------------------------------------------

/// An object identifier value.
///
/// Object identifiers are globally unique, hierarchical values used to
/// identify algorithms, attributes and object types. When written, they
/// are a sequence of decimal integers separated by dots such as
/// `1.3.6.1.4.1.311.2.1.4`.
///
/// Values are created either from their dotted text via
/// [`from_dotted`][Self::from_dotted] or from already decoded content
/// octets via [`from_der_content`][Self::from_der_content]. Both paths
/// validate strictly and leave nothing behind on failure. A default value
/// carries the constant [`DEFAULT_OID`].
///
/// Comparison is numeric over the component array, not textual: `1.3`
/// orders before `1.20`, and a shorter identifier orders before any longer
/// one it is a prefix of.
pub struct Oid {
    /// The common header, tagged OBJECT IDENTIFIER.
    header: Header,

    /// The components of the identifier.
    ///
    /// Always at least two and fewer than [`MAX_COMPONENTS`] entries for
    /// a present value.
    components: Components,

    /// The canonical dotted text, kept inline.
    text: DottedString,
}

impl Oid {
    /// Creates an absent object identifier.
    pub fn absent() -> Self {
        Oid {
            header: Header::absent(Tag::OID),
            components: SmallVec::new(),
            text: DottedString::empty(),
        }
    }

    /// Creates an object identifier from its dotted text.
    ///
    /// The grammar is enforced strictly, character by character and with
    /// no backtracking: the first component is a single digit 0, 1 or 2;
    /// the second is at most 39 if the first is below 2; every component
    /// is free of leading zeros; and each is limited to 2^32 − 81. The
    /// content octets are allocated through `allocator`.
    pub fn from_dotted(
        text: &str, allocator: &AllocRef
    ) -> Result<Self, Error> {
        let components = parse_components(text)?;
        let stored = DottedString::parse(text)?;
        let mut content = Content::Empty;
        content.duplicate(&encode_components(&components), allocator)?;
        Ok(Oid {
            header: Header::with_content(Tag::OID, content),
            components,
            text: stored,
        })
    }

    /// Creates an object identifier from decoded content octets.
    ///
    /// The octets are borrowed, not copied; the value keeps the backing
    /// buffer alive through the `Bytes` handle. The component array and
    /// the dotted text are derived from the octets.
    pub fn from_der_content(content: Bytes) -> Result<Self, Error> {
        let components = decode_components(content.as_ref())?;
        let text = DottedString::from_components(&components)?;
        Ok(Oid {
            header: Header::with_content(
                Tag::OID, Content::borrowed(content)
            ),
            components,
            text,
        })
    }

    /// Replaces the value with the one given in dotted text.
    ///
    /// On failure the value is left absent, never partially populated.
    pub fn set_dotted(
        &mut self, text: &str, allocator: &AllocRef
    ) -> Result<(), Error> {
        self.destroy();
        *self = Self::from_dotted(text, allocator)?;
        Ok(())
    }

    /// Returns the components of the identifier.
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Returns the number of components.
    pub fn component_count(&self) -> u8 {
        self.components.len() as u8
    }

    /// Returns the canonical dotted text.
    pub fn as_dotted(&self) -> &str {
        self.text.as_str()
    }

    /// Returns the encoded content octets.
    pub fn as_der_content(&self) -> &[u8] {
        self.header.content().bytes()
    }
}


//--- Default

impl Default for Oid {
    /// Returns a present value carrying the default object identifier.
    fn default() -> Self {
        Oid {
            header: Header::with_content(
                Tag::OID,
                Content::borrowed(Bytes::from_static(&DEFAULT_CONTENT)),
            ),
            components: SmallVec::from_slice(&DEFAULT_COMPONENTS),
            text: DottedString::literal(DEFAULT_OID),
        }
    }
}


//--- Display

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_dotted())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.header.is_present() {
            write!(f, "Oid({})", self)
        }
        else {
            f.write_str("Oid(absent)")
        }
    }
}


//--- Value

impl Value for Oid {
    fn info(&self) -> &'static TypeInfo {
        &OID_INFO
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
        self.components.clear();
        self.text = DottedString::empty();
        self.header.clear();
    }

    fn clone_from_value(
        &mut self, src: &dyn Value, allocator: &AllocRef
    ) -> Result<(), Error> {
        let src = match src.as_any().downcast_ref::<Oid>() {
            Some(src) => src,
            None => return Err(Error::InvalidState),
        };
        let mut content = Content::Empty;
        content.duplicate(src.header.content().bytes(), allocator)?;
        self.header = Header::with_content(src.header.tag(), content);
        self.components = src.components.clone();
        self.text = src.text;
        Ok(())
    }

    fn clone_boxed(
        &self, allocator: &AllocRef
    ) -> Result<Box<dyn Value>, Error> {
        let mut res = Box::new(Oid::absent());
        if self.header.is_present() {
            res.clone_from_value(self, allocator)?;
        }
        Ok(res)
    }

    fn compare_with(&self, other: &dyn Value) -> Ordering {
        match other.as_any().downcast_ref::<Oid>() {
            Some(other) => {
                // Numeric, component-wise ordering with the shorter
                // prefix winning ties. Slice ordering does exactly that.
                self.components().cmp(other.components())
            }
            None => self.type_id().cmp(&other.as_any().type_id()),
        }
    }

    fn check_sanity(
        &self, flags: CheckFlags, mut diag: Diag
    ) -> Result<(), Error> {
        let name = self.info().name;
        if self.components.len() < 2 {
            return Err(fail(&mut diag, Error::OutOfRange, format_args!(
                "{}: fewer than two components", name
            )))
        }
        if self.components.len() >= MAX_COMPONENTS {
            return Err(fail(
                &mut diag, Error::TooManyComponents,
                format_args!("{}: {} components", name, self.components.len())
            ))
        }
        if self.components[0] > 2 {
            return Err(fail(&mut diag, Error::OutOfRange, format_args!(
                "{}: first component is {}", name, self.components[0]
            )))
        }
        if self.components[0] < 2 && self.components[1] > 39 {
            return Err(fail(&mut diag, Error::OutOfRange, format_args!(
                "{}: second component is {} under first component {}",
                name, self.components[1], self.components[0]
            )))
        }
        if self.header.content().is_empty() {
            return Err(fail(&mut diag, Error::InvalidState, format_args!(
                "{}: no content octets", name
            )))
        }
        if flags.strict {
            let canonical = encode_components(&self.components);
            if self.header.content().bytes() != canonical.as_slice() {
                return Err(fail(
                    &mut diag, Error::InvalidState,
                    format_args!(
                        "{}: content octets are not canonical", name
                    )
                ))
            }
        }
        Ok(())
    }

    fn measure_content(&self) -> Result<usize, Error> {
        if self.header.content().is_empty() {
            Ok(encoded_len(&self.components))
        }
        else {
            Ok(self.header.content_len())
        }
    }

    fn write_content(
        &self, _flags: EncodeFlags, target: &mut dyn Target, _diag: Diag
    ) -> Result<(), Error> {
        if self.header.content().is_empty() {
            target.append(&encode_components(&self.components))
        }
        else {
            target.append(self.header.content().bytes())
        }
    }
}


//============ Parsing the Dotted Form =======================================

/// Parses the components out of a dotted string.
///
/// This performs the full grammar check and then converts each component
/// with a strict base-10 parser that has to consume the component's text
/// entirely.
fn parse_components(text: &str) -> Result<Components, Error> {
    let mut res = SmallVec::new();
    for (index, component) in split_components(text)?.iter().enumerate() {
        check_component(index, component, text.as_bytes()[0])?;
        res.push(parse_u32_exact(component)?);
    }
    Ok(res)
}

/// Splits a dotted string into its component texts.
///
/// Rejects anything but digits and single separating dots, as well as
/// strings with fewer than two components or 128 and more of them.
fn split_components(text: &str) -> Result<SmallVec<[&str; 12]>, Error> {
    let mut res = SmallVec::new();
    let mut start = 0;
    for (pos, ch) in text.bytes().enumerate() {
        match ch {
            b'0'..=b'9' => {}
            b'.' => {
                if pos == start {
                    // Leading dot, double dot.
                    return Err(Error::InvalidDottedString)
                }
                if res.len() + 1 >= MAX_COMPONENTS {
                    return Err(Error::TooManyComponents)
                }
                res.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => return Err(Error::InvalidDottedString)
        }
    }
    if start == text.len() {
        // Empty string or trailing dot.
        return Err(Error::InvalidDottedString)
    }
    if res.len() + 1 >= MAX_COMPONENTS {
        return Err(Error::TooManyComponents)
    }
    res.push(&text[start..]);
    if res.len() < 2 {
        return Err(Error::InvalidDottedString)
    }
    Ok(res)
}

/// Checks a single component text against the grammar.
///
/// The `first` byte is the first digit of the whole string which decides
/// the bound on the second component.
fn check_component(
    index: usize, component: &str, first: u8
) -> Result<(), Error> {
    if component.len() > 1 && component.starts_with('0') {
        return Err(Error::InvalidDottedString)
    }
    match index {
        0 => {
            if component.len() != 1 || first > b'2' {
                return Err(Error::InvalidDottedString)
            }
        }
        1 if first < b'2' => {
            // At most 39: one digit, or two digits up to "39".
            let ok = match component.len() {
                1 => true,
                2 => component.as_bytes()[0] <= b'3',
                _ => false,
            };
            if !ok {
                return Err(Error::InvalidDottedString)
            }
        }
        _ => {
            if exceeds_component_limit(component) {
                return Err(Error::OutOfRange)
            }
        }
    }
    Ok(())
}

/// Returns whether a component text exceeds the component limit.
///
/// The check is purely textual — length first, then lexicographic against
/// [`COMPONENT_LIMIT`] — so it cannot itself overflow.
fn exceeds_component_limit(component: &str) -> bool {
    match component.len().cmp(&COMPONENT_LIMIT.len()) {
        Ordering::Less => false,
        Ordering::Greater => true,
        Ordering::Equal => component >= COMPONENT_LIMIT,
    }
}

/// Parses a base-10 integer, consuming the entire text.
///
/// Any remaining or invalid character is an error, as is overflowing a
/// `u32`. There is no leniency here: a component that does not parse
/// exactly is rejected.
fn parse_u32_exact(text: &str) -> Result<u32, Error> {
    if text.is_empty() {
        return Err(Error::InvalidDottedString)
    }
    let mut res: u32 = 0;
    for ch in text.bytes() {
        if !ch.is_ascii_digit() {
            return Err(Error::InvalidDottedString)
        }
        res = res
            .checked_mul(10)
            .and_then(|res| res.checked_add(u32::from(ch - b'0')))
            .ok_or(Error::OutOfRange)?;
    }
    Ok(res)
}


//============ The Base-128 Content Encoding =================================

/// Returns the number of octets the encoded components occupy.
fn encoded_len(components: &[u32]) -> usize {
    if components.len() < 2 {
        return 0
    }
    let mut res = vlq_len(components[0] * 40 + components[1]);
    for &component in &components[2..] {
        res += vlq_len(component);
    }
    res
}

/// Returns the encoded content octets of the components.
fn encode_components(components: &[u32]) -> Vec<u8> {
    let mut res = Vec::with_capacity(encoded_len(components));
    if components.len() < 2 {
        return res
    }
    push_vlq(components[0] * 40 + components[1], &mut res);
    for &component in &components[2..] {
        push_vlq(component, &mut res);
    }
    res
}

/// Returns the number of octets the value needs in base-128.
fn vlq_len(value: u32) -> usize {
    if value < 0x80 { 1 }
    else if value < 0x4000 { 2 }
    else if value < 0x20_0000 { 3 }
    else if value < 0x1000_0000 { 4 }
    else { 5 }
}

/// Appends a value in base-128, most significant septet first.
///
/// Every octet but the last carries the continuation bit.
fn push_vlq(value: u32, out: &mut Vec<u8>) {
    for i in (1..vlq_len(value)).rev() {
        out.push((value >> (7 * i)) as u8 & 0x7f | 0x80);
    }
    out.push(value as u8 & 0x7f);
}

/// Decodes content octets back into the component array.
///
/// The first subidentifier splits into the first two components: values
/// below 40 belong to root 0, below 80 to root 1, everything else to
/// root 2.
fn decode_components(content: &[u8]) -> Result<Components, Error> {
    if content.is_empty() {
        return Err(Error::OutOfRange)
    }
    let mut res = SmallVec::new();
    let mut acc: u32 = 0;
    let mut mid = false;
    for &octet in content {
        if acc > u32::MAX >> 7 {
            return Err(Error::OutOfRange)
        }
        acc = acc << 7 | u32::from(octet & 0x7f);
        if octet & 0x80 != 0 {
            mid = true;
            continue
        }
        if res.is_empty() {
            if acc < 40 {
                res.push(0);
                res.push(acc);
            }
            else if acc < 80 {
                res.push(1);
                res.push(acc - 40);
            }
            else {
                res.push(2);
                res.push(acc - 80);
            }
        }
        else {
            res.push(acc);
        }
        if res.len() >= MAX_COMPONENTS {
            return Err(Error::TooManyComponents)
        }
        acc = 0;
        mid = false;
    }
    if mid {
        // The last octet had its continuation bit set.
        return Err(Error::OutOfRange)
    }
    Ok(res)
}


//------------ DottedString --------------------------------------------------

/// A fixed-capacity inline buffer holding the canonical dotted text.
#[derive(Clone, Copy)]
struct DottedString {
    /// The text bytes, always ASCII.
    buf: [u8; DOTTED_CAPACITY],

    /// The number of used bytes.
    len: u8,
}

impl DottedString {
    /// Returns an empty buffer.
    fn empty() -> Self {
        DottedString { buf: [0; DOTTED_CAPACITY], len: 0 }
    }

    /// Stores the given text, which has to fit.
    ///
    /// Fails with [`Error::TooLongStringForm`] if it does not.
    fn parse(text: &str) -> Result<Self, Error> {
        if text.len() > DOTTED_CAPACITY {
            return Err(Error::TooLongStringForm)
        }
        let mut res = Self::empty();
        res.buf[..text.len()].copy_from_slice(text.as_bytes());
        res.len = text.len() as u8;
        Ok(res)
    }

    /// Stores a literal known to fit.
    ///
    /// Only for compile-time constants; panics on texts that do not fit.
    fn literal(text: &str) -> Self {
        match Self::parse(text) {
            Ok(res) => res,
            Err(_) => panic!("literal dotted string too long"),
        }
    }

    /// Derives the dotted text from a component array.
    fn from_components(components: &[u32]) -> Result<Self, Error> {
        use std::fmt::Write;

        let mut res = Self::empty();
        let mut components = components.iter();
        if let Some(first) = components.next() {
            write!(&mut res, "{}", first)
                .map_err(|_| Error::TooLongStringForm)?;
        }
        for component in components {
            write!(&mut res, ".{}", component)
                .map_err(|_| Error::TooLongStringForm)?;
        }
        Ok(res)
    }

    /// Returns the text.
    fn as_str(&self) -> &str {
        // The buffer only ever contains ASCII.
        std::str::from_utf8(
            &self.buf[..usize::from(self.len)]
        ).unwrap_or_default()
    }
}

impl fmt::Write for DottedString {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let len = usize::from(self.len);
        if len + s.len() > DOTTED_CAPACITY {
            return Err(fmt::Error)
        }
        self.buf[len..len + s.len()].copy_from_slice(s.as_bytes());
        self.len = (len + s.len()) as u8;
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::alloc::heap;
    use crate::value::{self, compare, clone_value};
    use super::*;

    fn oid(text: &str) -> Oid {
        Oid::from_dotted(text, &heap()).unwrap()
    }

    #[test]
    fn parse_and_encode() {
        let oid = oid("1.3.6.1.4.1.311.2.3.1");
        assert_eq!(
            oid.components(),
            &[1, 3, 6, 1, 4, 1, 311, 2, 3, 1]
        );
        assert_eq!(
            oid.as_der_content(),
            b"\x2b\x06\x01\x04\x01\x82\x37\x02\x03\x01"
        );
        assert_eq!(oid.as_dotted(), "1.3.6.1.4.1.311.2.3.1");
        assert_eq!(oid.to_string(), "1.3.6.1.4.1.311.2.3.1");
    }

    #[test]
    fn round_trip_through_content() {
        for text in [
            "0.9.2342.19200300.100.1.1",
            "1.2.840.113549.1.1.11",
            "2.5.4.3",
            "2.16.840.1.101.3.4.2.1",
            "2.999.1",
        ] {
            let parsed = oid(text);
            let decoded = Oid::from_der_content(
                Bytes::copy_from_slice(parsed.as_der_content())
            ).unwrap();
            assert_eq!(decoded.components(), parsed.components());
            assert_eq!(decoded.as_dotted(), text);
        }
    }

    #[test]
    fn grammar_rejections() {
        for text in [
            "", ".", "1", "1.", ".1", "1..2", "3.0", "1.40", "0.40",
            "1.3.06", "01.2", "1.a", "1.2.-3", "1 2", "10.1",
        ] {
            assert_eq!(
                Oid::from_dotted(text, &heap()).unwrap_err(),
                Error::InvalidDottedString,
                "expected rejection of {:?}", text
            );
        }
    }

    #[test]
    fn second_component_of_root_two_is_unbounded() {
        let oid = oid("2.999.1");
        assert_eq!(oid.components(), &[2, 999, 1]);
        // 2*40 + 999 = 1079 = 0x437.
        assert_eq!(oid.as_der_content(), b"\x88\x37\x01");
    }

    #[test]
    fn component_limit() {
        // 2^32 - 81 is the largest permitted component.
        let oid = oid("1.2.4294967215");
        assert_eq!(oid.components(), &[1, 2, 4294967215]);
        assert_eq!(
            Oid::from_dotted("1.2.4294967216", &heap()).unwrap_err(),
            Error::OutOfRange
        );
        assert_eq!(
            Oid::from_dotted("1.2.99999999999", &heap()).unwrap_err(),
            Error::OutOfRange
        );
    }

    #[test]
    fn too_many_components() {
        let mut text = String::from("1.2");
        for _ in 0..126 {
            text.push_str(".1");
        }
        // 128 components in total now.
        assert_eq!(
            Oid::from_dotted(&text, &heap()).unwrap_err(),
            Error::TooManyComponents
        );
    }

    #[test]
    fn too_long_string_form() {
        // Syntactically fine but beyond the inline buffer.
        let text = format!("1.2.{}", "4294967215.".repeat(8)) + "1";
        assert_eq!(
            Oid::from_dotted(&text, &heap()).unwrap_err(),
            Error::TooLongStringForm
        );
    }

    #[test]
    fn ordering_is_numeric() {
        assert_eq!(
            compare(&oid("1.2"), &oid("1.2.0")),
            Ordering::Less
        );
        assert_eq!(
            compare(&oid("1.3"), &oid("1.2.99")),
            Ordering::Greater
        );
        assert_eq!(
            compare(&oid("1.2.40"), &oid("1.2.40")),
            Ordering::Equal
        );
    }

    #[test]
    fn default_value() {
        let default = Oid::default();
        assert!(default.header().is_present());
        assert_eq!(default.as_dotted(), "2.16.840.1.113894");
        assert_eq!(compare(&default, &Oid::default()), Ordering::Equal);
        assert_eq!(compare(&default, &oid("2.16.840.1.113894")),
            Ordering::Equal);
        value::check_sanity(
            &default, CheckFlags { strict: true }, None, Some(Tag::OID)
        ).unwrap();
    }

    #[test]
    fn set_dotted_clears_on_failure() {
        let mut value = Oid::default();
        assert_eq!(
            value.set_dotted("3.1", &heap()),
            Err(Error::InvalidDottedString)
        );
        assert!(!value.header().is_present());
        assert!(value.components().is_empty());
        assert_eq!(value.as_dotted(), "");
    }

    #[test]
    fn clone_duplicates_content() {
        let src = oid("1.3.6.1.5.5.7.1");
        let mut dst = Oid::absent();
        clone_value(&mut dst, &src, &heap()).unwrap();
        assert_eq!(compare(&dst, &src), Ordering::Equal);
        assert!(dst.header().content().is_owned());
        assert_eq!(dst.as_dotted(), src.as_dotted());
    }

    #[test]
    fn encode_through_dispatch() {
        let mut value = oid("1.3.6.1.4.1.311.2.3.1");
        value::encode_prepare(
            &mut value, EncodeFlags::default(), None
        ).unwrap();
        let mut target = Vec::new();
        value::encode_write(
            &value, EncodeFlags::default(), &mut target, None
        ).unwrap();
        assert_eq!(
            target,
            b"\x06\x0a\x2b\x06\x01\x04\x01\x82\x37\x02\x03\x01"
        );
    }

    #[test]
    fn sanity_catches_broken_invariants() {
        let mut broken = oid("1.2.3");
        broken.components[0] = 3;
        assert_eq!(
            value::check_sanity(&broken, CheckFlags::default(), None, None),
            Err(Error::OutOfRange)
        );

        let mut broken = oid("1.39.1");
        broken.components[1] = 40;
        assert_eq!(
            value::check_sanity(&broken, CheckFlags::default(), None, None),
            Err(Error::OutOfRange)
        );

        let mut stale = oid("1.2.3");
        stale.components[2] = 4;
        assert_eq!(
            value::check_sanity(
                &stale, CheckFlags { strict: true }, None, None
            ),
            Err(Error::InvalidState)
        );
    }
}
