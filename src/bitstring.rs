//! ASN.1 Bit Strings.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! A [`BitString`] carries a sequence of bits of arbitrary length. In the
//! encoding, the first content octet holds the number of unused bits in
//! the final octet and the remaining octets hold the bits, most
//! significant bit first.
//!
//! A value is in one of two modes, chosen at construction and fixed
//! thereafter. In _plain_ mode the content octets are the bits, full
//! stop. In _encapsulated_ mode the payload is the complete DER encoding
//! of another value — a real pattern in signature formats, where a
//! structured value is smuggled inside a BIT STRING field. The
//! encapsulated value can be mutated independently, so the content octets
//! become a cache with an explicit freshness state:
//! [`refresh_content`][BitString::refresh_content] rebuilds them, and
//! [`are_content_bits_valid`][BitString::are_content_bits_valid] checks
//! them without mutating anything. The encode-prepare pass is the only
//! other place a stale cache becomes fresh again.

use std::any::Any;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use bytes::Bytes;
use crate::alloc::AllocRef;
use crate::content::Content;
use crate::error::{fail, reborrow, Diag, Error};
use crate::tag::Tag;
use crate::target::{CompareTarget, SliceTarget, Target};
use crate::value::{
    compare, total_len, write_value,
    CheckFlags, EncodeFlags, Header, TypeInfo, Value,
};


//------------ Cache ---------------------------------------------------------

/// The freshness of cached content derived from an encapsulated value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Cache {
    /// The cached octets reflect the encapsulated value.
    Fresh,

    /// The encapsulated value may have changed since the octets were
    /// built.
    Stale,
}

/// The static descriptor of the bit string type.
static BIT_STRING_INFO: TypeInfo = TypeInfo {
    name: "BIT STRING", tag: Tag::BIT_STRING,
};


//------------ BitString -----------------------------------------------------

/// A bit string value.
pub struct BitString {
    /// The common header, tagged BIT STRING.
    header: Header,

    /// The number of bits in the string.
    bit_len: u32,

    /// The encapsulated value, if this is an encapsulated-mode string.
    inner: Option<Box<dyn Value>>,

    /// The freshness of the content octets.
    ///
    /// Only meaningful in encapsulated mode; plain content is never
    /// derived and thus never stale.
    cache: Cache,
}

impl BitString {
    /// Creates an absent bit string.
    pub fn absent() -> Self {
        BitString {
            header: Header::absent(Tag::BIT_STRING),
            bit_len: 0,
            inner: None,
            cache: Cache::Stale,
        }
    }

    /// Creates a plain bit string from a bit buffer.
    ///
    /// The buffer holds the bits most significant bit first; `bit_len`
    /// says how many of them are meaningful and must not exceed the
    /// buffer. Surplus bits in the final octet are cleared so the stored
    /// content is canonical. The content octets are allocated through
    /// `allocator`.
    pub fn new_plain(
        bits: &[u8], bit_len: u32, allocator: &AllocRef
    ) -> Result<Self, Error> {
        let octets = octets_for(bit_len)?;
        if octets > bits.len() {
            return Err(Error::OutOfRange)
        }
        let mut content = Content::Empty;
        content.allocate_zeroed(octets + 1, allocator)?;
        {
            let buf = content.owned_mut()?.bytes_mut();
            buf[0] = unused_bits(bit_len);
            buf[1..].copy_from_slice(&bits[..octets]);
            if bit_len % 8 != 0 {
                // Clear the unused bits of the final octet.
                buf[octets] &= 0xffu8 << unused_bits(bit_len);
            }
        }
        Ok(BitString {
            header: Header::with_content(Tag::BIT_STRING, content),
            bit_len,
            inner: None,
            cache: Cache::Fresh,
        })
    }

    /// Creates a plain bit string from decoded content octets.
    ///
    /// The octets are borrowed, not copied. The first octet has to carry
    /// an unused-bit count below eight, and an empty bit string has to
    /// declare zero unused bits.
    pub fn from_der_content(content: Bytes) -> Result<Self, Error> {
        let (unused, payload) = match content.as_ref() {
            [unused, payload @ ..] => (*unused, payload.len()),
            [] => return Err(Error::OutOfRange),
        };
        if unused > 7 || (payload == 0 && unused != 0) {
            return Err(Error::OutOfRange)
        }
        let bit_len = (payload as u64 * 8).checked_sub(u64::from(unused))
            .and_then(|len| u32::try_from(len).ok())
            .ok_or(Error::OutOfRange)?;
        Ok(BitString {
            header: Header::with_content(
                Tag::BIT_STRING, Content::borrowed(content)
            ),
            bit_len,
            inner: None,
            cache: Cache::Fresh,
        })
    }

    /// Creates a bit string encapsulating another value.
    ///
    /// The complete DER encoding of `inner` becomes the payload of this
    /// bit string. The content octets start out stale; call
    /// [`refresh_content`][Self::refresh_content] or run the
    /// encode-prepare pass to build them.
    pub fn new_encapsulated(inner: Box<dyn Value>) -> Self {
        BitString {
            header: Header::present(Tag::BIT_STRING),
            bit_len: 0,
            inner: Some(inner),
            cache: Cache::Stale,
        }
    }

    /// Returns the number of bits in the string.
    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    /// Returns the number of unused bits in the final content octet.
    pub fn unused_bits(&self) -> u8 {
        unused_bits(self.bit_len)
    }

    /// Returns the value of the given bit.
    ///
    /// Bits beyond the length of the string are false.
    pub fn bit(&self, bit: u32) -> bool {
        if bit >= self.bit_len {
            return false
        }
        let payload = self.payload();
        let idx = (bit >> 3) as usize;
        payload.get(idx).map_or(false, |octet| {
            octet & (0x80 >> (bit & 7)) != 0
        })
    }

    /// Returns the first 64 bits of the string as an integer.
    ///
    /// The wire format carries bits in the opposite order from host
    /// integers: bit zero of the string is the most significant bit of
    /// the first payload octet but the least significant bit of the
    /// result. The bit order is therefore reversed within each octet and
    /// the final partial octet is masked off.
    pub fn get_as_u64(&self) -> u64 {
        let bits = self.bit_len.min(64);
        let payload = self.payload();
        let mut res = 0u64;
        for (idx, octet) in
            payload.iter().take(((bits + 7) / 8) as usize).enumerate()
        {
            res |= u64::from(octet.reverse_bits()) << (8 * idx);
        }
        if bits < 64 {
            res &= (1u64 << bits) - 1;
        }
        res
    }

    /// Returns the payload octets behind the unused-bit octet.
    ///
    /// Empty for a value whose content octets have not been built yet.
    fn payload(&self) -> &[u8] {
        self.header.content().bytes().get(1..).unwrap_or(b"")
    }

    /// Returns the encapsulated value, if there is one.
    pub fn encapsulated(&self) -> Option<&dyn Value> {
        self.inner.as_deref()
    }

    /// Returns the encapsulated value for modification.
    ///
    /// Since the value can change under us, the cached content octets
    /// are conservatively marked stale.
    pub fn encapsulated_mut(&mut self) -> Option<&mut dyn Value> {
        if self.inner.is_some() {
            self.cache = Cache::Stale;
            self.header.clear_prepared();
        }
        self.inner.as_deref_mut()
    }

    /// Rebuilds the content octets from the encapsulated value.
    ///
    /// Measures the encoding the encapsulated value currently needs,
    /// sets the bit count to eight times that size, reallocates the
    /// content to size plus one, and writes the unused-bit octet —
    /// always zero, encapsulated payloads are octet-aligned — followed
    /// by the serialized value. A plain bit string has nothing to
    /// refresh and returns successfully.
    ///
    /// If an allocator is given, the content is (re-)allocated through
    /// it; otherwise the content's current allocator, or the default
    /// heap for fresh content, is used.
    pub fn refresh_content(
        &mut self, allocator: Option<&AllocRef>
    ) -> Result<(), Error> {
        let size = match self.inner.as_deref_mut() {
            Some(inner) => {
                // Settle caches of nested values before measuring.
                crate::value::encode_prepare(
                    inner, EncodeFlags::default(), None
                )?;
                total_len(inner)?
            }
            None => return Ok(()),
        };
        log::trace!("rebuilding {} cached bit string octets", size + 1);
        self.bit_len = u32::try_from(size)
            .ok()
            .and_then(|size| size.checked_mul(8))
            .ok_or(Error::OutOfRange)?;
        let content = self.header.content_mut();
        content.reallocate(size + 1, allocator)?;
        let buf = content.owned_mut()?.bytes_mut();
        buf[0] = 0;
        if let Some(inner) = self.inner.as_deref() {
            let mut target = SliceTarget::new(&mut buf[1..]);
            write_value(inner, EncodeFlags::default(), &mut target, None)?;
        }
        self.cache = Cache::Fresh;
        Ok(())
    }

    /// Checks whether the content octets reflect the encapsulated value.
    ///
    /// This never mutates the value: it recomputes the size the
    /// encapsulated value's encoding needs, compares it against the
    /// cached content length and, only if the sizes match, replays the
    /// write into a comparison sink that fails on the first mismatching
    /// octet instead of copying anything. A plain bit string is always
    /// valid.
    pub fn are_content_bits_valid(&self) -> Result<bool, Error> {
        let inner = match self.inner.as_deref() {
            Some(inner) => inner,
            None => return Ok(true),
        };
        let expected = total_len(inner)?;
        let cached = self.header.content().bytes();
        if cached.len() != expected + 1 || cached[0] != 0 {
            return Ok(false)
        }
        let mut target = CompareTarget::new(&cached[1..]);
        match write_value(
            inner, EncodeFlags::default(), &mut target, None
        ) {
            Ok(()) => {}
            Err(Error::NotEqual) => return Ok(false),
            Err(err) => return Err(err),
        }
        match target.finish() {
            Ok(()) => Ok(true),
            Err(Error::NotEqual) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns whether the cached content octets should be used as-is.
    fn uses_cache(&self) -> bool {
        self.cache == Cache::Fresh && !self.header.content().is_empty()
    }

    /// Serializes the current logical content octets.
    ///
    /// For a plain string these are the stored octets; for an
    /// encapsulated string the unused-bit octet followed by the value's
    /// current encoding, bypassing a possibly stale cache.
    fn write_image(&self, target: &mut dyn Target) -> Result<(), Error> {
        match self.inner.as_deref() {
            Some(inner) if !self.uses_cache() => {
                target.append(&[0])?;
                write_value(
                    inner, EncodeFlags::default(), target, None
                )
            }
            _ => target.append(self.header.content().bytes())
        }
    }
}


//--- Debug

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BitString")
            .field("bit_len", &self.bit_len)
            .field("encapsulated", &self.inner.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}


//--- Value

impl Value for BitString {
    fn info(&self) -> &'static TypeInfo {
        &BIT_STRING_INFO
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
        if let Some(inner) = self.inner.as_deref_mut() {
            inner.destroy();
        }
        self.inner = None;
        self.bit_len = 0;
        self.cache = Cache::Stale;
        self.header.clear();
    }

    fn visit_children(
        &self,
        op: &mut dyn FnMut(&dyn Value, &str) -> Result<crate::value::Flow, Error>,
    ) -> Result<crate::value::Flow, Error> {
        match self.inner.as_deref() {
            Some(inner) => op(inner, "encapsulated"),
            None => Ok(crate::value::Flow::Continue),
        }
    }

    fn clone_from_value(
        &mut self, src: &dyn Value, allocator: &AllocRef
    ) -> Result<(), Error> {
        let src = match src.as_any().downcast_ref::<BitString>() {
            Some(src) => src,
            None => return Err(Error::InvalidState),
        };
        self.header = Header::present(src.header.tag());
        if !src.header.content().is_empty() {
            self.header.content_mut().duplicate(
                src.header.content().bytes(), allocator
            )?;
        }
        self.bit_len = src.bit_len;
        self.cache = src.cache;
        self.inner = match src.inner.as_deref() {
            Some(inner) => Some(inner.clone_boxed(allocator)?),
            None => None,
        };
        Ok(())
    }

    fn clone_boxed(
        &self, allocator: &AllocRef
    ) -> Result<Box<dyn Value>, Error> {
        let mut res = Box::new(BitString::absent());
        if self.header.is_present() {
            res.clone_from_value(self, allocator)?;
        }
        Ok(res)
    }

    fn compare_with(&self, other: &dyn Value) -> Ordering {
        let other = match other.as_any().downcast_ref::<BitString>() {
            Some(other) => other,
            None => return self.type_id().cmp(&other.as_any().type_id()),
        };
        if let (Some(left), Some(right)) =
            (self.inner.as_deref(), other.inner.as_deref())
        {
            if std::ptr::eq(left.info(), right.info()) {
                // Same concrete type on both sides: compare the values
                // directly instead of re-serializing them.
                return compare(left, right)
            }
        }
        // Compare the current logical content octets, which is what a
        // refresh on either side would have produced.
        let mut left = Vec::new();
        let mut right = Vec::new();
        if self.write_image(&mut left).is_err()
            || other.write_image(&mut right).is_err()
        {
            return Ordering::Equal
        }
        left.cmp(&right)
    }

    fn check_sanity(
        &self, flags: CheckFlags, mut diag: Diag
    ) -> Result<(), Error> {
        let name = self.info().name;
        let content = self.header.content().bytes();
        if let Some(inner) = self.inner.as_deref() {
            if self.bit_len % 8 != 0 {
                // There is no such thing as a non-octet-aligned
                // embedded structure.
                return Err(fail(
                    &mut diag, Error::InvalidState,
                    format_args!(
                        "{}: {} bits with an encapsulated value",
                        name, self.bit_len
                    )
                ))
            }
            if let Err(err) = crate::value::check_sanity(
                inner, flags, reborrow(&mut diag), None
            ) {
                return Err(fail(&mut diag, err, format_args!(
                    "{}: encapsulated value failed its sanity check", name
                )))
            }
            if flags.strict && !self.are_content_bits_valid()? {
                return Err(fail(&mut diag, Error::InvalidState,
                    format_args!("{}: cached content is stale", name)
                ))
            }
            return Ok(())
        }
        let unused = match content {
            [] => {
                return Err(fail(&mut diag, Error::InvalidState,
                    format_args!("{}: no content octets", name)
                ))
            }
            [unused, ..] => *unused,
        };
        if unused > 7 {
            return Err(fail(&mut diag, Error::OutOfRange, format_args!(
                "{}: {} unused bits", name, unused
            )))
        }
        if unused != self.unused_bits()
            || content.len() != octets_for(self.bit_len)? + 1
        {
            return Err(fail(&mut diag, Error::OutOfRange, format_args!(
                "{}: content length {} does not match {} bits",
                name, content.len(), self.bit_len
            )))
        }
        if flags.strict && unused != 0 {
            let last = content[content.len() - 1];
            if last & ((1u8 << unused) - 1) != 0 {
                return Err(fail(
                    &mut diag, Error::OutOfRange,
                    format_args!("{}: unused bits are set", name)
                ))
            }
        }
        Ok(())
    }

    fn measure_content(&self) -> Result<usize, Error> {
        match self.inner.as_deref() {
            Some(inner) if !self.uses_cache() => {
                Ok(total_len(inner)? + 1)
            }
            _ => Ok(self.header.content_len())
        }
    }

    fn prepare_content(
        &mut self, flags: EncodeFlags, mut diag: Diag
    ) -> Result<usize, Error> {
        if self.inner.is_some() {
            if !self.are_content_bits_valid()? {
                if !flags.refresh_caches {
                    return Err(fail(
                        &mut diag, Error::InvalidState,
                        format_args!(
                            "{}: cached content is stale and refreshing \
                             is disabled",
                            self.info().name
                        )
                    ))
                }
                self.refresh_content(None)?;
            }
            else {
                self.cache = Cache::Fresh;
            }
        }
        else if self.header.content_len() != octets_for(self.bit_len)? + 1 {
            return Err(fail(&mut diag, Error::InvalidState, format_args!(
                "{}: content length {} does not match {} bits",
                self.info().name, self.header.content_len(), self.bit_len
            )))
        }
        Ok(self.header.content_len())
    }

    fn write_content(
        &self, _flags: EncodeFlags, target: &mut dyn Target, _diag: Diag
    ) -> Result<(), Error> {
        debug_assert!(
            self.inner.is_none() || self.bit_len % 8 == 0
        );
        self.write_image(target)
    }
}


//------------ Helpers -------------------------------------------------------

/// Returns the number of payload octets needed for the given bit count.
fn octets_for(bit_len: u32) -> Result<usize, Error> {
    usize::try_from((u64::from(bit_len) + 7) / 8)
        .map_err(|_| Error::OutOfRange)
}

/// Returns the unused-bit count of the final octet.
fn unused_bits(bit_len: u32) -> u8 {
    ((8 - bit_len % 8) % 8) as u8
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::alloc::heap;
    use crate::oid::Oid;
    use crate::value::{self, clone_value, encode_prepare, encode_write};
    use super::*;

    fn plain(bits: &[u8], bit_len: u32) -> BitString {
        BitString::new_plain(bits, bit_len, &heap()).unwrap()
    }

    fn encoded(value: &mut BitString) -> Vec<u8> {
        encode_prepare(value, EncodeFlags::default(), None).unwrap();
        let mut target = Vec::new();
        encode_write(
            value, EncodeFlags::default(), &mut target, None
        ).unwrap();
        target
    }

    #[test]
    fn plain_round_trip() {
        let mut bits = plain(b"\xb6\x80", 9);
        assert_eq!(bits.bit_len(), 9);
        assert_eq!(bits.unused_bits(), 7);
        assert_eq!(
            bits.header().content().bytes(), b"\x07\xb6\x80"
        );
        assert_eq!(encoded(&mut bits), b"\x03\x03\x07\xb6\x80");

        let decoded = BitString::from_der_content(
            Bytes::from_static(b"\x07\xb6\x80")
        ).unwrap();
        assert_eq!(decoded.bit_len(), 9);
        assert_eq!(
            compare(&decoded, &plain(b"\xb6\x80", 9)),
            Ordering::Equal
        );
    }

    #[test]
    fn unused_bits_are_cleared() {
        // Only the first 9 bits survive; the rest of the final octet
        // is cleared.
        let bits = plain(b"\xb6\xff", 9);
        assert_eq!(bits.header().content().bytes(), b"\x07\xb6\x80");
        value::check_sanity(
            &bits, CheckFlags { strict: true }, None, Some(Tag::BIT_STRING)
        ).unwrap();
    }

    #[test]
    fn bit_access() {
        let bits = plain(b"\xb6\x80", 9);
        let expected = [
            true, false, true, true, false, true, true, false, true,
        ];
        for (idx, &value) in expected.iter().enumerate() {
            assert_eq!(bits.bit(idx as u32), value, "bit {}", idx);
        }
        assert!(!bits.bit(9));
        assert!(!bits.bit(1000));
    }

    #[test]
    fn get_as_u64_reverses_octet_bits() {
        // 0xb6 = 1011_0110: the wire's first bit becomes the host's
        // least significant one.
        let bits = plain(b"\xb6", 8);
        assert_eq!(bits.get_as_u64(), 0x6d);

        // A partial final octet is masked.
        let bits = plain(b"\xb6\xc0", 10);
        assert_eq!(bits.get_as_u64(), 0x36d & 0x3ff);

        // More than 64 bits: only the first 64 survive.
        let bits = plain(&[0xffu8; 10], 80);
        assert_eq!(bits.get_as_u64(), u64::MAX);
    }

    #[test]
    fn empty_bit_string() {
        let mut bits = plain(b"", 0);
        assert_eq!(encoded(&mut bits), b"\x03\x01\x00");
        assert_eq!(bits.get_as_u64(), 0);
        assert_eq!(
            BitString::from_der_content(
                Bytes::from_static(b"\x03")
            ).unwrap_err(),
            Error::OutOfRange
        );
    }

    #[test]
    fn rejects_bad_content() {
        assert_eq!(
            BitString::from_der_content(
                Bytes::from_static(b"")
            ).unwrap_err(),
            Error::OutOfRange
        );
        assert_eq!(
            BitString::from_der_content(
                Bytes::from_static(b"\x08\xff")
            ).unwrap_err(),
            Error::OutOfRange
        );
    }

    #[test]
    fn encapsulation_round_trip() {
        let oid = Oid::from_dotted("1.2.840.113549.1.1", &heap()).unwrap();
        let mut bits = BitString::new_encapsulated(Box::new(oid));
        assert_eq!(encoded(&mut bits), b"\x03\x0b\x00\
            \x06\x08\x2a\x86\x48\x86\xf7\x0d\x01\x01");
        assert_eq!(bits.bit_len(), 80);
    }

    #[test]
    fn refresh_and_validity() {
        let oid = Oid::from_dotted("1.2.3", &heap()).unwrap();
        let mut bits = BitString::new_encapsulated(Box::new(oid));

        // Nothing cached yet.
        assert!(!bits.are_content_bits_valid().unwrap());

        bits.refresh_content(None).unwrap();
        assert!(bits.are_content_bits_valid().unwrap());
        assert_eq!(
            bits.header().content().bytes(), b"\x00\x06\x02\x2a\x03"
        );
        assert_eq!(bits.bit_len(), 32);

        // Replacing the encapsulated value leaves the cached octets
        // behind until the next refresh.
        let longer = Oid::from_dotted("1.2.840.113549", &heap()).unwrap();
        {
            let inner = bits.encapsulated_mut().unwrap();
            clone_value(inner, &longer, &heap()).unwrap();
        }
        assert!(!bits.are_content_bits_valid().unwrap());

        bits.refresh_content(None).unwrap();
        assert!(bits.are_content_bits_valid().unwrap());
        assert_eq!(
            bits.header().content().bytes(),
            b"\x00\x06\x06\x2a\x86\x48\x86\xf7\x0d"
        );
    }

    #[test]
    fn stale_cache_refreshes_on_prepare() {
        let oid = Oid::from_dotted("1.2.3", &heap()).unwrap();
        let mut bits = BitString::new_encapsulated(Box::new(oid));
        assert_eq!(
            encoded(&mut bits), b"\x03\x05\x00\x06\x02\x2a\x03"
        );

        // With refreshing disabled, a stale cache fails preparation.
        let oid = Oid::from_dotted("1.2.3", &heap()).unwrap();
        let mut bits = BitString::new_encapsulated(Box::new(oid));
        assert_eq!(
            encode_prepare(
                &mut bits,
                EncodeFlags { refresh_caches: false },
                None
            ),
            Err(Error::InvalidState)
        );
        bits.refresh_content(None).unwrap();
        encode_prepare(
            &mut bits, EncodeFlags { refresh_caches: false }, None
        ).unwrap();
    }

    #[test]
    fn encapsulated_sanity() {
        let oid = Oid::from_dotted("1.2.3", &heap()).unwrap();
        let mut bits = BitString::new_encapsulated(Box::new(oid));
        bits.refresh_content(None).unwrap();
        value::check_sanity(
            &bits, CheckFlags { strict: true }, None, Some(Tag::BIT_STRING)
        ).unwrap();

        // A stale cache only fails the strict check.
        let longer = Oid::from_dotted("1.2.840.113549", &heap()).unwrap();
        {
            let inner = bits.encapsulated_mut().unwrap();
            clone_value(inner, &longer, &heap()).unwrap();
        }
        value::check_sanity(
            &bits, CheckFlags::default(), None, None
        ).unwrap();
        assert_eq!(
            value::check_sanity(
                &bits, CheckFlags { strict: true }, None, None
            ),
            Err(Error::InvalidState)
        );
    }

    #[test]
    fn compare_plain() {
        let a = plain(b"\xb6\x80", 9);
        let b = plain(b"\xb6\x80", 9);
        let c = plain(b"\xb6\xc0", 10);
        assert_eq!(compare(&a, &b), Ordering::Equal);
        assert_ne!(compare(&a, &c), Ordering::Equal);
        assert_eq!(compare(&a, &c), compare(&c, &a).reverse());
        assert_eq!(compare(&BitString::absent(), &a), Ordering::Less);
    }

    #[test]
    fn compare_encapsulated() {
        let left = BitString::new_encapsulated(Box::new(
            Oid::from_dotted("1.2.3", &heap()).unwrap()
        ));
        let mut right = BitString::new_encapsulated(Box::new(
            Oid::from_dotted("1.2.3", &heap()).unwrap()
        ));
        // The fast path compares the values without serializing; a
        // stale cache on either side does not matter.
        assert_eq!(compare(&left, &right), Ordering::Equal);

        // Cross-mode comparison goes through the content octets.
        right.refresh_content(None).unwrap();
        let flat = plain(b"\x06\x02\x2a\x03", 32);
        assert_eq!(compare(&right, &flat), Ordering::Equal);
        assert_eq!(compare(&left, &flat), Ordering::Equal);
    }

    #[test]
    fn clone_encapsulated() {
        let mut src = BitString::new_encapsulated(Box::new(
            Oid::from_dotted("1.2.3", &heap()).unwrap()
        ));
        src.refresh_content(None).unwrap();

        let mut dst = BitString::absent();
        clone_value(&mut dst, &src, &heap()).unwrap();
        assert_eq!(dst.bit_len(), 32);
        assert!(dst.are_content_bits_valid().unwrap());
        assert_eq!(compare(&dst, &src), Ordering::Equal);

        // The copy is independent of the source.
        src.destroy();
        assert!(dst.are_content_bits_valid().unwrap());
        assert_eq!(
            dst.header().content().bytes(), b"\x00\x06\x02\x2a\x03"
        );
    }

    #[test]
    fn enumerate_reaches_encapsulated() {
        let bits = BitString::new_encapsulated(Box::new(
            Oid::from_dotted("1.2.3", &heap()).unwrap()
        ));
        let mut seen = Vec::new();
        value::enumerate(
            &bits, value::Order::Pre,
            &mut |child, name, depth| {
                seen.push((child.info().name, name.to_owned(), depth));
                Ok(value::Flow::Continue)
            }
        ).unwrap();
        assert_eq!(seen, [(
            "OBJECT IDENTIFIER", "encapsulated".to_owned(), 0
        )]);
    }
}
