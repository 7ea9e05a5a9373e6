//! The identifier octets of an encoded value.
//!
//! This is a private module. Its public items are re-exported by the parent.

use std::fmt;
use crate::error::Error;
use crate::target::Target;


//------------ Class ---------------------------------------------------------

/// The class of a tag.
///
/// The class occupies the top two bits of the first identifier octet.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Class {
    /// The ‘universal’ class, used by the types defined in X.680 itself.
    Universal,

    /// The ‘application’ class.
    Application,

    /// The ‘context-specific’ class, used for tagged fields in records.
    Context,

    /// The ‘private’ class.
    Private,
}

impl Class {
    /// Returns the class bits for the first identifier octet.
    fn bits(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::Context => 0x80,
            Class::Private => 0xc0,
        }
    }
}


//------------ Tag -----------------------------------------------------------

/// The tag of an encoded value.
///
/// Each encoded value starts with a sequence of one or more octets called
/// the _identifier octets._ They encode the class and number of the value's
/// tag as well as whether the value uses primitive or constructed encoding.
/// Unlike in raw BER, all three are kept together here since a value's
/// header fixes them for the value's whole life.
///
/// # Limitations
///
/// Tag numbers are limited to 32 bits which is far beyond anything
/// appearing in certificate structures.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Tag {
    /// The class of the tag.
    class: Class,

    /// Whether the value uses constructed encoding.
    constructed: bool,

    /// The tag number.
    number: u32,
}

/// # Constants for Often Used Tag Values
///
impl Tag {
    /// The tag for the BOOLEAN type, UNIVERSAL 1.
    pub const BOOLEAN: Self = Tag::universal(1, false);

    /// The tag for the INTEGER type, UNIVERSAL 2.
    pub const INTEGER: Self = Tag::universal(2, false);

    /// The tag for the BIT STRING type, UNIVERSAL 3.
    pub const BIT_STRING: Self = Tag::universal(3, false);

    /// The tag for the OCTET STRING type, UNIVERSAL 4.
    pub const OCTET_STRING: Self = Tag::universal(4, false);

    /// The tag for the NULL type, UNIVERSAL 5.
    pub const NULL: Self = Tag::universal(5, false);

    /// The tag for the OBJECT IDENTIFIER type, UNIVERSAL 6.
    pub const OID: Self = Tag::universal(6, false);

    /// The tag for the SEQUENCE and SEQUENCE OF types, UNIVERSAL 16.
    pub const SEQUENCE: Self = Tag::universal(16, true);

    /// The tag for the SET and SET OF types, UNIVERSAL 17.
    pub const SET: Self = Tag::universal(17, true);
}

impl Tag {
    /// Creates a universal tag with the given number.
    const fn universal(number: u32, constructed: bool) -> Self {
        Tag { class: Class::Universal, constructed, number }
    }

    /// Creates a new tag.
    pub const fn new(class: Class, constructed: bool, number: u32) -> Self {
        Tag { class, constructed, number }
    }

    /// Creates the tag for the n-th context-specific, constructed value.
    ///
    /// This is the tag of an explicitly tagged field `[n]` in a record.
    pub const fn ctx(number: u32) -> Self {
        Tag { class: Class::Context, constructed: true, number }
    }

    /// Creates the tag for the n-th context-specific, primitive value.
    pub const fn ctx_primitive(number: u32) -> Self {
        Tag { class: Class::Context, constructed: false, number }
    }

    /// Returns the class of the tag.
    pub fn class(self) -> Class {
        self.class
    }

    /// Returns whether the value uses constructed encoding.
    pub fn is_constructed(self) -> bool {
        self.constructed
    }

    /// Returns the tag number.
    pub fn number(self) -> u32 {
        self.number
    }

    /// Returns the first identifier octet.
    fn first_octet(self) -> u8 {
        let constructed = if self.constructed { 0x20 } else { 0 };
        if self.number < 0x1f {
            self.class.bits() | constructed | self.number as u8
        }
        else {
            self.class.bits() | constructed | 0x1f
        }
    }

    /// Returns the number of octets of the encoded identifier.
    pub fn encoded_len(self) -> usize {
        match self.number {
            0..=0x1e => 1,
            0x1f..=0x7f => 2,
            0x80..=0x3fff => 3,
            0x4000..=0x1f_ffff => 4,
            0x20_0000..=0xfff_ffff => 5,
            _ => 6,
        }
    }

    /// Writes the identifier octets to the given target.
    ///
    /// Tag numbers of 31 or more use the multi-octet form: the number is
    /// written in big-endian base 128 with the continuation bit set on
    /// every octet but the last.
    pub fn write_identifier(
        self, target: &mut dyn Target
    ) -> Result<(), Error> {
        target.append(&[self.first_octet()])?;
        if self.number < 0x1f {
            return Ok(())
        }
        let mut shift = (self.encoded_len() - 2) * 7;
        while shift > 0 {
            target.append(
                &[((self.number >> shift) & 0x7f) as u8 | 0x80]
            )?;
            shift -= 7;
        }
        target.append(&[(self.number & 0x7f) as u8])
    }
}


//--- Default

impl Default for Tag {
    /// Returns the end-of-content tag, UNIVERSAL 0.
    ///
    /// No real value uses this tag; it marks a header that has not been
    /// initialized yet.
    fn default() -> Self {
        Tag::universal(0, false)
    }
}


//--- Debug and Display

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.class, self.number) {
            (Class::Universal, 1) => write!(f, "BOOLEAN"),
            (Class::Universal, 2) => write!(f, "INTEGER"),
            (Class::Universal, 3) => write!(f, "BIT STRING"),
            (Class::Universal, 4) => write!(f, "OCTET STRING"),
            (Class::Universal, 5) => write!(f, "NULL"),
            (Class::Universal, 6) => write!(f, "OBJECT IDENTIFIER"),
            (Class::Universal, 16) => write!(f, "SEQUENCE"),
            (Class::Universal, 17) => write!(f, "SET"),
            (Class::Universal, n) => write!(f, "[UNIVERSAL {}]", n),
            (Class::Application, n) => write!(f, "[APPLICATION {}]", n),
            (Class::Context, n) => write!(f, "[{}]", n),
            (Class::Private, n) => write!(f, "[PRIVATE {}]", n),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}


//============ Tests =========================================================
