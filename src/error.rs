//! Error handling and the diagnostic sink.
//!
//! This is a private module. Its public items are re-exported by the parent.
//!
//! All operations of this crate report failure through the closed [`Error`]
//! taxonomy. The variants are kinds, not codes: callers are expected to
//! propagate the first failure and abandon the whole value tree rather than
//! attempt local recovery.
//!
//! In addition to the error value itself, operations that validate data
//! accept an optional [`DiagSink`] which they populate with a human-readable
//! message pinpointing the failing sub-value. Absence of a sink never
//! changes behavior.

use std::fmt;
use thiserror::Error;


//------------ Error ---------------------------------------------------------

/// An error produced while operating on an ASN.1 value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// The operation requires a present value but the value is absent.
    #[error("value is not present")]
    NotPresent,

    /// The value's current state does not permit the operation.
    ///
    /// This is returned, for instance, when allocating content over content
    /// that is already owned instead of going through reallocation, or when
    /// writing an encoding that was never prepared.
    #[error("operation not valid for the value's current state")]
    InvalidState,

    /// A numeric field or encoded component exceeds its permitted range.
    #[error("value out of range")]
    OutOfRange,

    /// An object identifier has 128 or more components.
    #[error("too many object identifier components")]
    TooManyComponents,

    /// An object identifier's dotted text does not fit its inline buffer.
    #[error("dotted string form too long")]
    TooLongStringForm,

    /// An object identifier's dotted text violates the grammar.
    #[error("invalid dotted object identifier string")]
    InvalidDottedString,

    /// The allocator failed to provide memory.
    #[error("out of memory")]
    OutOfMemory,

    /// A caller-supplied fixed buffer is too small for the data written.
    #[error("target buffer too small")]
    BufferOverflow,

    /// Written bytes differ from the expected bytes.
    ///
    /// This is produced by the comparison sink's fast path and consumed
    /// internally by cache-validity checks. It is not normally surfaced to
    /// users.
    #[error("content bytes differ")]
    NotEqual,

    /// A concrete type failed to supply a sanity-check operation.
    ///
    /// Every shipped type overrides the defaulted check; seeing this error
    /// indicates a defect in a type implementation, not in the data.
    #[error("type provides no sanity check")]
    NoCheckSanityMethod,

    /// A concrete type's dispatch entry is missing entirely.
    ///
    /// Like [`NoCheckSanityMethod`][Self::NoCheckSanityMethod], this is a
    /// framework-integrity error and should never occur with correctly
    /// assembled types.
    #[error("type provides no dispatch entry")]
    NoDispatchTable,
}


//------------ DiagSink ------------------------------------------------------

/// A receptacle for diagnostic information.
///
/// Validation and encoding operations receive an `Option<&mut dyn DiagSink>`
/// and report the specific failing field through it before returning the
/// error. Nested containers re-report with their own field names so a chain
/// of failures reads as one pinpointed leaf error.
pub trait DiagSink {
    /// Records a diagnostic of the given kind.
    fn report(&mut self, kind: Error, msg: &str);
}

/// The type of the optional diagnostic parameter.
///
/// Use [`reborrow`] when passing the sink down into a nested call.
pub type Diag<'a> = Option<&'a mut dyn DiagSink>;

/// Reborrows a diagnostic sink for a nested call.
pub fn reborrow<'a>(diag: &'a mut Diag<'_>) -> Diag<'a> {
    match diag {
        Some(sink) => Some(&mut **sink),
        None => None,
    }
}

/// Reports to the sink if one is present.
pub fn report(diag: &mut Diag<'_>, kind: Error, args: fmt::Arguments<'_>) {
    if let Some(sink) = diag {
        sink.report(kind, &args.to_string())
    }
}

/// Reports a diagnostic before producing the error itself.
///
/// This keeps call sites to a single expression:
///
/// ```rust,ignore
/// return Err(fail(diag, Error::OutOfRange, format_args!("bad {}", field)))
/// ```
pub fn fail(diag: &mut Diag<'_>, kind: Error, args: fmt::Arguments<'_>) -> Error {
    report(diag, kind, args);
    kind
}


//------------ RecordedDiag --------------------------------------------------

/// A diagnostic sink that keeps every report.
///
/// The sink records reports in order, so the first entry is the innermost,
/// most specific diagnostic.
#[derive(Clone, Debug, Default)]
pub struct RecordedDiag {
    /// The recorded reports, oldest first.
    reports: Vec<(Error, String)>,
}

impl RecordedDiag {
    /// Creates a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded reports, oldest first.
    pub fn reports(&self) -> &[(Error, String)] {
        &self.reports
    }

    /// Returns the first recorded report, if any.
    pub fn first(&self) -> Option<&(Error, String)> {
        self.reports.first()
    }

    /// Returns whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl DiagSink for RecordedDiag {
    fn report(&mut self, kind: Error, msg: &str) {
        self.reports.push((kind, msg.into()))
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_without_sink_is_noop() {
        let mut diag: Diag = None;
        report(&mut diag, Error::OutOfRange, format_args!("ignored"));
        assert_eq!(
            fail(&mut diag, Error::NotPresent, format_args!("ignored")),
            Error::NotPresent
        );
    }

    #[test]
    fn recorded_diag_keeps_order() {
        let mut rec = RecordedDiag::new();
        {
            let mut diag: Diag = Some(&mut rec);
            report(&mut diag, Error::OutOfRange, format_args!("first"));
            report(&mut diag, Error::NotPresent, format_args!("second"));
        }
        assert_eq!(rec.reports().len(), 2);
        assert_eq!(rec.first().unwrap().0, Error::OutOfRange);
        assert_eq!(rec.reports()[1].1, "second");
    }
}
