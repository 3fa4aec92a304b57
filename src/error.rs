//! Central error type for the EXI stream codec.
//!
//! Fatal stream errors (see [`Error::is_malformed_stream`]) abort decoding at
//! the first occurrence. Lexically invalid values are never reported here:
//! the value codecs signal them with `false` from `stage` and the resolver
//! falls back to an untyped production.

use core::fmt;
use std::borrow::Cow;

/// All errors raised by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// EXI version number is not supported (EXI 5.3).
    UnsupportedVersion,
    /// EXI header is malformed, e.g. a truncated cookie (EXI 5).
    MalformedHeader,
    /// The distinguishing bits are not `10` (EXI 5.2).
    InvalidDistinguishingBits(u8),
    /// The byte source ended in the middle of a field.
    PrematureEndOfStream,
    /// An unsigned integer has more continuation octets than its accumulator allows (EXI 7.1.6).
    MalformedVarint,
    /// A decoded integer does not fit the target width (EXI 7.1.5, 7.1.6).
    IntegerOverflow,
    /// An event code does not select any production of the current grammar (EXI 6.2).
    InvalidEventCode {
        /// Der gelesene Event Code (leer wenn nicht verfügbar).
        event_code: Cow<'static, str>,
        /// Grammar-Zustand beim Lesen (leer wenn nicht verfügbar).
        grammar_state: Cow<'static, str>,
    },
    /// A compact identifier refers past the end of its partition (EXI 7.3).
    InvalidCompactId(usize),
    /// Surrogate or out-of-range code point (EXI 7.1.10).
    InvalidCodePoint(u64),
    /// Enumeration index outside the declared values (EXI 7.2).
    InvalidEnumerationIndex { index: usize, enum_count: usize },
    /// A list length exceeds the accepted maximum (EXI 7.1.11).
    ListLengthOverflow(u64),
    /// A decoded string or binary length exceeds the accepted maximum.
    StringLengthExceeded { length: u64, max: u64 },
    /// The encoder found no production for an event in the current grammar.
    NoMatchingProduction {
        /// Das Event, das geschrieben werden sollte.
        event: Cow<'static, str>,
        /// Grammar-Zustand beim Schreiben.
        grammar_state: Cow<'static, str>,
    },
    /// Push calls out of document order.
    OrderingViolation {
        /// Erwarteter Aufruf.
        expected: Cow<'static, str>,
        /// Tatsächlicher Aufruf.
        found: Cow<'static, str>,
    },
    /// A feature of EXI 1.0 this codec does not implement.
    UnsupportedFeature(&'static str),
    /// `end_binary_data` saw a running total different from the declared length.
    BinarySizeMismatch { declared: u64, written: u64 },
    /// Conflicting options, rejected before any I/O (EXI 5.4).
    InvalidOptionCombination(Cow<'static, str>),
    /// Block size must be greater than zero (EXI 9.1).
    InvalidBlockSize,
    /// Failure of the underlying byte source or sink.
    IoError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion => write!(f, "unsupported EXI version (EXI 5.3)"),
            Self::MalformedHeader => write!(f, "malformed EXI header (EXI 5)"),
            Self::InvalidDistinguishingBits(bits) => {
                write!(f, "invalid distinguishing bits {bits:02b}, expected 10 (EXI 5.2)")
            }
            Self::PrematureEndOfStream => write!(f, "premature end of EXI stream"),
            Self::MalformedVarint => write!(f, "malformed unsigned integer: too many continuation octets (EXI 7.1.6)"),
            Self::IntegerOverflow => write!(f, "integer overflow (EXI 7.1.5, 7.1.6)"),
            Self::InvalidEventCode { event_code, grammar_state } => {
                if event_code.is_empty() && grammar_state.is_empty() {
                    write!(f, "invalid event code (EXI 6.2)")
                } else if grammar_state.is_empty() {
                    write!(f, "invalid event code '{event_code}' (EXI 6.2)")
                } else {
                    write!(f, "invalid event code '{event_code}' in state '{grammar_state}' (EXI 6.2)")
                }
            }
            Self::InvalidCompactId(id) => write!(f, "invalid compact identifier {id} (EXI 7.3)"),
            Self::InvalidCodePoint(cp) => write!(f, "invalid Unicode code point U+{cp:X} (EXI 7.1.10)"),
            Self::InvalidEnumerationIndex { index, enum_count } => {
                write!(f, "enum index {index} exceeds valid range 0..{enum_count} (EXI 7.2)")
            }
            Self::ListLengthOverflow(len) => write!(f, "list length {len} exceeds max allowed size (EXI 7.1.11)"),
            Self::StringLengthExceeded { length, max } => write!(f, "length {length} exceeds maximum {max}"),
            Self::NoMatchingProduction { event, grammar_state } => {
                write!(f, "no production for {event} in state '{grammar_state}' (EXI 8)")
            }
            Self::OrderingViolation { expected, found } => {
                write!(f, "event ordering violation: expected {expected}, found {found}")
            }
            Self::UnsupportedFeature(what) => write!(f, "unsupported EXI feature: {what}"),
            Self::BinarySizeMismatch { declared, written } => {
                write!(f, "binary data size mismatch: declared {declared} octets, got {written}")
            }
            Self::InvalidOptionCombination(why) => write!(f, "invalid EXI option combination: {why} (EXI 5.4)"),
            Self::InvalidBlockSize => write!(f, "block size must be greater than zero (EXI 9.1)"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::PrematureEndOfStream
        } else {
            Self::IoError(err.to_string())
        }
    }
}

impl Error {
    /// Erstellt einen `InvalidEventCode` Fehler mit Kontext.
    pub fn invalid_event_code(
        event_code: impl Into<Cow<'static, str>>,
        grammar_state: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidEventCode {
            event_code: event_code.into(),
            grammar_state: grammar_state.into(),
        }
    }

    /// Erstellt einen `NoMatchingProduction` Fehler mit Kontext.
    pub fn no_matching_production(
        event: impl Into<Cow<'static, str>>,
        grammar_state: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::NoMatchingProduction {
            event: event.into(),
            grammar_state: grammar_state.into(),
        }
    }

    /// Erstellt einen `OrderingViolation` Fehler mit Kontext.
    pub fn ordering_violation(
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::OrderingViolation {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Erstellt einen `InvalidOptionCombination` Fehler.
    pub fn option_conflict(why: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOptionCombination(why.into())
    }

    /// True for errors caused by a malformed or truncated EXI stream.
    pub fn is_malformed_stream(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion
                | Self::MalformedHeader
                | Self::InvalidDistinguishingBits(_)
                | Self::PrematureEndOfStream
                | Self::MalformedVarint
                | Self::IntegerOverflow
                | Self::InvalidEventCode { .. }
                | Self::InvalidCompactId(_)
                | Self::InvalidCodePoint(_)
                | Self::InvalidEnumerationIndex { .. }
                | Self::ListLengthOverflow(_)
                | Self::StringLengthExceeded { .. }
        )
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
