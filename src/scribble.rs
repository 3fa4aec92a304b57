//! Scratch record of the value codecs.
//!
//! `stage` parst die lexikalische Form in einen [`StagedValue`], `write`
//! schreibt ihn. Scanner und Scriber besitzen je eine Instanz und leeren sie
//! vor jeder Verwendung; Puffer behalten ihre Kapazität.

use num_bigint::{BigInt, BigUint};

use crate::grammar::DateTimeKind;

/// Date-time fields as written on the wire (EXI 7.1.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeValue {
    pub kind: DateTimeKind,
    /// Jahr minus 2000.
    pub year: i64,
    /// 0 wenn der Typ keinen Monat hat.
    pub month: u8,
    /// 0 wenn der Typ keinen Tag hat.
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Fractional seconds with reversed digits.
    pub fraction: Option<BigUint>,
    /// Offset in minutes.
    pub timezone: Option<i16>,
}

/// Parsed value ready for writing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StagedValue {
    #[default]
    None,
    /// Text in [`Scribble::text`].
    Text,
    /// `pattern_index`: 0 "false", 1 "0", 2 "true", 3 "1"
    Boolean { value: bool, pattern_index: u8 },
    Integer(BigInt),
    Decimal { negative: bool, integral: BigUint, fraction: BigUint },
    /// `mantissa × 10^exponent`; exponent -16384 marks INF/-INF/NaN.
    Float { mantissa: i64, exponent: i64 },
    DateTime(DateTimeValue),
    /// Octets in [`Scribble::octets`].
    Binary,
    /// Items in [`Scribble::items`].
    List,
    Enumeration(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Scribble {
    pub value: StagedValue,
    pub text: String,
    pub octets: Vec<u8>,
    pub items: Vec<Scribble>,
}

impl Scribble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.value = StagedValue::None;
        self.text.clear();
        self.octets.clear();
        self.items.clear();
    }
}
