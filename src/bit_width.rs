//! Zentrale Bitbreiten-Berechnung (EXI 6.2, 7.2, 7.3).
//!
//! `⌈log₂(n)⌉`: Anzahl Bits um `n` unterschiedliche Werte zu codieren.
//! Genutzt von Event-Code-Tupeln, Enumerations, RCS und den String-Table
//! Partitionen.

/// Anzahl Bits fuer `n` unterschiedliche Werte: `⌈log₂(n)⌉`.
///
/// - `n = 0` oder `n = 1`: 0 Bits
/// - `n = 2`: 1 Bit
/// - `n = 3..4`: 2 Bits
/// - `n = 5..8`: 3 Bits
#[inline]
pub fn for_count(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

/// Bits fuer einen Wertebereich `0..=max` (n-bit Integer, EXI 7.1.9).
#[inline]
pub fn for_max(max: u64) -> u8 {
    (u64::BITS - max.leading_zeros()) as u8
}
