//! Fixed-point yuan amounts with 2 decimal places precision.
//!
//! The card service reports money in fen (1/100 yuan). Amounts are converted
//! with `rust_decimal` so no floating-point rounding creeps in.

use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, AddAssign, Neg};
use std::str::FromStr;

/// An amount of yuan that always carries exactly 2 decimal places.
///
/// # Examples
///
/// ```
/// use ecard_history::Yuan;
///
/// assert_eq!(Yuan::from_fen(1250).to_string(), "12.50");
/// assert_eq!(Yuan::parse_fen("-300").unwrap().to_string(), "-3.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Yuan(Decimal);

impl Yuan {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Yuan(Decimal::ZERO);

    /// Converts an integer amount of fen.
    pub fn from_fen(fen: i64) -> Self {
        Yuan(Decimal::new(fen, Self::SCALE))
    }

    /// Parses a fen amount given as text, e.g. `"1250"` or `" -300 "`.
    ///
    /// Fractional fen are rounded to the nearest fen.
    pub fn parse_fen(text: &str) -> Option<Self> {
        let fen = Decimal::from_str(text.trim()).ok()?;
        let mut yuan = fen / Decimal::ONE_HUNDRED;
        yuan = yuan.round_dp(Self::SCALE);
        yuan.rescale(Self::SCALE);
        Some(Yuan(yuan))
    }
}

impl fmt::Display for Yuan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Yuan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut sum = self.0 + rhs.0;
        sum.rescale(Self::SCALE);
        Yuan(sum)
    }
}

impl AddAssign for Yuan {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for Yuan {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Yuan(-self.0)
    }
}
