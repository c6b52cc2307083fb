//! Non-negative integer minor-unit money amounts.
//!
//! Every amount on the payment path is a [`MinorUnits`] (cents, or whatever
//! the festival's token denomination is × 100) so that floating point can
//! never enter the money path and unit confusion between "dollars" and
//! "cents" is a type error, not a bug report.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct MinorUnits(u64);

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Render as `"<whole>.<hundredths>"` with exactly two decimal places,
    /// no thousands separators, `.` as the fraction separator — the
    /// canonicalization used by the transaction/QR signing strings, not an
    /// arithmetic operation.
    pub fn to_fixed_two(self) -> String {
        let whole = self.0 / 100;
        let cents = self.0 % 100;
        format!("{whole}.{cents:02}")
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fixed_two())
    }
}

impl Add for MinorUnits {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.checked_add(rhs).expect("MinorUnits addition overflowed")
    }
}

impl Sub for MinorUnits {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs).expect("MinorUnits subtraction underflowed")
    }
}

impl std::iter::Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc.checked_add(x).expect(
            "MinorUnits sum overflowed",
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn to_fixed_two_examples() {
        assert_eq!(MinorUnits::new(0).to_fixed_two(), "0.00");
        assert_eq!(MinorUnits::new(5).to_fixed_two(), "0.05");
        assert_eq!(MinorUnits::new(150_000).to_fixed_two(), "1500.00");
        assert_eq!(MinorUnits::new(123_456).to_fixed_two(), "1234.56");
    }

    #[test]
    fn checked_sub_underflow_is_none() {
        assert_eq!(MinorUnits::new(1).checked_sub(MinorUnits::new(2)), None);
    }

    #[test]
    fn sum_over_empty_is_zero() {
        let total: MinorUnits = Vec::<MinorUnits>::new().into_iter().sum();
        assert_eq!(total, MinorUnits::ZERO);
    }
}
