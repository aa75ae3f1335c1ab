use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

const AMOUNT_SCALE: u32 = 6;

/// Currency amount with micro-unit precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Rounded to micro-units with trailing zeros dropped, so equal amounts
    /// serialize identically.
    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount.round_dp(AMOUNT_SCALE).normalize())
    }

    pub fn from_f64(amount: f64) -> Option<Self> {
        Decimal::from_f64(amount).map(Self::from_decimal)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Amount) -> Self {
        Self::from_decimal(self.0 + other.0)
    }

    /// `None` when the result would go below zero.
    pub fn subtract(&self, other: Amount) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self::from_decimal(self.0 - other.0))
        } else {
            None
        }
    }

    pub fn saturating_sub(&self, other: Amount) -> Self {
        self.subtract(other).unwrap_or_else(Self::zero)
    }

    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::from_decimal(self.0 * factor)
    }

    pub fn is_sufficient(&self, required: Amount) -> bool {
        self.0 >= required.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Self(Decimal::from(value))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, amount| acc.add(amount))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Percentage expressed in points: `Percentage::new(20)` is 20%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    pub fn new(points: impl Into<Decimal>) -> Self {
        Self(points.into())
    }

    pub fn points(&self) -> Decimal {
        self.0
    }

    pub fn ratio(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// `1 + p/100`
    pub fn markup_factor(&self) -> Decimal {
        Decimal::ONE + self.ratio()
    }

    /// `1 - p/100`
    pub fn discount_factor(&self) -> Decimal {
        Decimal::ONE - self.ratio()
    }

    /// The share of `amount` this percentage represents.
    pub fn of(&self, amount: Amount) -> Amount {
        amount.multiply(self.ratio())
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}
