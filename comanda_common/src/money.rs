use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------       Money        ---------------------------------------------------------
/// A fixed-point currency amount with two decimal places, stored as an integer number of minor units (cents).
///
/// `Money::from(17_000)` is 170.00.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyConversionError(format!("{value} is too large to convert to Money")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MINOR_UNITS_PER_MAJOR as u64;
        let minor = abs % MINOR_UNITS_PER_MAJOR as u64;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

/// Parses decimal strings such as `"170"`, `"170.5"` or `"-0.50"`. At most two decimal places are accepted.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (major, minor) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };
        let all_digits = |v: &str| v.chars().all(|c| c.is_ascii_digit());
        if major.is_empty() || !all_digits(major) || !all_digits(minor) || minor.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' is not a valid amount")));
        }
        let major = major.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
        let minor = match minor.len() {
            0 => Ok(0),
            1 => minor.parse::<i64>().map(|v| v * 10),
            _ => minor.parse::<i64>(),
        }
        .map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
        let value = major
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(|| MoneyConversionError(format!("'{s}' is out of range")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_minor(value: i64) -> Self {
        Self(value)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs_diff(&self, other: Money) -> Money {
        Self((self.0 - other.0).abs())
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Money> {
        self.0.checked_mul(rhs).map(Self)
    }
}
