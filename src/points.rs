use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::Serialize;

/// A signed quantity of reward points.
///
/// The operators use plain `i64` arithmetic. The engine keeps every payer balance
/// within `i64` and totals spanning payers in `i128`; use the `checked_*` methods
/// for amounts that come from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Points(i64);

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn new(value: i64) -> Self {
        Points(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// `None` when the sum does not fit.
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(value) => Some(Points(value)),
            None => None,
        }
    }

    /// `None` for `i64::MIN`, whose magnitude has no positive counterpart.
    pub const fn checked_neg(self) -> Option<Self> {
        match self.0.checked_neg() {
            Some(value) => Some(Points(value)),
            None => None,
        }
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Points(value)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Points {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Points(self.0 + rhs.0)
    }
}

impl AddAssign for Points {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Points(self.0 - rhs.0)
    }
}

impl SubAssign for Points {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Points {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Points(-self.0)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Points::ZERO, Add::add)
    }
}
