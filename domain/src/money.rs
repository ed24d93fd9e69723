use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// The smallest externally accepted bid or price increment, in minor units.
pub const MINIMUM_BID_FLOOR: u64 = 100;

/// An amount of money expressed in integer minor units (e.g. cents). Never
/// negative, never fractional: the core does no floating-point arithmetic
/// anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MinorUnits(pub u64);

impl MinorUnits {
    pub const ZERO: MinorUnits = MinorUnits(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: MinorUnits) -> Option<MinorUnits> {
        self.0.checked_add(other.0).map(MinorUnits)
    }

    /// Checked subtraction; `None` if `other` exceeds `self`.
    pub fn checked_sub(self, other: MinorUnits) -> Option<MinorUnits> {
        self.0.checked_sub(other.0).map(MinorUnits)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for MinorUnits {
    type Output = MinorUnits;

    fn add(self, rhs: MinorUnits) -> MinorUnits {
        self.checked_add(rhs).expect("MinorUnits addition overflow")
    }
}

impl Sub for MinorUnits {
    type Output = MinorUnits;

    fn sub(self, rhs: MinorUnits) -> MinorUnits {
        self.checked_sub(rhs)
            .expect("MinorUnits subtraction underflow")
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MinorUnits {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn add_then_sub_round_trips(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = MinorUnits::new(a).checked_add(MinorUnits::new(b)).unwrap();
            prop_assert_eq!(sum.checked_sub(MinorUnits::new(b)).unwrap(), MinorUnits::new(a));
        }

        #[test]
        fn sub_never_goes_negative(a in any::<u64>(), b in any::<u64>()) {
            match MinorUnits::new(a).checked_sub(MinorUnits::new(b)) {
                Some(result) => prop_assert!(a >= b && result.value() == a - b),
                None => prop_assert!(a < b),
            }
        }
    }
}
