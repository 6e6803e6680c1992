//! Money amounts carried by metric values
//!
//! `units` holds whole currency units and `nanos` the fractional part in
//! billionths. For a non-zero amount both carry the same sign.

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Nanos per currency unit
pub const NANOS_PER_UNIT: i32 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// ISO-4217 currency code
    pub currency_code: String,
    pub units: i64,
    pub nanos: i32,
}

impl Money {
    pub fn new(currency_code: impl Into<String>, units: i64, nanos: i32) -> Self {
        Self {
            currency_code: currency_code.into(),
            units,
            nanos,
        }
    }

    /// Check the sign and range constraints on `units`/`nanos`
    pub fn is_valid(&self) -> bool {
        let nanos_in_range = self.nanos.abs() < NANOS_PER_UNIT;
        let signs_agree = !(self.units > 0 && self.nanos < 0 || self.units < 0 && self.nanos > 0);
        nanos_in_range && signs_agree && !self.currency_code.is_empty()
    }

    /// Add two amounts of the same currency
    pub fn checked_add(&self, other: &Money) -> Result<Money, MergeError> {
        if self.currency_code != other.currency_code {
            return Err(MergeError::CurrencyMismatch {
                prior: self.currency_code.clone(),
                latest: other.currency_code.clone(),
            });
        }

        if !self.is_valid() || !other.is_valid() {
            return Err(MergeError::InvalidMoney);
        }

        let mut units = self
            .units
            .checked_add(other.units)
            .ok_or(MergeError::Overflow("money"))?;
        // both |nanos| < 1e9, so the sum fits in i32
        let mut nanos = self.nanos + other.nanos;

        if nanos >= NANOS_PER_UNIT {
            units = units.checked_add(1).ok_or(MergeError::Overflow("money"))?;
            nanos -= NANOS_PER_UNIT;
        } else if nanos <= -NANOS_PER_UNIT {
            units = units.checked_sub(1).ok_or(MergeError::Overflow("money"))?;
            nanos += NANOS_PER_UNIT;
        }

        if units > 0 && nanos < 0 {
            units -= 1;
            nanos += NANOS_PER_UNIT;
        } else if units < 0 && nanos > 0 {
            units += 1;
            nanos -= NANOS_PER_UNIT;
        }

        Ok(Money::new(self.currency_code.clone(), units, nanos))
    }
}
