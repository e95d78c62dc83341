//! Stock movement rules.
//!
//! An item owns `quantity` units in total; `available` counts the units not
//! currently checked out. Every movement is validated against the closed
//! range `[0, quantity]` before it is allowed to touch `available`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::{DomainError, DomainResult, Reference, UserId};

use crate::item::CheckoutEntry;

/// Direction of a stock movement, as sent in the `checking` field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Signed change applied to `available` for `quantity` units.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(DomainError::validation(format!(
                "checking must be 'in' or 'out', got '{other}'"
            ))),
        }
    }
}

/// Validate a raw JSON quantity: it must be a positive integer.
///
/// Integral floats (`3.0`) are accepted; strings, fractions, zero and
/// negatives are not.
pub fn parse_quantity(raw: &JsonValue) -> DomainResult<i64> {
    let n = match raw {
        JsonValue::Number(n) => n,
        other => {
            return Err(DomainError::invalid_quantity(format!(
                "expected a positive integer, got {other}"
            )));
        }
    };

    let value = if let Some(v) = n.as_i64() {
        v
    } else if let Some(f) = n.as_f64() {
        if f.fract() != 0.0 || f < 1.0 || f > i64::MAX as f64 {
            return Err(DomainError::invalid_quantity(format!(
                "expected a positive integer, got {f}"
            )));
        }
        f as i64
    } else {
        return Err(DomainError::invalid_quantity(format!("{n} is out of range")));
    };

    if value <= 0 {
        return Err(DomainError::invalid_quantity(format!(
            "expected a positive integer, got {value}"
        )));
    }
    Ok(value)
}

/// A validated check-in or check-out request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    quantity: i64,
    direction: Direction,
    user: Reference<UserId>,
}

impl StockMovement {
    pub fn new(quantity: i64, direction: Direction, user: Reference<UserId>) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::invalid_quantity(format!(
                "expected a positive integer, got {quantity}"
            )));
        }
        Ok(Self {
            quantity,
            direction,
            user,
        })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn user(&self) -> &Reference<UserId> {
        &self.user
    }

    /// Signed change to `available`.
    pub fn delta(&self) -> i64 {
        self.direction.signed(self.quantity)
    }

    /// Compute the new `available` value, rejecting anything outside
    /// `[0, total]`.
    pub fn project(&self, available: i64, total: i64) -> DomainResult<i64> {
        let projected = available
            .checked_add(self.delta())
            .ok_or_else(|| DomainError::invalid_quantity("quantity overflows"))?;
        if projected < 0 || projected > total {
            return Err(DomainError::out_of_range(projected, total));
        }
        Ok(projected)
    }

    /// History entry recording this movement at `at`.
    pub fn entry(&self, at: DateTime<Utc>) -> CheckoutEntry {
        CheckoutEntry {
            user: self.user,
            time: at,
            checking: self.direction,
            quantity: self.quantity,
        }
    }
}

/// New `available` value when the total `quantity` of an item changes.
///
/// The number of checked-out units stays constant; a total smaller than the
/// checked-out count is rejected.
pub fn rescale_available(quantity: i64, available: i64, new_quantity: i64) -> DomainResult<i64> {
    if new_quantity < 0 {
        return Err(DomainError::validation("quantity cannot be negative"));
    }
    let checked_out = quantity - available;
    let projected = new_quantity - checked_out;
    if projected < 0 {
        return Err(DomainError::out_of_range(projected, new_quantity));
    }
    Ok(projected)
}
