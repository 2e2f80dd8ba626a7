//! Unit score value object (0.0-1.0 scale).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A finite value between 0.0 and 1.0 inclusive.
///
/// Every score the engine emits passes through this type, so the
/// clamping rule lives in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitScore(f64);

impl UnitScore {
    /// The lowest score.
    pub const ZERO: Self = Self(0.0);

    /// The neutral value used when data is missing.
    pub const NEUTRAL: Self = Self(0.5);

    /// The highest score.
    pub const ONE: Self = Self(1.0);

    /// Creates a new UnitScore, clamping to the valid range.
    ///
    /// NaN collapses to zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Creates a UnitScore, returning error if out of range or not finite.
    pub fn try_new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::out_of_range("score", 0.0, 1.0, value));
        }
        Ok(Self(value))
    }

    /// Returns the value as f64.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for UnitScore {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
