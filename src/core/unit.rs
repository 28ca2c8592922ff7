//! Unit conversion between display units and canonical kilograms.
//!
//! Raw materials are always stored in kilograms. Callers enter and read
//! quantities in one of three units; this module is the only place that knows
//! the conversion factors.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Units a material quantity can be entered or displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Plain kilograms
    Kg,
    /// A 20 kg sack
    Sack20,
    /// A 50 kg sack
    Sack50,
}

impl Unit {
    /// All supported units, in display order.
    pub const ALL: [Self; 3] = [Self::Kg, Self::Sack20, Self::Sack50];

    /// Kilograms in one of this unit.
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::Kg => 1.0,
            Self::Sack20 => 20.0,
            Self::Sack50 => 50.0,
        }
    }

    /// Code stored in the database and accepted from callers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Sack20 => "sack20",
            Self::Sack50 => "sack50",
        }
    }

    /// Converts a quantity expressed in this unit to kilograms.
    #[must_use]
    pub fn to_kg(self, quantity: f64) -> f64 {
        quantity * self.factor()
    }

    /// Converts kilograms to a quantity expressed in this unit.
    #[must_use]
    pub fn from_kg(self, kilograms: f64) -> f64 {
        kilograms / self.factor()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "kg" => Ok(Self::Kg),
            "sack20" => Ok(Self::Sack20),
            "sack50" => Ok(Self::Sack50),
            other => Err(Error::InvalidUnit {
                unit: other.to_string(),
            }),
        }
    }
}

/// Converts `quantity` given in the unit named by `unit` to kilograms.
///
/// # Errors
/// Returns [`Error::InvalidUnit`] if `unit` is not a supported code.
pub fn to_canonical(quantity: f64, unit: &str) -> Result<f64> {
    Ok(unit.parse::<Unit>()?.to_kg(quantity))
}

/// Converts `kilograms` to a quantity in the unit named by `unit`.
///
/// # Errors
/// Returns [`Error::InvalidUnit`] if `unit` is not a supported code.
pub fn from_canonical(kilograms: f64, unit: &str) -> Result<f64> {
    Ok(unit.parse::<Unit>()?.from_kg(kilograms))
}
