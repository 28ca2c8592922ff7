//! Material entity - A raw material held in stock (flour, sugar, butter...).
//!
//! Quantities are always stored in kilograms. `unit` only records how the
//! material is entered and displayed; see [`crate::core::unit`].

use crate::core::unit::Unit;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the material, unique regardless of case
    #[sea_orm(unique)]
    pub name: String,
    /// Current stock in kilograms, never negative
    pub quantity: f64,
    /// Minimum threshold in kilograms
    pub minimum_quantity: f64,
    /// Display unit code (`kg`, `sack20` or `sack50`)
    pub unit: String,
    /// Supplier last name
    pub supplier_last_name: Option<String>,
    /// Supplier first name
    pub supplier_first_name: Option<String>,
    /// Supplier email address
    pub supplier_email: Option<String>,
    /// Supplier phone number
    pub supplier_phone: Option<String>,
    /// When the material was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One material has many consumption entries
    #[sea_orm(has_many = "super::consumption::Entity")]
    Consumptions,
}

impl Related<super::consumption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consumptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Position of the current stock relative to the minimum threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// Stock is strictly above the minimum
    AboveMinimum,
    /// Stock has reached or dropped below the minimum
    AtOrBelowMinimum,
}

impl Model {
    /// Parses the stored display unit.
    pub fn display_unit(&self) -> crate::errors::Result<Unit> {
        self.unit.parse()
    }

    /// Current stock expressed in the display unit.
    pub fn quantity_in_display_unit(&self) -> crate::errors::Result<f64> {
        Ok(self.display_unit()?.from_kg(self.quantity))
    }

    /// Minimum threshold expressed in the display unit.
    pub fn minimum_in_display_unit(&self) -> crate::errors::Result<f64> {
        Ok(self.display_unit()?.from_kg(self.minimum_quantity))
    }

    /// Where the current stock sits relative to the minimum.
    #[must_use]
    pub fn stock_level(&self) -> StockLevel {
        if self.quantity > self.minimum_quantity {
            StockLevel::AboveMinimum
        } else {
            StockLevel::AtOrBelowMinimum
        }
    }
}
