//! Consumption entity - One historical use of a raw material.
//!
//! Entries are written with the time of the ledger write and are only changed
//! through the ledger operations in [`crate::core::consumption`], which keep the
//! parent material's stock in step.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Consumption entry database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the material that was consumed
    pub material_id: i64,
    /// Quantity used, in kilograms
    pub quantity: f64,
    /// When the consumption was recorded
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between consumption entries and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one material and goes away with it
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id",
        on_delete = "Cascade"
    )]
    Material,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
