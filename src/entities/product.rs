//! Product entity - A finished bakery product (cake, croissant, bread).
//!
//! Products keep two counts: units in the back room and units on the shop
//! display. Sales are taken from the display count.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product, unique regardless of case
    #[sea_orm(unique)]
    pub name: String,
    /// Product kind code: `"cake"`, `"croissant"` or `"bread"`
    pub kind: String,
    /// Unit price
    pub price: f64,
    /// Units held in the back room
    pub stock_count: i64,
    /// Units on the shop display, available for sale
    pub display_count: i64,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many sales
    #[sea_orm(has_many = "super::sale::Entity")]
    Sales,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
