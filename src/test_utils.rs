//! Shared test utilities for the bakery stock crate.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test materials and products with sensible defaults.

use crate::{
    core::{
        material::{self, NewMaterial, SupplierInfo},
        product::{self, NewProduct, ProductKind},
        unit::Unit,
    },
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a [`NewMaterial`] without a minimum or supplier details.
pub fn new_material(name: &str, quantity: f64, unit: Unit) -> NewMaterial {
    NewMaterial {
        name: name.to_string(),
        quantity,
        minimum_quantity: 0.0,
        unit,
        supplier: SupplierInfo::default(),
    }
}

/// Creates a test material displayed in kilograms.
///
/// # Defaults
/// * `minimum_quantity`: 0
/// * `unit`: kg
pub async fn create_test_material(
    db: &DatabaseConnection,
    name: &str,
    kilograms: f64,
) -> Result<entities::material::Model> {
    material::create_material(db, new_material(name, kilograms, Unit::Kg)).await
}

/// Creates a test material whose quantity is given in `unit`.
pub async fn create_custom_material(
    db: &DatabaseConnection,
    name: &str,
    quantity: f64,
    unit: Unit,
) -> Result<entities::material::Model> {
    material::create_material(db, new_material(name, quantity, unit)).await
}

/// Sets up a database holding 100 kg of "Flour".
/// Returns (db, material) for common ledger scenarios.
pub async fn setup_with_material() -> Result<(DatabaseConnection, entities::material::Model)> {
    let db = setup_test_db().await?;
    let flour = create_test_material(&db, "Flour", 100.0).await?;
    Ok((db, flour))
}

/// Builds a [`NewProduct`] of kind bread with an empty back room.
pub fn new_product(name: &str, price: f64, display_count: i64) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        kind: ProductKind::Bread,
        price,
        stock_count: 0,
        display_count,
    }
}

/// Creates a test bread product.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    display_count: i64,
) -> Result<entities::product::Model> {
    product::create_product(db, new_product(name, price, display_count)).await
}

/// Sets up a database with a "Baguette" at 1.20 and ten on display.
pub async fn setup_with_product() -> Result<(DatabaseConnection, entities::product::Model)> {
    let db = setup_test_db().await?;
    let baguette = create_test_product(&db, "Baguette", 1.2, 10).await?;
    Ok((db, baguette))
}
