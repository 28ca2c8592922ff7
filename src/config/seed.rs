//! Seed configuration loading from config.toml
//!
//! The seed file lists the raw materials and products the bakery starts with.
//! On startup every entry whose name is not in the database yet is created;
//! existing rows are left alone so restarts never reset stock.

use crate::{
    core::{
        material::{self, NewMaterial, SupplierInfo},
        product::{self, NewProduct},
    },
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct SeedConfig {
    /// Raw materials to create if missing
    #[serde(default)]
    pub materials: Vec<MaterialSeed>,
    /// Products to create if missing
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// Configuration for a single raw material
#[derive(Debug, Deserialize, Clone)]
pub struct MaterialSeed {
    /// Name of the material
    pub name: String,
    /// Initial stock, in `unit`
    #[serde(default)]
    pub quantity: f64,
    /// Minimum threshold, in `unit`
    #[serde(default)]
    pub minimum_quantity: f64,
    /// Unit code, defaults to `kg`
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Supplier contact details
    #[serde(default)]
    pub supplier: SupplierInfo,
}

/// Configuration for a single product
#[derive(Debug, Deserialize, Clone)]
pub struct ProductSeed {
    /// Name of the product
    pub name: String,
    /// Kind code: `cake`, `croissant` or `bread`
    pub kind: String,
    /// Unit price
    pub price: f64,
    /// Units in the back room
    #[serde(default)]
    pub stock_count: i64,
    /// Units on the shop display
    #[serde(default)]
    pub display_count: i64,
}

fn default_unit() -> String {
    "kg".to_string()
}

/// Loads seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load seed configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the seed file named by `SEED_CONFIG`, or `./config.toml`.
///
/// A missing file is not an error: the bakery simply starts empty.
pub fn load_default_config() -> Result<SeedConfig> {
    let path = std::env::var("SEED_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(path)
    } else {
        info!("No seed file at {path}, starting without seed data");
        Ok(SeedConfig::default())
    }
}

/// Summary of a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedOutcome {
    /// Materials created by this run
    pub materials_created: usize,
    /// Products created by this run
    pub products_created: usize,
}

/// Creates every seeded material and product that does not exist yet.
///
/// The whole run is one transaction: an invalid entry leaves the database as
/// it was before the call.
#[instrument(skip_all)]
pub async fn seed_database(db: &DatabaseConnection, config: &SeedConfig) -> Result<SeedOutcome> {
    let mut outcome = SeedOutcome::default();
    let txn = db.begin().await?;

    for seed in &config.materials {
        if material::get_material_by_name(&txn, &seed.name).await?.is_some() {
            continue;
        }
        let unit = seed.unit.parse()?;
        material::create_material(
            &txn,
            NewMaterial {
                name: seed.name.clone(),
                quantity: seed.quantity,
                minimum_quantity: seed.minimum_quantity,
                unit,
                supplier: seed.supplier.clone(),
            },
        )
        .await?;
        outcome.materials_created += 1;
    }

    for seed in &config.products {
        if product::get_product_by_name(&txn, &seed.name).await?.is_some() {
            continue;
        }
        product::create_product(
            &txn,
            NewProduct {
                name: seed.name.clone(),
                kind: seed.kind.parse()?,
                price: seed.price,
                stock_count: seed.stock_count,
                display_count: seed.display_count,
            },
        )
        .await?;
        outcome.products_created += 1;
    }

    txn.commit().await?;

    info!(
        materials = outcome.materials_created,
        products = outcome.products_created,
        "Seed data applied"
    );
    Ok(outcome)
}
