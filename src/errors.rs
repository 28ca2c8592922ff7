//! Unified error type for the stock ledger.
//!
//! Every public operation returns [`Result`]. Domain failures are typed so the
//! calling layer can map them to user-facing responses; none of them is fatal to
//! the process and none leaves a partial mutation behind.

use thiserror::Error;

/// Errors produced by the ledger, configuration and storage layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Unit code outside of `kg`, `sack20`, `sack50`
    #[error("Unsupported unit \"{unit}\". Valid units: kg, sack20, sack50")]
    InvalidUnit {
        /// The rejected unit code
        unit: String,
    },

    /// Quantity that is non-positive (or negative where zero is allowed) or not finite
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// Price or monetary amount that is non-positive or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Product kind outside of `cake`, `croissant`, `bread`
    #[error("Invalid product kind \"{kind}\". Valid kinds: cake, croissant, bread")]
    InvalidProductKind {
        /// The rejected kind
        kind: String,
    },

    /// Case-insensitive name collision on create or rename
    #[error("An entry named \"{name}\" already exists")]
    DuplicateName {
        /// The conflicting name
        name: String,
    },

    /// Unknown material, consumption entry or product id
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// The id that was looked up
        id: i64,
    },

    /// Debit would drive the stock below zero
    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        /// Quantity currently on hand
        available: f64,
        /// Quantity the operation asked for
        requested: f64,
    },

    /// Input rejected before reaching storage
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Integer conversion failure (pagination arithmetic)
    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),
}

impl Error {
    pub(crate) const fn material_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Material",
            id,
        }
    }

    pub(crate) const fn consumption_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Consumption entry",
            id,
        }
    }

    pub(crate) const fn product_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Product",
            id,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
