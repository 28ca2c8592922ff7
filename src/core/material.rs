//! Material business logic - Owns raw-material stock and its minimum threshold.
//!
//! Stock is held in kilograms. Every caller-supplied quantity goes through
//! [`Unit`] before it touches the database, and every stock mutation goes
//! through a validated credit or debit. The `*_kg` building blocks are generic
//! over [`ConnectionTrait`] so the consumption ledger can run them inside its own
//! transaction; the public wrappers open one themselves.

use crate::{
    core::{
        pagination::{Page, contains_pattern, validate_limit},
        unit::Unit,
    },
    entities::{Material, material},
    errors::{Error, Result},
};
use sea_orm::{
    ActiveValue, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Supplier contact details attached to a material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    /// Supplier last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Supplier first name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Supplier email address
    #[serde(default)]
    pub email: Option<String>,
    /// Supplier phone number
    #[serde(default)]
    pub phone: Option<String>,
}

/// Arguments for [`create_material`]. Quantities are expressed in `unit`.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    /// Material name, trimmed before storing
    pub name: String,
    /// Initial stock
    pub quantity: f64,
    /// Minimum threshold
    pub minimum_quantity: f64,
    /// Unit both quantities are expressed in; becomes the display unit
    pub unit: Unit,
    /// Supplier contact details
    pub supplier: SupplierInfo,
}

/// Partial update for [`update_material`].
///
/// `None` leaves a field unchanged. Supplier fields are doubly optional:
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
    /// New name
    pub name: Option<String>,
    /// New absolute stock, in `unit` (or the stored unit when `unit` is `None`)
    pub quantity: Option<f64>,
    /// New minimum threshold, same unit rules as `quantity`
    pub minimum_quantity: Option<f64>,
    /// New display unit
    pub unit: Option<Unit>,
    /// New supplier last name
    pub supplier_last_name: Option<Option<String>>,
    /// New supplier first name
    pub supplier_first_name: Option<Option<String>>,
    /// New supplier email
    pub supplier_email: Option<Option<String>>,
    /// New supplier phone
    pub supplier_phone: Option<Option<String>>,
}

/// Finds a material by its unique ID.
pub async fn get_material_by_id<C>(db: &C, material_id: i64) -> Result<Option<material::Model>>
where
    C: ConnectionTrait,
{
    Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a material by name, ignoring case and surrounding whitespace.
pub async fn get_material_by_name<C>(db: &C, name: &str) -> Result<Option<material::Model>>
where
    C: ConnectionTrait,
{
    find_by_name_excluding(db, name, None).await
}

async fn find_by_name_excluding<C>(
    db: &C,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<Option<material::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Material::find().filter(
        Expr::expr(Func::lower(Expr::col(material::Column::Name)))
            .eq(Func::lower(Expr::val(name.trim()))),
    );
    if let Some(id) = exclude_id {
        query = query.filter(material::Column::Id.ne(id));
    }
    query.one(db).await.map_err(Into::into)
}

/// Lists materials whose name contains `search`, newest first.
pub async fn list_materials(
    db: &DatabaseConnection,
    search: &str,
    limit: u64,
    offset: u64,
) -> Result<Page<material::Model>> {
    validate_limit(limit)?;

    let query = Material::find().filter(material::Column::Name.like(contains_pattern(search)));
    let total = query.clone().count(db).await?;
    let items = query
        .order_by_desc(material::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}

/// Returns the materials whose stock is at or below their minimum threshold.
pub async fn get_materials_at_or_below_minimum(
    db: &DatabaseConnection,
) -> Result<Vec<material::Model>> {
    Material::find()
        .filter(
            Expr::col(material::Column::Quantity).lte(Expr::col(material::Column::MinimumQuantity)),
        )
        .order_by_asc(material::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new material, converting both quantities to kilograms.
///
/// Runs in its own transaction, nested as a savepoint when `db` is already one.
///
/// # Errors
/// - [`Error::Validation`] if the name is empty
/// - [`Error::InvalidQuantity`] if a quantity is negative or not finite
/// - [`Error::DuplicateName`] if a material with the same name exists, ignoring case
#[instrument(skip(db))]
pub async fn create_material<C>(db: &C, new: NewMaterial) -> Result<material::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let name = validate_name(&new.name)?;
    validate_non_negative(new.quantity)?;
    validate_non_negative(new.minimum_quantity)?;

    let quantity = finite_kg(new.unit.to_kg(new.quantity))?;
    let minimum_quantity = finite_kg(new.unit.to_kg(new.minimum_quantity))?;

    let txn = db.begin().await?;

    if find_by_name_excluding(&txn, &name, None).await?.is_some() {
        return Err(Error::DuplicateName { name });
    }

    let material = material::ActiveModel {
        name: Set(name),
        quantity: Set(quantity),
        minimum_quantity: Set(minimum_quantity),
        unit: Set(new.unit.as_str().to_string()),
        supplier_last_name: Set(clean_text(new.supplier.last_name)),
        supplier_first_name: Set(clean_text(new.supplier.first_name)),
        supplier_email: Set(clean_text(new.supplier.email)),
        supplier_phone: Set(clean_text(new.supplier.phone)),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = material.insert(&txn).await?;
    txn.commit().await?;

    info!(
        material_id = result.id,
        quantity_kg = result.quantity,
        "Material created"
    );
    Ok(result)
}

/// Applies a [`MaterialPatch`] to an existing material.
///
/// Supplied quantities are converted with the patch unit when one is given,
/// otherwise with the stored display unit. Stored kilogram values that the
/// patch does not mention are kept as they are: changing only the unit changes
/// how the stock is displayed, not how much there is.
///
/// # Errors
/// - [`Error::NotFound`] if the material does not exist
/// - [`Error::DuplicateName`] if the new name belongs to another material
/// - [`Error::Validation`] / [`Error::InvalidQuantity`] for invalid fields
#[instrument(skip(db))]
pub async fn update_material(
    db: &DatabaseConnection,
    material_id: i64,
    patch: MaterialPatch,
) -> Result<material::Model> {
    let new_name = patch.name.as_deref().map(validate_name).transpose()?;
    if let Some(quantity) = patch.quantity {
        validate_non_negative(quantity)?;
    }
    if let Some(minimum) = patch.minimum_quantity {
        validate_non_negative(minimum)?;
    }

    let txn = db.begin().await?;

    let existing = Material::find_by_id(material_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;

    let unit = match patch.unit {
        Some(unit) => unit,
        None => existing.display_unit()?,
    };

    let mut active: material::ActiveModel = existing.into();

    if let Some(name) = new_name {
        if find_by_name_excluding(&txn, &name, Some(material_id))
            .await?
            .is_some()
        {
            return Err(Error::DuplicateName { name });
        }
        active.name = Set(name);
    }
    if let Some(quantity) = patch.quantity {
        active.quantity = Set(finite_kg(unit.to_kg(quantity))?);
    }
    if let Some(minimum) = patch.minimum_quantity {
        active.minimum_quantity = Set(finite_kg(unit.to_kg(minimum))?);
    }
    if let Some(unit) = patch.unit {
        active.unit = Set(unit.as_str().to_string());
    }
    apply_text_patch(&mut active.supplier_last_name, patch.supplier_last_name);
    apply_text_patch(&mut active.supplier_first_name, patch.supplier_first_name);
    apply_text_patch(&mut active.supplier_email, patch.supplier_email);
    apply_text_patch(&mut active.supplier_phone, patch.supplier_phone);

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!(material_id, "Material updated");
    Ok(updated)
}

/// Adds stock to a material.
///
/// `unit` defaults to the material's display unit.
///
/// # Errors
/// - [`Error::InvalidQuantity`] if `quantity` is not a positive finite number
/// - [`Error::NotFound`] if the material does not exist
#[instrument(skip(db))]
pub async fn credit(
    db: &DatabaseConnection,
    material_id: i64,
    quantity: f64,
    unit: Option<Unit>,
) -> Result<material::Model> {
    validate_positive(quantity)?;

    let txn = db.begin().await?;
    let kilograms = resolve_kilograms(&txn, material_id, quantity, unit).await?;
    let updated = credit_kg(&txn, material_id, kilograms).await?;
    txn.commit().await?;

    info!(material_id, kilograms, "Stock credited");
    Ok(updated)
}

/// Removes stock from a material without writing a ledger entry.
///
/// Consumption that should appear in the history goes through
/// [`crate::core::consumption::record_consumption`] instead.
///
/// # Errors
/// - [`Error::InvalidQuantity`] if `quantity` is not a positive finite number
/// - [`Error::NotFound`] if the material does not exist
/// - [`Error::InsufficientStock`] if less than the requested kilograms are on hand
#[instrument(skip(db))]
pub async fn debit(
    db: &DatabaseConnection,
    material_id: i64,
    quantity: f64,
    unit: Option<Unit>,
) -> Result<material::Model> {
    validate_positive(quantity)?;

    let txn = db.begin().await?;
    let kilograms = resolve_kilograms(&txn, material_id, quantity, unit).await?;
    let updated = debit_kg(&txn, material_id, kilograms).await?;
    txn.commit().await?;

    info!(material_id, kilograms, "Stock debited");
    Ok(updated)
}

/// Deletes a material. Its consumption entries are removed by the
/// `ON DELETE CASCADE` foreign key.
///
/// # Errors
/// Returns [`Error::NotFound`] if the material does not exist.
#[instrument(skip(db))]
pub async fn delete_material(db: &DatabaseConnection, material_id: i64) -> Result<()> {
    let result = Material::delete_by_id(material_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::material_not_found(material_id));
    }
    info!(material_id, "Material deleted");
    Ok(())
}

/// Converts `quantity` to kilograms using `unit`, or the material's display
/// unit when `unit` is `None`. Fails if the material does not exist.
async fn resolve_kilograms<C>(
    db: &C,
    material_id: i64,
    quantity: f64,
    unit: Option<Unit>,
) -> Result<f64>
where
    C: ConnectionTrait,
{
    let material = get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;
    to_kilograms(&material, quantity, unit)
}

/// Converts `quantity` to kilograms for an already loaded material.
///
/// A finite quantity can still overflow once multiplied by a sack factor;
/// that is rejected as [`Error::InvalidQuantity`].
pub(crate) fn to_kilograms(
    material: &material::Model,
    quantity: f64,
    unit: Option<Unit>,
) -> Result<f64> {
    let unit = match unit {
        Some(unit) => unit,
        None => material.display_unit()?,
    };
    finite_kg(unit.to_kg(quantity))
}

/// Adds `kilograms` to the stock in a single `UPDATE`.
///
/// Fails with [`Error::InvalidQuantity`] if the new stock would not be finite.
pub(crate) async fn credit_kg<C>(
    db: &C,
    material_id: i64,
    kilograms: f64,
) -> Result<material::Model>
where
    C: ConnectionTrait,
{
    let material = get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;
    finite_kg(material.quantity + kilograms)?;

    let result = Material::update_many()
        .col_expr(
            material::Column::Quantity,
            Expr::col(material::Column::Quantity).add(kilograms),
        )
        .filter(material::Column::Id.eq(material_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::material_not_found(material_id));
    }

    get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))
}

/// Subtracts `kilograms` from the stock.
///
/// The `UPDATE` only matches while `quantity >= kilograms`, so the stored
/// quantity cannot go negative even if another writer got there first.
pub(crate) async fn debit_kg<C>(
    db: &C,
    material_id: i64,
    kilograms: f64,
) -> Result<material::Model>
where
    C: ConnectionTrait,
{
    let material = get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;

    if material.quantity < kilograms {
        warn!(
            material_id,
            available = material.quantity,
            requested = kilograms,
            "Debit rejected"
        );
        return Err(Error::InsufficientStock {
            available: material.quantity,
            requested: kilograms,
        });
    }

    let result = Material::update_many()
        .col_expr(
            material::Column::Quantity,
            Expr::col(material::Column::Quantity).sub(kilograms),
        )
        .filter(material::Column::Id.eq(material_id))
        .filter(material::Column::Quantity.gte(kilograms))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let available = get_material_by_id(db, material_id)
            .await?
            .map_or(0.0, |m| m.quantity);
        return Err(Error::InsufficientStock {
            available,
            requested: kilograms,
        });
    }

    get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            message: "Material name cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_positive(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(())
}

fn finite_kg(kilograms: f64) -> Result<f64> {
    if kilograms.is_finite() {
        Ok(kilograms)
    } else {
        Err(Error::InvalidQuantity {
            quantity: kilograms,
        })
    }
}

fn validate_non_negative(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Trims free text; blank strings are stored as `NULL`.
fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_text_patch(field: &mut ActiveValue<Option<String>>, patch: Option<Option<String>>) {
    if let Some(value) = patch {
        *field = Set(clean_text(value));
    }
}
