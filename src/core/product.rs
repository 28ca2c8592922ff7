//! Product business logic - Finished products and point-of-sale consumption.
//!
//! Products are sold from the shop display. A sale follows the same pattern as
//! raw-material consumption: inside one transaction the display count is checked
//! and decremented and an immutable sale row is appended.

use crate::{
    core::pagination::{Page, contains_pattern, validate_limit},
    entities::{Product, Sale, product, sale},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::{info, instrument, warn};

/// Kinds of finished product the bakery sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Cakes, including custom cakes once finished
    Cake,
    /// Croissants and other viennoiseries
    Croissant,
    /// Bread
    Bread,
}

impl ProductKind {
    /// Code stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cake => "cake",
            Self::Croissant => "croissant",
            Self::Bread => "bread",
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cake" => Ok(Self::Cake),
            "croissant" => Ok(Self::Croissant),
            "bread" => Ok(Self::Bread),
            _ => Err(Error::InvalidProductKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Arguments for [`create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Product name, trimmed before storing
    pub name: String,
    /// Product kind
    pub kind: ProductKind,
    /// Unit price, must be positive
    pub price: f64,
    /// Units in the back room
    pub stock_count: i64,
    /// Units on the shop display
    pub display_count: i64,
}

/// Partial update for [`update_product`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    /// New name
    pub name: Option<String>,
    /// New kind
    pub kind: Option<ProductKind>,
    /// New unit price
    pub price: Option<f64>,
    /// New back-room count
    pub stock_count: Option<i64>,
    /// New display count
    pub display_count: Option<i64>,
}

/// Sales of one product on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    /// Product id
    pub product_id: i64,
    /// Product name
    pub product_name: String,
    /// Product kind code
    pub kind: String,
    /// The day
    pub day: NaiveDate,
    /// Units sold that day
    pub quantity_sold: i64,
    /// Revenue that day
    pub total_amount: f64,
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a product by name, ignoring case and surrounding whitespace.
pub async fn get_product_by_name<C>(db: &C, name: &str) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    find_by_name_excluding(db, name, None).await
}

async fn find_by_name_excluding<C>(
    db: &C,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Product::find().filter(
        Expr::expr(Func::lower(Expr::col(product::Column::Name)))
            .eq(Func::lower(Expr::val(name.trim()))),
    );
    if let Some(id) = exclude_id {
        query = query.filter(product::Column::Id.ne(id));
    }
    query.one(db).await.map_err(Into::into)
}

/// Lists products whose name contains `search`, ordered alphabetically.
pub async fn list_products(
    db: &DatabaseConnection,
    search: &str,
    limit: u64,
    offset: u64,
) -> Result<Page<product::Model>> {
    validate_limit(limit)?;

    let query = Product::find().filter(product::Column::Name.like(contains_pattern(search)));
    let total = query.clone().count(db).await?;
    let items = query
        .order_by_asc(product::Column::Name)
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

/// Creates a new product after validating its fields.
///
/// # Errors
/// - [`Error::Validation`] if the name is empty
/// - [`Error::InvalidAmount`] if the price is not a positive finite number
/// - [`Error::InvalidQuantity`] if a count is negative
/// - [`Error::DuplicateName`] if a product with the same name exists, ignoring case
#[instrument(skip(db))]
pub async fn create_product<C>(db: &C, new: NewProduct) -> Result<product::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let name = validate_name(&new.name)?;
    validate_price(new.price)?;
    validate_count(new.stock_count)?;
    validate_count(new.display_count)?;

    let txn = db.begin().await?;

    if find_by_name_excluding(&txn, &name, None).await?.is_some() {
        return Err(Error::DuplicateName { name });
    }

    let now = Utc::now();
    let product = product::ActiveModel {
        name: Set(name),
        kind: Set(new.kind.as_str().to_string()),
        price: Set(new.price),
        stock_count: Set(new.stock_count),
        display_count: Set(new.display_count),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let result = product.insert(&txn).await?;
    txn.commit().await?;

    info!(product_id = result.id, "Product created");
    Ok(result)
}

/// Applies a [`ProductPatch`] to an existing product.
///
/// # Errors
/// - [`Error::NotFound`] if the product does not exist
/// - [`Error::DuplicateName`] if the new name belongs to another product
/// - [`Error::Validation`] / [`Error::InvalidAmount`] / [`Error::InvalidQuantity`]
///   for invalid fields
#[instrument(skip(db))]
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    patch: ProductPatch,
) -> Result<product::Model> {
    let new_name = patch.name.as_deref().map(validate_name).transpose()?;
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    if let Some(count) = patch.stock_count {
        validate_count(count)?;
    }
    if let Some(count) = patch.display_count {
        validate_count(count)?;
    }

    let txn = db.begin().await?;

    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::product_not_found(product_id))?
        .into();

    if let Some(name) = new_name {
        if find_by_name_excluding(&txn, &name, Some(product_id))
            .await?
            .is_some()
        {
            return Err(Error::DuplicateName { name });
        }
        product.name = Set(name);
    }
    if let Some(kind) = patch.kind {
        product.kind = Set(kind.as_str().to_string());
    }
    if let Some(price) = patch.price {
        product.price = Set(price);
    }
    if let Some(count) = patch.stock_count {
        product.stock_count = Set(count);
    }
    if let Some(count) = patch.display_count {
        product.display_count = Set(count);
    }
    product.updated_at = Set(Utc::now());

    let updated = product.update(&txn).await?;
    txn.commit().await?;

    info!(product_id, "Product updated");
    Ok(updated)
}

/// Deletes a product together with its sales history.
///
/// # Errors
/// Returns [`Error::NotFound`] if the product does not exist.
#[instrument(skip(db))]
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<()> {
    let result = Product::delete_by_id(product_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::product_not_found(product_id));
    }
    info!(product_id, "Product deleted");
    Ok(())
}

/// Sells `quantity` units from the shop display.
///
/// The sale amount is fixed at the current unit price.
///
/// # Errors
/// - [`Error::InvalidQuantity`] if `quantity` is not positive
/// - [`Error::NotFound`] if the product does not exist
/// - [`Error::InvalidAmount`] if the product has no positive price
/// - [`Error::InsufficientStock`] if the display holds fewer units; nothing is
///   changed
#[instrument(skip(db))]
pub async fn sell_from_display(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: i64,
) -> Result<sale::Model> {
    if quantity <= 0 {
        return Err(Error::InvalidQuantity {
            quantity: count_as_f64(quantity),
        });
    }

    let txn = db.begin().await?;

    let product = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::product_not_found(product_id))?;

    if !product.price.is_finite() || product.price <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: product.price,
        });
    }

    if product.display_count < quantity {
        warn!(
            product_id,
            available = product.display_count,
            requested = quantity,
            "Sale rejected"
        );
        return Err(Error::InsufficientStock {
            available: count_as_f64(product.display_count),
            requested: count_as_f64(quantity),
        });
    }

    let result = Product::update_many()
        .col_expr(
            product::Column::DisplayCount,
            Expr::col(product::Column::DisplayCount).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::DisplayCount.gte(quantity))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InsufficientStock {
            available: count_as_f64(product.display_count),
            requested: count_as_f64(quantity),
        });
    }

    let sale = sale::ActiveModel {
        product_id: Set(product_id),
        quantity: Set(quantity),
        total_amount: Set(count_as_f64(quantity) * product.price),
        sold_at: Set(Utc::now()),
        ..Default::default()
    };
    let sale = sale.insert(&txn).await?;

    txn.commit().await?;

    info!(
        sale_id = sale.id,
        product_id,
        quantity,
        total_amount = sale.total_amount,
        "Sale recorded"
    );
    Ok(sale)
}

/// Retrieves all sales of one product, newest first.
pub async fn get_sales_for_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<sale::Model>> {
    Sale::find()
        .filter(sale::Column::ProductId.eq(product_id))
        .order_by_desc(sale::Column::SoldAt)
        .order_by_desc(sale::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sales totals grouped by product and UTC day, newest day first, then by
/// product name.
pub async fn daily_sales(db: &DatabaseConnection) -> Result<Vec<DailySales>> {
    let rows = Sale::find()
        .find_also_related(Product)
        .order_by_desc(sale::Column::SoldAt)
        .all(db)
        .await?;

    let mut totals: BTreeMap<(NaiveDate, String, i64), DailySales> = BTreeMap::new();
    for (sale, product) in rows {
        let Some(product) = product else { continue };
        let day = sale.sold_at.date_naive();
        let group = totals
            .entry((day, product.name.clone(), product.id))
            .or_insert_with(|| DailySales {
                product_id: product.id,
                product_name: product.name,
                kind: product.kind,
                day,
                quantity_sold: 0,
                total_amount: 0.0,
            });
        group.quantity_sold += sale.quantity;
        group.total_amount += sale.total_amount;
    }

    let mut days: Vec<DailySales> = totals.into_values().collect();
    // BTreeMap orders days ascending; keep names ascending within a day
    days.sort_by(|a, b| b.day.cmp(&a.day));
    Ok(days)
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            message: "Product name cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

fn validate_count(count: i64) -> Result<()> {
    if count < 0 {
        return Err(Error::InvalidQuantity {
            quantity: count_as_f64(count),
        });
    }
    Ok(())
}

// Counts are small shop quantities, far inside f64's exact integer range.
#[allow(clippy::cast_precision_loss)]
fn count_as_f64(count: i64) -> f64 {
    count as f64
}
