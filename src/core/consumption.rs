//! Consumption ledger - Records raw-material usage and keeps stock in step with it.
//!
//! Every mutation here touches two tables: the ledger row and the parent
//! material's stock. Each one runs inside a single database transaction, so a
//! reader never sees stock debited without its entry (or the reverse). An early
//! `?` return drops the transaction, which rolls it back.

use crate::{
    core::{
        material::{credit_kg, debit_kg, get_material_by_id, to_kilograms, validate_positive},
        pagination::{Page, contains_pattern, validate_limit},
        unit::Unit,
    },
    entities::{Consumption, Material, consumption, material},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sea_orm::{QueryOrder, QuerySelect, Select, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Filter shared by the ledger listing and the consumption reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionFilter {
    /// Keep entries whose material name contains this text (case-insensitive)
    pub material_name_contains: Option<String>,
    /// Keep entries recorded on this UTC day
    pub exact_date: Option<NaiveDate>,
    /// Page size, at least 1
    pub limit: u64,
    /// Rows to skip
    pub offset: u64,
}

impl Default for ConsumptionFilter {
    fn default() -> Self {
        Self {
            material_name_contains: None,
            exact_date: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// A ledger entry together with the name of its material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionRow {
    /// Entry id
    pub id: i64,
    /// Material id
    pub material_id: i64,
    /// Material name at query time
    pub material_name: String,
    /// Quantity used, in kilograms
    pub quantity: f64,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

/// Records the use of `quantity` of a material and debits its stock.
///
/// `unit` defaults to the material's display unit. The entry stores the
/// converted kilograms and the time of the write.
///
/// # Errors
/// - [`Error::NotFound`] if the material does not exist, checked first
/// - [`Error::InvalidQuantity`] if `quantity` is not a positive finite number
///   or does not fit in kilograms
/// - [`Error::InsufficientStock`] if the material holds less than requested;
///   neither the stock nor the ledger is changed
#[instrument(skip(db))]
pub async fn record_consumption(
    db: &DatabaseConnection,
    material_id: i64,
    quantity: f64,
    unit: Option<Unit>,
) -> Result<consumption::Model> {
    let txn = db.begin().await?;

    let material = get_material_by_id(&txn, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;
    validate_positive(quantity)?;
    let kilograms = to_kilograms(&material, quantity, unit)?;
    debit_kg(&txn, material_id, kilograms).await?;

    let entry = consumption::ActiveModel {
        material_id: Set(material_id),
        quantity: Set(kilograms),
        timestamp: Set(Utc::now()),
        ..Default::default()
    };
    let result = entry.insert(&txn).await?;

    txn.commit().await?;

    info!(
        entry_id = result.id,
        material_id, kilograms, "Consumption recorded"
    );
    Ok(result)
}

/// Finds a ledger entry by its unique ID.
pub async fn get_consumption_by_id(
    db: &DatabaseConnection,
    entry_id: i64,
) -> Result<Option<consumption::Model>> {
    Consumption::find_by_id(entry_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all ledger entries for one material, newest first.
pub async fn get_consumptions_for_material(
    db: &DatabaseConnection,
    material_id: i64,
) -> Result<Vec<consumption::Model>> {
    Consumption::find()
        .filter(consumption::Column::MaterialId.eq(material_id))
        .order_by_desc(consumption::Column::Timestamp)
        .order_by_desc(consumption::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Changes the recorded quantity of an entry and reconciles the stock.
///
/// `new_quantity` is in kilograms, like the stored value. Raising the quantity
/// debits the difference, lowering it credits the difference back. A raise the
/// material cannot cover is rejected rather than driving the stock negative.
///
/// # Errors
/// - [`Error::InvalidQuantity`] if `new_quantity` is not a positive finite number
/// - [`Error::NotFound`] if the entry does not exist
/// - [`Error::InsufficientStock`] if the extra debit exceeds the stock
#[instrument(skip(db))]
pub async fn update_quantity(
    db: &DatabaseConnection,
    entry_id: i64,
    new_quantity: f64,
) -> Result<consumption::Model> {
    validate_positive(new_quantity)?;

    let txn = db.begin().await?;

    let entry = Consumption::find_by_id(entry_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::consumption_not_found(entry_id))?;

    let material_id = entry.material_id;
    let delta = new_quantity - entry.quantity;
    if delta > 0.0 {
        debit_kg(&txn, material_id, delta).await?;
    } else if delta < 0.0 {
        credit_kg(&txn, material_id, -delta).await?;
    }

    let mut active: consumption::ActiveModel = entry.into();
    active.quantity = Set(new_quantity);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    info!(entry_id, material_id, delta, "Consumption quantity updated");
    Ok(updated)
}

/// Deletes a ledger entry and credits its quantity back to the material.
///
/// # Errors
/// Returns [`Error::NotFound`] if the entry does not exist.
#[instrument(skip(db))]
pub async fn delete_consumption(db: &DatabaseConnection, entry_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let entry = Consumption::find_by_id(entry_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::consumption_not_found(entry_id))?;

    let material_id = entry.material_id;
    let quantity = entry.quantity;

    entry.delete(&txn).await?;
    credit_kg(&txn, material_id, quantity).await?;

    txn.commit().await?;

    info!(entry_id, material_id, quantity, "Consumption deleted");
    Ok(())
}

/// Lists ledger entries matching `filter`, newest first.
///
/// `total` counts every entry matching the filter, not just this page.
pub async fn list_consumptions(
    db: &DatabaseConnection,
    filter: &ConsumptionFilter,
) -> Result<Page<ConsumptionRow>> {
    validate_limit(filter.limit)?;

    let query = filtered_query(filter);
    let total = query.clone().count(db).await?;

    let rows = query
        .select_also(Material)
        .order_by_desc(consumption::Column::Timestamp)
        .order_by_desc(consumption::Column::Id)
        .limit(filter.limit)
        .offset(filter.offset)
        .all(db)
        .await?;

    Ok(Page {
        items: rows.into_iter().filter_map(into_row).collect(),
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
}

/// Every entry matching the filter's predicate, ignoring its pagination.
/// Used by the reports, which aggregate before paginating.
pub(crate) async fn all_matching_rows(
    db: &DatabaseConnection,
    filter: &ConsumptionFilter,
) -> Result<Vec<ConsumptionRow>> {
    let rows = filtered_query(filter)
        .select_also(Material)
        .order_by_desc(consumption::Column::Timestamp)
        .all(db)
        .await?;
    debug!(rows = rows.len(), "Loaded consumption rows for aggregation");
    Ok(rows.into_iter().filter_map(into_row).collect())
}

fn filtered_query(filter: &ConsumptionFilter) -> Select<Consumption> {
    let mut query = Consumption::find().inner_join(Material);

    if let Some(name) = filter
        .material_name_contains
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        query = query.filter(material::Column::Name.like(contains_pattern(name)));
    }

    if let Some(date) = filter.exact_date {
        let (start, end) = day_bounds(date);
        query = query
            .filter(consumption::Column::Timestamp.gte(start))
            .filter(consumption::Column::Timestamp.lt(end));
    }

    query
}

/// Start (inclusive) and end (exclusive) of a UTC day.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + TimeDelta::days(1))
}

// The inner join guarantees the material is present.
fn into_row((entry, material): (consumption::Model, Option<material::Model>)) -> Option<ConsumptionRow> {
    material.map(|material| ConsumptionRow {
        id: entry.id,
        material_id: entry.material_id,
        material_name: material.name,
        quantity: entry.quantity,
        timestamp: entry.timestamp,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::material::{self as material_ops, get_material_by_id};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    async fn stock_of(db: &DatabaseConnection, material_id: i64) -> Result<f64> {
        Ok(get_material_by_id(db, material_id).await?.unwrap().quantity)
    }

    #[tokio::test]
    async fn test_record_consumption_validation() -> Result<()> {
        let (db, flour) = setup_with_material().await?;

        for quantity in [0.0, -3.0, f64::NAN, f64::NEG_INFINITY] {
            let result = record_consumption(&db, flour.id, quantity, None).await;
            assert!(matches!(result, Err(Error::InvalidQuantity { .. })));
        }
        assert_eq!(stock_of(&db, flour.id).await?, 100.0);
        assert!(get_consumptions_for_material(&db, flour.id).await?.is_empty());

        // An unknown material is reported before a bad quantity
        let result = record_consumption(&db, 9999, -1.0, None).await;
        assert!(matches!(result, Err(Error::NotFound { id: 9999, .. })));

        let mock = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = update_quantity(&mock, 1, 0.0).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumption_rejects_overflowing_quantity() -> Result<()> {
        let (db, flour) = setup_with_material().await?;

        let result = record_consumption(&db, flour.id, 1e307, Some(Unit::Sack50)).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { .. })));

        assert_eq!(stock_of(&db, flour.id).await?, 100.0);
        assert!(get_consumptions_for_material(&db, flour.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_consumptions_name_filter_is_literal() -> Result<()> {
        let db = setup_test_db().await?;
        let percent = create_test_material(&db, "Cocoa 70%", 10.0).await?;
        let plain = create_test_material(&db, "Cocoa 700", 10.0).await?;
        record_consumption(&db, percent.id, 1.0, None).await?;
        record_consumption(&db, plain.id, 1.0, None).await?;

        let filter = ConsumptionFilter {
            material_name_contains: Some("70%".to_string()),
            ..Default::default()
        };
        let page = list_consumptions(&db, &filter).await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].material_id, percent.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumption_material_not_found() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<material::Model>::new()])
            .into_connection();

        let result = record_consumption(&db, 999, 5.0, Some(Unit::Kg)).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Material",
                id: 999
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_quantity_entry_not_found_mock() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<consumption::Model>::new()])
            .into_connection();

        let result = update_quantity(&db, 7, 5.0).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Consumption entry",
                id: 7
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumption_debits_stock() -> Result<()> {
        // Flour with 100 kg, use 20 kg
        let (db, flour) = setup_with_material().await?;

        let before = Utc::now();
        let entry = record_consumption(&db, flour.id, 20.0, Some(Unit::Kg)).await?;
        let after = Utc::now();

        assert_eq!(entry.material_id, flour.id);
        assert_eq!(entry.quantity, 20.0);
        assert!(entry.timestamp >= before && entry.timestamp <= after);
        assert_eq!(stock_of(&db, flour.id).await?, 80.0);

        let entries = get_consumptions_for_material(&db, flour.id).await?;
        assert_eq!(entries, vec![entry]);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumption_insufficient_stock_is_atomic() -> Result<()> {
        let db = setup_test_db().await?;
        let flour = create_test_material(&db, "Flour", 40.0).await?;

        // One 50 kg sack is more than the 40 kg available
        let result = record_consumption(&db, flour.id, 1.0, Some(Unit::Sack50)).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientStock { available, requested })
                if available == 40.0 && requested == 50.0
        ));

        assert_eq!(stock_of(&db, flour.id).await?, 40.0);
        assert!(get_consumptions_for_material(&db, flour.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumption_uses_display_unit_by_default() -> Result<()> {
        let db = setup_test_db().await?;
        let flour = create_custom_material(&db, "Flour", 5.0, Unit::Sack20).await?;
        assert_eq!(flour.quantity, 100.0);

        let entry = record_consumption(&db, flour.id, 2.0, None).await?;
        assert_eq!(entry.quantity, 40.0);
        assert_eq!(stock_of(&db, flour.id).await?, 60.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_quantity_adjusts_stock_by_delta() -> Result<()> {
        let (db, flour) = setup_with_material().await?;
        let entry = record_consumption(&db, flour.id, 10.0, None).await?;
        assert_eq!(stock_of(&db, flour.id).await?, 90.0);

        let updated = update_quantity(&db, entry.id, 15.0).await?;
        assert_eq!(updated.quantity, 15.0);
        assert_eq!(updated.timestamp, entry.timestamp);
        assert_eq!(stock_of(&db, flour.id).await?, 85.0);

        let updated = update_quantity(&db, entry.id, 5.0).await?;
        assert_eq!(updated.quantity, 5.0);
        assert_eq!(stock_of(&db, flour.id).await?, 95.0);

        // Same quantity is a no-op on stock
        update_quantity(&db, entry.id, 5.0).await?;
        assert_eq!(stock_of(&db, flour.id).await?, 95.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_quantity_rejects_negative_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let sugar = create_test_material(&db, "Sugar", 30.0).await?;
        let entry = record_consumption(&db, sugar.id, 20.0, None).await?;

        // Needs 40 more kg, only 10 left
        let result = update_quantity(&db, entry.id, 60.0).await;
        assert!(matches!(result, Err(Error::InsufficientStock { .. })));

        assert_eq!(stock_of(&db, sugar.id).await?, 10.0);
        let unchanged = get_consumption_by_id(&db, entry.id).await?.unwrap();
        assert_eq!(unchanged.quantity, 20.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_consumption_restores_stock() -> Result<()> {
        let (db, flour) = setup_with_material().await?;
        let before = stock_of(&db, flour.id).await?;

        let entry = record_consumption(&db, flour.id, 12.5, None).await?;
        assert_eq!(stock_of(&db, flour.id).await?, 87.5);

        delete_consumption(&db, entry.id).await?;
        assert_eq!(stock_of(&db, flour.id).await?, before);
        assert!(get_consumption_by_id(&db, entry.id).await?.is_none());

        let result = delete_consumption(&db, entry.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_ledger_reconciles_stock() -> Result<()> {
        let (db, flour) = setup_with_material().await?;
        let initial = flour.quantity;

        material_ops::credit(&db, flour.id, 1.0, Some(Unit::Sack20)).await?;
        let a = record_consumption(&db, flour.id, 25.0, None).await?;
        let b = record_consumption(&db, flour.id, 0.5, Some(Unit::Sack50)).await?;
        let c = record_consumption(&db, flour.id, 7.0, None).await?;
        update_quantity(&db, a.id, 30.0).await?;
        delete_consumption(&db, b.id).await?;
        update_quantity(&db, c.id, 2.0).await?;

        let credits = 20.0;
        let consumed: f64 = get_consumptions_for_material(&db, flour.id)
            .await?
            .iter()
            .map(|e| e.quantity)
            .sum();
        assert_eq!(consumed, 32.0);
        assert_eq!(stock_of(&db, flour.id).await?, initial + credits - consumed);

        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_material_cascades_to_entries() -> Result<()> {
        let (db, flour) = setup_with_material().await?;
        let sugar = create_test_material(&db, "Sugar", 50.0).await?;

        let e1 = record_consumption(&db, flour.id, 5.0, None).await?;
        let e2 = record_consumption(&db, flour.id, 6.0, None).await?;
        let kept = record_consumption(&db, sugar.id, 1.0, None).await?;

        material_ops::delete_material(&db, flour.id).await?;

        assert!(get_consumption_by_id(&db, e1.id).await?.is_none());
        assert!(get_consumption_by_id(&db, e2.id).await?.is_none());
        let remaining = Consumption::find()
            .filter(consumption::Column::MaterialId.eq(flour.id))
            .count(&db)
            .await?;
        assert_eq!(remaining, 0);

        let page = list_consumptions(&db, &ConsumptionFilter::default()).await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, kept.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_consumptions_filters_and_counts() -> Result<()> {
        let db = setup_test_db().await?;
        let wheat = create_test_material(&db, "Wheat flour", 100.0).await?;
        let rye = create_test_material(&db, "Rye flour", 100.0).await?;
        let sugar = create_test_material(&db, "Sugar", 100.0).await?;

        for _ in 0..3 {
            record_consumption(&db, wheat.id, 1.0, None).await?;
        }
        record_consumption(&db, rye.id, 2.0, None).await?;
        let last = record_consumption(&db, sugar.id, 3.0, None).await?;

        let all = list_consumptions(&db, &ConsumptionFilter::default()).await?;
        assert_eq!(all.total, 5);
        assert_eq!(all.items[0].id, last.id);
        assert_eq!(all.items[0].material_name, "Sugar");

        let filter = ConsumptionFilter {
            material_name_contains: Some("FLOUR".to_string()),
            limit: 2,
            ..Default::default()
        };
        let page = list_consumptions(&db, &filter).await?;
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|r| r.material_name.contains("flour")));

        let today = list_consumptions(
            &db,
            &ConsumptionFilter {
                exact_date: Some(Utc::now().date_naive()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(today.total, 5);

        let other_day = list_consumptions(
            &db,
            &ConsumptionFilter {
                exact_date: NaiveDate::from_ymd_opt(2001, 1, 1),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(other_day.total, 0);
        assert!(other_day.items.is_empty());

        Ok(())
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start.to_rfc3339(), "2026-10-18T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-10-19T00:00:00+00:00");
    }
}
