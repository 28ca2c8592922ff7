//! Report generation business logic.
//!
//! This module aggregates the consumption ledger into daily and per-material
//! totals and builds per-material stock reports. All functions are read-only
//! and return structured data that the presentation layer can format.

use crate::{
    core::{
        consumption::{self, ConsumptionFilter, ConsumptionRow},
        material::get_material_by_id,
        pagination::{Page, paginate_vec},
        unit::Unit,
    },
    entities::{
        consumption::Model as ConsumptionModel,
        material::{self, StockLevel},
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{cmp::Ordering, collections::HashMap};

/// Total consumption of one material on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyConsumption {
    /// Material id
    pub material_id: i64,
    /// Material name
    pub material_name: String,
    /// The day
    pub day: NaiveDate,
    /// Kilograms used that day
    pub total_quantity: f64,
    /// Number of ledger entries that day
    pub entry_count: u64,
}

/// Total consumption of one material across the filtered entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialConsumption {
    /// Material id
    pub material_id: i64,
    /// Material name
    pub material_name: String,
    /// Kilograms used
    pub total_quantity: f64,
    /// Number of ledger entries
    pub entry_count: u64,
}

/// Stock report for a single material.
#[derive(Debug, Clone)]
pub struct MaterialReport {
    /// The material being reported on
    pub material: material::Model,
    /// Display unit
    pub unit: Unit,
    /// Current stock in the display unit
    pub quantity_in_unit: f64,
    /// Minimum threshold in the display unit
    pub minimum_in_unit: f64,
    /// Position of the stock relative to the minimum
    pub stock_level: StockLevel,
    /// Most recent ledger entries
    pub recent_entries: Vec<ConsumptionModel>,
    /// Kilograms across all current ledger entries
    pub total_consumed: f64,
}

/// Consumption totals grouped by material and day.
///
/// Ordered by day (newest first), then by total (largest first). The page's
/// `total` is the number of groups under the filter.
pub async fn daily_consumption(
    db: &DatabaseConnection,
    filter: &ConsumptionFilter,
) -> Result<Page<DailyConsumption>> {
    let rows = consumption::all_matching_rows(db, filter).await?;
    let mut groups = group_by_material_and_day(rows);

    groups.sort_by(|a, b| {
        b.day
            .cmp(&a.day)
            .then_with(|| descending(a.total_quantity, b.total_quantity))
            .then_with(|| a.material_name.cmp(&b.material_name))
    });

    paginate_vec(groups, filter.limit, filter.offset)
}

/// Consumption totals grouped by material only, largest first.
///
/// Combined with [`ConsumptionFilter::exact_date`] this answers "what was used
/// on that day".
pub async fn consumption_by_material(
    db: &DatabaseConnection,
    filter: &ConsumptionFilter,
) -> Result<Page<MaterialConsumption>> {
    let rows = consumption::all_matching_rows(db, filter).await?;

    let mut totals: HashMap<i64, MaterialConsumption> = HashMap::new();
    for row in rows {
        let group = totals
            .entry(row.material_id)
            .or_insert_with(|| MaterialConsumption {
                material_id: row.material_id,
                material_name: row.material_name.clone(),
                total_quantity: 0.0,
                entry_count: 0,
            });
        group.total_quantity += row.quantity;
        group.entry_count += 1;
    }

    let mut groups: Vec<MaterialConsumption> = totals.into_values().collect();
    groups.sort_by(|a, b| {
        descending(a.total_quantity, b.total_quantity)
            .then_with(|| a.material_name.cmp(&b.material_name))
    });

    paginate_vec(groups, filter.limit, filter.offset)
}

fn group_by_material_and_day(rows: Vec<ConsumptionRow>) -> Vec<DailyConsumption> {
    let mut totals: HashMap<(i64, NaiveDate), DailyConsumption> = HashMap::new();
    for row in rows {
        let day = row.timestamp.date_naive();
        let group = totals
            .entry((row.material_id, day))
            .or_insert_with(|| DailyConsumption {
                material_id: row.material_id,
                material_name: row.material_name.clone(),
                day,
                total_quantity: 0.0,
                entry_count: 0,
            });
        group.total_quantity += row.quantity;
        group.entry_count += 1;
    }
    totals.into_values().collect()
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Generates a stock report for a specific material.
///
/// # Arguments
/// * `db` - Database connection
/// * `material_id` - ID of the material to report on
/// * `entry_limit` - Maximum number of recent entries to include (default 10)
pub async fn generate_material_report(
    db: &DatabaseConnection,
    material_id: i64,
    entry_limit: Option<u64>,
) -> Result<MaterialReport> {
    let material = get_material_by_id(db, material_id)
        .await?
        .ok_or_else(|| Error::material_not_found(material_id))?;

    let limit = entry_limit.unwrap_or(10);
    let entries = consumption::get_consumptions_for_material(db, material_id).await?;
    let total_consumed: f64 = entries.iter().map(|e| e.quantity).sum();
    let recent_entries = entries.into_iter().take(limit.try_into()?).collect();

    let unit = material.display_unit()?;

    Ok(MaterialReport {
        unit,
        quantity_in_unit: unit.from_kg(material.quantity),
        minimum_in_unit: unit.from_kg(material.minimum_quantity),
        stock_level: material.stock_level(),
        material,
        recent_entries,
        total_consumed,
    })
}

/// Formats a kilogram quantity in a display unit.
///
/// Returns strings like `"2.50 sack20 (50.00 kg)"`, or `"12.00 kg"` for kilograms.
#[must_use]
pub fn format_quantity(kilograms: f64, unit: Unit) -> String {
    match unit {
        Unit::Kg => format!("{kilograms:.2} kg"),
        _ => format!("{:.2} {unit} ({kilograms:.2} kg)", unit.from_kg(kilograms)),
    }
}

/// Generates a summary line for a ledger entry.
#[must_use]
pub fn format_consumption_summary(entry: &ConsumptionModel) -> String {
    format!(
        "#{} | {} | -{:.2} kg",
        entry.id,
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.quantity
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::consumption::record_consumption;
    use crate::entities::{Consumption, consumption as consumption_entity};
    use crate::test_utils::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

    async fn insert_entry_at(
        db: &DatabaseConnection,
        material_id: i64,
        quantity: f64,
        timestamp: chrono::DateTime<Utc>,
    ) -> Result<()> {
        // Historical rows for aggregation; stock is not the subject here
        consumption_entity::ActiveModel {
            material_id: Set(material_id),
            quantity: Set(quantity),
            timestamp: Set(timestamp),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(12.0, Unit::Kg), "12.00 kg");
        assert_eq!(format_quantity(50.0, Unit::Sack20), "2.50 sack20 (50.00 kg)");
        assert_eq!(format_quantity(25.0, Unit::Sack50), "0.50 sack50 (25.00 kg)");
    }

    #[test]
    fn test_format_consumption_summary() {
        let entry = ConsumptionModel {
            id: 3,
            material_id: 1,
            quantity: 7.5,
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 6, 30, 0).unwrap(),
        };
        assert_eq!(
            format_consumption_summary(&entry),
            "#3 | 2026-10-18 06:30 | -7.50 kg"
        );
    }

    #[tokio::test]
    async fn test_daily_consumption_groups_by_material_and_day() -> Result<()> {
        let db = setup_test_db().await?;
        let flour = create_test_material(&db, "Flour", 100.0).await?;
        let sugar = create_test_material(&db, "Sugar", 100.0).await?;

        let day1 = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        let day1_late = Utc.with_ymd_and_hms(2026, 10, 17, 22, 15, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        insert_entry_at(&db, flour.id, 10.0, day1).await?;
        insert_entry_at(&db, flour.id, 5.0, day1_late).await?;
        insert_entry_at(&db, sugar.id, 20.0, day1).await?;
        insert_entry_at(&db, flour.id, 3.0, day2).await?;

        let page = daily_consumption(&db, &ConsumptionFilter::default()).await?;
        assert_eq!(page.total, 3);

        let first = &page.items[0];
        assert_eq!(first.day, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(first.material_name, "Flour");
        assert_eq!(first.total_quantity, 3.0);

        // Same day: larger total first
        assert_eq!(page.items[1].material_name, "Sugar");
        assert_eq!(page.items[1].total_quantity, 20.0);
        assert_eq!(page.items[2].material_name, "Flour");
        assert_eq!(page.items[2].total_quantity, 15.0);
        assert_eq!(page.items[2].entry_count, 2);

        // Filter and pagination apply to groups
        let filter = ConsumptionFilter {
            material_name_contains: Some("flo".to_string()),
            limit: 1,
            offset: 1,
            ..Default::default()
        };
        let page = daily_consumption(&db, &filter).await?;
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].total_quantity, 15.0);
        assert!(!page.has_next());

        Ok(())
    }

    #[tokio::test]
    async fn test_consumption_by_material_on_date() -> Result<()> {
        let db = setup_test_db().await?;
        let flour = create_test_material(&db, "Flour", 100.0).await?;
        let butter = create_test_material(&db, "Butter", 100.0).await?;

        let day = Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();

        insert_entry_at(&db, flour.id, 4.0, day).await?;
        insert_entry_at(&db, flour.id, 6.0, day).await?;
        insert_entry_at(&db, butter.id, 2.0, day).await?;
        insert_entry_at(&db, butter.id, 50.0, next_day).await?;

        let filter = ConsumptionFilter {
            exact_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        let page = consumption_by_material(&db, &filter).await?;
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].material_name, "Flour");
        assert_eq!(page.items[0].total_quantity, 10.0);
        assert_eq!(page.items[0].entry_count, 2);
        assert_eq!(page.items[1].material_name, "Butter");
        assert_eq!(page.items[1].total_quantity, 2.0);

        let all = consumption_by_material(&db, &ConsumptionFilter::default()).await?;
        assert_eq!(all.items[0].material_name, "Butter");
        assert_eq!(all.items[0].total_quantity, 52.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_generate_material_report() -> Result<()> {
        let db = setup_test_db().await?;
        let flour = create_custom_material(&db, "Flour", 5.0, Unit::Sack20).await?;

        for _ in 0..4 {
            record_consumption(&db, flour.id, 10.0, Some(Unit::Kg)).await?;
        }

        let report = generate_material_report(&db, flour.id, Some(3)).await?;
        assert_eq!(report.unit, Unit::Sack20);
        assert_eq!(report.material.quantity, 60.0);
        assert_eq!(report.quantity_in_unit, 3.0);
        assert_eq!(report.total_consumed, 40.0);
        assert_eq!(report.recent_entries.len(), 3);
        assert_eq!(report.stock_level, StockLevel::AboveMinimum);

        let result = generate_material_report(&db, 404, None).await;
        assert!(matches!(result, Err(Error::NotFound { id: 404, .. })));

        let count = Consumption::find().count(&db).await?;
        assert_eq!(count, 4);

        Ok(())
    }
}
