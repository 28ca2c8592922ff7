use bakery_stock::{
    config::{database, seed},
    core::{material, report::format_quantity},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load seed data
    let seed_config = seed::load_default_config()
        .inspect_err(|e| error!("Failed to load seed configuration: {}", e))?;

    // 4. Open the database and make sure the schema exists
    let database_url = database::get_database_url();
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to open database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Seed materials and products that are not there yet
    let outcome = seed::seed_database(&db, &seed_config)
        .await
        .inspect_err(|e| error!("Failed to seed database: {}", e))?;
    info!(
        materials = outcome.materials_created,
        products = outcome.products_created,
        "Seeding finished"
    );

    // 6. Report materials that need restocking
    let low_stock = material::get_materials_at_or_below_minimum(&db).await?;
    if low_stock.is_empty() {
        info!("All materials are above their minimum");
    }
    for item in low_stock {
        let unit = item.display_unit()?;
        warn!(
            material = %item.name,
            quantity = %format_quantity(item.quantity, unit),
            minimum = %format_quantity(item.minimum_quantity, unit),
            "Material at or below minimum"
        );
    }

    Ok(())
}
