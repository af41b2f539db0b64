// Seeding tool: opens the entity store and bulk-writes a course catalog,
// either the built-in demo data or a TOML file passed via --catalog.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use corkboard::config::{Cli, Config};
use corkboard::courses::{self, Catalog};
use corkboard::store::SqliteStore;

const DEMO_CATALOG: &str = include_str!("../demos/catalog.toml");

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Open the entity store
    let store = SqliteStore::open(config.db_path())?;

    let catalog = match &cli.catalog {
        Some(path) => {
            tracing::info!("Seeding catalog from {}", path.display());
            Catalog::from_toml(&std::fs::read_to_string(path)?)?
        }
        None => {
            tracing::info!("Seeding built-in demo catalog");
            Catalog::from_toml(DEMO_CATALOG)?
        }
    };

    let report = courses::seed_catalog(&store, &catalog)?;
    tracing::info!(
        "Seed complete: {} courses, {} lessons",
        report.courses,
        report.lessons
    );

    Ok(())
}
