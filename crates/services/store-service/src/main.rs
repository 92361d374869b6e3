//! Store Service - schema management and demo data for the store database.

use clap::{Parser, Subcommand};

use store_service_lib::config::StoreServiceConfig;
use store_service_lib::repository::QueryFilters;
use store_service_lib::MigrateAction;

#[derive(Parser)]
#[command(name = "store-service")]
#[command(about = "Store data-access service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Insert a demo catalog, customer and delivery man
    Seed,
    /// Print one page of the product catalog
    Products {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        size: Option<u64>,
        /// Sort column: id, name, price or quantity
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value = "asc")]
        direction: String,
        /// Search as `column=value`
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = StoreServiceConfig::from_env();
    common::telemetry::init_tracing(&config.service.log_level);
    tracing::debug!(service = %config.service.service_name, "Configuration loaded");

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            store_service_lib::run_migrations(migrate_action).await?;
        }
        Commands::Seed => {
            store_service_lib::seed().await?;
        }
        Commands::Products {
            page,
            size,
            sort,
            direction,
            search,
        } => {
            let mut filters = QueryFilters::page(page, 0);
            if let Some(column) = sort {
                filters = filters.sort(column, direction);
            }
            if let Some((column, value)) = search.as_deref().and_then(|s| s.split_once('=')) {
                filters = filters.search(column, value);
            }
            store_service_lib::list_products(filters, size).await?;
        }
    }

    Ok(())
}
