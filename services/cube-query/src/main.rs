//! Command line front end for the geocube loading engine.
//!
//! Lists products and measurements, describes a query without reading
//! pixels, and loads a query tile by tile, printing one JSON summary line
//! per assembled tile.

mod catalog_file;
mod request;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use grid_processor::{AssembledTile, Loader, LoaderConfig, ZarrRasterSource};
use storage::{Catalog, PgCatalog};

use request::QueryArgs;

#[derive(Parser, Debug)]
#[command(name = "cube-query")]
#[command(about = "Load gridded data cubes from indexed raster datasets")]
struct Args {
    /// PostgreSQL catalog connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// YAML catalog file (used instead of the database)
    #[arg(long, env = "CUBE_CATALOG_FILE")]
    catalog_file: Option<String>,

    /// Directory that dataset source paths are relative to
    #[arg(long, env = "CUBE_RASTER_ROOT", default_value = ".")]
    raster_root: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List products
    Products,
    /// List the measurements of a product
    Measurements {
        /// Product name
        product: String,
    },
    /// Describe the shape of a query without reading pixels
    Describe(QueryArgs),
    /// Load a query and print a summary of every tile
    Load {
        #[command(flatten)]
        query: QueryArgs,

        /// Tiles computed concurrently (default: CUBE_LOAD_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Include pixel values in the output
        #[arg(long)]
        with_data: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = LoaderConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!("invalid loader configuration: {}", e))?;
    info!(
        concurrency = config.concurrency,
        time_grouping = %config.time_grouping,
        ordering = %config.ordering,
        "Loaded configuration"
    );

    let catalog = open_catalog(&args).await?;
    let source = Arc::new(ZarrRasterSource::new(&args.raster_root));
    let loader = Loader::new(catalog, source, config);

    match args.command {
        Command::Products => {
            let products = loader.list_products().await?;
            let listing: Vec<_> = products
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "description": p.description,
                        "fusion": p.fusion.as_str(),
                        "crs": p.grid.as_ref().map(|g| g.crs.to_string()),
                        "measurements": p.measurements.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Measurements { product } => {
            let measurements = loader.list_measurements(&product).await?;
            println!("{}", serde_json::to_string_pretty(&measurements)?);
        }
        Command::Describe(query) => {
            let descriptor = loader.describe(&query.to_request()?).await?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Command::Load {
            query,
            concurrency,
            with_data,
        } => {
            let plan = loader.load(&query.to_request()?).await?;
            for warning in plan.warnings() {
                warn!(warning = %warning, "Query warning");
            }

            let concurrency = concurrency.unwrap_or_else(|| plan.default_concurrency());
            let mut tiles = plan.stream(concurrency);
            let mut count = 0usize;
            while let Some(tile) = tiles.next().await {
                let tile = tile?;
                println!("{}", serde_json::to_string(&tile_summary(&tile, with_data))?);
                count += 1;
            }
            info!(tiles = count, "Load complete");
        }
    }

    Ok(())
}

async fn open_catalog(args: &Args) -> Result<Arc<dyn Catalog>> {
    if let Some(path) = &args.catalog_file {
        info!(path = %path, "Using catalog file");
        return Ok(Arc::new(catalog_file::load_catalog_file(path).await?));
    }

    let url = args
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow!("either --database-url (DATABASE_URL) or --catalog-file is required"))?;
    let catalog = PgCatalog::connect(url).await?;
    catalog.migrate().await?;
    Ok(Arc::new(catalog))
}

fn tile_summary(tile: &AssembledTile, with_data: bool) -> serde_json::Value {
    let measurements: Vec<_> = tile
        .measurements
        .iter()
        .map(|m| {
            let mut entry = json!({
                "name": m.name,
                "dtype": m.dtype.as_str(),
                "nodata": m.nodata,
                "valid": m.valid_count(),
            });
            if with_data {
                // JSON has no NaN; nodata pixels are written as null.
                entry["data"] = json!(m
                    .data
                    .iter()
                    .map(|v| (!m.is_nodata(*v)).then_some(*v))
                    .collect::<Vec<_>>());
            }
            entry
        })
        .collect();

    json!({
        "time": tile.key.time.to_rfc3339(),
        "tile": [tile.key.tile.x, tile.key.tile.y],
        "shape": [tile.shape.0, tile.shape.1],
        "crs": tile.crs.to_string(),
        "extent": tile.extent,
        "geotransform": tile.geotransform,
        "datasets": tile.datasets.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        "measurements": measurements,
        "warnings": tile.warnings,
    })
}
