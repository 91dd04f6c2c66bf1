//! zspatial CLI
//!
//! Command-line interface for a spatial index:
//! - Place, look up and remove keys
//! - Query rectangles
//! - Render the Z-order layout of a small grid

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zspatial::config::{generate_default_config, Backend, Config, LoggingConfig};
use zspatial::{
    GridView, IndexConfig, KvStore, MemoryStore, Point, Rect, SpatialIndex, SqliteStore,
};

#[derive(Parser)]
#[command(name = "zspatial")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Two-dimensional spatial index over an ordered key-value store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Place a key at a point, replacing its previous location
    Set {
        key: String,
        x: u32,
        y: u32,
    },

    /// Show the location of a key
    Get { key: String },

    /// Remove a key's location
    Remove { key: String },

    /// List keys inside the half-open rectangle [x0, x1) x [y0, y1)
    Query {
        x0: u64,
        y0: u64,
        x1: u64,
        y1: u64,
    },

    /// Remove every entry of the index
    Clear,

    /// Number of keys with a location
    Count,

    /// Print the Z-index of every cell of a 2^levels grid
    Grid {
        /// Side of the grid as a power of two (at most 8)
        #[arg(short, long, default_value = "3")]
        levels: u32,
        /// Only show cells inside x0,y0,x1,y1
        #[arg(short, long, value_parser = parse_rect)]
        rect: Option<Rect>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);
    tracing::debug!(
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_dir,
        prefix = %config.index.prefix,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }

        Commands::Grid { levels, rect } => {
            let mut view = GridView::new(levels);
            if let Some(rect) = rect {
                view = view.highlight(rect);
            }
            print!("{}", view);
        }

        command => {
            let index_config = IndexConfig::from_settings(&config.index)?;
            match config.storage.backend {
                Backend::Sqlite => {
                    let store = SqliteStore::open(Path::new(&config.storage.data_dir))
                        .with_context(|| {
                            format!("opening store in {}", config.storage.data_dir)
                        })?;
                    run(&SpatialIndex::new(store, index_config)?, command, cli.format)?;
                }
                Backend::Memory => {
                    tracing::warn!("Memory backend selected; nothing persists after exit");
                    let store = MemoryStore::new();
                    run(&SpatialIndex::new(store, index_config)?, command, cli.format)?;
                }
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zspatial={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so JSON on stdout stays parseable
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run<S: KvStore>(
    index: &SpatialIndex<S>,
    command: Commands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Commands::Set { key, x, y } => {
            let point = Point::new(x, y);
            index.set_location(key.as_bytes(), point)?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "key": key, "x": x, "y": y, "z": point.z() })
                ),
                OutputFormat::Table => println!("Set {} at {}", key, point),
            }
        }

        Commands::Get { key } => {
            let location = index.get_location(key.as_bytes())?;
            match (format, location) {
                (OutputFormat::Json, Some(p)) => println!(
                    "{}",
                    serde_json::json!({ "key": key, "x": p.x, "y": p.y, "z": p.z() })
                ),
                (OutputFormat::Json, None) => {
                    println!("{}", serde_json::json!({ "key": key, "location": null }))
                }
                (OutputFormat::Table, Some(p)) => println!("{} at {} (z={})", key, p, p.z()),
                (OutputFormat::Table, None) => {
                    eprintln!("No location for {}", key);
                    std::process::exit(1);
                }
            }
        }

        Commands::Remove { key } => {
            let removed = index.remove_location(key.as_bytes())?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "key": key, "removed": removed }))
                }
                OutputFormat::Table if removed => println!("Removed {}", key),
                OutputFormat::Table => println!("{} had no location", key),
            }
        }

        Commands::Query { x0, y0, x1, y1 } => {
            let rect = Rect::new((x0, y0), (x1, y1));
            let (found, stats) = index.get_in_rectangle_with_stats(&rect)?;
            let z_range = index.z_range(&rect);

            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = found
                        .iter()
                        .map(|f| {
                            serde_json::json!({
                                "key": String::from_utf8_lossy(&f.key),
                                "x": f.point.x,
                                "y": f.point.y,
                                "z": f.z,
                            })
                        })
                        .collect();
                    let body = serde_json::json!({
                        "rect": rect,
                        "results": rows,
                        "z_range": z_range,
                        "stats": {
                            "scans": stats.scans,
                            "examined": stats.examined,
                            "jumps": stats.jumps,
                        },
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                OutputFormat::Table => {
                    if found.is_empty() {
                        println!("No keys in {}", rect);
                    } else {
                        println!("{:<24} {:<16} {}", "Key", "Point", "Z");
                        println!("{}", "-".repeat(60));
                        for f in &found {
                            println!(
                                "{:<24} {:<16} {}",
                                String::from_utf8_lossy(&f.key),
                                f.point.to_string(),
                                f.z
                            );
                        }
                    }
                    println!();
                    println!(
                        "{} found, {} examined in {} scans ({} jumps)",
                        found.len(),
                        stats.examined,
                        stats.scans,
                        stats.jumps
                    );
                    if let Some((lo, hi)) = z_range {
                        println!("Z-index range scanned: {}..={}", lo, hi);
                    }
                }
            }
        }

        Commands::Clear => {
            index.clear()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "cleared": true })),
                OutputFormat::Table => println!("Index cleared"),
            }
        }

        Commands::Count => {
            let count = index.len()?;
            let prefix = &index.config().prefix;
            let bits = index.curve().bits();
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "count": count, "prefix": prefix, "bits": bits })
                ),
                OutputFormat::Table => {
                    println!("{} keys in {:?} ({}-bit domain)", count, prefix, bits)
                }
            }
        }

        // Handled in main without opening a store
        Commands::Grid { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u64>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        &[x0, y0, x1, y1] => Ok(Rect::new((x0, y0), (x1, y1))),
        _ => Err(format!("expected x0,y0,x1,y1, got {:?}", s)),
    }
}
