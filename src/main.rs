use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vct_leaderboards::api::{build_router, state::AppState};
use vct_leaderboards::config::AppConfig;
use vct_leaderboards::leaderboards::{self, catalog, LeaderboardKind, RunOptions};
use vct_leaderboards::source::load_raw;
use vct_leaderboards::storage::{build_sinks, terminal::render_preview, ExportFormat};
use vct_leaderboards::views::{longest_maps, Relation, ViewStore};

/// Rows shown by the longest-maps preview.
const LONGEST_MAPS: usize = 10;

#[derive(Parser)]
#[command(name = "vct-leaderboards")]
#[command(about = "Kill/death leaderboards from Valorant Champions Tour combat logs")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory holding the source files (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute leaderboards and write them to the configured sinks
    Compute {
        /// Minimum distinct matches for thresholded boards
        #[arg(long, allow_negative_numbers = true)]
        min_matches: Option<i64>,

        /// Ranks kept per partition
        #[arg(long, allow_negative_numbers = true)]
        top_n: Option<i64>,

        /// Comma-separated leaderboard names
        #[arg(long, value_delimiter = ',')]
        boards: Vec<String>,

        /// Comma-separated export formats (terminal, csv, jsonl, xlsx, parquet, chart)
        #[arg(long, value_delimiter = ',')]
        format: Vec<ExportFormat>,

        /// Output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Compute leaderboards in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Build the canonical relations and export them
    Views {
        /// Comma-separated export formats
        #[arg(long, value_delimiter = ',')]
        format: Vec<ExportFormat>,

        /// Output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// List the leaderboard catalog
    Catalog,

    /// Compute all leaderboards once and serve them over HTTP
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_tracing(level, cli.json_logs);

    tracing::info!("Starting vct-leaderboards v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Compute {
            min_matches,
            top_n,
            boards,
            format,
            out_dir,
            parallel,
        } => {
            if let Some(min) = min_matches {
                config.leaderboards.min_matches = min;
            }
            if let Some(n) = top_n {
                config.leaderboards.top_n = n;
            }
            if !boards.is_empty() {
                config.leaderboards.boards = boards;
            }
            if !format.is_empty() {
                config.export.formats = format;
            }
            if let Some(dir) = out_dir {
                config.export.out_dir = dir;
            }
            config.leaderboards.parallel |= parallel;
            config.validate().context("Invalid configuration")?;

            let options = RunOptions {
                boards: config.leaderboards.board_kinds()?,
                thresholds: config.leaderboards.thresholds()?,
                parallel: config.leaderboards.parallel,
            };
            let source = config.source.row_source(&config.data_dir);
            let builder = config.source.view_builder();
            let sinks = build_sinks(&config.export.formats, &config.export.storage_config());

            let (_, report) = leaderboards::run(source.as_ref(), &builder, &options, &sinks)
                .context("Leaderboard run failed")?;

            println!("\n=== Run Summary ===");
            println!("Kill events:      {}", report.kill_events);
            println!(
                "Thresholds:       min_matches={} top_n={}",
                report.thresholds.min_matches(),
                report.thresholds.top_n()
            );
            for board in &report.boards {
                println!("{:<18}{} rows", format!("{}:", board.name), board.rows);
            }
            for board in report.empty_boards() {
                println!("WARNING: {} is empty", board.name);
            }
            println!(
                "Duration:         {} ms",
                (report.finished_at - report.started_at).num_milliseconds()
            );
        }
        Commands::Views { format, out_dir } => {
            if !format.is_empty() {
                config.export.formats = format;
            }
            if let Some(dir) = out_dir {
                config.export.out_dir = dir;
            }
            config.validate().context("Invalid configuration")?;

            let source = config.source.row_source(&config.data_dir);
            let raw = load_raw(source.as_ref()).context("Failed to read sources")?;
            let mut store = ViewStore::new();
            let relations = store
                .refresh(&config.source.view_builder(), &raw)
                .context("Failed to build views")?;

            let sinks = build_sinks(&config.export.formats, &config.export.storage_config());
            for sink in &sinks {
                for relation in Relation::ALL {
                    sink.write(relation.name(), relations.get(relation))?;
                }
                sink.finish()?;
            }

            println!("\n=== Canonical Relations ===");
            for (relation, fingerprint) in relations.fingerprints() {
                println!(
                    "{:<14}{:>8} rows  sha256:{}",
                    relation.name(),
                    relations.get(relation).len(),
                    fingerprint
                );
            }

            let longest = longest_maps(&relations.map_results, LONGEST_MAPS)?;
            print!("{}", render_preview("longest_maps", &longest, LONGEST_MAPS));
        }
        Commands::Catalog => {
            println!("=== Leaderboards ===");
            for def in catalog() {
                let threshold = match def.sample_column {
                    Some(column) => format!("{} >= min_matches", column),
                    None => "-".to_string(),
                };
                println!("{:<18}{}", def.name(), def.description);
                println!("  group by:   {}", def.group_by.join(", "));
                if !def.partition_by.is_empty() {
                    println!("  partition:  {}", def.partition_by.join(", "));
                }
                println!("  threshold:  {}", threshold);
                println!("  limit:      {:?}", def.limit);
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let options = RunOptions {
                boards: LeaderboardKind::ALL.to_vec(),
                thresholds: config.leaderboards.thresholds()?,
                parallel: config.leaderboards.parallel,
            };
            let source = config.source.row_source(&config.data_dir);
            let mut store = ViewStore::new();
            let relations = leaderboards::load_relations(
                source.as_ref(),
                &config.source.view_builder(),
                &mut store,
            )
            .context("Failed to load relations")?;
            let outputs = leaderboards::compute_all(
                &relations,
                &options.boards,
                &options.thresholds,
                options.parallel,
            )?;

            let state = AppState::new(outputs, Arc::clone(&relations), options.thresholds);
            let app = build_router(state, &config.server.cors_origin);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!("Serving leaderboards on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
