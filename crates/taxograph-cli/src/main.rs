mod logging;
mod serve;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde_json::json;
use taxograph_core::config::{Config, ConfigOverrides, DEFAULT_CONFIG_FILE};
use taxograph_core::pipeline::{execute, GraphPipeline};
use taxograph_core::store::{export_gephi_csv, SqliteStore};
use tracing::info;

use serve::ServeConfig;

#[derive(Parser)]
#[command(name = "taxograph")]
#[command(about = "Restructure a macrotopic/topic/subtopic taxonomy into a graph", long_about = None)]
struct Cli {
    /// Config file to use instead of ./taxograph.toml or the user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overrides the configured one
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default taxograph.toml and create the database schema
    Init {
        /// Overwrite an existing taxograph.toml
        #[arg(long)]
        force: bool,
    },
    /// Load macrotopic,topic,subtopic records from a CSV file
    Import {
        /// CSV file with a `macrotopic,topic,subtopic` header
        file: PathBuf,
    },
    /// Restructure all unprocessed rows into a new graph run
    Run,
    /// Show the graph the next run would write, without writing it
    Preview,
    /// List committed runs, most recent first
    Runs,
    /// Write a run as Gephi spreadsheet CSV files
    Export {
        /// Run id (defaults to the latest run)
        #[arg(long)]
        run: Option<String>,
        /// Output directory (defaults to the configured export dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Serve committed graphs as JSON for graph viewers
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let overrides = ConfigOverrides { db_path: cli.db };
    let config = Config::load_with(cli.config.as_deref(), &overrides)
        .wrap_err("loading configuration")?;

    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Init { force } => init(&config, force)?,
        Commands::Import { file } => {
            let mut store = SqliteStore::open(&config.database.path)?;
            let count = store
                .import_csv(&file)
                .wrap_err_with(|| format!("importing {}", file.display()))?;
            store.close()?;
            info!(records = count, "import finished");
            println!("Imported {} taxonomy records into {}", count, config.database.path);
        }
        Commands::Run => {
            let result = execute(&config.database);
            println!("{}", serde_json::to_string_pretty(&result.to_response())?);
            return Ok(ExitCode::from(result.exit_code() as u8));
        }
        Commands::Preview => preview(&config)?,
        Commands::Runs => {
            let store = SqliteStore::open(&config.database.path)?;
            let runs = store.list_runs()?;
            if runs.is_empty() {
                println!("No runs found. Use 'taxograph run' to create one.");
            }
            for run in runs {
                println!(
                    "{}  {}  {} nodes  {} edges",
                    run.id,
                    run.created_at.to_rfc3339(),
                    run.node_count,
                    run.edge_count
                );
            }
        }
        Commands::Export { run, dir } => {
            let dir = dir.unwrap_or_else(|| config.export.dir_path());
            export(&config, run, &dir)?;
        }
        Commands::Serve { port } => {
            let serve_config = ServeConfig {
                host: config.serve.host.clone(),
                port: port.unwrap_or(config.serve.port),
                db_path: PathBuf::from(&config.database.path),
            };
            tokio::runtime::Runtime::new()?.block_on(serve::start_server(serve_config))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init(config: &Config, force: bool) -> Result<()> {
    let config_path = Path::new(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !force {
        println!("{} already exists, leaving it untouched", DEFAULT_CONFIG_FILE);
    } else {
        fs::write(config_path, Config::default_config_string())
            .wrap_err_with(|| format!("writing {}", DEFAULT_CONFIG_FILE))?;
        println!("Wrote {}", DEFAULT_CONFIG_FILE);
    }

    SqliteStore::open(&config.database.path)?.close()?;
    println!("Database ready at {}", config.database.path);
    Ok(())
}

fn preview(config: &Config) -> Result<()> {
    let pipeline = GraphPipeline::new(SqliteStore::open(&config.database.path)?);
    let preview = match pipeline.prepare()? {
        Some(batch) => json!({
            "rows": batch.rows.len(),
            "graph": batch.graph,
            "processed": batch.processed,
        }),
        None => json!({ "rows": 0 }),
    };
    pipeline.into_inner().close()?;

    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn export(config: &Config, run: Option<String>, dir: &Path) -> Result<()> {
    let store = SqliteStore::open(&config.database.path)?;
    let run_id = match run {
        Some(id) => id,
        None => store
            .latest_run()?
            .map(|run| run.id)
            .ok_or_else(|| eyre!("no committed runs, use 'taxograph run' first"))?,
    };

    let graph = store.load_graph(&run_id)?;
    let files = export_gephi_csv(&graph, dir)?;
    store.close()?;

    info!(run_id = %run_id, nodes = graph.nodes.len(), edges = graph.edges.len(), "graph exported");
    println!("Nodes: {}", files.nodes_path.display());
    println!("Edges: {}", files.edges_path.display());
    Ok(())
}
