mod app;
mod output;
mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use toolcast_config::{
    ack_min_delay, apply_all_defaults, config_dir, config_file_path, listen_addr,
    load_and_prepare, validate, write_config, ToolcastConfig,
};
use toolcast_executor::PlannedBatch;
use toolcast_logging::{init_logger, LoggerOptions};

use app::App;
use transport::ConsoleTransport;

#[derive(Parser)]
#[command(name = "toolcast")]
#[command(about = "toolcast — chat-driven tool dispatch with provider fallback")]
#[command(version)]
struct Cli {
    /// Config file (default: $TOOLCAST_CONFIG_DIR/config.yaml or ~/.toolcast/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway and the tool bridge
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one planned batch (JSON file, or stdin when omitted) and print the results
    Run { file: Option<PathBuf> },
    /// List registered tools
    Tools {
        /// Print the planner-facing JSON schemas instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check the config file and report problems
    Validate,
    /// Write a config file with every default filled in
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    match cli.command {
        Commands::Validate => return validate_command(&path).await,
        Commands::Init { force } => return init_command(&path, force).await,
        _ => {}
    }

    let mut config = load_and_prepare(&path).await?;
    init_logging(&config)?;

    match cli.command {
        Commands::Serve { port, bind } => {
            let server = config.server.get_or_insert_with(Default::default);
            if port.is_some() {
                server.port = port;
            }
            if bind.is_some() {
                server.bind = bind;
            }
            run_server(config).await?;
        }
        Commands::Run { file } => run_batch(&config, file.as_deref()).await?,
        Commands::Tools { json } => list_tools(&config, json)?,
        Commands::Validate | Commands::Init { .. } => {}
    }

    Ok(())
}

fn init_logging(config: &ToolcastConfig) -> Result<()> {
    let logging = config.logging.clone().unwrap_or_default();
    let defaults = LoggerOptions::default();
    init_logger(&LoggerOptions {
        level: logging.level.unwrap_or(defaults.level),
        dir: logging.dir.map(PathBuf::from),
        console_json: logging.console_json.unwrap_or(defaults.console_json),
    })
}

async fn run_server(config: ToolcastConfig) -> Result<()> {
    let addr = listen_addr(&config)?;
    let transport = Arc::new(ConsoleTransport::new(ack_min_delay(&config)));
    let app = App::build(&config, transport)?;

    info!(addr = %addr, "Starting toolcast");

    let signal = app.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(error = %e, "Cannot listen for ctrl-c"),
        }
        signal.cancel();
    });

    app.serve(addr).await
}

async fn run_batch(config: &ToolcastConfig, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read batch file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("cannot read batch from stdin")?;
            raw
        }
    };
    let batch: PlannedBatch = serde_json::from_str(&raw).context("invalid planned batch")?;

    let transport = Arc::new(ConsoleTransport::new(ack_min_delay(config)));
    let app = App::build(config, transport)?;
    let outcome = app.bridge.run_batch(&batch.calls, &batch.context()).await;
    app.bridge.deliver(&batch.chat_id, &outcome.segments).await;

    eprintln!("{}", serde_json::to_string_pretty(&outcome.results)?);
    Ok(())
}

fn list_tools(config: &ToolcastConfig, json: bool) -> Result<()> {
    let transport = Arc::new(ConsoleTransport::new(ack_min_delay(config)));
    let app = App::build(config, transport)?;
    let declarations = app.registry.declarations();

    if json {
        let schemas: Vec<_> = declarations.iter().map(|d| d.to_json_schema()).collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = declarations
        .iter()
        .map(|d| {
            vec![
                d.name.clone(),
                d.required_params().collect::<Vec<_>>().join(", "),
                d.description.clone(),
            ]
        })
        .collect();
    print!("{}", output::render_table(&["Tool", "Required", "Description"], &rows));
    Ok(())
}

async fn validate_command(path: &Path) -> Result<()> {
    match load_and_prepare(path).await {
        Ok(config) => {
            output::print_report(&validate(&config));
            output::note_success(&format!("{} is valid", path.display()));
            Ok(())
        }
        Err(e) => {
            output::note_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

async fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        output::note_warn(&format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        ));
        return Ok(());
    }
    let config = apply_all_defaults(ToolcastConfig::default());
    let report = validate(&config);
    if !output::print_report(&report) {
        anyhow::bail!("default config failed validation");
    }
    write_config(&config, path).await?;
    output::note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
