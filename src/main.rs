//! sqlrag CLI entry point

use clap::{Parser, Subcommand};
use sqlrag::{
    config::Config,
    db::PgDatabase,
    error::Result,
    schema::{with_placeholder, SchemaExtractor, SchemaSource},
    server, startup, AppContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sqlrag")]
#[command(version, about = "Ask questions of a PostgreSQL database in plain language", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SQLRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize all components and serve the HTTP API (default)
    Serve {
        /// Address to bind, overriding the config
        #[arg(long)]
        bind: Option<String>,
    },

    /// Extract schema documents from the database and print them
    Extract {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize all components and answer one question
    Query {
        /// The natural-language question
        query: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (json_layer, text_layer) = if cli.log_json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => handle_serve(config, bind).await,
        Commands::Extract { json } => handle_extract(config, json).await,
        Commands::Query { query } => handle_query(config, &query).await,
    }
}

/// Run startup, giving up early on Ctrl-C
async fn initialize(config: Config) -> Result<AppContext> {
    startup::cancellable(startup::initialize(config), server::shutdown_signal()).await
}

async fn handle_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let bind = config.server.bind.clone();

    let ctx = Arc::new(initialize(config).await?);
    server::serve(ctx, &bind, server::shutdown_signal()).await
}

async fn handle_extract(config: Config, json: bool) -> Result<()> {
    info!(
        "Database URL (password masked): {}",
        config.database.masked_url()
    );
    let db = PgDatabase::connect_lazy(&config.database);
    let documents = with_placeholder(SchemaExtractor::new(db.pool().clone()).extract().await?);

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    for (i, doc) in documents.iter().enumerate() {
        println!("--- Document {} ({}) ---", i + 1, doc.source_type);
        println!("{}\n", doc.content);
    }
    Ok(())
}

async fn handle_query(config: Config, query: &str) -> Result<()> {
    let ctx = initialize(config).await?;
    let result = ctx.pipeline()?.handle_query(query).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
