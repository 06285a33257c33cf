//! # nlsql
//!
//! A command-line driver for the natural-language-to-SQL pipeline. It wires the SQLite
//! schema source and executor, a SQLite-backed conversation store and the configured
//! model client into a `QueryPipeline`.
//!
//! Results are printed to stdout as JSON. Logs go to stderr.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{get_config, AppConfig};
use nlsql::context::ContextManager;
use nlsql::providers::db::sqlite::{SqliteKvStore, SqliteProvider};
use nlsql::{
    create_ai_provider, AiProvider, QueryPipeline, QueryRequest, SchemaEncoder, SchemaProvider,
    SecurityValidator,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a configuration file, replacing `config.yml` and its templates.
    #[arg(long, global = true, env = "NLSQL_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and run the generated query.
    Ask(AskArgs),
    /// Print the encoded schema of the configured database.
    Schema(SchemaArgs),
    /// Check a SQL statement against the security policy.
    Validate(ValidateArgs),
    /// Inspect or delete a conversation context.
    Context(ContextArgs),
}

#[derive(Args, Debug)]
struct AskArgs {
    question: String,
    #[arg(long, default_value = "default")]
    tenant: String,
    /// Continue an existing conversation.
    #[arg(long)]
    context: Option<String>,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Overrides `pipeline.schema_budget`.
    #[arg(long)]
    budget: Option<usize>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    sql: String,
}

#[derive(Args, Debug)]
struct ContextArgs {
    #[command(subcommand)]
    command: ContextCommands,
}

#[derive(Subcommand, Debug)]
enum ContextCommands {
    Show { id: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = get_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Ask(args) => handle_ask(&config, args).await,
        Commands::Schema(args) => handle_schema(&config, args).await,
        Commands::Validate(args) => handle_validate(&config, args),
        Commands::Context(args) => handle_context(&config, args).await,
    }
}

async fn handle_ask(config: &AppConfig, args: AskArgs) -> Result<()> {
    let database = Arc::new(open_database(&config.db_url).await?);
    let ai_provider: Arc<dyn AiProvider> = Arc::from(create_ai_provider(&config.provider)?);

    let pipeline = QueryPipeline::builder()
        .settings(config.pipeline.clone())
        .ai_provider(ai_provider)
        .schema_provider(database.clone())
        .executor(database)
        .context_manager(open_contexts(config).await?)
        .build()?;

    let mut request = QueryRequest::new(args.question, args.tenant);
    if let Some(id) = args.context {
        request = request.with_context(id);
    }

    match pipeline.run(request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            std::process::exit(1);
        }
    }
}

async fn handle_schema(config: &AppConfig, args: SchemaArgs) -> Result<()> {
    let database = open_database(&config.db_url).await?;
    let schema = database.introspect().await?;
    let budget = args.budget.unwrap_or(config.pipeline.schema_budget);

    let encoder = SchemaEncoder::new(config.pipeline.encoder_options());
    println!("{}", encoder.encode(&schema, budget));
    Ok(())
}

fn handle_validate(config: &AppConfig, args: ValidateArgs) -> Result<()> {
    let validator = SecurityValidator::new(config.pipeline.security);
    let violations = validator.validate_all(&args.sql);

    if violations.is_empty() {
        println!("OK");
        return Ok(());
    }
    for violation in &violations {
        println!("{violation}");
    }
    std::process::exit(1);
}

async fn handle_context(config: &AppConfig, args: ContextArgs) -> Result<()> {
    let contexts = open_contexts(config).await?;

    match args.command {
        ContextCommands::Show { id } => {
            let context = contexts.get(&id).await?;
            let remaining = contexts.remaining_ttl(&id).await?;
            let output = serde_json::json!({
                "context": context,
                "expires_in_secs": remaining.map(|d| d.num_seconds()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        ContextCommands::Delete { id } => {
            contexts.delete(&id).await?;
            info!("Deleted context '{id}'.");
            println!("Deleted {id}");
        }
    }
    Ok(())
}

async fn open_database(db_url: &str) -> Result<SqliteProvider> {
    ensure_parent_dir(db_url)?;
    SqliteProvider::new(db_url)
        .await
        .with_context(|| format!("Failed to open database '{db_url}'"))
}

async fn open_contexts(config: &AppConfig) -> Result<ContextManager> {
    ensure_parent_dir(&config.context_db_url)?;
    let store = SqliteKvStore::open(&config.context_db_url)
        .await
        .with_context(|| format!("Failed to open context store '{}'", config.context_db_url))?;
    Ok(ContextManager::new(Arc::new(store)).with_ttl_secs(config.pipeline.context_ttl_secs))
}

fn ensure_parent_dir(db_url: &str) -> Result<()> {
    if db_url == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(db_url).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
