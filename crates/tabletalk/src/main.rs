//! tabletalk: ask questions about a database in plain language.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabletalk::config::{default_config_path, load_config};
use tabletalk::provider::build_provider;
use tabletalk::{
    CatalogBuilder, ExecutionPolicy, HelpfulError, Orchestrator, PipelineSettings, SessionOptions,
};
use tabletalk_db::{DbConfig, QueryStore, SqlStore};
use tabletalk_logging::LogConfig;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tabletalk", about = "Ask questions about a relational database in plain language")]
struct Cli {
    /// Database connection string (sqlite:... or postgres://...)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Config file (default: ~/.tabletalk/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generation backend: ollama or claude (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Model name (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print each generated query and its result table
    #[arg(long)]
    show_sql: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = tabletalk_logging::init_logging(LogConfig {
        app_name: "tabletalk",
        verbose: cli.verbose,
        interactive: true,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    if cli.config.is_some() && !config_path.exists() {
        return Err(HelpfulError::new(format!("Config file not found: {}", config_path.display()))
            .with_suggestion("TRY: Omit --config to use built-in defaults")
            .into());
    }
    let mut config =
        load_config(&config_path).map_err(|e| HelpfulError::invalid_config(&config_path, &e))?;

    if let Some(provider) = cli.provider {
        config.llm.provider = provider;
    }
    if cli.model.is_some() {
        config.llm.model = cli.model;
    }
    config
        .validate()
        .map_err(|e| HelpfulError::invalid_config(&config_path, &e))?;

    let url = cli.database_url.ok_or_else(HelpfulError::missing_database_url)?;
    let db_config = DbConfig::from_url(&url).map_err(|e| HelpfulError::invalid_database_url(&e))?;
    let redacted = db_config.redacted_url();
    let store = SqlStore::open(db_config)
        .await
        .map_err(|e| HelpfulError::unreachable_store(&redacted, &e))?
        .with_statement_timeout(config.execution.timeout());
    info!(url = %redacted, "Connected to store");

    let builder = CatalogBuilder::new()
        .with_enum_hint_threshold(config.catalog.enum_hint_threshold)
        .with_timeout(config.catalog.introspection_timeout());
    let catalog = builder
        .build(&store)
        .await
        .map_err(|e| HelpfulError::introspection_failed(&e))?;
    if catalog.is_empty() {
        warn!("The database has no tables; only schema questions can be answered");
    }

    let kind = config
        .llm
        .provider_kind()
        .map_err(|e| HelpfulError::invalid_config(&config_path, &e))?;
    let llm = build_provider(kind, &config.llm)
        .map_err(|e| HelpfulError::provider_unavailable(kind.as_str(), &e))?;
    if !llm.is_ready() {
        warn!(provider = llm.name(), "Generation backend reports it is not ready");
    }

    println!(
        "Connected to {} ({} tables). Using {} ({}).",
        store.dialect().display_name(),
        catalog.tables().len(),
        llm.name(),
        llm.model()
    );
    println!("Ask a question, ':schema' to show tables, ':refresh' to reload them, 'exit' to quit.");

    let settings = PipelineSettings {
        generation_timeout: Some(config.llm.timeout()),
        context_row_limit: config.execution.context_row_limit,
        policy: ExecutionPolicy {
            read_only: config.execution.read_only,
        },
    };
    let mut orchestrator = Orchestrator::new(Arc::new(store), llm, catalog)
        .with_settings(settings)
        .with_catalog_builder(builder);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let summary = orchestrator
        .run_session(stdin, stdout, SessionOptions { show_sql: cli.show_sql })
        .await
        .context("Operator loop failed")?;

    println!(
        "Goodbye. {} questions, {} errors.",
        summary.questions, summary.errors
    );
    Ok(())
}
