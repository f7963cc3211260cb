use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use stepflow_core::config::AppConfig;
use stepflow_core::definition::GraphDefinition;
use stepflow_core::event::EventBus;
use stepflow_core::types::StateMap;
use stepflow_engine::Graph;
use stepflow_tools::builtin::code_review;
use stepflow_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "stepflow", version, about = "Graph-based workflow engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stepflow.toml", env = "STEPFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Run a graph definition once and print the outcome as JSON
    Run {
        /// Graph definition (JSON). Defaults to the built-in code review workflow.
        definition: Option<PathBuf>,
        /// Initial state as a JSON object
        #[arg(long, conflicts_with = "state_file")]
        state: Option<String>,
        /// Read the initial state from a JSON file
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
    /// List registered tools
    Tools,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stepflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "stepflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let registry = Arc::new(ToolRegistry::with_builtins().with_timeout(config.tools.timeout_secs));

    match cli.command {
        Some(Commands::Serve) => {
            info!(bind = %config.gateway.bind, "Starting HTTP gateway");
            let event_bus = Arc::new(EventBus::default());
            let server = stepflow_gateway::GatewayServer::new(config, registry, event_bus);
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Run {
            definition,
            state,
            state_file,
        }) => {
            let definition = match definition {
                Some(path) => read_definition(&path)?,
                None => code_review::workflow_definition(),
            };
            let initial = read_initial_state(state.as_deref(), state_file.as_deref())?;
            let graph = Graph::from_definition(&definition, &*registry, &config.engine)?;

            match graph.run(initial).await {
                Ok(outcome) => {
                    let report = serde_json::json!({
                        "status": "completed",
                        "final_state": outcome.final_state(),
                        "execution_log": outcome.log,
                        "termination": outcome.termination,
                        "steps_executed": outcome.steps_executed,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Err(err) => {
                    error!(step = %err.step, error = %err.source, "Run failed");
                    let report = serde_json::json!({
                        "status": "failed",
                        "error": err.to_string(),
                        "state": err.state.snapshot(),
                        "execution_log": err.log,
                        "steps_executed": err.steps_executed,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    anyhow::bail!("run failed at step '{}'", err.step);
                }
            }
        }
        Some(Commands::Tools) => {
            for def in registry.definitions() {
                println!("{:<26} {}", def.name, def.description);
            }
        }
        Some(Commands::Config) => {
            println!("{}", config.to_toml_string()?);
        }
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        debug!(path = %path.display(), "Loading config");
        Ok(AppConfig::load(path)?)
    } else {
        debug!(path = %path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

fn read_definition(path: &Path) -> anyhow::Result<GraphDefinition> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph definition {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing graph definition {}", path.display()))
}

fn read_initial_state(inline: Option<&str>, file: Option<&Path>) -> anyhow::Result<StateMap> {
    let text = match (inline, file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading initial state {}", path.display()))?,
        (None, None) => return Ok(StateMap::new()),
    };
    match serde_json::from_str::<serde_json::Value>(&text).context("parsing initial state")? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("initial state must be a JSON object, got {}", other),
    }
}
