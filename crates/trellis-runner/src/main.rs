//! Trellis runner
//!
//! Loads an application configuration, builds its handlers and dispatches
//! events read from a file or stdin.

mod engine;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use trellis_action::ActionRegistry;
use trellis_config::AppConfig;
use trellis_data::{CompositeResolver, ExpressionFactory, Resolver, SimpleScope};
use trellis_log::LogConfig;
use trellis_trigger::ActionOutcome;

use crate::engine::Engine;

#[derive(Parser)]
#[command(name = "trellis", version, about = "Event-driven automation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch one event to a handler
    Run {
        /// Application configuration file
        #[arg(short, long, env = "TRELLIS_CONFIG")]
        config: PathBuf,

        /// Handler as `<trigger>.<handler>`, or just `<trigger>` when it has one handler
        #[arg(long)]
        handler: String,

        /// Event payload (JSON); `-` or omitted reads stdin
        #[arg(short, long)]
        event: Option<PathBuf>,

        /// Dispatch deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Pretty-print the outcomes
        #[arg(long)]
        pretty: bool,
    },

    /// Load the configuration and build every handler without dispatching
    Check {
        #[arg(short, long, env = "TRELLIS_CONFIG")]
        config: PathBuf,
    },

    /// Evaluate one expression against an event
    Eval {
        /// Expression, e.g. `=$.order.total` or `{{ name | upper }}`
        #[arg(long)]
        expr: String,

        /// Event payload (JSON); `-` or omitted reads stdin
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env();
    log_config.init()?;
    let logger = log_config.root_logger();

    match cli.command {
        Command::Run {
            config,
            handler,
            event,
            timeout_ms,
            pretty,
        } => {
            let app = load_app(&config)?;
            let registry = ActionRegistry::with_builtins(&logger);
            let engine = Engine::new(&app, &registry, &logger)?;

            let name = qualify(&engine, &handler)?;
            let handler = engine
                .handler(&name)
                .with_context(|| format!("no handler named '{}'", name))?;
            let event = read_event(event.as_deref())?;

            let outcomes = engine
                .dispatch(handler, event, timeout_ms.map(Duration::from_millis))
                .await?;
            let report = Value::Array(outcomes.iter().map(outcome_json).collect());

            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", out);
        }
        Command::Check { config } => {
            let app = load_app(&config)?;
            let registry = ActionRegistry::with_builtins(&logger);
            let engine = Engine::new(&app, &registry, &logger)?;

            for trigger in engine.triggers() {
                info!(trigger = %trigger.id, handlers = trigger.handlers.len(), "Trigger ok");
            }
            for name in engine.handler_names() {
                println!("{}", name);
            }
        }
        Command::Eval { expr, event } => {
            let event = read_event(event.as_deref())?;
            let resolver: Arc<dyn Resolver> = Arc::new(CompositeResolver::standard());
            let exprs = ExpressionFactory::new(resolver);

            let compiled = exprs.new_expr(&expr)?;
            let value = compiled.eval(&SimpleScope::from_value(event))?;
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}

fn load_app(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Expand a bare trigger id to its only handler
fn qualify(engine: &Engine, name: &str) -> Result<String> {
    if name.contains('.') {
        return Ok(name.to_string());
    }
    let prefix = format!("{}.", name);
    let matches: Vec<_> = engine
        .handler_names()
        .into_iter()
        .filter(|n| n.starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.to_string()),
        [] => bail!("no handlers for trigger '{}'", name),
        _ => bail!(
            "trigger '{}' has {} handlers, pick one of: {}",
            name,
            matches.len(),
            matches.join(", ")
        ),
    }
}

fn read_event(path: Option<&Path>) -> Result<Value> {
    let content = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read event {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    parse_event(&content)
}

/// Parse an event payload; blank input is an empty object
fn parse_event(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(content).context("event is not valid JSON")
}

fn outcome_json(outcome: &ActionOutcome) -> Value {
    match outcome {
        ActionOutcome::Completed(output) => json!({"status": "completed", "output": output}),
        ActionOutcome::Skipped => json!({"status": "skipped"}),
        ActionOutcome::Failed(err) => json!({"status": "failed", "error": err.to_string()}),
    }
}
