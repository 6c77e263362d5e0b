//! A command line sandbox for evaluating, compiling and checking Eel expressions against a JSON or YAML context
//! document.

#![deny(missing_docs)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context as _};
use clap::{Args, Parser, Subcommand};
use eel::{AllowList, Context, EvaluationOptions, ExpressionCache, Interpreter, Map, Value};
use flowquery::OperationResolverBuilder;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
use self::config::{Config, Mode};

/// Eel expression sandbox.
#[derive(Parser)]
#[command(about)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an expression and print the result as JSON.
    Eval(EvalCommand),

    /// Print the fragment an expression compiles to.
    Compile(ExpressionArg),

    /// Check that an expression parses.
    Check(ExpressionArg),
}

#[derive(Args)]
struct ExpressionArg {
    /// The Eel expression.
    expression: String,
}

#[derive(Args)]
struct EvalCommand {
    /// The Eel expression.
    expression: String,

    /// Path to the context document. Files ending in `.yaml` or `.yml` are read as YAML, anything else as JSON.
    #[arg(long)]
    context: Option<PathBuf>,

    /// Evaluator to use. Overrides the configured mode.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Allow calling methods matching this pattern, e.g. `Array.*`.
    ///
    /// Giving any pattern evaluates against a protected context, in which only allowed methods can be called.
    #[arg(long = "allow")]
    allow: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    // Configuration errors are reported after logging is up, using the default filter.
    let config = Config::load(cli.config.as_deref());
    let default_filter = config
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| Config::default().log_level);

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .init();

    let result = config
        .context("Failed to load configuration.")
        .and_then(|config| run(cli.command, &config));
    match result {
        Ok(output) => {
            println!("{}", output);
            debug!("eel-sandbox finished.");
        }
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn run(command: Command, config: &Config) -> anyhow::Result<String> {
    match command {
        Command::Eval(command) => eval(command, config),
        Command::Compile(ExpressionArg { expression }) => Ok(eel::compile(&expression)?),
        Command::Check(ExpressionArg { expression }) => {
            eel::parser::parse(&expression)?;
            Ok("ok".to_string())
        }
    }
}

fn eval(command: EvalCommand, config: &Config) -> anyhow::Result<String> {
    let mut root = match &command.context {
        Some(path) => load_document(path)?,
        None => Value::Null,
    };
    bind_query_function(&mut root)?;

    let context = if command.allow.is_empty() {
        Context::new(root)
    } else {
        info!(patterns = ?command.allow, "Evaluating against a protected context.");
        Context::protected(root, AllowList::from_patterns(&command.allow))
    };

    let options = EvaluationOptions {
        denied_calls: config.denied_calls,
    };
    let mode = command.mode.unwrap_or(config.mode);
    debug!(?mode, expression = %command.expression, "Evaluating expression.");

    let value = match mode {
        Mode::Interpret => Interpreter::new(options).evaluate(&command.expression, &context)?,
        Mode::Compile => {
            let cache = ExpressionCache::new(config.cache_capacity);
            let compiled = cache.get_or_compile(&command.expression)?;
            debug!(fragment = compiled.fragment(), "Compiled expression.");
            compiled.invoke_with(&context, &options)?
        }
    };

    serde_json::to_string_pretty(&value).context("Failed to serialize result.")
}

fn load_document(path: &Path) -> anyhow::Result<Value> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read context file '{}'.", path.display()))?;

    let is_yaml = matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml" | "yml"));
    let value = if is_yaml {
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse '{}' as YAML.", path.display()))?
    } else {
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse '{}' as JSON.", path.display()))?
    };
    Ok(value)
}

/// Binds `q(...)` at the root of the context document, unless the document already defines it.
fn bind_query_function(root: &mut Value) -> anyhow::Result<()> {
    let resolver = OperationResolverBuilder::new()
        .with_core_operations()
        .build()
        .context("Failed to build the query operation registry.")?;
    let function = Value::from(flowquery::function(Arc::new(resolver)));

    if root.is_null() {
        *root = Value::from(Map::default());
    }

    match root {
        Value::Map(entries) => {
            if !entries.contains_key("q") {
                Arc::make_mut(entries).insert("q".to_string(), function);
            }
        }
        other => bail!("Context document must be a mapping, got {}.", other.type_name()),
    }
    Ok(())
}
