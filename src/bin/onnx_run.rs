use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use onnx_harness::execution::ProviderConfig;
use onnx_harness::runner::{outputs_to_json, parse_provider_option, run_model, InputBinding, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "onnx-run", version, about = "Run an ONNX model on the selected execution providers")]
struct Cli {
    /// Model to load (default: Relu.onnx)
    model: Option<PathBuf>,

    /// JSON run configuration; command line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execution provider, highest priority first (repeatable)
    #[arg(long = "provider")]
    providers: Vec<String>,

    /// Provider option as PROVIDER:KEY=VALUE (repeatable)
    #[arg(long = "provider-option")]
    provider_options: Vec<String>,

    /// Input as NAME[:TYPE]=v1,v2,... (repeatable)
    #[arg(long = "input")]
    inputs: Vec<InputBinding>,

    /// Output to fetch, in order (repeatable)
    #[arg(long = "output")]
    outputs: Vec<String>,

    /// Print outputs as JSON
    #[arg(long)]
    json: bool,

    /// Skip schema validation of the model
    #[arg(long)]
    no_validate: bool,

    /// Log per-node execution times (needs debug logging)
    #[arg(long)]
    profile: bool,

    /// Prefix for the session's log lines
    #[arg(long)]
    log_id: Option<String>,

    /// Log level (RUST_LOG)
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => RunnerConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => RunnerConfig::default(),
    };

    if let Some(model) = cli.model {
        config.model = model;
    }
    if !cli.providers.is_empty() {
        config.providers = cli.providers.iter().map(|name| ProviderConfig::new(name)).collect();
    }
    for option in &cli.provider_options {
        let (provider, key, value) = parse_provider_option(option)?;
        config.set_provider_option(&provider, &key, &value)?;
    }
    if !cli.inputs.is_empty() {
        config.inputs = cli.inputs;
    }
    if !cli.outputs.is_empty() {
        config.outputs = cli.outputs;
    }
    if cli.no_validate {
        config.validate_graph = false;
    }
    if cli.profile {
        config.enable_profiling = true;
    }
    if let Some(log_id) = cli.log_id {
        config.log_id = log_id;
    }

    let outputs = run_model(&config).with_context(|| format!("failed to run {}", config.model.display()))?;

    println!("y:");
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outputs_to_json(&outputs))?);
    } else {
        for output in &outputs {
            println!("{}", output);
        }
    }

    Ok(())
}
