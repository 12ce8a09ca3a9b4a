use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use onnx_harness::builder::{fixtures::resolve_output_path, save_model, Fixture};

#[derive(Parser, Debug)]
#[command(name = "onnx-fixture", version, about = "Build an ONNX test model and write it to disk")]
struct Cli {
    /// Output file, or an existing directory to place the fixture in
    out_path: PathBuf,

    /// Which model to build (optional-output or relu)
    #[arg(long, default_value = "optional-output")]
    fixture: Fixture,

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

    let path = resolve_output_path(&cli.out_path, cli.fixture);

    let model = cli
        .fixture
        .build()
        .with_context(|| format!("failed to build the {} fixture", cli.fixture))?;

    save_model(&model, &path).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}
