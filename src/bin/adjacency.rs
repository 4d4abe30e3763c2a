//! Command-line entry point: compute adjacency metrics for a JSON layer.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use adjacency_rs::{
    AdjacencyRun, FailurePolicy, IsolatedPolicy, MemoryLayer, RunConfig, RunContext,
};

#[derive(Parser, Debug)]
#[command(
    name = "adjacency",
    version,
    about = "Primary and secondary adjacency metrics for a polygon layer"
)]
struct Cli {
    /// Layer file: `{"id_field": ..., "features": [{"id": .., "neighbors": [..]}]}`
    layer: PathBuf,

    /// Run configuration (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Materialize the graph up front and compute nodes in parallel
    #[arg(long)]
    parallel: bool,

    /// Fail on asymmetric adjacency
    #[arg(long)]
    strict: bool,

    /// Record failing features and keep going
    #[arg(long)]
    continue_on_error: bool,

    /// Handling of features with no neighbors: skip, zero, error or sentinel:N
    #[arg(long)]
    isolated: Option<IsolatedPolicy>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "adjacency run failed");
            ExitCode::FAILURE
        }
    }
}

/// Lay the command-line flags over a loaded configuration. Flags only
/// ever switch behaviour on; an absent flag keeps the file's value.
fn apply_flags(cli: &Cli, mut config: RunConfig) -> RunConfig {
    if config.dataset.is_none() {
        config.dataset = Some(cli.layer.display().to_string());
    }
    if cli.strict {
        config.strict_symmetry = true;
    }
    if cli.continue_on_error {
        config.failure_policy = FailurePolicy::Continue;
    }
    if let Some(policy) = cli.isolated {
        config.isolated_policy = policy;
    }
    config
}

async fn run(cli: Cli) -> adjacency_rs::Result<()> {
    let loaded = match &cli.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    let config = apply_flags(&cli, loaded);

    let layer = MemoryLayer::from_path(&cli.layer)?;
    let primary_field = config.primary_field.clone();
    let secondary_field = config.secondary_field.clone();

    let run = AdjacencyRun::new(RunContext {
        oracle: &layer,
        store: &layer,
        source: &layer,
        config,
    })?;
    let report = if cli.parallel {
        run.execute_parallel().await?
    } else {
        run.execute().await?
    };

    println!("{}\t{}\t{}", run.id_field(), primary_field, secondary_field);
    for node in layer.feature_ids() {
        let show = |v: Option<i16>| v.map_or_else(|| "null".to_string(), |v| v.to_string());
        println!(
            "{}\t{}\t{}",
            node,
            show(layer.attribute(node, &primary_field)),
            show(layer.attribute(node, &secondary_field)),
        );
    }
    println!("{}", report.to_json()?);
    Ok(())
}
