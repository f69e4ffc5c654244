//! cmrbench - Application Entry Point
//!
//! Generates instances, runs the solvers and evaluates their logs for one
//! sweep, either a built-in preset or a JSON sweep definition.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cmrbench::benchmark::{Mode, SweepDriver, SweepReport, SystemLauncher};
use cmrbench::config::{Config, SweepConfig};
use cmrbench::sweeps;
use cmrbench::utils::{format_duration, now_utc};

#[derive(Parser)]
#[command(name = "cmrbench", version, about = "Benchmark matrix recognition solvers")]
struct Cli {
    /// Phase(s) to perform
    #[arg(value_enum)]
    mode: ModeArg,

    /// Built-in sweep to use
    #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(sweeps::NAMES),
          required_unless_present = "config", conflicts_with = "config")]
    sweep: Option<String>,

    /// JSON sweep definition to use
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the evaluation as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Number of samples per instance
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    samples: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Generate,
    Run,
    Eval,
    All,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Generate => Mode::Generate,
            ModeArg::Run => Mode::Run,
            ModeArg::Eval => Mode::Eval,
            ModeArg::All => Mode::All,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sweep = match (&cli.sweep, &cli.config) {
        (_, Some(path)) => SweepConfig::load(path)?,
        (Some(name), None) => sweeps::preset(name)?,
        (None, None) => anyhow::bail!("either --sweep or --config is required"),
    };
    let name = sweep.name.clone();

    tracing::info!(
        sweep = %name,
        mode = ?cli.mode,
        samples = cli.samples,
        build_dir = %config.tools.build_dir.display(),
        "Starting sweep"
    );

    let started = now_utc();
    let driver = SweepDriver::new(sweep, config, cli.samples, Arc::new(SystemLauncher::new()))?;
    let mode = Mode::from(cli.mode);
    let summaries = match driver.execute(mode).await {
        Ok(summaries) => summaries,
        Err(e) => {
            tracing::error!(sweep = %name, code = e.error_code(), error = %e, "Sweep failed");
            return Err(e.into());
        }
    };

    if matches!(mode, Mode::Eval | Mode::All) {
        let report = SweepReport::new(&name, cli.samples, &summaries);
        if cli.json {
            println!("{}", report.to_json()?);
        } else {
            print!("{}", report.render_table());
        }
    }

    tracing::info!(
        sweep = %name,
        elapsed = %format_duration(now_utc() - started),
        "Sweep finished"
    );
    Ok(())
}
