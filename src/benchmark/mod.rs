//! Benchmark orchestration engine
//!
//! A sweep moves through three phases:
//!
//! 1. **Generate** (`generator.rs`): write one compressed matrix per
//!    (instance, sample), skipping artifacts that already exist.
//! 2. **Run** (`runner.rs`): invoke every applicable solver on every artifact,
//!    capturing its output to per-trial log files.
//! 3. **Eval** (`parser.rs`, `metrics.rs`): extract timings from the logs,
//!    censor near-timeout reference runs and aggregate over samples.
//!
//! `sweep.rs` drives the phases; `executor.rs` is the only place that
//! launches processes.

pub mod executor;
pub mod generator;
pub mod layout;
pub mod metrics;
pub mod parser;
pub mod report;
pub mod runner;
pub mod scratch;
pub mod store;
pub mod sweep;

pub use executor::{Pipeline, ProcessLauncher, RunOutcome, SystemLauncher};
pub use layout::ArtifactLayout;
pub use parser::LogParser;
pub use report::SweepReport;
pub use runner::{TrialRunStatus, TrialRunner};
pub use store::ResultStore;
pub use sweep::{Mode, SweepDriver};
