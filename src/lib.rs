//! cmrbench - Benchmark orchestration for matrix recognition solvers
//!
//! Runs external solvers for totally unimodular matrix recognition over
//! parameterized families of generated instances, extracts timings from
//! their logs and summarizes them per instance and algorithm.
//!
//! # Architecture
//!
//! - **Models**: instances, algorithms, command templates and trials
//! - **Config**: environment configuration and validated sweep definitions
//! - **Sweeps**: built-in sweep presets
//! - **Benchmark**: generation, execution, parsing and aggregation

pub mod benchmark;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod sweeps;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, SweepConfig};
pub use error::{BenchError, BenchResult};
