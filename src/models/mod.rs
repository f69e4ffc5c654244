//! Domain models

pub mod algorithm;
pub mod command;
pub mod instance;
pub mod trial;

pub use algorithm::{Algorithm, AlgorithmFamily, LogStream, ParseRule};
pub use command::{AlgorithmCommand, PipelineTemplate, StageTemplate, TemplateVars};
pub use instance::{Density, InstanceKey};
pub use trial::{Trial, TrialOutcome, TrialSpec};
