//! Built-in sweep definitions
//!
//! Each preset is one [`SweepConfig`] value. Additional sweeps can be
//! described in JSON and loaded with [`SweepConfig::load`].

use std::collections::BTreeMap;

use crate::config::{AlgorithmEntry, ConfigError, SweepConfig};
use crate::constants::{DEFAULT_CENSOR_CEILING_SECS, DEFAULT_TIME_LIMIT_SECS};
use crate::models::{
    Algorithm, AlgorithmCommand, Density, InstanceKey, PipelineTemplate, StageTemplate,
};

/// Names of the built-in sweeps
pub const NAMES: &[&str] = &["modwheel", "rndcamion", "network"];

/// Look up a built-in sweep by name
pub fn preset(name: &str) -> Result<SweepConfig, ConfigError> {
    match name {
        "modwheel" => Ok(modwheel()),
        "rndcamion" => Ok(rndcamion()),
        "network" => Ok(network()),
        other => Err(ConfigError::UnknownSweep(other.to_string())),
    }
}

fn gzip() -> StageTemplate {
    StageTemplate::new("gzip", &["-c"])
}

fn sweep(
    name: &str,
    instances: Vec<InstanceKey>,
    algorithms: Vec<AlgorithmEntry>,
    generator: Vec<StageTemplate>,
) -> SweepConfig {
    SweepConfig {
        name: name.to_string(),
        family: name.to_string(),
        instance_dir: name.to_string(),
        instances,
        algorithms,
        generator: PipelineTemplate::new(generator),
        commands: BTreeMap::new(),
        time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
        censor_ceiling_secs: DEFAULT_CENSOR_CEILING_SECS,
    }
}

/// Wheel matrices with rows and columns scaled by two modulo a row
pub fn modwheel() -> SweepConfig {
    let orders = (9..100).step_by(10).chain((99..1000).step_by(100));

    sweep(
        "modwheel",
        orders.map(InstanceKey::new).collect(),
        vec![
            AlgorithmEntry::new(Algorithm::CmrDec),
            AlgorithmEntry::limited(Algorithm::CmrPart, 50),
            AlgorithmEntry::limited(Algorithm::CmrEuler, 40),
            AlgorithmEntry::new(Algorithm::CmrCert),
            AlgorithmEntry::new(Algorithm::Unimod),
            AlgorithmEntry::new(Algorithm::UnimodCert),
        ],
        vec![
            StageTemplate::new(
                "{build_dir}/cmr-generate-wheel",
                &["-01", "{size}", "-o", "sparse"],
            ),
            StageTemplate::new(
                "{build_dir}/cmr-matrix",
                &["-i", "sparse", "-", "-r", "-R2", "{size_div2_plus1}", "-o", "sparse", "-"],
            ),
            gzip(),
        ],
    )
}

/// Random matrices made Camion-signed, over a grid of orders and densities
pub fn rndcamion() -> SweepConfig {
    let densities = [0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];
    let instances = (50..=2000)
        .step_by(50)
        .flat_map(|order| {
            densities.iter().filter_map(move |&p| {
                Density::try_from(p)
                    .ok()
                    .map(|density| InstanceKey::with_density(order, density))
            })
        })
        .collect();

    sweep(
        "rndcamion",
        instances,
        vec![
            AlgorithmEntry::new(Algorithm::CmrDec),
            AlgorithmEntry::limited(Algorithm::CmrEuler, 500),
            AlgorithmEntry::new(Algorithm::CmrPart),
            AlgorithmEntry::new(Algorithm::CmrCert),
            AlgorithmEntry::new(Algorithm::Unimod),
            AlgorithmEntry::new(Algorithm::UnimodCert),
        ],
        vec![
            StageTemplate::new(
                "{build_dir}/cmr-generate-random",
                &["-o", "sparse", "{size}", "{size}", "{density}"],
            ),
            StageTemplate::new("{build_dir}/cmr-camion", &["-i", "sparse", "-", "-S", "-"]),
            gzip(),
        ],
    )
}

/// Unimod on an unsigned dense copy; network matrices need no signing
fn unsigned_unimod() -> AlgorithmCommand {
    AlgorithmCommand {
        prepare: vec![PipelineTemplate::new(vec![
            StageTemplate::new("gunzip", &["-cd", "{input}"]),
            StageTemplate::new(
                "{build_dir}/cmr-matrix",
                &["-", "-i", "sparse", "-o", "dense", "{scratch}/input.dense"],
            ),
        ])],
        run: PipelineTemplate::new(vec![StageTemplate::new(
            "{unimod_dir}/unimodularity-test",
            &["{scratch}/input.dense", "-t", "-v"],
        )]),
    }
}

/// Network matrices of growing order
pub fn network() -> SweepConfig {
    let orders = (1..=40)
        .chain((1..=40).map(|i| 100 * i))
        .chain((1..=40).map(|i| 1000 * i));

    let mut network = sweep(
        "network",
        orders.map(InstanceKey::new).collect(),
        vec![
            AlgorithmEntry::new(Algorithm::CmrDec),
            AlgorithmEntry::limited(Algorithm::CmrEuler, 20),
            AlgorithmEntry::limited(Algorithm::CmrPart, 30),
            AlgorithmEntry::limited(Algorithm::Unimod, 4000),
        ],
        vec![
            StageTemplate::new(
                "{build_dir}/cmr-generate-network",
                &["-o", "sparse", "{size}", "{size}"],
            ),
            gzip(),
        ],
    );
    network.commands.insert(Algorithm::Unimod, unsigned_unimod());
    network
}
