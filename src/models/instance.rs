//! Benchmark instance identifiers

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::SIZE_ENCODING_WIDTH;

/// Scale of the fixed-point density representation
const DENSITY_SCALE: f64 = 10_000.0;

/// Nonzero density of a random instance, stored in ten-thousandths so that
/// it can be hashed and compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Density(u32);

impl Density {
    /// Density as a probability in `[0, 1]`
    pub fn value(&self) -> f64 {
        self.0 as f64 / DENSITY_SCALE
    }
}

impl TryFrom<f64> for Density {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("density {} is outside [0, 1]", value));
        }
        Ok(Self((value * DENSITY_SCALE).round() as u32))
    }
}

impl From<Density> for f64 {
    fn from(density: Density) -> Self {
        density.value()
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

/// One benchmark instance: a square matrix order plus an optional density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<Density>,
}

impl InstanceKey {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            density: None,
        }
    }

    pub fn with_density(size: u32, density: Density) -> Self {
        Self {
            size,
            density: Some(density),
        }
    }

    /// File name fragment, e.g. `00050x00050` or `00050x00050-p0.90`
    pub fn encode(&self) -> String {
        let width = SIZE_ENCODING_WIDTH;
        let base = format!("{:0width$}x{:0width$}", self.size, self.size);
        match self.density {
            Some(density) => format!("{}-p{}", base, density),
            None => base,
        }
    }
}

impl Ord for InstanceKey {
    /// Ascending size; for equal sizes, keys without a density first, then
    /// densities in descending order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| match (self.density, other.density) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => b.cmp(&a),
            })
    }
}

impl PartialOrd for InstanceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.density {
            Some(density) => write!(f, "{} (p={})", self.size, density),
            None => write!(f, "{}", self.size),
        }
    }
}
