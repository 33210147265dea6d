//! Per-timestep values which may be given either as a single scalar or as a full series.
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// A value for every timestep of the model horizon.
///
/// A scalar is broadcast to every timestep. A series must have exactly one value per timestep,
/// which is checked with [`Sequence::check_length`] when the energy system is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    /// The same value at every timestep
    Constant(f64),
    /// One value per timestep
    Series(Vec<f64>),
}

impl Default for Sequence {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl From<f64> for Sequence {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<Vec<f64>> for Sequence {
    fn from(values: Vec<f64>) -> Self {
        Self::Series(values)
    }
}

impl Sequence {
    /// Get the value at timestep `t`.
    ///
    /// # Panics
    ///
    /// If this is a series which is shorter than `t + 1`.
    pub fn get(&self, t: usize) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Series(values) => values[t],
        }
    }

    /// Expand into an explicit series covering `len` timesteps
    pub fn to_series(&self, len: usize) -> Vec<f64> {
        (0..len).map(|t| self.get(t)).collect()
    }

    /// Iterate over the values which were explicitly provided
    pub fn iter_values(&self) -> impl Iterator<Item = f64> + '_ {
        let values: &[f64] = match self {
            Self::Constant(value) => std::slice::from_ref(value),
            Self::Series(values) => values,
        };
        values.iter().copied()
    }

    /// Check that a series covers exactly `len` timesteps. Scalars always pass.
    pub fn check_length(&self, len: usize) -> Result<()> {
        if let Self::Series(values) = self {
            ensure!(
                values.len() == len,
                "Expected {len} values (one per timestep), got {}",
                values.len()
            );
        }

        Ok(())
    }

    /// Whether every provided value satisfies `predicate`
    pub fn all(&self, predicate: impl Fn(f64) -> bool) -> bool {
        self.iter_values().all(predicate)
    }
}
