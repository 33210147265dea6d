//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::energy_system::SystemParameters;
use crate::input::{input_err_msg, read_toml};
use crate::model::ModelOptions;
use crate::units::{Dimensionless, Hertz, MomentOfInertia};
use crate::wind::PiecewiseLinearCurve;
use anyhow::{Context, Result, ensure};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_interval_hours, u32, 1);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The time index of the model
    pub timeindex: TimeIndexParameters,
    /// The nominal frequency of the grid (Hz)
    pub nominal_grid_frequency: Option<Hertz>,
    /// Lower limit for the inertia of synchronous machines at every timestep (kg·m²)
    pub minimum_system_synchronous_inertia: Option<MomentOfInertia>,
    /// Lower limit for the inertia of all sources at every timestep (kg·m²)
    pub minimum_system_inertia: Option<MomentOfInertia>,
    /// Multiplier for the inertia constant emulated by wind turbines
    pub emulated_inertia_constant: Option<Dimensionless>,
    /// Whether an inertia source without a correlated flow is an error
    #[serde(default)]
    pub strict_correlation: bool,
    /// Whether inertia formulas use `nominal_grid_frequency` rather than 50 Hz
    #[serde(default)]
    pub use_nominal_frequency: bool,
    /// Points (normalised output, inertia constant) of the wind inertia curve
    pub wind_inertia_curve: Option<Vec<(f64, f64)>>,
}

/// Represents the "timeindex" section of the model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct TimeIndexParameters {
    /// The first timestep, e.g. "2020-01-01T00:00:00"
    pub start: String,
    /// The number of timesteps
    pub periods: usize,
    /// The length of each timestep in hours
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
}

impl TimeIndexParameters {
    /// The timesteps of the model
    pub fn timesteps(&self) -> Result<Vec<NaiveDateTime>> {
        let start: NaiveDateTime = self
            .start
            .parse()
            .with_context(|| format!("Invalid start time '{}'", self.start))?;
        let interval = TimeDelta::hours(i64::from(self.interval_hours));

        let mut timesteps = Vec::with_capacity(self.periods);
        let mut time = start;
        for _ in 0..self.periods {
            timesteps.push(time);
            time = time
                .checked_add_signed(interval)
                .context("Time index out of range")?;
        }

        Ok(timesteps)
    }
}

/// Check that the `timeindex` section is valid
fn check_timeindex(timeindex: &TimeIndexParameters) -> Result<()> {
    ensure!(timeindex.periods > 0, "timeindex.periods cannot be zero");
    ensure!(
        timeindex.interval_hours > 0,
        "timeindex.interval_hours cannot be zero"
    );
    timeindex.timesteps()?;

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_timeindex(&self.timeindex)?;

        // The inertia thresholds are checked when the energy system is created
        self.wind_inertia_curve()?;

        Ok(())
    }

    /// System-wide parameters of the energy system
    pub fn system_parameters(&self) -> SystemParameters {
        SystemParameters {
            nominal_grid_frequency: self.nominal_grid_frequency,
            minimum_system_synchronous_inertia: self.minimum_system_synchronous_inertia,
            minimum_system_inertia: self.minimum_system_inertia,
            emulated_inertia_constant: self.emulated_inertia_constant,
            use_nominal_frequency: self.use_nominal_frequency,
        }
    }

    /// Options for building the model
    pub fn options(&self) -> ModelOptions {
        ModelOptions {
            strict_correlation: self.strict_correlation,
        }
    }

    /// The wind inertia curve, or the default curve if none is given
    pub fn wind_inertia_curve(&self) -> Result<PiecewiseLinearCurve> {
        match &self.wind_inertia_curve {
            Some(points) => {
                PiecewiseLinearCurve::new(points.clone()).context("Invalid wind_inertia_curve")
            }
            None => Ok(PiecewiseLinearCurve::default()),
        }
    }
}
