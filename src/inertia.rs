//! Sources of rotational inertia and the physics relating their parameters.
//!
//! An inertia source is an edge of the energy system graph. It starts at the node whose
//! operation provides the inertia (e.g. a generator) and ends at a node collecting inertia
//! provision (normally an unbalanced bus). The flow leaving the same source node is the
//! inertia source's *correlated flow*.
use crate::error::ModelError;
use crate::sequence::Sequence;
use crate::units::{ApparentPower, Dimensionless, Hertz, MomentOfInertia, Seconds};
use std::f64::consts::PI;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The grid frequency assumed by the inertia formulas unless configured otherwise
pub const LEGACY_GRID_FREQUENCY: Hertz = Hertz(50.0);

/// The physical mechanism by which an inertia source provides inertia
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ProvisionType {
    /// A synchronous machine whose commitment depends on its dispatch
    SynchronousGenerator,
    /// A synchronous machine coupled to a storage (e.g. pumped hydro)
    SynchronousStorage,
    /// Inertia emulated by the converters of wind turbines
    SyntheticWind,
    /// Inertia emulated by the converter of a storage, reserving part of its power
    SyntheticStorage,
    /// No inertia is provided
    None,
}

impl ProvisionType {
    /// Whether this is a synchronous machine
    pub fn is_synchronous(self) -> bool {
        matches!(self, Self::SynchronousGenerator | Self::SynchronousStorage)
    }

    /// Whether the commitment is fixed by the correlated flow's profile rather than by the solver
    pub fn has_fixed_commitment(self) -> bool {
        matches!(self, Self::SyntheticWind | Self::None)
    }

    /// Parse a provision type, failing with a validation error for unknown names
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        Self::from_str(s.trim()).map_err(|_| {
            ModelError::validation(
                "inertia source",
                "provision_type",
                format!("unknown provision type '{s}'"),
            )
        })
    }
}

/// Moment of inertia of a synchronous machine: J = H·S / (0.5·(2πf)²)
pub fn moment_of_inertia_from_inertia_constant(
    inertia_constant: Seconds,
    apparent_power: ApparentPower,
    frequency: Hertz,
) -> MomentOfInertia {
    let energy = inertia_constant * apparent_power;
    MomentOfInertia(energy.value() / (0.5 * frequency.angular_speed_squared().value()))
}

/// Inertia constant corresponding to a moment of inertia: H = 0.5·J·(2πf)² / S
///
/// Returns zero for a machine without apparent power.
pub fn inertia_constant_from_moment_of_inertia(
    moment_of_inertia: MomentOfInertia,
    apparent_power: ApparentPower,
    frequency: Hertz,
) -> Seconds {
    if apparent_power.value() == 0.0 {
        return Seconds(0.0);
    }

    let energy = 0.5 * moment_of_inertia.value() * frequency.angular_speed_squared().value();
    Seconds(energy / apparent_power.value())
}

/// Moment of inertia emulated by a storage converter: J = S·share / (4π²·f·2)
pub fn synthetic_storage_moment_of_inertia(
    apparent_power: ApparentPower,
    inertia_power_share: Dimensionless,
    frequency: Hertz,
) -> MomentOfInertia {
    let denominator = 4.0 * PI.powi(2) * frequency.value() * 2.0;
    MomentOfInertia(apparent_power.value() * inertia_power_share.0 / denominator)
}

/// User-provided parameters for an inertia source
#[derive(Debug, Clone, PartialEq)]
pub struct InertiaParameters {
    /// How inertia is provided
    pub provision_type: ProvisionType,
    /// Inertia constant H
    pub inertia_constant: Option<Seconds>,
    /// Apparent power S
    pub apparent_power: Option<ApparentPower>,
    /// Cost per unit of moment of inertia provided, per timestep
    pub inertia_costs: Sequence,
    /// Moment of inertia J. Derived for most provision types.
    pub moment_of_inertia: Option<MomentOfInertia>,
    /// Minimum stable operation point as a fraction of apparent power
    pub minimum_stable_operation: Dimensionless,
    /// Share of a storage's power reserved for inertia emulation
    pub inertia_power_share: Dimensionless,
}

impl InertiaParameters {
    /// Parameters for the given provision type with every other value left at its default
    pub fn new(provision_type: ProvisionType) -> Self {
        Self {
            provision_type,
            inertia_constant: None,
            apparent_power: None,
            inertia_costs: Sequence::Constant(0.0),
            moment_of_inertia: None,
            minimum_stable_operation: Dimensionless(0.0),
            inertia_power_share: Dimensionless(0.0),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let check_non_negative = |field, value: Option<f64>| match value {
            Some(value) if !value.is_finite() => Err(invalid(field, "must be a finite number")),
            Some(value) if value < 0.0 => Err(invalid(field, "can not be below 0")),
            _ => Ok(()),
        };

        check_non_negative("inertia_constant", self.inertia_constant.map(Seconds::value))?;
        check_non_negative("apparent_power", self.apparent_power.map(ApparentPower::value))?;
        check_non_negative(
            "moment_of_inertia",
            self.moment_of_inertia.map(MomentOfInertia::value),
        )?;

        if !self.inertia_costs.all(f64::is_finite) {
            return Err(invalid("inertia_costs", "must be finite numbers"));
        }

        let is_fraction = |value: Dimensionless| (0.0..=1.0).contains(&value.0);
        match self.provision_type {
            ProvisionType::SyntheticStorage if !is_fraction(self.inertia_power_share) => Err(
                invalid("inertia_power_share", "must be between 0 and 1"),
            ),
            ProvisionType::SynchronousGenerator if !is_fraction(self.minimum_stable_operation) => {
                Err(invalid(
                    "minimum_stable_operation",
                    "must be between 0 and 1",
                ))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ModelError {
    ModelError::validation("inertia source", field, reason)
}

/// A source of rotational inertia between two nodes.
///
/// Values are validated and derived on construction and cannot be changed afterwards. For
/// `synthetic_wind` and `none` sources, the inertia constant and moment of inertia are zero here;
/// their per-timestep values are computed when a model is built (see
/// [`crate::model::InertiaProfile`]).
#[derive(Debug, Clone, PartialEq)]
pub struct InertiaEdge {
    provision_type: ProvisionType,
    inertia_constant: Seconds,
    apparent_power: ApparentPower,
    inertia_costs: Sequence,
    moment_of_inertia: Sequence,
    minimum_stable_operation: Dimensionless,
    inertia_power_share: Dimensionless,
    frequency: Hertz,
}

impl InertiaEdge {
    /// Create a new inertia source, deriving values with the legacy grid frequency of 50 Hz
    pub fn new(params: InertiaParameters) -> Result<Self, ModelError> {
        Self::with_frequency(params, LEGACY_GRID_FREQUENCY)
    }

    /// Create a new inertia source, deriving values with the given grid frequency
    pub fn with_frequency(params: InertiaParameters, frequency: Hertz) -> Result<Self, ModelError> {
        params.validate()?;

        let apparent_power = params.apparent_power.unwrap_or_default();
        let (inertia_constant, moment_of_inertia) = match params.provision_type {
            ProvisionType::SynchronousGenerator | ProvisionType::SynchronousStorage => {
                let inertia_constant = params.inertia_constant.unwrap_or_default();
                let moment_of_inertia = moment_of_inertia_from_inertia_constant(
                    inertia_constant,
                    apparent_power,
                    frequency,
                );
                (inertia_constant, moment_of_inertia)
            }
            ProvisionType::SyntheticStorage => {
                let moment_of_inertia = synthetic_storage_moment_of_inertia(
                    apparent_power,
                    params.inertia_power_share,
                    frequency,
                );
                let inertia_constant = inertia_constant_from_moment_of_inertia(
                    moment_of_inertia,
                    apparent_power,
                    frequency,
                );
                (inertia_constant, moment_of_inertia)
            }
            ProvisionType::SyntheticWind | ProvisionType::None => {
                (Seconds(0.0), MomentOfInertia(0.0))
            }
        };

        Ok(Self {
            provision_type: params.provision_type,
            inertia_constant,
            apparent_power,
            inertia_costs: params.inertia_costs,
            moment_of_inertia: Sequence::Constant(moment_of_inertia.value()),
            minimum_stable_operation: params.minimum_stable_operation,
            inertia_power_share: params.inertia_power_share,
            frequency,
        })
    }

    /// How inertia is provided
    pub fn provision_type(&self) -> ProvisionType {
        self.provision_type
    }

    /// The (scalar) inertia constant. Zero for `synthetic_wind` and `none` sources.
    pub fn inertia_constant(&self) -> Seconds {
        self.inertia_constant
    }

    /// The apparent power of the machine
    pub fn apparent_power(&self) -> ApparentPower {
        self.apparent_power
    }

    /// Cost per unit of moment of inertia, per timestep
    pub fn inertia_costs(&self) -> &Sequence {
        &self.inertia_costs
    }

    /// The moment of inertia, per timestep. Zero for `synthetic_wind` and `none` sources.
    pub fn moment_of_inertia(&self) -> &Sequence {
        &self.moment_of_inertia
    }

    /// Minimum stable operation point as a fraction of apparent power
    pub fn minimum_stable_operation(&self) -> Dimensionless {
        self.minimum_stable_operation
    }

    /// Share of a storage's power reserved for inertia emulation
    pub fn inertia_power_share(&self) -> Dimensionless {
        self.inertia_power_share
    }

    /// The grid frequency the derived values were calculated with
    pub fn frequency(&self) -> Hertz {
        self.frequency
    }
}
