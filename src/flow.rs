//! Flows of energy between the nodes of an energy system.
use crate::error::ModelError;
use crate::id::EdgeID;
use crate::sequence::Sequence;
use anyhow::{Context, Result};

/// Parameters for a flow whose capacity is a decision of the optimisation
#[derive(Debug, Clone, PartialEq)]
pub struct Investment {
    /// Equivalent periodical costs per unit of invested capacity
    pub ep_costs: f64,
    /// Upper limit for the invested capacity
    pub maximum: f64,
    /// Lower limit for the invested capacity
    pub minimum: f64,
    /// Capacity which already exists and needs no investment
    pub existing: f64,
}

impl Default for Investment {
    fn default() -> Self {
        Self {
            ep_costs: 0.0,
            maximum: f64::INFINITY,
            minimum: 0.0,
            existing: 0.0,
        }
    }
}

/// A directed flow of energy from a source node to a target node.
///
/// `min`, `max` and `fix` are fractions of the nominal value (or of the invested capacity for
/// investment flows).
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// The capacity of the flow
    pub nominal_value: Option<f64>,
    /// Minimum flow as a fraction of capacity
    pub min: Sequence,
    /// Maximum flow as a fraction of capacity
    pub max: Sequence,
    /// A profile fixing the flow, as a fraction of capacity
    pub fix: Option<Sequence>,
    /// Costs per unit of flow
    pub variable_costs: Sequence,
    /// Whether the flow has an on/off status variable
    pub nonconvex: bool,
    /// Whether the flow must be non-negative
    pub unidirectional: bool,
    /// Investment parameters, for flows whose capacity is optimised
    pub investment: Option<Investment>,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            nominal_value: None,
            min: Sequence::Constant(0.0),
            max: Sequence::Constant(1.0),
            fix: None,
            variable_costs: Sequence::Constant(0.0),
            nonconvex: false,
            unidirectional: true,
            investment: None,
        }
    }
}

impl Flow {
    /// A flow with the given capacity and otherwise default parameters
    pub fn with_nominal_value(nominal_value: f64) -> Self {
        Self {
            nominal_value: Some(nominal_value),
            ..Self::default()
        }
    }

    /// The flow's fixed value at timestep `t`, as a fraction of capacity, if it has a profile
    pub fn fixed_fraction(&self, t: usize) -> Option<f64> {
        self.fix.as_ref().map(|fix| fix.get(t))
    }

    /// Check the flow's parameters for the edge `edge` over a horizon of `num_timesteps`
    pub fn validate(&self, edge: &EdgeID, num_timesteps: usize) -> Result<()> {
        let invalid =
            |field, reason: &str| ModelError::validation(format!("flow {edge}"), field, reason);

        if let Some(nominal_value) = self.nominal_value {
            if !(nominal_value.is_finite() && nominal_value >= 0.0) {
                Err(invalid("nominal_value", "must be a finite number >= 0"))?;
            }
            if self.investment.is_some() {
                Err(invalid(
                    "nominal_value",
                    "cannot be set together with an investment",
                ))?;
            }
        }

        if self.nonconvex && self.nominal_value.is_none() {
            Err(invalid("nonconvex", "non-convex flows need a nominal value"))?;
        }
        if self.fix.is_some() && self.nominal_value.is_none() && self.investment.is_none() {
            Err(invalid(
                "fix",
                "fixed flows need a nominal value or an investment",
            ))?;
        }

        for (field, seq) in [
            ("min", Some(&self.min)),
            ("max", Some(&self.max)),
            ("fix", self.fix.as_ref()),
            ("variable_costs", Some(&self.variable_costs)),
        ] {
            let Some(seq) = seq else { continue };
            seq.check_length(num_timesteps)
                .with_context(|| format!("Invalid {field} for flow {edge}"))?;
            if !seq.all(f64::is_finite) {
                Err(invalid(field, "must be finite numbers"))?;
            }
        }

        if (0..num_timesteps).any(|t| self.min.get(t) > self.max.get(t)) {
            Err(invalid("min", "must not exceed max"))?;
        }

        if let Some(investment) = &self.investment {
            if investment.minimum < 0.0 || investment.minimum > investment.maximum {
                Err(invalid(
                    "investment",
                    "minimum must be >= 0 and not exceed maximum",
                ))?;
            }
            if !(investment.existing.is_finite() && investment.existing >= 0.0) {
                Err(invalid("investment", "existing capacity must be >= 0"))?;
            }
            if !investment.ep_costs.is_finite() {
                Err(invalid("investment", "ep_costs must be finite"))?;
            }
        }

        Ok(())
    }
}
