//! The blocks which make up the optimisation problem.
//!
//! Each block acts on one working set of [`Groups`]. Blocks declare their variables first and add
//! their constraints afterwards, so a block can refer to any variable of any other block.
use crate::energy_system::EnergySystem;
use crate::grouping::{Block, Groups};
use crate::model::{Correlations, InertiaProfile};
use crate::optimisation::Problem;
use anyhow::Result;

pub mod bus;
pub mod flow;
pub mod inertia;
pub mod investment_flow;
pub mod nonconvex_flow;
pub mod storage;
pub mod transformer;

/// Everything a block needs to know about the model being built
pub struct BlockContext<'a> {
    /// The energy system
    pub energy_system: &'a EnergySystem,
    /// The working sets
    pub groups: &'a Groups,
    /// The correlated flow of each inertia source which has one
    pub correlations: &'a Correlations,
    /// Per-timestep inertia values
    pub profile: &'a InertiaProfile,
}

impl BlockContext<'_> {
    /// Iterate over the timesteps of the model
    pub fn timesteps(&self) -> std::ops::Range<usize> {
        0..self.energy_system.num_timesteps()
    }
}

impl Block {
    /// Declare the variables of this block
    pub fn add_variables(self, problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
        match self {
            Self::Storage => storage::add_variables(problem, ctx),
            Self::InvestmentFlow => investment_flow::add_variables(problem, ctx),
            Self::NonConvexFlow => nonconvex_flow::add_variables(problem, ctx),
            Self::Inertia => inertia::add_variables(problem, ctx),
            Self::Bus | Self::Transformer | Self::Flow => Ok(()),
        }
    }

    /// Add the constraints and objective terms of this block
    pub fn add_constraints(self, problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
        match self {
            Self::Bus => bus::add_constraints(problem, ctx),
            Self::Transformer => transformer::add_constraints(problem, ctx),
            Self::Storage => storage::add_constraints(problem, ctx),
            Self::InvestmentFlow => investment_flow::add_constraints(problem, ctx),
            Self::Flow => flow::add_objective(problem, ctx),
            Self::NonConvexFlow => nonconvex_flow::add_constraints(problem, ctx),
            Self::Inertia => {
                inertia::add_constraints(problem, ctx)?;
                inertia::add_objective(problem, ctx)
            }
        }
    }
}
