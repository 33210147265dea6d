//! A two-phase scaffold for building and solving the optimisation problem.
//!
//! Blocks first declare variables, whose bounds and objective coefficients can still be changed
//! by later blocks, and then add constraints. The finished problem is handed to HiGHS in one go.
use crate::error::ModelError;
use crate::id::{EdgeID, NodeID};
use anyhow::{Result, anyhow};
use highs::{HighsModelStatus, RowProblem, Sense};
use indexmap::IndexMap;
use log::debug;
use std::ops::RangeInclusive;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(usize);

/// The parameters a variable corresponds to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Flow along an edge at a timestep
    Flow(EdgeID, usize),
    /// Commitment of an inertia source at a timestep
    SourceInertia(EdgeID, usize),
    /// Status of a non-convex flow at a timestep
    Status(EdgeID, usize),
    /// Invested capacity of a flow
    Invest(EdgeID),
    /// Content of a storage at the end of a timestep
    StorageContent(NodeID, usize),
    /// Content of a storage before the first timestep
    InitialContent(NodeID),
}

/// The parameters a constraint corresponds to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKey {
    /// Inflows equal outflows of a bus
    BusBalance(NodeID, usize),
    /// Relation between an input and an output of a transformer
    TransformerRelation {
        /// The input flow
        input: EdgeID,
        /// The output flow
        output: EdgeID,
        /// The timestep
        timestep: usize,
    },
    /// Upper limit of an investment flow
    InvestmentFlowMax(EdgeID, usize),
    /// Lower limit of an investment flow
    InvestmentFlowMin(EdgeID, usize),
    /// Fixed value of an investment flow
    InvestmentFlowFixed(EdgeID, usize),
    /// Upper limit of a non-convex flow
    NonConvexFlowMax(EdgeID, usize),
    /// Lower limit of a non-convex flow
    NonConvexFlowMin(EdgeID, usize),
    /// Change of storage content
    StorageBalance(NodeID, usize),
    /// Last storage content equals the initial content
    StorageBalanced(NodeID),
    /// A committed synchronous generator runs at least at its minimum stable operation
    FlowInertia(EdgeID, usize),
    /// A synchronous generator producing power is committed
    InertiaFlow(EdgeID, usize),
    /// Lower limit for the inertia of synchronous machines
    MinSynchronousInertia(usize),
    /// Lower limit for the inertia of all sources
    MinSystemInertia(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    lower: f64,
    upper: f64,
    cost: f64,
    integer: bool,
}

/// A constraint of the form `lower <= sum(coeff * var) <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// What the constraint represents
    pub key: ConstraintKey,
    /// Bounds of the constraint
    pub bounds: RangeInclusive<f64>,
    /// Variables and their coefficients
    pub terms: Vec<(Variable, f64)>,
}

/// An optimisation problem under construction
#[derive(Debug, Default)]
pub struct Problem {
    variables: IndexMap<VariableKey, Variable>,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Problem {
    /// Add a continuous variable with the given bounds and no cost.
    ///
    /// # Panics
    ///
    /// If a variable with the same key already exists.
    pub fn add_variable(&mut self, key: VariableKey, bounds: RangeInclusive<f64>) -> Variable {
        self.push_column(key, bounds, false)
    }

    /// Add a binary variable with no cost
    pub fn add_binary(&mut self, key: VariableKey) -> Variable {
        self.push_column(key, 0.0..=1.0, true)
    }

    fn push_column(
        &mut self,
        key: VariableKey,
        bounds: RangeInclusive<f64>,
        integer: bool,
    ) -> Variable {
        let var = Variable(self.columns.len());
        let existing = self.variables.insert(key, var).is_some();
        assert!(!existing, "Duplicate entry for var");

        let (lower, upper) = bounds.into_inner();
        self.columns.push(Column {
            lower,
            upper,
            cost: 0.0,
            integer,
        });

        var
    }

    /// Look up a variable by its key
    pub fn variable(&self, key: &VariableKey) -> Option<Variable> {
        self.variables.get(key).copied()
    }

    /// Look up a variable, failing if it has not been declared
    pub fn get_variable(&self, key: &VariableKey) -> Result<Variable> {
        self.variable(key)
            .ok_or_else(|| anyhow!("No variable found for {key:?}"))
    }

    /// Change the bounds of a variable
    pub fn set_bounds(&mut self, var: Variable, bounds: RangeInclusive<f64>) {
        let column = &mut self.columns[var.0];
        (column.lower, column.upper) = bounds.into_inner();
    }

    /// Change the lower bound of a variable
    pub fn set_lower(&mut self, var: Variable, lower: f64) {
        self.columns[var.0].lower = lower;
    }

    /// Change the upper bound of a variable
    pub fn set_upper(&mut self, var: Variable, upper: f64) {
        self.columns[var.0].upper = upper;
    }

    /// Fix a variable to a value
    pub fn fix(&mut self, var: Variable, value: f64) {
        self.set_bounds(var, value..=value);
    }

    /// The bounds of a variable
    pub fn bounds(&self, var: Variable) -> RangeInclusive<f64> {
        let column = &self.columns[var.0];
        column.lower..=column.upper
    }

    /// Add to the objective coefficient of a variable
    pub fn add_cost(&mut self, var: Variable, coeff: f64) {
        self.columns[var.0].cost += coeff;
    }

    /// The objective coefficient of a variable
    pub fn cost(&self, var: Variable) -> f64 {
        self.columns[var.0].cost
    }

    /// Add a constraint
    pub fn add_row<I>(&mut self, key: ConstraintKey, bounds: RangeInclusive<f64>, terms: I)
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.rows.push(Row {
            key,
            bounds,
            terms: terms.into_iter().collect(),
        });
    }

    /// The constraints added so far
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Find a constraint by its key
    pub fn row(&self, key: &ConstraintKey) -> Option<&Row> {
        self.rows.iter().find(|row| &row.key == key)
    }

    /// The number of variables
    pub fn num_variables(&self) -> usize {
        self.columns.len()
    }

    /// Minimise the objective with HiGHS
    pub fn solve(self) -> Result<Solution> {
        debug!(
            "Solving problem with {} variables and {} constraints",
            self.columns.len(),
            self.rows.len()
        );

        let mut problem = RowProblem::default();
        let cols: Vec<_> = self
            .columns
            .iter()
            .map(|column| {
                let bounds = column.lower..=column.upper;
                if column.integer {
                    problem.add_integer_column(column.cost, bounds)
                } else {
                    problem.add_column(column.cost, bounds)
                }
            })
            .collect();
        for row in &self.rows {
            problem.add_row(
                row.bounds.clone(),
                row.terms.iter().map(|&(var, coeff)| (cols[var.0], coeff)),
            );
        }

        let mut highs_model = problem.optimise(Sense::Minimise);
        enable_highs_logging(&mut highs_model);

        let solved = highs_model.try_solve().map_err(|status| ModelError::Solve {
            status: format!("{status:?}"),
        })?;
        match solved.status() {
            HighsModelStatus::Optimal => {}
            status => Err(ModelError::Solve {
                status: format!("{status:?}"),
            })?,
        }

        let values = solved.get_solution().columns().to_vec();
        let objective_value = self
            .columns
            .iter()
            .zip(&values)
            .map(|(column, value)| column.cost * value)
            .sum();

        Ok(Solution {
            variables: self.variables,
            values,
            objective_value,
        })
    }
}

/// Enable logging for the HiGHS solver
fn enable_highs_logging(model: &mut highs::Model) {
    // **HACK**: Skip this step if logging is disabled (e.g. when running tests)
    if let Ok(log_level) = std::env::var("OPINMOD_LOG_LEVEL")
        && log_level.eq_ignore_ascii_case("off")
    {
        return;
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}

/// The solution to the optimisation problem
#[derive(Debug, Clone)]
pub struct Solution {
    variables: IndexMap<VariableKey, Variable>,
    values: Vec<f64>,
    objective_value: f64,
}

impl Solution {
    /// The value of a variable, if it exists
    pub fn value(&self, key: &VariableKey) -> Option<f64> {
        self.variables.get(key).map(|var| self.values[var.0])
    }

    /// Iterate over all variables and their values, in the order they were declared
    pub fn iter_values(&self) -> impl Iterator<Item = (&VariableKey, f64)> {
        self.variables
            .iter()
            .map(|(key, var)| (key, self.values[var.0]))
    }

    /// The value of the objective function
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn flow_key(t: usize) -> VariableKey {
        VariableKey::Flow(("a", "b").into(), t)
    }

    #[test]
    fn test_costs_accumulate() {
        let mut problem = Problem::default();
        let var = problem.add_variable(flow_key(0), 0.0..=10.0);
        problem.add_cost(var, 2.0);
        problem.add_cost(var, 0.5);
        assert_eq!(problem.cost(var), 2.5);
    }

    #[test]
    fn test_fix() {
        let mut problem = Problem::default();
        let var = problem.add_binary(VariableKey::SourceInertia(("a", "b").into(), 0));
        problem.fix(var, 1.0);
        assert_eq!(problem.bounds(var), 1.0..=1.0);
    }

    #[test]
    #[should_panic(expected = "Duplicate entry for var")]
    fn test_duplicate_variable() {
        let mut problem = Problem::default();
        problem.add_variable(flow_key(0), 0.0..=1.0);
        problem.add_variable(flow_key(0), 0.0..=1.0);
    }

    #[test]
    fn test_solve() {
        // minimise x + 2y subject to x + y >= 3, y >= 1
        let mut problem = Problem::default();
        let x = problem.add_variable(flow_key(0), 0.0..=f64::INFINITY);
        let y = problem.add_variable(flow_key(1), 1.0..=f64::INFINITY);
        problem.add_cost(x, 1.0);
        problem.add_cost(y, 2.0);
        problem.add_row(
            ConstraintKey::MinSystemInertia(0),
            3.0..=f64::INFINITY,
            [(x, 1.0), (y, 1.0)],
        );

        let solution = problem.solve().unwrap();
        assert_approx_eq!(f64, solution.value(&flow_key(0)).unwrap(), 2.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solution.value(&flow_key(1)).unwrap(), 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solution.objective_value(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_binary() {
        // A binary must be 1 to allow x >= 0.5
        let mut problem = Problem::default();
        let x = problem.add_variable(flow_key(0), 0.5..=1.0);
        let on = problem.add_binary(VariableKey::Status(("a", "b").into(), 0));
        problem.add_cost(on, 1.0);
        problem.add_row(
            ConstraintKey::NonConvexFlowMax(("a", "b").into(), 0),
            f64::NEG_INFINITY..=0.0,
            [(x, 1.0), (on, -1.0)],
        );

        let solution = problem.solve().unwrap();
        assert_approx_eq!(
            f64,
            solution.value(&VariableKey::Status(("a", "b").into(), 0)).unwrap(),
            1.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_infeasible() {
        let mut problem = Problem::default();
        let x = problem.add_variable(flow_key(0), 0.0..=1.0);
        problem.add_row(ConstraintKey::MinSystemInertia(0), 2.0..=f64::INFINITY, [(x, 1.0)]);

        let err = problem.solve().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::Solve { .. })
        ));
    }
}
