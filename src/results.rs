//! Results of a solved model.
//!
//! The base results hold the values of the variables for each edge and node. Inertia sources are
//! then decorated with their inertia constant, apparent power and moment of inertia.
use crate::energy_system::Edge;
use crate::id::{EdgeID, NodeID};
use crate::inertia::ProvisionType;
use crate::model::SolvedModel;
use crate::node::NodeKind;
use crate::optimisation::VariableKey;
use chrono::NaiveDateTime;
use indexmap::IndexMap;

/// Results for one edge or node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentResults {
    /// Values which don't depend on the timestep
    pub scalars: IndexMap<&'static str, f64>,
    /// Per-timestep values, one column per variable
    pub sequences: IndexMap<&'static str, Vec<f64>>,
}

/// Inertia provided to the system at one timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemInertia {
    /// Moment of inertia of committed synchronous machines
    pub synchronous_inertia: f64,
    /// Moment of inertia of all committed sources
    pub total_inertia: f64,
}

/// The results of a solved model
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    /// The time index of the sequences
    pub timeindex: Vec<NaiveDateTime>,
    /// Results for each edge
    pub edges: IndexMap<EdgeID, ComponentResults>,
    /// Results for each node with variables of its own
    pub nodes: IndexMap<NodeID, ComponentResults>,
    /// Inertia provided to the system at each timestep
    pub system_inertia: Vec<SystemInertia>,
    /// Value of the objective function
    pub objective: f64,
}

/// Get the results of a solved model, with inertia sources decorated
pub fn results(solved: &SolvedModel) -> Results {
    let mut results = base_results(solved);
    decorate_inertia_sources(&mut results, solved);
    results.system_inertia = system_inertia(&results, solved);

    results
}

fn series(solved: &SolvedModel, key: impl Fn(usize) -> VariableKey) -> Option<Vec<f64>> {
    (0..solved.energy_system.num_timesteps())
        .map(|t| solved.solution.value(&key(t)))
        .collect()
}

/// The values of the variables, grouped by edge and node
fn base_results(solved: &SolvedModel) -> Results {
    let energy_system = solved.energy_system;

    let mut edges = IndexMap::new();
    for (id, edge) in energy_system.iter_edges() {
        let mut component = ComponentResults::default();
        match edge {
            Edge::Flow(_) => {
                for (name, key) in [
                    ("flow", VariableKey::Flow as fn(EdgeID, usize) -> VariableKey),
                    ("status", VariableKey::Status),
                ] {
                    if let Some(values) = series(solved, |t| key(id.clone(), t)) {
                        component.sequences.insert(name, values);
                    }
                }
                if let Some(invest) = solved.solution.value(&VariableKey::Invest(id.clone())) {
                    component.scalars.insert("invest", invest);
                }
            }
            Edge::Inertia(_) => {
                if let Some(values) =
                    series(solved, |t| VariableKey::SourceInertia(id.clone(), t))
                {
                    component.sequences.insert("source_inertia", values);
                }
            }
        }
        edges.insert(id, component);
    }

    let mut nodes = IndexMap::new();
    for node in energy_system.nodes() {
        if !matches!(node.kind, NodeKind::Storage(_)) {
            continue;
        }

        let mut component = ComponentResults::default();
        if let Some(values) = series(solved, |t| VariableKey::StorageContent(node.id.clone(), t)) {
            component.sequences.insert("storage_content", values);
        }
        if let Some(initial) = solved
            .solution
            .value(&VariableKey::InitialContent(node.id.clone()))
        {
            component.scalars.insert("initial_content", initial);
        }
        nodes.insert(node.id.clone(), component);
    }

    Results {
        timeindex: energy_system.timeindex().to_vec(),
        edges,
        nodes,
        system_inertia: Vec::new(),
        objective: solved.solution.objective_value(),
    }
}

/// Attach `inertia_constant`, `apparent_power` and `moment_of_inertia` columns to inertia sources.
///
/// The inertia constant of `synthetic_wind` sources varies over time. For the other provision
/// types it is constant.
fn decorate_inertia_sources(results: &mut Results, solved: &SolvedModel) {
    let num_timesteps = solved.energy_system.num_timesteps();
    for (id, inertia) in solved.energy_system.sources_inertia() {
        let Some(component) = results.edges.get_mut(&id) else {
            continue;
        };

        let (inertia_constant, moment_of_inertia) = match solved.profile.get(&id) {
            Some(series) if inertia.provision_type() == ProvisionType::SyntheticWind => (
                series.inertia_constant.iter().map(|h| h.value()).collect(),
                series.moment_of_inertia.iter().map(|j| j.value()).collect(),
            ),
            _ => (
                vec![inertia.inertia_constant().value(); num_timesteps],
                inertia.moment_of_inertia().to_series(num_timesteps),
            ),
        };

        let sequences = &mut component.sequences;
        sequences.insert("inertia_constant", inertia_constant);
        sequences.insert(
            "apparent_power",
            vec![inertia.apparent_power().value(); num_timesteps],
        );
        sequences.insert("moment_of_inertia", moment_of_inertia);
    }
}

/// Sum commitment * J over synchronous and over all inertia sources
fn system_inertia(results: &Results, solved: &SolvedModel) -> Vec<SystemInertia> {
    let sources = solved.energy_system.sources_inertia();
    (0..solved.energy_system.num_timesteps())
        .map(|t| {
            let mut summary = SystemInertia {
                synchronous_inertia: 0.0,
                total_inertia: 0.0,
            };
            for (id, inertia) in &sources {
                let Some(component) = results.edges.get(id) else {
                    continue;
                };
                let committed = component
                    .sequences
                    .get("source_inertia")
                    .map_or(0.0, |values| values[t].round());
                let provided = committed * solved.profile.moment_of_inertia(id, t).value();

                summary.total_inertia += provided;
                if inertia.provision_type().is_synchronous() {
                    summary.synchronous_inertia += provided;
                }
            }
            summary
        })
        .collect()
}
