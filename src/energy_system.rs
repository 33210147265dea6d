//! The energy system graph: nodes connected by flows and inertia sources.
use crate::error::ModelError;
use crate::flow::Flow;
use crate::id::{EdgeID, NodeID};
use crate::inertia::{InertiaEdge, LEGACY_GRID_FREQUENCY};
use crate::node::{Node, NodeKind};
use crate::units::{Dimensionless, Hertz, MomentOfInertia};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use log::{debug, warn};
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;

/// An edge of the energy system graph
#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    /// A flow of energy
    Flow(Flow),
    /// Provision of rotational inertia
    Inertia(InertiaEdge),
}

/// System-wide parameters relating to inertia
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemParameters {
    /// The nominal frequency of the grid
    pub nominal_grid_frequency: Option<Hertz>,
    /// Lower limit for the inertia of synchronous machines at every timestep
    pub minimum_system_synchronous_inertia: Option<MomentOfInertia>,
    /// Lower limit for the inertia of all sources at every timestep
    pub minimum_system_inertia: Option<MomentOfInertia>,
    /// Multiplier for the output of the wind inertia estimator
    pub emulated_inertia_constant: Option<Dimensionless>,
    /// Whether inertia formulas use `nominal_grid_frequency` instead of 50 Hz
    pub use_nominal_frequency: bool,
}

impl SystemParameters {
    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |field, reason: &str| ModelError::validation("energy system", field, reason);

        if self
            .nominal_grid_frequency
            .is_some_and(|f| !(f.is_finite() && f.value() > 0.0))
        {
            return Err(invalid(
                "nominal_grid_frequency",
                "the nominal grid frequency has to be above 0",
            ));
        }
        if self
            .minimum_system_synchronous_inertia
            .is_some_and(|j| !(j.is_finite() && j.value() >= 0.0))
        {
            return Err(invalid(
                "minimum_system_synchronous_inertia",
                "can not be below zero",
            ));
        }
        if self
            .minimum_system_inertia
            .is_some_and(|j| !(j.is_finite() && j.value() >= 0.0))
        {
            return Err(invalid("minimum_system_inertia", "can not be below zero"));
        }
        if self
            .emulated_inertia_constant
            .is_some_and(|c| !c.0.is_finite())
        {
            return Err(invalid("emulated_inertia_constant", "must be finite"));
        }

        Ok(())
    }

    /// The grid frequency used by the inertia formulas.
    ///
    /// This is 50 Hz unless `use_nominal_frequency` is set and a nominal frequency is given.
    pub fn physics_frequency(&self) -> Hertz {
        match self.nominal_grid_frequency {
            Some(frequency) if self.use_nominal_frequency => frequency,
            _ => LEGACY_GRID_FREQUENCY,
        }
    }
}

/// An energy system: a graph of nodes and edges over an ordered time index.
///
/// The graph is assembled with [`EnergySystem::add_node`], [`EnergySystem::add_flow`] and
/// [`EnergySystem::add_inertia_source`] and checked as a whole with [`EnergySystem::validate`]
/// before a model is built from it.
#[derive(Debug, Clone)]
pub struct EnergySystem {
    graph: Graph<Node, Edge>,
    node_indices: IndexMap<NodeID, NodeIndex>,
    edge_indices: IndexMap<EdgeID, EdgeIndex>,
    timeindex: Vec<NaiveDateTime>,
    parameters: SystemParameters,
}

impl EnergySystem {
    /// Create an energy system without any nodes
    pub fn new(timeindex: Vec<NaiveDateTime>, parameters: SystemParameters) -> Result<Self> {
        ensure!(!timeindex.is_empty(), "The time index cannot be empty");
        ensure!(
            timeindex.windows(2).all(|pair| pair[0] < pair[1]),
            "The time index must be strictly increasing"
        );
        parameters.validate()?;

        if let Some(frequency) = parameters.nominal_grid_frequency
            && !parameters.use_nominal_frequency
            && frequency != LEGACY_GRID_FREQUENCY
        {
            warn!(
                "Nominal grid frequency is {frequency} Hz, but inertia is calculated for \
                {LEGACY_GRID_FREQUENCY} Hz. Set use_nominal_frequency to use the nominal frequency."
            );
        }

        Ok(Self {
            graph: Graph::new(),
            node_indices: IndexMap::new(),
            edge_indices: IndexMap::new(),
            timeindex,
            parameters,
        })
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        ensure!(
            !self.node_indices.contains_key(&node.id),
            "Duplicate node label {}",
            node.id
        );

        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);

        Ok(())
    }

    /// Add a flow from `source` to `target`
    pub fn add_flow(&mut self, source: &NodeID, target: &NodeID, flow: Flow) -> Result<()> {
        self.add_edge(source, target, Edge::Flow(flow))
    }

    /// Add an inertia source from `source` to `target`.
    ///
    /// The source's derived values must have been calculated with this system's
    /// [`SystemParameters::physics_frequency`].
    pub fn add_inertia_source(
        &mut self,
        source: &NodeID,
        target: &NodeID,
        inertia: InertiaEdge,
    ) -> Result<()> {
        let frequency = self.parameters.physics_frequency();
        if inertia.frequency() != frequency {
            Err(ModelError::validation(
                EdgeID::new(source, target),
                "frequency",
                format!(
                    "derived with {} Hz, but the energy system uses {frequency} Hz",
                    inertia.frequency()
                ),
            ))?;
        }

        self.add_edge(source, target, Edge::Inertia(inertia))
    }

    fn add_edge(&mut self, source: &NodeID, target: &NodeID, edge: Edge) -> Result<()> {
        let id = EdgeID::new(source, target);
        let source_index = self.node_index(source)?;
        let target_index = self.node_index(target)?;
        ensure!(
            !self.edge_indices.contains_key(&id),
            "There is already an edge {id}"
        );

        let index = self.graph.add_edge(source_index, target_index, edge);
        self.edge_indices.insert(id, index);

        Ok(())
    }

    fn node_index(&self, id: &NodeID) -> Result<NodeIndex> {
        self.node_indices
            .get(id)
            .copied()
            .with_context(|| format!("Unknown node {id}"))
    }

    /// Check that the energy system can be turned into a model.
    ///
    /// This checks every flow's and storage's parameters against the time index, the sequences of
    /// the inertia sources and the number of connections of storages.
    pub fn validate(&self) -> Result<()> {
        let num_timesteps = self.num_timesteps();
        for (edge_id, edge) in self.iter_edges() {
            match edge {
                Edge::Flow(flow) => flow.validate(&edge_id, num_timesteps)?,
                Edge::Inertia(inertia) => {
                    inertia
                        .inertia_costs()
                        .check_length(num_timesteps)
                        .with_context(|| {
                            format!("Invalid inertia_costs for inertia source {edge_id}")
                        })?;
                }
            }
        }

        for node in self.nodes() {
            match &node.kind {
                NodeKind::Storage(storage) => {
                    storage.validate(&node.id, num_timesteps)?;
                    self.check_storage_connections(&node.id)?;
                }
                NodeKind::Transformer(transformer) => {
                    for (connected, seq) in &transformer.conversion_factors {
                        seq.check_length(num_timesteps).with_context(|| {
                            format!(
                                "Invalid conversion factor for {connected} of transformer {}",
                                node.id
                            )
                        })?;
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Energy system has {} nodes, {} flows and {} inertia sources",
            self.node_indices.len(),
            self.flows().len(),
            self.sources_inertia().len()
        );

        Ok(())
    }

    /// Storages have one input and one output flow. An additional inertia output is allowed.
    fn check_storage_connections(&self, node: &NodeID) -> Result<()> {
        if self.inputs(node).count() > 1 {
            Err(ModelError::Cardinality {
                node: node.to_string(),
                direction: "input",
            })?;
        }

        let num_output_flows = self
            .outputs(node)
            .filter(|(_, edge)| matches!(edge, Edge::Flow(_)))
            .count();
        if num_output_flows > 1 {
            Err(ModelError::Cardinality {
                node: node.to_string(),
                direction: "output",
            })?;
        }

        Ok(())
    }

    /// The ordered time index
    pub fn timeindex(&self) -> &[NaiveDateTime] {
        &self.timeindex
    }

    /// The number of timesteps in the time index
    pub fn num_timesteps(&self) -> usize {
        self.timeindex.len()
    }

    /// System-wide parameters
    pub fn parameters(&self) -> &SystemParameters {
        &self.parameters
    }

    /// Iterate over the nodes in the order they were added
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_indices.values().map(|&index| &self.graph[index])
    }

    /// Get a node by its label
    pub fn node(&self, id: &NodeID) -> Option<&Node> {
        self.node_indices.get(id).map(|&index| &self.graph[index])
    }

    /// Iterate over all edges in the order they were added
    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeID, &Edge)> {
        self.edge_indices
            .iter()
            .map(|(id, &index)| (id.clone(), &self.graph[index]))
    }

    /// Get an edge by its end points
    pub fn edge(&self, id: &EdgeID) -> Option<&Edge> {
        self.edge_indices.get(id).map(|&index| &self.graph[index])
    }

    /// All flows, keyed by (source, target)
    pub fn flows(&self) -> IndexMap<EdgeID, &Flow> {
        self.iter_edges()
            .filter_map(|(id, edge)| match edge {
                Edge::Flow(flow) => Some((id, flow)),
                Edge::Inertia(_) => None,
            })
            .collect()
    }

    /// All inertia sources, keyed by (source, target)
    pub fn sources_inertia(&self) -> IndexMap<EdgeID, &InertiaEdge> {
        self.iter_edges()
            .filter_map(|(id, edge)| match edge {
                Edge::Inertia(inertia) => Some((id, inertia)),
                Edge::Flow(_) => None,
            })
            .collect()
    }

    /// Iterate over the edges ending at `node`
    pub fn inputs(&self, node: &NodeID) -> impl Iterator<Item = (EdgeID, &Edge)> {
        self.iter_directed(node, Direction::Incoming)
    }

    /// Iterate over the edges starting at `node`
    pub fn outputs(&self, node: &NodeID) -> impl Iterator<Item = (EdgeID, &Edge)> {
        self.iter_directed(node, Direction::Outgoing)
    }

    fn iter_directed(
        &self,
        node: &NodeID,
        direction: Direction,
    ) -> impl Iterator<Item = (EdgeID, &Edge)> {
        // petgraph iterates adjacent edges newest first, so we reverse to get insertion order
        let mut edges: Vec<_> = self
            .node_indices
            .get(node)
            .into_iter()
            .flat_map(|&index| self.graph.edges_directed(index, direction))
            .map(|edge| {
                let id = EdgeID::new(
                    &self.graph[edge.source()].id,
                    &self.graph[edge.target()].id,
                );
                (id, edge.weight())
            })
            .collect();
        edges.reverse();
        edges.into_iter()
    }

    /// Find the flow correlated with an inertia source: the flow leaving the same source node.
    ///
    /// If the source node has several output flows, the last one added is used.
    pub fn correlated_flow(&self, inertia_source: &EdgeID) -> Option<(EdgeID, &Flow)> {
        let flows: Vec<_> = self
            .outputs(&inertia_source.source)
            .filter_map(|(id, edge)| match edge {
                Edge::Flow(flow) => Some((id, flow)),
                Edge::Inertia(_) => None,
            })
            .collect();

        let num_flows = flows.len();
        let last = flows.into_iter().next_back()?;
        if num_flows > 1 {
            warn!(
                "Node {} has several output flows; using {} as the flow correlated with \
                {inertia_source}",
                inertia_source.source, last.0
            );
        }

        Some(last)
    }

    /// Get the flow with the given end points, failing if there is no such flow
    pub fn get_flow(&self, id: &EdgeID) -> Result<&Flow> {
        match self.edge(id) {
            Some(Edge::Flow(flow)) => Ok(flow),
            Some(Edge::Inertia(_)) => bail!("{id} is an inertia source, not a flow"),
            None => bail!("No flow {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, energy_system, timeindex};
    use crate::inertia::{InertiaParameters, ProvisionType};
    use crate::node::GenericStorage;
    use crate::units::{ApparentPower, Seconds};
    use rstest::rstest;

    #[rstest]
    fn test_flows_and_sources_inertia(energy_system: EnergySystem) {
        let flows = energy_system.flows();
        assert!(flows.contains_key::<EdgeID>(&("gas_plant", "electricity").into()));
        assert!(!flows.contains_key::<EdgeID>(&("gas_plant", "inertia").into()));

        let sources = energy_system.sources_inertia();
        assert_eq!(
            sources.keys().collect::<Vec<_>>(),
            vec![&EdgeID::from(("gas_plant", "inertia"))]
        );
    }

    #[rstest]
    fn test_correlated_flow(energy_system: EnergySystem) {
        let (id, flow) = energy_system
            .correlated_flow(&("gas_plant", "inertia").into())
            .unwrap();
        assert_eq!(id, ("gas_plant", "electricity").into());
        assert_eq!(flow.nominal_value, Some(100.0));
    }

    #[rstest]
    fn test_correlated_flow_last_added(mut energy_system: EnergySystem) {
        energy_system.add_node(Node::bus("heat")).unwrap();
        energy_system
            .add_flow(&"gas_plant".into(), &"heat".into(), Flow::default())
            .unwrap();
        let (id, _) = energy_system
            .correlated_flow(&("gas_plant", "inertia").into())
            .unwrap();
        assert_eq!(id, ("gas_plant", "heat").into());
    }

    #[rstest]
    fn test_correlated_flow_missing(mut energy_system: EnergySystem) {
        energy_system.add_node(Node::new("lonely", NodeKind::Source)).unwrap();
        let inertia = InertiaEdge::new(InertiaParameters::new(ProvisionType::None)).unwrap();
        energy_system
            .add_inertia_source(&"lonely".into(), &"inertia".into(), inertia)
            .unwrap();
        assert!(energy_system
            .correlated_flow(&("lonely", "inertia").into())
            .is_none());
    }

    #[rstest]
    fn test_inputs_outputs_order(energy_system: EnergySystem) {
        let outputs: Vec<_> = energy_system
            .outputs(&"gas_plant".into())
            .map(|(id, _)| id)
            .collect();
        assert_eq!(
            outputs,
            vec![
                EdgeID::from(("gas_plant", "electricity")),
                EdgeID::from(("gas_plant", "inertia"))
            ]
        );
    }

    #[rstest]
    fn test_duplicate_node(mut energy_system: EnergySystem) {
        assert_error!(
            energy_system.add_node(Node::bus("electricity")),
            "Duplicate node label electricity"
        );
    }

    #[rstest]
    fn test_duplicate_edge(mut energy_system: EnergySystem) {
        assert_error!(
            energy_system.add_flow(&"gas_plant".into(), &"electricity".into(), Flow::default()),
            "There is already an edge (gas_plant, electricity)"
        );
    }

    #[rstest]
    fn test_unknown_node(mut energy_system: EnergySystem) {
        assert_error!(
            energy_system.add_flow(&"nowhere".into(), &"electricity".into(), Flow::default()),
            "Unknown node nowhere"
        );
    }

    #[rstest]
    fn test_storage_cardinality(mut energy_system: EnergySystem) {
        let battery = NodeKind::Storage(GenericStorage {
            nominal_storage_capacity: 10.0,
            ..GenericStorage::default()
        });
        energy_system.add_node(Node::new("battery", battery)).unwrap();
        let battery_id = NodeID::new("battery");
        let electricity = NodeID::new("electricity");
        energy_system
            .add_flow(&electricity, &battery_id, Flow::default())
            .unwrap();
        energy_system
            .add_flow(&battery_id, &electricity, Flow::default())
            .unwrap();
        let inertia =
            InertiaEdge::new(InertiaParameters::new(ProvisionType::SyntheticStorage)).unwrap();
        energy_system
            .add_inertia_source(&battery_id, &"inertia".into(), inertia)
            .unwrap();
        energy_system.validate().unwrap();

        // A second output flow is not allowed
        energy_system.add_node(Node::bus("heat")).unwrap();
        energy_system
            .add_flow(&battery_id, &"heat".into(), Flow::default())
            .unwrap();
        let err = energy_system.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::Cardinality {
                node: "battery".into(),
                direction: "output"
            })
        );
    }

    #[rstest]
    #[case(SystemParameters {
        nominal_grid_frequency: Some(Hertz(0.0)),
        ..Default::default()
    })]
    #[case(SystemParameters {
        minimum_system_inertia: Some(MomentOfInertia(-1.0)),
        ..Default::default()
    })]
    #[case(SystemParameters {
        minimum_system_synchronous_inertia: Some(MomentOfInertia(-1.0)),
        ..Default::default()
    })]
    fn test_invalid_parameters(
        timeindex: Vec<NaiveDateTime>,
        #[case] parameters: SystemParameters,
    ) {
        let err = EnergySystem::new(timeindex, parameters).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::Validation { .. })
        ));
    }

    #[rstest]
    fn test_empty_timeindex() {
        assert_error!(
            EnergySystem::new(Vec::new(), SystemParameters::default()),
            "The time index cannot be empty"
        );
    }

    #[test]
    fn test_physics_frequency() {
        let mut parameters = SystemParameters {
            nominal_grid_frequency: Some(Hertz(60.0)),
            ..SystemParameters::default()
        };
        assert_eq!(parameters.physics_frequency(), Hertz(50.0));
        parameters.use_nominal_frequency = true;
        assert_eq!(parameters.physics_frequency(), Hertz(60.0));
    }

    #[rstest]
    fn test_inertia_source_frequency(timeindex: Vec<NaiveDateTime>) {
        let parameters = SystemParameters {
            nominal_grid_frequency: Some(Hertz(60.0)),
            use_nominal_frequency: true,
            ..SystemParameters::default()
        };
        let mut es = EnergySystem::new(timeindex, parameters).unwrap();
        es.add_node(Node::new("gas_plant", NodeKind::Source)).unwrap();
        es.add_node(Node::new("inertia", NodeKind::Bus { balanced: false }))
            .unwrap();
        let params = InertiaParameters {
            inertia_constant: Some(Seconds(4.0)),
            apparent_power: Some(ApparentPower(100.0)),
            ..InertiaParameters::new(ProvisionType::SynchronousGenerator)
        };

        // Derived at 50 Hz
        let inertia = InertiaEdge::new(params.clone()).unwrap();
        let err = es
            .add_inertia_source(&"gas_plant".into(), &"inertia".into(), inertia)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::Validation {
                field: "frequency",
                ..
            })
        ));
        assert!(es.sources_inertia().is_empty());

        let inertia = InertiaEdge::with_frequency(params, Hertz(60.0)).unwrap();
        es.add_inertia_source(&"gas_plant".into(), &"inertia".into(), inertia)
            .unwrap();
    }

    #[rstest]
    fn test_validate_profile_length(mut energy_system: EnergySystem) {
        energy_system.add_node(Node::new("wind", NodeKind::Source)).unwrap();
        let flow = Flow {
            fix: Some(vec![0.5].into()),
            ..Flow::with_nominal_value(10.0)
        };
        energy_system
            .add_flow(&"wind".into(), &"electricity".into(), flow)
            .unwrap();
        assert_error!(
            energy_system.validate(),
            "Invalid fix for flow (wind, electricity)"
        );
    }
}
