//! Classification of the edges and nodes of an energy system into the working sets of the
//! optimisation blocks.
//!
//! Each kind of edge has a fixed set of capabilities. An edge is put into the working set of
//! every block whose required capability it has, so the sets are not mutually exclusive.
use crate::energy_system::{Edge, EnergySystem};
use crate::flow::Flow;
use crate::id::{EdgeID, NodeID};
use crate::node::NodeKind;
use strum::{Display, EnumIter};

/// An attribute of an edge which a block can act upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The edge has a (possibly unset) nominal value
    NominalValue,
    /// The edge's capacity is an investment decision
    Investment,
    /// The edge has an on/off status
    NonConvex,
    /// The edge provides inertia
    InertiaConstant,
}

/// The kinds of edges in an energy system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A flow with a fixed or no capacity
    Flow,
    /// A flow with an investment decision
    InvestmentFlow,
    /// A flow with a status variable
    NonConvexFlow,
    /// An inertia source
    Inertia,
}

impl EdgeKind {
    /// Classify an edge
    pub fn of(edge: &Edge) -> Self {
        match edge {
            Edge::Flow(Flow {
                investment: Some(_),
                ..
            }) => Self::InvestmentFlow,
            Edge::Flow(Flow { nonconvex: true, .. }) => Self::NonConvexFlow,
            Edge::Flow(_) => Self::Flow,
            Edge::Inertia(_) => Self::Inertia,
        }
    }

    /// The capabilities of this kind of edge
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Flow => &[Capability::NominalValue],
            Self::InvestmentFlow => &[Capability::NominalValue, Capability::Investment],
            Self::NonConvexFlow => &[Capability::NominalValue, Capability::NonConvex],
            Self::Inertia => &[Capability::InertiaConstant],
        }
    }
}

/// The blocks of the optimisation problem, in the order in which they are built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Block {
    /// Balance of inflows and outflows of buses
    Bus,
    /// Conversion relations of transformers
    Transformer,
    /// Storage content and balance
    Storage,
    /// Flows with investment decisions
    InvestmentFlow,
    /// Variable costs of all flows
    Flow,
    /// Flows with a status
    NonConvexFlow,
    /// Inertia provision
    Inertia,
}

/// The working sets of the blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Groups {
    /// Every flow
    pub flows: Vec<EdgeID>,
    /// Flows with an investment decision
    pub investment_flows: Vec<EdgeID>,
    /// Flows with a status variable
    pub nonconvex_flows: Vec<EdgeID>,
    /// Inertia sources
    pub inertia_sources: Vec<EdgeID>,
    /// Balanced buses
    pub buses: Vec<NodeID>,
    /// Transformers
    pub transformers: Vec<NodeID>,
    /// Storages
    pub storages: Vec<NodeID>,
}

impl Groups {
    /// Classify the edges and nodes of an energy system
    pub fn new(energy_system: &EnergySystem) -> Self {
        let mut groups = Self::default();
        for (id, edge) in energy_system.iter_edges() {
            groups.add_edge(id, EdgeKind::of(edge).capabilities());
        }

        for node in energy_system.nodes() {
            let group = match node.kind {
                NodeKind::Bus { balanced: true } => &mut groups.buses,
                NodeKind::Transformer(_) => &mut groups.transformers,
                NodeKind::Storage(_) => &mut groups.storages,
                _ => continue,
            };
            group.push(node.id.clone());
        }

        groups
    }

    /// Add an edge to the working set of each block requiring one of `capabilities`
    pub fn add_edge(&mut self, id: EdgeID, capabilities: &[Capability]) {
        for capability in capabilities {
            let group = match capability {
                Capability::NominalValue => &mut self.flows,
                Capability::Investment => &mut self.investment_flows,
                Capability::NonConvex => &mut self.nonconvex_flows,
                Capability::InertiaConstant => &mut self.inertia_sources,
            };
            group.push(id.clone());
        }
    }
}
