//! The nodes of an energy system graph.
use crate::error::ModelError;
use crate::id::NodeID;
use crate::sequence::Sequence;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

/// A connection point in the energy system graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique label of the node
    pub id: NodeID,
    /// What kind of node this is, with kind-specific parameters
    pub kind: NodeKind,
}

impl Node {
    /// Create a new node
    pub fn new(id: impl Into<NodeID>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// A balanced bus
    pub fn bus(id: impl Into<NodeID>) -> Self {
        Self::new(id, NodeKind::Bus { balanced: true })
    }

    /// Whether flows into this node take part in the relations of upstream transformers.
    ///
    /// Only buses can be unbalanced.
    pub fn is_balanced(&self) -> bool {
        match self.kind {
            NodeKind::Bus { balanced } => balanced,
            _ => true,
        }
    }

    /// The [`NodeType`] of this node
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Bus { .. } => NodeType::Bus,
            NodeKind::Source => NodeType::Source,
            NodeKind::Sink => NodeType::Sink,
            NodeKind::Transformer(_) => NodeType::Transformer,
            NodeKind::Storage(_) => NodeType::Storage,
        }
    }
}

/// The kinds of nodes, as named in input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
pub enum NodeType {
    /// See [`NodeKind::Bus`]
    #[string = "bus"]
    Bus,
    /// See [`NodeKind::Source`]
    #[string = "source"]
    Source,
    /// See [`NodeKind::Sink`]
    #[string = "sink"]
    Sink,
    /// See [`NodeKind::Transformer`]
    #[string = "transformer"]
    Transformer,
    /// See [`NodeKind::Storage`]
    #[string = "storage"]
    Storage,
}

/// Kind-specific parameters of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Connects flows. A balanced bus has inflows equal to outflows at every timestep.
    Bus {
        /// Whether the balance constraint applies
        balanced: bool,
    },
    /// Only has outputs
    Source,
    /// Only has inputs
    Sink,
    /// Converts inputs into outputs in fixed ratios
    Transformer(Transformer),
    /// Stores energy between timesteps
    Storage(GenericStorage),
}

/// Parameters of a linear transformer with any number of inputs and outputs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transformer {
    /// Conversion factor for each connected node. Nodes not listed have a factor of one.
    pub conversion_factors: IndexMap<NodeID, Sequence>,
}

impl Transformer {
    /// The conversion factor for the connection to `node` at timestep `t`
    pub fn conversion_factor(&self, node: &NodeID, t: usize) -> f64 {
        self.conversion_factors.get(node).map_or(1.0, |seq| seq.get(t))
    }
}

/// Parameters of a storage with a single input and a single output flow
#[derive(Debug, Clone, PartialEq)]
pub struct GenericStorage {
    /// The maximum amount of energy which can be stored
    pub nominal_storage_capacity: f64,
    /// Fraction of the stored energy lost per timestep
    pub loss_rate: f64,
    /// Storage level before the first timestep, as a fraction of capacity
    pub initial_storage_level: Option<f64>,
    /// Efficiency of charging
    pub inflow_conversion_factor: Sequence,
    /// Efficiency of discharging
    pub outflow_conversion_factor: Sequence,
    /// Minimum storage level as a fraction of capacity
    pub min_storage_level: Sequence,
    /// Maximum storage level as a fraction of capacity
    pub max_storage_level: Sequence,
    /// Whether the last storage level must equal the initial one
    pub balanced: bool,
}

impl Default for GenericStorage {
    fn default() -> Self {
        Self {
            nominal_storage_capacity: 0.0,
            loss_rate: 0.0,
            initial_storage_level: None,
            inflow_conversion_factor: Sequence::Constant(1.0),
            outflow_conversion_factor: Sequence::Constant(1.0),
            min_storage_level: Sequence::Constant(0.0),
            max_storage_level: Sequence::Constant(1.0),
            balanced: true,
        }
    }
}

impl GenericStorage {
    /// Check the storage's parameters over a horizon of `num_timesteps`
    pub fn validate(&self, node: &NodeID, num_timesteps: usize) -> Result<()> {
        let invalid =
            |field, reason: &str| ModelError::validation(format!("storage {node}"), field, reason);
        let is_fraction = |value: f64| (0.0..=1.0).contains(&value);

        if !(self.nominal_storage_capacity.is_finite() && self.nominal_storage_capacity >= 0.0) {
            Err(invalid(
                "nominal_storage_capacity",
                "must be a finite number >= 0",
            ))?;
        }
        if !is_fraction(self.loss_rate) {
            Err(invalid("loss_rate", "must be between 0 and 1"))?;
        }
        if self.initial_storage_level.is_some_and(|level| !is_fraction(level)) {
            Err(invalid("initial_storage_level", "must be between 0 and 1"))?;
        }

        for (field, seq) in [
            ("inflow_conversion_factor", &self.inflow_conversion_factor),
            ("outflow_conversion_factor", &self.outflow_conversion_factor),
        ] {
            seq.check_length(num_timesteps)
                .with_context(|| format!("Invalid {field} for storage {node}"))?;
            if !seq.all(|value| value.is_finite() && value > 0.0) {
                Err(invalid(field, "must be finite numbers > 0"))?;
            }
        }

        for (field, seq) in [
            ("min_storage_level", &self.min_storage_level),
            ("max_storage_level", &self.max_storage_level),
        ] {
            seq.check_length(num_timesteps)
                .with_context(|| format!("Invalid {field} for storage {node}"))?;
            if !seq.all(is_fraction) {
                Err(invalid(field, "must be between 0 and 1"))?;
            }
        }

        Ok(())
    }
}
