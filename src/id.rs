//! Code for handling IDs
use std::fmt::Display;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `NodeID`)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }
        }
    };
}

define_id_type!(NodeID);

/// Identifies a directed edge of the energy system graph by its end points
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct EdgeID {
    /// The node the edge starts at
    pub source: NodeID,
    /// The node the edge ends at
    pub target: NodeID,
}

impl EdgeID {
    /// Create a new [`EdgeID`]
    pub fn new(source: &NodeID, target: &NodeID) -> Self {
        Self {
            source: source.clone(),
            target: target.clone(),
        }
    }
}

impl Display for EdgeID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.source, self.target)
    }
}

impl<S: Into<NodeID>, T: Into<NodeID>> From<(S, T)> for EdgeID {
    fn from((source, target): (S, T)) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
