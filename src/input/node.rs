//! Code for reading nodes, storages and conversion factors from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::id::NodeID;
use crate::node::{GenericStorage, Node, NodeKind, NodeType, Transformer};
use crate::sequence::Sequence;
use anyhow::{Context, Result, anyhow, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const NODES_FILE_NAME: &str = "nodes.csv";
const STORAGES_FILE_NAME: &str = "storages.csv";
const CONVERSION_FACTORS_FILE_NAME: &str = "conversion_factors.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct NodeRaw {
    id: String,
    kind: NodeType,
    balanced: Option<bool>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct StorageRaw {
    node: String,
    nominal_storage_capacity: f64,
    loss_rate: Option<f64>,
    initial_storage_level: Option<f64>,
    inflow_conversion_factor: Option<f64>,
    outflow_conversion_factor: Option<f64>,
    min_storage_level: Option<f64>,
    max_storage_level: Option<f64>,
    balanced: Option<bool>,
}

impl From<StorageRaw> for GenericStorage {
    fn from(raw: StorageRaw) -> Self {
        let defaults = GenericStorage::default();
        let or_default =
            |value: Option<f64>, default: Sequence| value.map_or(default, Sequence::Constant);

        GenericStorage {
            nominal_storage_capacity: raw.nominal_storage_capacity,
            loss_rate: raw.loss_rate.unwrap_or(defaults.loss_rate),
            initial_storage_level: raw.initial_storage_level,
            inflow_conversion_factor: or_default(
                raw.inflow_conversion_factor,
                defaults.inflow_conversion_factor,
            ),
            outflow_conversion_factor: or_default(
                raw.outflow_conversion_factor,
                defaults.outflow_conversion_factor,
            ),
            min_storage_level: or_default(raw.min_storage_level, defaults.min_storage_level),
            max_storage_level: or_default(raw.max_storage_level, defaults.max_storage_level),
            balanced: raw.balanced.unwrap_or(defaults.balanced),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct ConversionFactorRaw {
    transformer: String,
    node: String,
    value: f64,
}

/// Read the nodes of an energy system.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The nodes in the order they appear in the file.
pub fn read_nodes(model_dir: &Path) -> Result<Vec<Node>> {
    let file_path = model_dir.join(NODES_FILE_NAME);
    let nodes_csv = read_csv(&file_path)?;
    let mut storages = read_storages(model_dir)?;
    let mut transformers = read_conversion_factors(model_dir)?;

    let nodes = read_nodes_from_iter(nodes_csv, &mut storages, &mut transformers)
        .with_context(|| input_err_msg(&file_path))?;

    if let Some(id) = storages.keys().next() {
        return Err(unknown_node(id, "storage")
            .context(input_err_msg(model_dir.join(STORAGES_FILE_NAME))));
    }
    if let Some(id) = transformers.keys().next() {
        return Err(unknown_node(id, "transformer")
            .context(input_err_msg(model_dir.join(CONVERSION_FACTORS_FILE_NAME))));
    }

    Ok(nodes)
}

fn unknown_node(id: &NodeID, kind: &str) -> anyhow::Error {
    anyhow!("{id} is not a {kind} in {NODES_FILE_NAME}")
}

fn read_nodes_from_iter<I>(
    iter: I,
    storages: &mut IndexMap<NodeID, GenericStorage>,
    transformers: &mut IndexMap<NodeID, Transformer>,
) -> Result<Vec<Node>>
where
    I: Iterator<Item = NodeRaw>,
{
    let mut nodes = Vec::new();
    for raw in iter {
        let id = NodeID::from(raw.id.as_str());
        ensure!(
            raw.balanced.is_none() || raw.kind == NodeType::Bus,
            "balanced can only be given for buses (node {id})"
        );

        let kind = match raw.kind {
            NodeType::Bus => NodeKind::Bus {
                balanced: raw.balanced.unwrap_or(true),
            },
            NodeType::Source => NodeKind::Source,
            NodeType::Sink => NodeKind::Sink,
            NodeType::Transformer => {
                NodeKind::Transformer(transformers.shift_remove(&id).unwrap_or_default())
            }
            NodeType::Storage => {
                let storage = storages.shift_remove(&id).with_context(|| {
                    format!("Storage {id} has no entry in {STORAGES_FILE_NAME}")
                })?;
                NodeKind::Storage(storage)
            }
        };
        nodes.push(Node::new(id, kind));
    }

    Ok(nodes)
}

fn read_storages(model_dir: &Path) -> Result<IndexMap<NodeID, GenericStorage>> {
    let file_path = model_dir.join(STORAGES_FILE_NAME);
    let storages_csv = read_csv_optional::<StorageRaw>(&file_path)?;

    let mut storages = IndexMap::new();
    for raw in storages_csv {
        let id = NodeID::from(raw.node.as_str());
        let existing = storages.insert(id.clone(), raw.into()).is_some();
        ensure!(
            !existing,
            "{}: Duplicate entry for storage {id}",
            input_err_msg(&file_path)
        );
    }

    Ok(storages)
}

fn read_conversion_factors(model_dir: &Path) -> Result<IndexMap<NodeID, Transformer>> {
    let file_path = model_dir.join(CONVERSION_FACTORS_FILE_NAME);
    let factors_csv = read_csv_optional::<ConversionFactorRaw>(&file_path)?;

    let mut transformers: IndexMap<NodeID, Transformer> = IndexMap::new();
    for raw in factors_csv {
        let transformer = transformers
            .entry(raw.transformer.as_str().into())
            .or_default();
        let existing = transformer
            .conversion_factors
            .insert(raw.node.as_str().into(), Sequence::Constant(raw.value))
            .is_some();
        ensure!(
            !existing,
            "{}: Duplicate conversion factor for {} of transformer {}",
            input_err_msg(&file_path),
            raw.node,
            raw.transformer
        );
    }

    Ok(transformers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_read_nodes() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            NODES_FILE_NAME,
            "id,kind,balanced
electricity,bus,
inertia,bus,false
gas,source,
chp,transformer,
battery,storage,",
        );
        write_file(
            dir.path(),
            STORAGES_FILE_NAME,
            "node,nominal_storage_capacity,loss_rate,initial_storage_level,inflow_conversion_factor,outflow_conversion_factor,min_storage_level,max_storage_level,balanced
battery,10,0.01,0.5,,0.9,,,",
        );
        write_file(
            dir.path(),
            CONVERSION_FACTORS_FILE_NAME,
            "transformer,node,value\nchp,electricity,0.4",
        );

        let nodes = read_nodes(dir.path()).unwrap();
        assert_eq!(nodes.len(), 5);
        assert!(nodes[0].is_balanced());
        assert!(!nodes[1].is_balanced());
        let NodeKind::Transformer(transformer) = &nodes[3].kind else {
            panic!("Expected a transformer");
        };
        assert_eq!(transformer.conversion_factor(&"electricity".into(), 0), 0.4);
        let NodeKind::Storage(storage) = &nodes[4].kind else {
            panic!("Expected a storage");
        };
        assert_eq!(storage.nominal_storage_capacity, 10.0);
        assert_eq!(storage.initial_storage_level, Some(0.5));
        assert_eq!(storage.inflow_conversion_factor, Sequence::Constant(1.0));
        assert_eq!(storage.outflow_conversion_factor, Sequence::Constant(0.9));
        assert!(storage.balanced);
    }

    #[test]
    fn test_storage_without_entry() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), NODES_FILE_NAME, "id,kind,balanced\nbattery,storage,");
        let err = read_nodes(dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            input_err_msg(dir.path().join(NODES_FILE_NAME))
        );
        assert_eq!(
            err.chain().nth(1).unwrap().to_string(),
            "Storage battery has no entry in storages.csv"
        );
    }

    #[test]
    fn test_conversion_factor_for_unknown_transformer() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), NODES_FILE_NAME, "id,kind,balanced\ngas,source,");
        write_file(
            dir.path(),
            CONVERSION_FACTORS_FILE_NAME,
            "transformer,node,value\nchp,electricity,0.4",
        );
        let err = read_nodes(dir.path()).unwrap_err();
        assert_eq!(
            err.chain().nth(1).unwrap().to_string(),
            "chp is not a transformer in nodes.csv"
        );
    }

    #[test]
    fn test_balanced_only_for_buses() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), NODES_FILE_NAME, "id,kind,balanced\ngas,source,true");
        assert!(read_nodes(dir.path()).is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), NODES_FILE_NAME, "id,kind,balanced\ngas,reactor,");
        assert!(read_nodes(dir.path()).is_err());
    }
}
