//! The module responsible for writing results to disk.
use crate::id::{EdgeID, NodeID};
use crate::optimisation::Solution;
use crate::results::Results;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "opinmod_results";

/// The output file name for per-timestep values of edges
const EDGE_SEQUENCES_FILE_NAME: &str = "edge_sequences.csv";

/// The output file name for per-timestep values of nodes
const NODE_SEQUENCES_FILE_NAME: &str = "node_sequences.csv";

/// The output file name for values which don't depend on the timestep
const SCALARS_FILE_NAME: &str = "scalars.csv";

/// The output file name for the inertia of the whole system
const SYSTEM_INERTIA_FILE_NAME: &str = "system_inertia.csv";

/// The output file name for the objective value
const OBJECTIVE_FILE_NAME: &str = "objective.txt";

/// The output file name for the values of all variables
const DEBUG_VARIABLES_FILE_NAME: &str = "debug_variables.csv";

/// Get the default output folder for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, deleting an existing one if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing folder is being overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct EdgeSequenceRow {
    source: NodeID,
    target: NodeID,
    variable: String,
    timestep: usize,
    value: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct NodeSequenceRow {
    node: NodeID,
    variable: String,
    timestep: usize,
    value: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ScalarRow {
    source: NodeID,
    target: Option<NodeID>,
    variable: String,
    value: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SystemInertiaRow {
    timestep: usize,
    synchronous_inertia: f64,
    total_inertia: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct VariableRow {
    variable: String,
    value: f64,
}

/// An object for writing results to CSV files
pub struct DataWriter {
    output_path: PathBuf,
    edge_sequences_writer: csv::Writer<File>,
    node_sequences_writer: csv::Writer<File>,
    scalars_writer: csv::Writer<File>,
    system_inertia_writer: csv::Writer<File>,
    debug_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to also write the values of all variables
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        let debug_writer = if save_debug_info {
            Some(new_writer(DEBUG_VARIABLES_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            output_path: output_path.to_path_buf(),
            edge_sequences_writer: new_writer(EDGE_SEQUENCES_FILE_NAME)?,
            node_sequences_writer: new_writer(NODE_SEQUENCES_FILE_NAME)?,
            scalars_writer: new_writer(SCALARS_FILE_NAME)?,
            system_inertia_writer: new_writer(SYSTEM_INERTIA_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write the results of a solved model
    pub fn write_results(&mut self, results: &Results) -> Result<()> {
        self.write_edges(results)?;
        self.write_nodes(results)?;
        self.write_system_inertia(results)?;

        fs::write(
            self.output_path.join(OBJECTIVE_FILE_NAME),
            format!("{}\n", results.objective),
        )?;

        Ok(())
    }

    fn write_edges(&mut self, results: &Results) -> Result<()> {
        for (EdgeID { source, target }, component) in &results.edges {
            for (variable, values) in &component.sequences {
                for (timestep, value) in values.iter().enumerate() {
                    self.edge_sequences_writer.serialize(EdgeSequenceRow {
                        source: source.clone(),
                        target: target.clone(),
                        variable: (*variable).to_string(),
                        timestep,
                        value: *value,
                    })?;
                }
            }
            for (variable, value) in &component.scalars {
                self.scalars_writer.serialize(ScalarRow {
                    source: source.clone(),
                    target: Some(target.clone()),
                    variable: (*variable).to_string(),
                    value: *value,
                })?;
            }
        }

        Ok(())
    }

    fn write_nodes(&mut self, results: &Results) -> Result<()> {
        for (node, component) in &results.nodes {
            for (variable, values) in &component.sequences {
                for (timestep, value) in values.iter().enumerate() {
                    self.node_sequences_writer.serialize(NodeSequenceRow {
                        node: node.clone(),
                        variable: (*variable).to_string(),
                        timestep,
                        value: *value,
                    })?;
                }
            }
            // Node scalars have no target
            for (variable, value) in &component.scalars {
                self.scalars_writer.serialize(ScalarRow {
                    source: node.clone(),
                    target: None,
                    variable: (*variable).to_string(),
                    value: *value,
                })?;
            }
        }

        Ok(())
    }

    fn write_system_inertia(&mut self, results: &Results) -> Result<()> {
        for (timestep, summary) in results.system_inertia.iter().enumerate() {
            self.system_inertia_writer.serialize(SystemInertiaRow {
                timestep,
                synchronous_inertia: summary.synchronous_inertia,
                total_inertia: summary.total_inertia,
            })?;
        }

        Ok(())
    }

    /// Write the values of all variables, if debug output is enabled
    pub fn write_debug_info(&mut self, solution: &Solution) -> Result<()> {
        let Some(writer) = &mut self.debug_writer else {
            return Ok(());
        };

        for (key, value) in solution.iter_values() {
            writer.serialize(VariableRow {
                variable: format!("{key:?}"),
                value,
            })?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.edge_sequences_writer.flush()?;
        self.node_sequences_writer.flush()?;
        self.scalars_writer.flush()?;
        self.system_inertia_writer.flush()?;
        if let Some(writer) = &mut self.debug_writer {
            writer.flush()?;
        }

        Ok(())
    }
}
