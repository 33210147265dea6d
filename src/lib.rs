//! Common functionality for OpInMod, an energy system model with rotational inertia provision.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod blocks;
pub mod cli;
pub mod energy_system;
pub mod error;
pub mod flow;
pub mod grouping;
pub mod id;
pub mod inertia;
pub mod input;
pub mod log;
pub mod model;
pub mod node;
pub mod optimisation;
pub mod output;
pub mod results;
pub mod sequence;
pub mod settings;
pub mod units;
pub mod wind;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program
pub fn get_opinmod_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir available on this platform; settings will be read from the current dir
        return PathBuf::new();
    };
    config_dir.push("opinmod");

    config_dir
}
