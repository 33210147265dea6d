//! Code for reading flows and their profiles from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::energy_system::EnergySystem;
use crate::flow::{Flow, Investment};
use crate::id::EdgeID;
use crate::sequence::Sequence;
use anyhow::{Context, Result, anyhow, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const FLOWS_FILE_NAME: &str = "flows.csv";
const FLOW_PROFILES_FILE_NAME: &str = "flow_profiles.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct FlowRaw {
    source: String,
    target: String,
    nominal_value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    fix: Option<f64>,
    variable_costs: Option<f64>,
    nonconvex: Option<bool>,
    unidirectional: Option<bool>,
    investment_ep_costs: Option<f64>,
    investment_maximum: Option<f64>,
    investment_minimum: Option<f64>,
    investment_existing: Option<f64>,
}

impl FlowRaw {
    fn investment(&self) -> Option<Investment> {
        let fields = [
            self.investment_ep_costs,
            self.investment_maximum,
            self.investment_minimum,
            self.investment_existing,
        ];
        if fields.iter().all(Option::is_none) {
            return None;
        }

        let defaults = Investment::default();
        Some(Investment {
            ep_costs: self.investment_ep_costs.unwrap_or(defaults.ep_costs),
            maximum: self.investment_maximum.unwrap_or(defaults.maximum),
            minimum: self.investment_minimum.unwrap_or(defaults.minimum),
            existing: self.investment_existing.unwrap_or(defaults.existing),
        })
    }

    fn into_flow(self) -> Flow {
        let defaults = Flow::default();
        let investment = self.investment();
        Flow {
            nominal_value: self.nominal_value,
            min: self.min.map_or(defaults.min, Sequence::Constant),
            max: self.max.map_or(defaults.max, Sequence::Constant),
            fix: self.fix.map(Sequence::Constant),
            variable_costs: self
                .variable_costs
                .map_or(defaults.variable_costs, Sequence::Constant),
            nonconvex: self.nonconvex.unwrap_or(defaults.nonconvex),
            unidirectional: self.unidirectional.unwrap_or(defaults.unidirectional),
            investment,
        }
    }
}

/// A flow parameter which can be given as a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
enum ProfileParameter {
    #[string = "min"]
    Min,
    #[string = "max"]
    Max,
    #[string = "fix"]
    Fix,
    #[string = "variable_costs"]
    VariableCosts,
}

#[derive(Debug, Deserialize, PartialEq)]
struct FlowProfileRaw {
    source: String,
    target: String,
    parameter: ProfileParameter,
    timestep: usize,
    value: f64,
}

type ProfileMap = IndexMap<(EdgeID, ProfileParameter), Vec<Option<f64>>>;

/// Read flows and their profiles and add them to the energy system.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `energy_system` - The energy system, which must already contain the nodes
pub fn read_flows(model_dir: &Path, energy_system: &mut EnergySystem) -> Result<()> {
    let profiles_path = model_dir.join(FLOW_PROFILES_FILE_NAME);
    let profiles_csv = read_csv_optional(&profiles_path)?;
    let mut profiles = read_profiles_from_iter(profiles_csv, energy_system.num_timesteps())
        .with_context(|| input_err_msg(&profiles_path))?;

    let file_path = model_dir.join(FLOWS_FILE_NAME);
    let flows_csv = read_csv(&file_path)?;
    add_flows_from_iter(flows_csv, &mut profiles, energy_system)
        .with_context(|| input_err_msg(&file_path))?;

    if let Some((id, _)) = profiles.keys().next() {
        return Err(anyhow!("Profile given for unknown flow {id}")
            .context(input_err_msg(&profiles_path)));
    }

    Ok(())
}

fn add_flows_from_iter<I>(
    iter: I,
    profiles: &mut ProfileMap,
    energy_system: &mut EnergySystem,
) -> Result<()>
where
    I: Iterator<Item = FlowRaw>,
{
    for raw in iter {
        let id = EdgeID::from((raw.source.as_str(), raw.target.as_str()));
        let mut flow = raw.into_flow();
        apply_profiles(&id, &mut flow, profiles)?;

        energy_system.add_flow(&id.source, &id.target, flow)?;
    }

    Ok(())
}

/// Replace scalar parameters of a flow with their profiles
fn apply_profiles(id: &EdgeID, flow: &mut Flow, profiles: &mut ProfileMap) -> Result<()> {
    for parameter in [
        ProfileParameter::Min,
        ProfileParameter::Max,
        ProfileParameter::Fix,
        ProfileParameter::VariableCosts,
    ] {
        let Some(values) = profiles.shift_remove(&(id.clone(), parameter)) else {
            continue;
        };
        let values = values
            .into_iter()
            .enumerate()
            .map(|(t, value)| {
                value.with_context(|| {
                    format!("Profile for {parameter:?} of flow {id} is missing timestep {t}")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let seq = Sequence::Series(values);
        match parameter {
            ProfileParameter::Min => flow.min = seq,
            ProfileParameter::Max => flow.max = seq,
            ProfileParameter::Fix => flow.fix = Some(seq),
            ProfileParameter::VariableCosts => flow.variable_costs = seq,
        }
    }

    Ok(())
}

fn read_profiles_from_iter<I>(iter: I, num_timesteps: usize) -> Result<ProfileMap>
where
    I: Iterator<Item = FlowProfileRaw>,
{
    let mut profiles = ProfileMap::new();
    for raw in iter {
        let id = EdgeID::from((raw.source.as_str(), raw.target.as_str()));
        ensure!(
            raw.timestep < num_timesteps,
            "Timestep {} for flow {id} is out of range (model has {num_timesteps} timesteps)",
            raw.timestep
        );

        let values = profiles
            .entry((id.clone(), raw.parameter))
            .or_insert_with(|| vec![None; num_timesteps]);
        ensure!(
            values[raw.timestep].replace(raw.value).is_none(),
            "Duplicate value for timestep {} of flow {id}",
            raw.timestep
        );
    }

    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::timeindex;
    use crate::energy_system::SystemParameters;
    use crate::node::{Node, NodeKind};
    use chrono::NaiveDateTime;
    use rstest::{fixture, rstest};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[fixture]
    fn empty_system(timeindex: Vec<NaiveDateTime>) -> EnergySystem {
        let mut es = EnergySystem::new(timeindex, SystemParameters::default()).unwrap();
        es.add_node(Node::new("wind", NodeKind::Source)).unwrap();
        es.add_node(Node::bus("electricity")).unwrap();
        es
    }

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    const FLOWS_HEADER: &str = "source,target,nominal_value,min,max,fix,variable_costs,nonconvex,unidirectional,investment_ep_costs,investment_maximum,investment_minimum,investment_existing";

    #[rstest]
    fn test_read_flows_with_profile(mut empty_system: EnergySystem) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            FLOWS_FILE_NAME,
            &format!("{FLOWS_HEADER}\nwind,electricity,50,,,,2,,,,,,"),
        );
        write_file(
            dir.path(),
            FLOW_PROFILES_FILE_NAME,
            "source,target,parameter,timestep,value
wind,electricity,fix,0,0.1
wind,electricity,fix,1,0.5
wind,electricity,fix,2,0.9",
        );

        read_flows(dir.path(), &mut empty_system).unwrap();
        let flow = empty_system
            .get_flow(&("wind", "electricity").into())
            .unwrap();
        assert_eq!(flow.nominal_value, Some(50.0));
        assert_eq!(flow.fix, Some(Sequence::Series(vec![0.1, 0.5, 0.9])));
        assert_eq!(flow.variable_costs, Sequence::Constant(2.0));
        assert!(flow.unidirectional);
        assert!(flow.investment.is_none());
    }

    #[rstest]
    fn test_read_investment_flow(mut empty_system: EnergySystem) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            FLOWS_FILE_NAME,
            &format!("{FLOWS_HEADER}\nwind,electricity,,,,,,,,100,,,5"),
        );

        read_flows(dir.path(), &mut empty_system).unwrap();
        let flow = empty_system
            .get_flow(&("wind", "electricity").into())
            .unwrap();
        assert_eq!(
            flow.investment,
            Some(Investment {
                ep_costs: 100.0,
                existing: 5.0,
                ..Investment::default()
            })
        );
    }

    #[rstest]
    fn test_incomplete_profile(mut empty_system: EnergySystem) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            FLOWS_FILE_NAME,
            &format!("{FLOWS_HEADER}\nwind,electricity,50,,,,,,,,,,"),
        );
        write_file(
            dir.path(),
            FLOW_PROFILES_FILE_NAME,
            "source,target,parameter,timestep,value\nwind,electricity,max,1,0.5",
        );

        let err = read_flows(dir.path(), &mut empty_system).unwrap_err();
        assert_eq!(
            err.to_string(),
            input_err_msg(dir.path().join(FLOWS_FILE_NAME))
        );
    }

    #[rstest]
    fn test_profile_timestep_out_of_range(mut empty_system: EnergySystem) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            FLOWS_FILE_NAME,
            &format!("{FLOWS_HEADER}\nwind,electricity,50,,,,,,,,,,"),
        );
        write_file(
            dir.path(),
            FLOW_PROFILES_FILE_NAME,
            "source,target,parameter,timestep,value\nwind,electricity,max,3,0.5",
        );

        let err = read_flows(dir.path(), &mut empty_system).unwrap_err();
        assert_eq!(
            err.to_string(),
            input_err_msg(dir.path().join(FLOW_PROFILES_FILE_NAME))
        );
    }

    #[rstest]
    fn test_flow_to_unknown_node(mut empty_system: EnergySystem) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            FLOWS_FILE_NAME,
            &format!("{FLOWS_HEADER}\nwind,heat,50,,,,,,,,,,"),
        );

        let err = read_flows(dir.path(), &mut empty_system).unwrap_err();
        assert_eq!(err.chain().nth(1).unwrap().to_string(), "Unknown node heat");
    }
}
