//! Fixtures for tests
use crate::energy_system::{EnergySystem, SystemParameters};
use crate::flow::{Flow, Investment};
use crate::inertia::{InertiaEdge, InertiaParameters, ProvisionType};
use crate::model::{InertiaModel, ModelOptions};
use crate::node::{GenericStorage, Node, NodeKind, Transformer};
use crate::sequence::Sequence;
use crate::units::{ApparentPower, Dimensionless, Hertz, MomentOfInertia, Seconds};
use crate::wind::PiecewiseLinearCurve;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::indexmap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Build a model with default options, panicking on failure
pub fn build_model(energy_system: &EnergySystem) -> InertiaModel<'_> {
    InertiaModel::build(
        energy_system,
        &ModelOptions::default(),
        &PiecewiseLinearCurve::default(),
    )
    .unwrap()
}

#[fixture]
pub fn timeindex() -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..3).map(|i| start + TimeDelta::hours(i)).collect()
}

/// A gas plant with inertia supplying a fixed demand
fn base_energy_system(parameters: SystemParameters) -> EnergySystem {
    let mut es = EnergySystem::new(timeindex(), parameters).unwrap();
    es.add_node(Node::bus("electricity")).unwrap();
    es.add_node(Node::new("inertia", NodeKind::Bus { balanced: false }))
        .unwrap();
    es.add_node(Node::new("gas_plant", NodeKind::Source)).unwrap();
    es.add_node(Node::new("demand", NodeKind::Sink)).unwrap();

    let gas_flow = Flow {
        variable_costs: Sequence::Constant(50.0),
        ..Flow::with_nominal_value(100.0)
    };
    es.add_flow(&"gas_plant".into(), &"electricity".into(), gas_flow)
        .unwrap();
    let demand_flow = Flow {
        fix: Some(vec![0.5, 1.0, 0.5].into()),
        ..Flow::with_nominal_value(80.0)
    };
    es.add_flow(&"electricity".into(), &"demand".into(), demand_flow)
        .unwrap();

    let params = InertiaParameters {
        inertia_constant: Some(Seconds(4.0)),
        apparent_power: Some(ApparentPower(100.0)),
        minimum_stable_operation: Dimensionless(0.3),
        inertia_costs: Sequence::Constant(1000.0),
        ..InertiaParameters::new(ProvisionType::SynchronousGenerator)
    };
    es.add_inertia_source(
        &"gas_plant".into(),
        &"inertia".into(),
        InertiaEdge::new(params).unwrap(),
    )
    .unwrap();

    es
}

#[fixture]
pub fn energy_system() -> EnergySystem {
    base_energy_system(SystemParameters::default())
}

/// The gas plant together with wind turbines emulating inertia, with inertia thresholds
#[fixture]
pub fn wind_energy_system() -> EnergySystem {
    let parameters = SystemParameters {
        nominal_grid_frequency: Some(Hertz(50.0)),
        minimum_system_synchronous_inertia: Some(MomentOfInertia(0.005)),
        minimum_system_inertia: Some(MomentOfInertia(0.005)),
        emulated_inertia_constant: Some(Dimensionless(2.0)),
        use_nominal_frequency: false,
    };
    let mut es = base_energy_system(parameters);
    es.add_node(Node::new("wind", NodeKind::Source)).unwrap();
    let wind_flow = Flow {
        fix: Some(vec![0.0, 0.5, 0.2].into()),
        ..Flow::with_nominal_value(50.0)
    };
    es.add_flow(&"wind".into(), &"electricity".into(), wind_flow)
        .unwrap();
    let params = InertiaParameters {
        apparent_power: Some(ApparentPower(50.0)),
        ..InertiaParameters::new(ProvisionType::SyntheticWind)
    };
    es.add_inertia_source(
        &"wind".into(),
        &"inertia".into(),
        InertiaEdge::new(params).unwrap(),
    )
    .unwrap();

    es
}

/// The wind energy system with a pumped hydro plant providing synchronous inertia and a run of
/// river plant providing none
#[fixture]
pub fn hydro_energy_system() -> EnergySystem {
    let mut es = wind_energy_system();
    es.add_node(Node::new("pumped_hydro", NodeKind::Source))
        .unwrap();
    es.add_flow(
        &"pumped_hydro".into(),
        &"electricity".into(),
        Flow::with_nominal_value(20.0),
    )
    .unwrap();
    let params = InertiaParameters {
        inertia_constant: Some(Seconds(3.0)),
        apparent_power: Some(ApparentPower(20.0)),
        ..InertiaParameters::new(ProvisionType::SynchronousStorage)
    };
    es.add_inertia_source(
        &"pumped_hydro".into(),
        &"inertia".into(),
        InertiaEdge::new(params).unwrap(),
    )
    .unwrap();

    es.add_node(Node::new("river", NodeKind::Source)).unwrap();
    let river_flow = Flow {
        fix: Some(vec![0.0, 0.5, 0.0].into()),
        ..Flow::with_nominal_value(10.0)
    };
    es.add_flow(&"river".into(), &"electricity".into(), river_flow)
        .unwrap();
    let params = InertiaParameters {
        apparent_power: Some(ApparentPower(10.0)),
        ..InertiaParameters::new(ProvisionType::None)
    };
    es.add_inertia_source(
        &"river".into(),
        &"inertia".into(),
        InertiaEdge::new(params).unwrap(),
    )
    .unwrap();

    es
}

/// A combined heat and power plant with the given electrical conversion factor
pub fn chp_energy_system_with_factor(electrical_efficiency: f64) -> EnergySystem {
    let mut es = EnergySystem::new(timeindex(), SystemParameters::default()).unwrap();
    es.add_node(Node::new("gas", NodeKind::Source)).unwrap();
    es.add_node(Node::bus("electricity")).unwrap();
    es.add_node(Node::new("heat", NodeKind::Bus { balanced: false }))
        .unwrap();
    es.add_node(Node::new("demand", NodeKind::Sink)).unwrap();
    let transformer = Transformer {
        conversion_factors: indexmap! {
            "electricity".into() => Sequence::Constant(electrical_efficiency),
            "heat".into() => Sequence::Constant(0.5),
        },
    };
    es.add_node(Node::new("chp", NodeKind::Transformer(transformer)))
        .unwrap();

    es.add_flow(&"gas".into(), &"chp".into(), Flow::default())
        .unwrap();
    es.add_flow(&"chp".into(), &"electricity".into(), Flow::default())
        .unwrap();
    es.add_flow(&"chp".into(), &"heat".into(), Flow::default())
        .unwrap();
    let demand_flow = Flow {
        fix: Some(Sequence::Constant(1.0)),
        ..Flow::with_nominal_value(20.0)
    };
    es.add_flow(&"electricity".into(), &"demand".into(), demand_flow)
        .unwrap();

    es
}

#[fixture]
pub fn chp_energy_system() -> EnergySystem {
    chp_energy_system_with_factor(0.4)
}

/// The gas plant with a battery attached to the electricity bus
#[fixture]
pub fn storage_energy_system() -> EnergySystem {
    let mut es = energy_system();
    let battery = GenericStorage {
        nominal_storage_capacity: 10.0,
        loss_rate: 0.1,
        initial_storage_level: Some(0.5),
        inflow_conversion_factor: Sequence::Constant(0.9),
        outflow_conversion_factor: Sequence::Constant(0.8),
        ..GenericStorage::default()
    };
    es.add_node(Node::new("battery", NodeKind::Storage(battery)))
        .unwrap();
    es.add_flow(
        &"electricity".into(),
        &"battery".into(),
        Flow::with_nominal_value(5.0),
    )
    .unwrap();
    es.add_flow(
        &"battery".into(),
        &"electricity".into(),
        Flow::with_nominal_value(5.0),
    )
    .unwrap();

    es
}

/// The gas plant together with solar panels whose capacity is an investment decision
#[fixture]
pub fn investment_energy_system() -> EnergySystem {
    let mut es = energy_system();
    es.add_node(Node::new("solar", NodeKind::Source)).unwrap();
    let flow = Flow {
        max: Sequence::Constant(0.8),
        investment: Some(Investment {
            ep_costs: 20.0,
            maximum: 1000.0,
            minimum: 0.0,
            existing: 10.0,
        }),
        ..Flow::default()
    };
    es.add_flow(&"solar".into(), &"electricity".into(), flow)
        .unwrap();

    es
}

/// The gas plant together with a coal plant with an on/off status
#[fixture]
pub fn nonconvex_energy_system() -> EnergySystem {
    let mut es = energy_system();
    es.add_node(Node::new("coal_plant", NodeKind::Source))
        .unwrap();
    let flow = Flow {
        nonconvex: true,
        min: Sequence::Constant(0.4),
        variable_costs: Sequence::Constant(30.0),
        ..Flow::with_nominal_value(60.0)
    };
    es.add_flow(&"coal_plant".into(), &"electricity".into(), flow)
        .unwrap();

    es
}
