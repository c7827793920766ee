//! Starting operating point for the power flow.
//!
//! Every rule sets an absolute value, so running the initializer twice
//! leaves the network bit-identical to running it once.

use std::collections::BTreeMap;

use psa_core::{ControlMode, Network, Node, PsaError, PsaResult, Technology};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Seed values written by [`OperatingPointInitializer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Voltage magnitude set-point for every bus (p.u.)
    pub bus_voltage_pu: f64,
    /// Voltage magnitude set-point of the slack generator (p.u.)
    pub slack_voltage_pu: f64,
    /// Active power seed for the slack generator (MW)
    pub slack_p_seed_mw: f64,
    /// PQ dispatch as a fraction of rated power, per technology
    pub capacity_factors: BTreeMap<Technology, f64>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            bus_voltage_pu: 1.0,
            slack_voltage_pu: 1.02,
            slack_p_seed_mw: 200.0,
            capacity_factors: BTreeMap::from([(Technology::Solar, 0.5), (Technology::Wind, 0.5)]),
        }
    }
}

/// What an initialization pass changed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    pub slack: String,
    pub buses: usize,
    /// PQ generators whose dispatch was seeded, with the seed (MW)
    pub seeded: Vec<(String, f64)>,
    pub compensators: usize,
    pub storage_units: usize,
    pub links: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OperatingPointInitializer {
    config: InitConfig,
}

impl OperatingPointInitializer {
    pub fn new(config: InitConfig) -> Self {
        Self { config }
    }

    /// Name of the unique Slack-mode generator.
    pub fn find_slack(network: &Network) -> PsaResult<String> {
        let names: Vec<String> = network
            .generators()
            .into_iter()
            .filter(|g| g.control == ControlMode::Slack)
            .map(|g| g.name.clone())
            .collect();
        if names.len() > 1 {
            return Err(PsaError::AmbiguousSlack { names });
        }
        names.into_iter().next().ok_or(PsaError::MissingSlack)
    }

    /// Write the starting operating point into `network`.
    ///
    /// Fails before touching the network when there is not exactly one
    /// Slack-mode generator.
    pub fn initialize(&self, network: &mut Network) -> PsaResult<InitReport> {
        let slack = Self::find_slack(network)?;
        let cfg = &self.config;
        let mut report = InitReport {
            slack: slack.clone(),
            ..InitReport::default()
        };

        for node in network.graph.node_weights_mut() {
            match node {
                Node::Bus(bus) => {
                    bus.v_mag_pu_set = cfg.bus_voltage_pu;
                    report.buses += 1;
                }
                Node::Gen(gen) if gen.is_compensator() => {
                    gen.control = ControlMode::PQ;
                    gen.q_set_mvar = 0.0;
                    report.compensators += 1;
                }
                Node::Gen(gen) if gen.control == ControlMode::Slack => {
                    gen.v_mag_pu_set = Some(cfg.slack_voltage_pu);
                    gen.p_set_mw = cfg.slack_p_seed_mw;
                }
                Node::Gen(gen) if gen.control == ControlMode::PQ => {
                    if let Some(factor) = cfg.capacity_factors.get(&gen.technology) {
                        gen.p_set_mw = factor * gen.p_nom_mw;
                        debug!(
                            "seeded {} ({}) at {:.1} MW",
                            gen.name, gen.technology, gen.p_set_mw
                        );
                        report.seeded.push((gen.name.clone(), gen.p_set_mw));
                    }
                }
                Node::Gen(_) | Node::Load(_) => {}
                Node::Storage(storage) => {
                    storage.p_set_mw = 0.0;
                    report.storage_units += 1;
                }
            }
        }
        for edge in network.graph.edge_weights_mut() {
            if let psa_core::Edge::Link(link) = edge {
                link.p_set_mw = 0.0;
                report.links += 1;
            }
        }

        info!(
            "initialized operating point: slack {}, {} buses, {} PQ seeds, {} compensators",
            report.slack,
            report.buses,
            report.seeded.len(),
            report.compensators
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psa_core::{
        Bus, BusId, CompensatorRating, Gen, GenId, Link, LinkId, StorageId, StorageUnit,
    };

    fn network_with(gens: Vec<Gen>) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "A", 110.0)).unwrap();
        network.add_bus(Bus::new(BusId::new(2), "B", 110.0)).unwrap();
        for gen in gens {
            network.add_injection(Node::Gen(gen)).unwrap();
        }
        network
    }

    fn slack() -> Gen {
        Gen::new(GenId::new(0), "Thermal", BusId::new(1), ControlMode::Slack).with_rating(500.0)
    }

    #[test]
    fn missing_slack_is_an_error() {
        let mut network = network_with(vec![Gen::new(
            GenId::new(0),
            "PV",
            BusId::new(1),
            ControlMode::PQ,
        )]);
        let result = OperatingPointInitializer::default().initialize(&mut network);
        assert!(matches!(result, Err(PsaError::MissingSlack)));
    }

    #[test]
    fn two_slacks_are_ambiguous() {
        let second = Gen::new(GenId::new(1), "Other", BusId::new(2), ControlMode::Slack);
        let mut network = network_with(vec![slack(), second]);
        match OperatingPointInitializer::default().initialize(&mut network) {
            Err(PsaError::AmbiguousSlack { names }) => assert_eq!(names.len(), 2),
            other => panic!("expected ambiguous slack, got {:?}", other),
        }
    }

    #[test]
    fn slack_gets_voltage_and_seed() {
        let mut network = network_with(vec![slack()]);
        let report = OperatingPointInitializer::default()
            .initialize(&mut network)
            .unwrap();
        assert_eq!(report.slack, "Thermal");
        let gen = network.generator("Thermal").unwrap();
        assert_eq!(gen.v_mag_pu_set, Some(1.02));
        assert_eq!(gen.p_set_mw, 200.0);
        assert!(network.buses().iter().all(|b| b.v_mag_pu_set == 1.0));
    }

    #[test]
    fn pq_seed_follows_technology_tag() {
        let solar = Gen::new(GenId::new(1), "Plant 7", BusId::new(2), ControlMode::PQ)
            .with_rating(80.0)
            .with_technology(Technology::Solar);
        let hydro = Gen::new(GenId::new(2), "Solar_Named_Hydro", BusId::new(2), ControlMode::PQ)
            .with_rating(60.0)
            .with_technology(Technology::Hydro);
        let mut network = network_with(vec![slack(), solar, hydro]);
        OperatingPointInitializer::default()
            .initialize(&mut network)
            .unwrap();
        assert_eq!(network.generator("Plant 7").unwrap().p_set_mw, 40.0);
        // Name suggests solar but the tag wins
        assert_eq!(network.generator("Solar_Named_Hydro").unwrap().p_set_mw, 0.0);
    }

    #[test]
    fn compensators_storage_and_links_are_neutralised() {
        let rating = CompensatorRating {
            q_nom_mvar: 50.0,
            q_min_mvar: -50.0,
            q_max_mvar: 50.0,
            v_set_pu: 1.0,
        };
        let mut svc = Gen::compensator(GenId::new(1), "SVC_B", BusId::new(2), rating);
        svc.q_set_mvar = 12.0;
        let mut network = network_with(vec![slack(), svc]);
        network
            .add_injection(Node::Storage(StorageUnit {
                id: StorageId::new(0),
                name: "Battery".into(),
                bus: BusId::new(2),
                p_nom_mw: 10.0,
                max_hours: 2.0,
                efficiency_store: 0.9,
                efficiency_dispatch: 0.9,
                cyclic_state_of_charge: false,
                state_of_charge_initial_mwh: 5.0,
                p_set_mw: 7.0,
            }))
            .unwrap();
        network
            .add_link(Link {
                id: LinkId::new(0),
                name: "DC".into(),
                from_bus: BusId::new(1),
                to_bus: BusId::new(2),
                p_nom_mw: 100.0,
                efficiency: 0.97,
                p_min_pu: -1.0,
                p_max_pu: 1.0,
                p_set_mw: 30.0,
            })
            .unwrap();

        OperatingPointInitializer::default()
            .initialize(&mut network)
            .unwrap();

        let svc = network.generator("SVC_B").unwrap();
        assert_eq!(svc.control, ControlMode::PQ);
        assert_eq!(svc.q_set_mvar, 0.0);
        assert_eq!(network.storage_units()[0].p_set_mw, 0.0);
        assert_eq!(network.links()[0].p_set_mw, 0.0);
    }

    #[test]
    fn initialization_is_idempotent() {
        let wind = Gen::new(GenId::new(1), "Wind", BusId::new(2), ControlMode::PQ)
            .with_rating(120.0)
            .with_technology(Technology::Wind);
        let mut network = network_with(vec![slack(), wind]);
        let init = OperatingPointInitializer::default();

        init.initialize(&mut network).unwrap();
        let once: Vec<_> = network.graph.node_weights().cloned().collect();
        init.initialize(&mut network).unwrap();
        let twice: Vec<_> = network.graph.node_weights().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(network.generator("Wind").unwrap().p_set_mw, 60.0);
    }
}
