//! Build a [`Network`] from schema-store rows.
//!
//! Buses are loaded first into an id table; every dependent row resolves its
//! bus references through that table and an unresolved id aborts the load
//! with [`PsaError::ReferentialIntegrity`]. Compensators become generator
//! nodes tagged [`InjectionKind::Compensator`](psa_core::InjectionKind).

use std::collections::HashSet;

use psa_core::{
    Bus, BusId, BusKind, BusRef, CompensatorRating, ComponentKind, ControlMode, Coordinates, Gen,
    GenId, Line, LineId, Link, LinkId, Load, LoadId, LoadStats, Network, Node, PsaError,
    PsaResult, Snapshot, StorageId, StorageUnit, Technology, Transformer, TransformerId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::schema::{GeneratorRow, TableSet};
use crate::store::SchemaStore;

/// Prefix given to compensator generator names
pub const COMPENSATOR_PREFIX: &str = "SVC_";

/// Settings applied while materializing the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Series resistance assigned to every transformer (p.u. on its rating)
    pub transformer_r_pu: f64,
    /// Series reactance assigned to every transformer (p.u. on its rating)
    pub transformer_x_pu: f64,
    pub snapshot: Snapshot,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            transformer_r_pu: 0.01,
            transformer_x_pu: 0.1,
            snapshot: Snapshot::default(),
        }
    }
}

/// Read every table from `store`, close it, then build the network.
pub fn load_network<S: SchemaStore>(mut store: S, options: &LoaderOptions) -> PsaResult<Network> {
    let location = store.describe();
    let tables = store.read_tables()?;
    store.close()?;
    debug!("loaded {} rows from {}", tables.row_count(), location);

    let (network, stats) = build_network(&tables, options)?;
    info!("network loaded from {}: {}", location, stats);
    Ok(network)
}

struct BusIds(HashSet<i64>);

impl BusIds {
    fn resolve(
        &self,
        kind: ComponentKind,
        row: &str,
        column: &'static str,
        id: i64,
    ) -> PsaResult<BusId> {
        if self.0.contains(&id) {
            Ok(BusId::new(id))
        } else {
            Err(PsaError::ReferentialIntegrity {
                kind,
                row: row.to_string(),
                column,
                missing: BusRef::Id(id),
            })
        }
    }
}

fn check_non_negative(kind: ComponentKind, name: &str, field: &str, value: f64) -> PsaResult<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(PsaError::Network(format!(
            "{} '{}' has invalid {} {}",
            kind, name, field, value
        )));
    }
    Ok(())
}

fn technology_of(row: &GeneratorRow) -> Technology {
    match row.carrier.as_deref().map(str::trim) {
        Some(carrier) if !carrier.is_empty() => carrier.parse().unwrap_or_else(|_| {
            warn!("generator '{}' has unknown carrier '{}'", row.name, carrier);
            Technology::Other
        }),
        _ => {
            let guess = Technology::classify_name(&row.name);
            debug!(
                "generator '{}' has no carrier; classified as {} by name",
                row.name, guess
            );
            guess
        }
    }
}

/// Build the network graph from rows already read from a store.
pub fn build_network(tables: &TableSet, options: &LoaderOptions) -> PsaResult<(Network, LoadStats)> {
    use ComponentKind as K;

    let mut network = Network::new();
    network.snapshot = options.snapshot;
    let mut stats = LoadStats::default();

    for row in &tables.buses {
        let kind: BusKind = row.bus_type.parse()?;
        let coordinates = match (row.x_coord, row.y_coord) {
            (Some(x), Some(y)) => Some(Coordinates { x, y }),
            _ => None,
        };
        network.add_bus(Bus {
            kind,
            coordinates,
            ..Bus::new(BusId::new(row.id), row.name.clone(), row.v_nom_kv)
        })?;
        stats.buses += 1;
    }
    let buses = BusIds(tables.buses.iter().map(|b| b.id).collect());

    for (idx, row) in tables.lines.iter().enumerate() {
        let from = buses.resolve(K::Line, &row.name, "from_bus_id", row.from_bus_id)?;
        let to = buses.resolve(K::Line, &row.name, "to_bus_id", row.to_bus_id)?;
        if from == to {
            return Err(PsaError::Network(format!(
                "Line '{}' connects bus {} to itself",
                row.name, from
            )));
        }
        check_non_negative(K::Line, &row.name, "length_km", row.length_km)?;
        check_non_negative(K::Line, &row.name, "r_ohm_per_km", row.r_ohm_per_km)?;
        check_non_negative(K::Line, &row.name, "x_ohm_per_km", row.x_ohm_per_km)?;
        network.add_line(Line::from_per_km(
            LineId::new(idx),
            row.name.clone(),
            from,
            to,
            row.length_km,
            row.r_ohm_per_km,
            row.x_ohm_per_km,
            row.s_nom_mva,
        ))?;
        stats.lines += 1;
    }

    for (idx, row) in tables.transformers.iter().enumerate() {
        let from = buses.resolve(K::Transformer, &row.name, "from_bus_id", row.from_bus_id)?;
        let to = buses.resolve(K::Transformer, &row.name, "to_bus_id", row.to_bus_id)?;
        network.add_transformer(Transformer {
            id: TransformerId::new(idx),
            name: row.name.clone(),
            from_bus: from,
            to_bus: to,
            s_nom_mva: row.s_nom_mva,
            tap_ratio: row.tap_ratio,
            phase_shift_deg: row.phase_shift,
            vector_group: row.vector_group.clone().unwrap_or_default(),
            r_pu: options.transformer_r_pu,
            x_pu: options.transformer_x_pu,
        })?;
        stats.transformers += 1;
    }

    let mut next_gen = 0usize;
    for row in &tables.generators {
        let bus = buses.resolve(K::Generator, &row.name, "bus_id", row.bus_id)?;
        let control: ControlMode = row.control_type.parse().map_err(|_| {
            PsaError::Parse(format!(
                "generator '{}' has unknown control type '{}'",
                row.name, row.control_type
            ))
        })?;
        let gen = Gen::new(GenId::new(next_gen), row.name.clone(), bus, control)
            .with_rating(row.p_nom_mw)
            .with_marginal_cost(row.marginal_cost_eur_per_mwh)
            .with_technology(technology_of(row));
        network.add_injection(Node::Gen(gen))?;
        next_gen += 1;
        stats.generators += 1;
    }

    for row in &tables.svcs {
        let bus = buses.resolve(K::Compensator, &row.name, "bus_id", row.bus_id)?;
        let rating = CompensatorRating {
            q_nom_mvar: row.q_nom_mvar,
            q_min_mvar: row.q_min_mvar,
            q_max_mvar: row.q_max_mvar,
            v_set_pu: row.v_set_pu,
        };
        let name = format!("{}{}", COMPENSATOR_PREFIX, row.name);
        network.add_injection(Node::Gen(Gen::compensator(
            GenId::new(next_gen),
            name,
            bus,
            rating,
        )))?;
        next_gen += 1;
        stats.compensators += 1;
    }

    for (idx, row) in tables.loads.iter().enumerate() {
        let bus = buses.resolve(K::Load, &row.name, "bus_id", row.bus_id)?;
        network.add_injection(Node::Load(Load {
            id: LoadId::new(idx),
            name: row.name.clone(),
            bus,
            p_set_mw: row.p_set_mw,
            q_set_mvar: row.q_set_mvar,
        }))?;
        stats.loads += 1;
    }

    for (idx, row) in tables.storage_units.iter().enumerate() {
        let bus = buses.resolve(K::StorageUnit, &row.name, "bus_id", row.bus_id)?;
        network.add_injection(Node::Storage(StorageUnit {
            id: StorageId::new(idx),
            name: row.name.clone(),
            bus,
            p_nom_mw: row.p_nom_mw,
            max_hours: row.max_hours,
            efficiency_store: row.efficiency_store,
            efficiency_dispatch: row.efficiency_dispatch,
            cyclic_state_of_charge: row.cyclic_soc,
            state_of_charge_initial_mwh: 0.0,
            p_set_mw: 0.0,
        }))?;
        stats.storage_units += 1;
    }

    for (idx, row) in tables.links.iter().enumerate() {
        let from = buses.resolve(K::Link, &row.name, "from_bus_id", row.from_bus_id)?;
        let to = buses.resolve(K::Link, &row.name, "to_bus_id", row.to_bus_id)?;
        network.add_link(Link {
            id: LinkId::new(idx),
            name: row.name.clone(),
            from_bus: from,
            to_bus: to,
            p_nom_mw: row.p_nom_mw,
            efficiency: row.efficiency,
            p_min_pu: row.p_min_pu,
            p_max_pu: row.p_max_pu,
            p_set_mw: 0.0,
        })?;
        stats.links += 1;
    }

    Ok((network, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::NetworkFixture;
    use crate::store::MemoryStore;

    fn sample_tables() -> TableSet {
        NetworkFixture::sample().into_table_set().unwrap()
    }

    #[test]
    fn sample_network_loads_every_component() {
        let (network, stats) = build_network(&sample_tables(), &LoaderOptions::default()).unwrap();
        assert_eq!(stats.buses, 5);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.transformers, 2);
        assert_eq!(stats.generators, 3);
        assert_eq!(stats.compensators, 2);
        assert_eq!(stats.loads, 3);
        assert_eq!(stats.storage_units, 2);
        assert_eq!(stats.links, 2);
        assert_eq!(network.generators().len(), 5);
        assert_eq!(network.compensators().len(), 2);
    }

    #[test]
    fn line_parameters_are_absolute_after_load() {
        let (network, _) = build_network(&sample_tables(), &LoaderOptions::default()).unwrap();
        let line = network
            .lines()
            .into_iter()
            .find(|l| l.name == "Line_A_City")
            .unwrap();
        assert!((line.r_ohm - 2.0).abs() < 1e-12);
        assert!((line.x_ohm - 6.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_bus_id_names_row_and_id() {
        let mut tables = sample_tables();
        tables.lines[0].to_bus_id = 42;
        match build_network(&tables, &LoaderOptions::default()) {
            Err(PsaError::ReferentialIntegrity {
                kind,
                row,
                column,
                missing,
            }) => {
                assert_eq!(kind, ComponentKind::Line);
                assert_eq!(row, "Line_A_City");
                assert_eq!(column, "to_bus_id");
                assert_eq!(missing, BusRef::Id(42));
            }
            other => panic!("expected referential error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_bus_in_svc_table_is_fatal() {
        let mut tables = sample_tables();
        tables.svcs[1].bus_id = 0;
        assert!(matches!(
            build_network(&tables, &LoaderOptions::default()),
            Err(PsaError::ReferentialIntegrity {
                kind: ComponentKind::Compensator,
                ..
            })
        ));
    }

    #[test]
    fn self_loop_line_is_rejected() {
        let mut tables = sample_tables();
        tables.lines[2].to_bus_id = tables.lines[2].from_bus_id;
        assert!(matches!(
            build_network(&tables, &LoaderOptions::default()),
            Err(PsaError::Network(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut tables = sample_tables();
        let copy = tables.loads[0].clone();
        tables.loads.push(copy);
        assert!(matches!(
            build_network(&tables, &LoaderOptions::default()),
            Err(PsaError::DuplicateName {
                kind: ComponentKind::Load,
                ..
            })
        ));
    }

    #[test]
    fn compensators_are_tagged_and_prefixed() {
        let (network, _) = build_network(&sample_tables(), &LoaderOptions::default()).unwrap();
        let svc = network.generator("SVC_Industrial_SVC").unwrap();
        let rating = svc.compensator_rating().unwrap();
        assert_eq!(rating.q_nom_mvar, 100.0);
        assert_eq!(svc.p_nom_mw, 0.0);
        assert_eq!(svc.control, ControlMode::PV);
    }

    #[test]
    fn transformer_constants_come_from_options() {
        let options = LoaderOptions {
            transformer_r_pu: 0.02,
            transformer_x_pu: 0.12,
            ..LoaderOptions::default()
        };
        let (network, _) = build_network(&sample_tables(), &options).unwrap();
        for tx in network.transformers() {
            assert_eq!(tx.r_pu, 0.02);
            assert_eq!(tx.x_pu, 0.12);
        }
    }

    #[test]
    fn missing_carrier_falls_back_to_name() {
        let mut tables = sample_tables();
        for row in &mut tables.generators {
            row.carrier = None;
        }
        let (network, _) = build_network(&tables, &LoaderOptions::default()).unwrap();
        let solar = network.generator("Solar_Farm_Rural").unwrap();
        assert_eq!(solar.technology, Technology::Solar);
    }

    #[test]
    fn load_network_consumes_store() {
        let store = MemoryStore::from_fixture(&NetworkFixture::sample()).unwrap();
        let network = load_network(store, &LoaderOptions::default()).unwrap();
        assert_eq!(network.buses().len(), 5);
        assert_eq!(network.snapshot.to_string(), "2025-01-01 00:00:00");
    }

    #[test]
    fn line_node_buses_use_the_l_code() {
        let mut fixture = NetworkFixture::sample();
        fixture.buses[4].bus_type = "l".to_string();
        let name = fixture.buses[4].name.clone();
        let store = MemoryStore::from_fixture(&fixture).unwrap();
        let network = load_network(store, &LoaderOptions::default()).unwrap();
        let bus = network.buses().into_iter().find(|b| b.name == name).unwrap();
        assert_eq!(bus.kind, BusKind::LineNode);
    }
}
