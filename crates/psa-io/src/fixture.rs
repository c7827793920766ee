//! JSON network descriptions.
//!
//! A fixture lists components with bus references by *name*. It is the input
//! to [`crate::SqliteStore::populate`] and can be turned straight into a
//! [`TableSet`] for an in-memory run.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use psa_core::{BusRef, ComponentKind, PsaError, PsaResult};
use serde::{Deserialize, Serialize};

use crate::schema::{
    BusRow, GeneratorRow, LineRow, LinkRow, LoadRow, StorageUnitRow, SvcRow, TableSet,
    TransformerRow,
};

fn default_bus_type() -> String {
    "b".to_string()
}

fn one() -> f64 {
    1.0
}

fn default_control() -> String {
    "PQ".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSpec {
    pub name: String,
    pub v_nom_kv: f64,
    #[serde(rename = "type", default = "default_bus_type")]
    pub bus_type: String,
    #[serde(default)]
    pub x_coord: Option<f64>,
    #[serde(default)]
    pub y_coord: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub name: String,
    #[serde(alias = "from_bus_name")]
    pub from_bus: String,
    #[serde(alias = "to_bus_name")]
    pub to_bus: String,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub s_nom_mva: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub name: String,
    #[serde(alias = "from_bus_name")]
    pub from_bus: String,
    #[serde(alias = "to_bus_name")]
    pub to_bus: String,
    pub s_nom_mva: f64,
    #[serde(default = "one")]
    pub tap_ratio: f64,
    #[serde(default)]
    pub phase_shift: f64,
    #[serde(default)]
    pub vector_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub name: String,
    #[serde(alias = "bus_name")]
    pub bus: String,
    pub p_nom_mw: f64,
    #[serde(default)]
    pub marginal_cost_eur_per_mwh: f64,
    #[serde(default = "default_control")]
    pub control_type: String,
    #[serde(default)]
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    pub name: String,
    #[serde(alias = "bus_name")]
    pub bus: String,
    #[serde(default)]
    pub p_set_mw: f64,
    #[serde(default)]
    pub q_set_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub name: String,
    #[serde(alias = "bus_name")]
    pub bus: String,
    pub p_nom_mw: f64,
    pub max_hours: f64,
    #[serde(default = "one")]
    pub efficiency_store: f64,
    #[serde(default = "one")]
    pub efficiency_dispatch: f64,
    #[serde(default)]
    pub cyclic_soc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    #[serde(alias = "from_bus_name")]
    pub from_bus: String,
    #[serde(alias = "to_bus_name")]
    pub to_bus: String,
    pub p_nom_mw: f64,
    #[serde(default = "one")]
    pub efficiency: f64,
    #[serde(default)]
    pub p_min_pu: f64,
    #[serde(default = "one")]
    pub p_max_pu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvcSpec {
    pub name: String,
    #[serde(alias = "bus_name")]
    pub bus: String,
    pub q_nom_mvar: f64,
    pub q_min_mvar: f64,
    pub q_max_mvar: f64,
    #[serde(default = "one")]
    pub v_set_pu: f64,
}

/// A complete network description with name-based bus references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkFixture {
    pub buses: Vec<BusSpec>,
    pub lines: Vec<LineSpec>,
    pub transformers: Vec<TransformerSpec>,
    pub generators: Vec<GeneratorSpec>,
    pub loads: Vec<LoadSpec>,
    #[serde(alias = "storage")]
    pub storage_units: Vec<StorageSpec>,
    #[serde(alias = "hvdc_links")]
    pub links: Vec<LinkSpec>,
    pub svcs: Vec<SvcSpec>,
}

/// Resolves bus names to the integer ids of a store
pub(crate) struct BusNames<'a> {
    ids: &'a HashMap<String, i64>,
}

impl<'a> BusNames<'a> {
    pub(crate) fn new(ids: &'a HashMap<String, i64>) -> Self {
        Self { ids }
    }

    pub(crate) fn resolve(
        &self,
        kind: ComponentKind,
        row: &str,
        column: &'static str,
        bus: &str,
    ) -> PsaResult<i64> {
        self.ids
            .get(bus)
            .copied()
            .ok_or_else(|| PsaError::ReferentialIntegrity {
                kind,
                row: row.to_string(),
                column,
                missing: BusRef::Name(bus.to_string()),
            })
    }
}

impl NetworkFixture {
    pub fn from_json_str(text: &str) -> PsaResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> PsaResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> PsaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rows for every table, with bus ids numbered from 1 in fixture order.
    ///
    /// Dependent ids are also numbered from 1 within each table.
    pub fn into_table_set(&self) -> PsaResult<TableSet> {
        let mut ids = HashMap::new();
        let mut tables = TableSet::default();
        for (bus, id) in self.buses.iter().zip(1i64..) {
            if ids.insert(bus.name.clone(), id).is_some() {
                return Err(PsaError::DuplicateName {
                    kind: ComponentKind::Bus,
                    name: bus.name.clone(),
                });
            }
            tables.buses.push(BusRow {
                id,
                name: bus.name.clone(),
                v_nom_kv: bus.v_nom_kv,
                bus_type: bus.bus_type.clone(),
                x_coord: bus.x_coord,
                y_coord: bus.y_coord,
            });
        }
        self.dependent_rows(&BusNames::new(&ids), &mut tables)?;
        Ok(tables)
    }

    /// Fill every dependent table of `tables`, resolving names through `names`.
    pub(crate) fn dependent_rows(&self, names: &BusNames<'_>, tables: &mut TableSet) -> PsaResult<()> {
        use ComponentKind as K;

        for (spec, id) in self.lines.iter().zip(1i64..) {
            tables.lines.push(LineRow {
                id,
                name: spec.name.clone(),
                from_bus_id: names.resolve(K::Line, &spec.name, "from_bus_id", &spec.from_bus)?,
                to_bus_id: names.resolve(K::Line, &spec.name, "to_bus_id", &spec.to_bus)?,
                length_km: spec.length_km,
                r_ohm_per_km: spec.r_ohm_per_km,
                x_ohm_per_km: spec.x_ohm_per_km,
                s_nom_mva: spec.s_nom_mva,
            });
        }
        for (spec, id) in self.transformers.iter().zip(1i64..) {
            tables.transformers.push(TransformerRow {
                id,
                name: spec.name.clone(),
                from_bus_id: names.resolve(K::Transformer, &spec.name, "from_bus_id", &spec.from_bus)?,
                to_bus_id: names.resolve(K::Transformer, &spec.name, "to_bus_id", &spec.to_bus)?,
                s_nom_mva: spec.s_nom_mva,
                tap_ratio: spec.tap_ratio,
                phase_shift: spec.phase_shift,
                vector_group: spec.vector_group.clone(),
            });
        }
        for (spec, id) in self.generators.iter().zip(1i64..) {
            tables.generators.push(GeneratorRow {
                id,
                name: spec.name.clone(),
                bus_id: names.resolve(K::Generator, &spec.name, "bus_id", &spec.bus)?,
                p_nom_mw: spec.p_nom_mw,
                marginal_cost_eur_per_mwh: spec.marginal_cost_eur_per_mwh,
                control_type: spec.control_type.clone(),
                carrier: spec.carrier.clone(),
            });
        }
        for (spec, id) in self.loads.iter().zip(1i64..) {
            tables.loads.push(LoadRow {
                id,
                name: spec.name.clone(),
                bus_id: names.resolve(K::Load, &spec.name, "bus_id", &spec.bus)?,
                p_set_mw: spec.p_set_mw,
                q_set_mvar: spec.q_set_mvar,
            });
        }
        for (spec, id) in self.storage_units.iter().zip(1i64..) {
            tables.storage_units.push(StorageUnitRow {
                id,
                name: spec.name.clone(),
                bus_id: names.resolve(K::StorageUnit, &spec.name, "bus_id", &spec.bus)?,
                p_nom_mw: spec.p_nom_mw,
                max_hours: spec.max_hours,
                efficiency_store: spec.efficiency_store,
                efficiency_dispatch: spec.efficiency_dispatch,
                cyclic_soc: spec.cyclic_soc,
            });
        }
        for (spec, id) in self.links.iter().zip(1i64..) {
            tables.links.push(LinkRow {
                id,
                name: spec.name.clone(),
                from_bus_id: names.resolve(K::Link, &spec.name, "from_bus_id", &spec.from_bus)?,
                to_bus_id: names.resolve(K::Link, &spec.name, "to_bus_id", &spec.to_bus)?,
                p_nom_mw: spec.p_nom_mw,
                efficiency: spec.efficiency,
                p_min_pu: spec.p_min_pu,
                p_max_pu: spec.p_max_pu,
            });
        }
        for (spec, id) in self.svcs.iter().zip(1i64..) {
            tables.svcs.push(SvcRow {
                id,
                name: spec.name.clone(),
                bus_id: names.resolve(K::Compensator, &spec.name, "bus_id", &spec.bus)?,
                q_nom_mvar: spec.q_nom_mvar,
                q_min_mvar: spec.q_min_mvar,
                q_max_mvar: spec.q_max_mvar,
                v_set_pu: spec.v_set_pu,
            });
        }
        Ok(())
    }

    /// The five-bus 110 kV demonstration grid.
    pub fn sample() -> Self {
        let bus = |name: &str, x: f64, y: f64| BusSpec {
            name: name.into(),
            v_nom_kv: 110.0,
            bus_type: default_bus_type(),
            x_coord: Some(x),
            y_coord: Some(y),
        };
        let line = |name: &str, from: &str, to: &str, km: f64, r: f64, x: f64, s: f64| LineSpec {
            name: name.into(),
            from_bus: from.into(),
            to_bus: to.into(),
            length_km: km,
            r_ohm_per_km: r,
            x_ohm_per_km: x,
            s_nom_mva: s,
        };
        let generator = |name: &str, bus: &str, p: f64, cost: f64, control: &str, carrier: &str| {
            GeneratorSpec {
                name: name.into(),
                bus: bus.into(),
                p_nom_mw: p,
                marginal_cost_eur_per_mwh: cost,
                control_type: control.into(),
                carrier: Some(carrier.into()),
            }
        };
        let load = |name: &str, bus: &str, p: f64, q: f64| LoadSpec {
            name: name.into(),
            bus: bus.into(),
            p_set_mw: p,
            q_set_mvar: q,
        };

        NetworkFixture {
            buses: vec![
                bus("Substation_A", 0.0, 0.0),
                bus("City_Center", 5.0, 2.0),
                bus("Industrial_Park", 8.0, -1.0),
                bus("Rural_Town", -3.0, 4.0),
                bus("Wind_Farm_Connection", -6.0, -2.0),
            ],
            lines: vec![
                line("Line_A_City", "Substation_A", "City_Center", 20.0, 0.1, 0.3, 150.0),
                line("Line_City_Industrial", "City_Center", "Industrial_Park", 15.0, 0.15, 0.25, 120.0),
                line("Line_A_Rural", "Substation_A", "Rural_Town", 30.0, 0.08, 0.2, 180.0),
                line("Line_Rural_Wind", "Rural_Town", "Wind_Farm_Connection", 10.0, 0.2, 0.4, 100.0),
            ],
            transformers: vec![
                TransformerSpec {
                    name: "MainSubstation_Transformer".into(),
                    from_bus: "Substation_A".into(),
                    to_bus: "City_Center".into(),
                    s_nom_mva: 200.0,
                    tap_ratio: 1.0,
                    phase_shift: 0.0,
                    vector_group: Some("Dyn11".into()),
                },
                TransformerSpec {
                    name: "Industrial_Transformer".into(),
                    from_bus: "City_Center".into(),
                    to_bus: "Industrial_Park".into(),
                    s_nom_mva: 150.0,
                    tap_ratio: 0.95,
                    phase_shift: -30.0,
                    vector_group: Some("Yyn0".into()),
                },
            ],
            generators: vec![
                generator("Thermal_Plant_A", "Substation_A", 500.0, 25.0, "Slack", "thermal"),
                generator("Solar_Farm_Rural", "Rural_Town", 80.0, 10.0, "PQ", "solar"),
                generator("Wind_Turbines", "Wind_Farm_Connection", 120.0, 5.0, "PQ", "wind"),
            ],
            loads: vec![
                load("City_Load_1", "City_Center", 70.0, 20.0),
                load("Industrial_Load_1", "Industrial_Park", 100.0, 30.0),
                load("Rural_Load_1", "Rural_Town", 30.0, 10.0),
            ],
            storage_units: vec![
                StorageSpec {
                    name: "Industrial_Battery".into(),
                    bus: "Industrial_Park".into(),
                    p_nom_mw: 50.0,
                    max_hours: 4.0,
                    efficiency_store: 0.95,
                    efficiency_dispatch: 0.95,
                    cyclic_soc: true,
                },
                StorageSpec {
                    name: "Grid_Scale_Battery".into(),
                    bus: "City_Center".into(),
                    p_nom_mw: 100.0,
                    max_hours: 6.0,
                    efficiency_store: 0.92,
                    efficiency_dispatch: 0.92,
                    cyclic_soc: true,
                },
            ],
            links: vec![
                LinkSpec {
                    name: "Offshore_Wind_Link".into(),
                    from_bus: "Wind_Farm_Connection".into(),
                    to_bus: "City_Center".into(),
                    p_nom_mw: 400.0,
                    efficiency: 0.97,
                    p_min_pu: -1.0,
                    p_max_pu: 1.0,
                },
                LinkSpec {
                    name: "Industrial_DC_Link".into(),
                    from_bus: "Substation_A".into(),
                    to_bus: "Industrial_Park".into(),
                    p_nom_mw: 300.0,
                    efficiency: 0.98,
                    p_min_pu: 0.0,
                    p_max_pu: 1.0,
                },
            ],
            svcs: vec![
                SvcSpec {
                    name: "Industrial_SVC".into(),
                    bus: "Industrial_Park".into(),
                    q_nom_mvar: 100.0,
                    q_min_mvar: -100.0,
                    q_max_mvar: 100.0,
                    v_set_pu: 1.02,
                },
                SvcSpec {
                    name: "Wind_Farm_SVC".into(),
                    bus: "Wind_Farm_Connection".into(),
                    q_nom_mvar: 150.0,
                    q_min_mvar: -150.0,
                    q_max_mvar: 150.0,
                    v_set_pu: 1.0,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_resolves_every_bus_name() {
        let tables = NetworkFixture::sample().into_table_set().unwrap();
        assert_eq!(tables.buses.len(), 5);
        assert_eq!(tables.lines.len(), 4);
        assert_eq!(tables.svcs.len(), 2);
        // Wind_Farm_Connection is the fifth bus
        assert_eq!(tables.links[0].from_bus_id, 5);
        assert_eq!(tables.links[0].to_bus_id, 2);
    }

    #[test]
    fn unknown_bus_name_is_referential_error() {
        let mut fixture = NetworkFixture::sample();
        fixture.loads[0].bus = "Nowhere".into();
        match fixture.into_table_set() {
            Err(PsaError::ReferentialIntegrity { row, missing, .. }) => {
                assert_eq!(row, "City_Load_1");
                assert_eq!(missing, BusRef::Name("Nowhere".into()));
            }
            other => panic!("expected referential error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_source_column_names() {
        let json = r#"{
            "buses": [
                {"name": "A", "v_nom_kv": 110.0, "type": "b"},
                {"name": "B", "v_nom_kv": 110.0}
            ],
            "lines": [
                {"name": "L", "from_bus_name": "A", "to_bus_name": "B",
                 "length_km": 1.0, "r_ohm_per_km": 0.1, "x_ohm_per_km": 0.3, "s_nom_mva": 10.0}
            ],
            "hvdc_links": [
                {"name": "K", "from_bus": "A", "to_bus": "B", "p_nom_mw": 5.0}
            ]
        }"#;
        let fixture = NetworkFixture::from_json_str(json).unwrap();
        assert_eq!(fixture.buses[1].bus_type, "b");
        assert_eq!(fixture.lines[0].from_bus, "A");
        assert_eq!(fixture.links[0].efficiency, 1.0);
        assert!(fixture.generators.is_empty());
    }

    #[test]
    fn json_text_reloads_identically() {
        let fixture = NetworkFixture::sample();
        let text = fixture.to_json_string().unwrap();
        assert_eq!(NetworkFixture::from_json_str(&text).unwrap(), fixture);
    }
}
