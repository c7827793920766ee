//! # psa-core: Transmission Network Data Model
//!
//! Provides the in-memory network graph consumed by validation, operating-point
//! initialization and power-flow solving.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses, Generators (including reactive compensators), Loads, Storage units
//! - **Edges**: Lines, Transformers and HVDC links
//!
//! Single-bus components (generators, loads, storage) are graph nodes that
//! carry their bus id; they are not wired to the bus node. Two-terminal
//! components are edges between the two bus nodes, so parallel branches are
//! represented naturally.
//!
//! ## Quick Start
//!
//! ```rust
//! use psa_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new(BusId::new(1), "North", 110.0)).unwrap();
//! network.add_bus(Bus::new(BusId::new(2), "South", 110.0)).unwrap();
//!
//! network
//!     .add_line(Line::from_per_km(
//!         LineId::new(1),
//!         "North_South",
//!         BusId::new(1),
//!         BusId::new(2),
//!         20.0,
//!         0.1,
//!         0.3,
//!         150.0,
//!     ))
//!     .unwrap();
//!
//! assert_eq!(network.buses().len(), 2);
//! assert!((network.lines()[0].r_ohm - 2.0).abs() < 1e-12);
//! ```
//!
//! ## Reactive Compensators
//!
//! Static VAR compensators are stored as [`Gen`] entries whose
//! [`InjectionKind`] is [`InjectionKind::Compensator`]. Downstream code
//! matches on the discriminant, never on the component name.
//!
//! ## Modules
//!
//! - [`diagnostics`] - Plausibility findings and load statistics
//! - [`error`] - [`PsaError`] and [`PsaResult`]
//! - [`solver`] - Power-flow solver boundary and linear-system backends

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod solver;

pub use diagnostics::{Check, Finding, Findings, LoadStats};
pub use error::{BusRef, PsaError, PsaResult};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use solver::*;

// Newtype wrappers for IDs for type safety
macro_rules! id_type {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            #[inline]
            pub fn new(value: $inner) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// BusId wraps the store's integer primary key so foreign keys resolve directly.
id_type!(BusId, i64);
id_type!(LineId, usize);
id_type!(TransformerId, usize);
id_type!(GenId, usize);
id_type!(LoadId, usize);
id_type!(StorageId, usize);
id_type!(LinkId, usize);

// ============================================================================
// Component references
// ============================================================================

/// Component kinds as they appear in the store and in findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Bus,
    Line,
    Transformer,
    Generator,
    Compensator,
    Load,
    StorageUnit,
    Link,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentKind::Bus => "Bus",
            ComponentKind::Line => "Line",
            ComponentKind::Transformer => "Transformer",
            ComponentKind::Generator => "Generator",
            ComponentKind::Compensator => "SVC",
            ComponentKind::Load => "Load",
            ComponentKind::StorageUnit => "StorageUnit",
            ComponentKind::Link => "Link",
        };
        f.write_str(label)
    }
}

/// Kind-qualified component name, e.g. "Transformer T1"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComponentRef {
    pub kind: ComponentKind,
    pub name: String,
}

impl ComponentRef {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

// ============================================================================
// Enumerations stored as text columns
// ============================================================================

/// Bus classification stored in the `type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusKind {
    #[default]
    Busbar,
    LineNode,
}

impl BusKind {
    /// Single-letter code written to the store
    pub fn code(&self) -> &'static str {
        match self {
            BusKind::Busbar => "b",
            BusKind::LineNode => "l",
        }
    }
}

impl FromStr for BusKind {
    type Err = PsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b" | "busbar" => Ok(BusKind::Busbar),
            "l" | "n" | "line-node" | "line_node" | "node" => Ok(BusKind::LineNode),
            other => Err(PsaError::Parse(format!("unknown bus type '{}'", other))),
        }
    }
}

/// Generator control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Reference generator: fixes |V| and angle, absorbs the imbalance
    Slack,
    /// Fixed P and |V|
    PV,
    /// Fixed P and Q
    PQ,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControlMode::Slack => "Slack",
            ControlMode::PV => "PV",
            ControlMode::PQ => "PQ",
        };
        f.write_str(label)
    }
}

impl FromStr for ControlMode {
    type Err = PsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(ControlMode::Slack),
            "pv" => Ok(ControlMode::PV),
            "pq" => Ok(ControlMode::PQ),
            other => Err(PsaError::Parse(format!("unknown control type '{}'", other))),
        }
    }
}

/// Generation technology used to seed PQ dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Solar,
    Wind,
    Hydro,
    Thermal,
    Nuclear,
    #[default]
    Other,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Solar => "solar",
            Technology::Wind => "wind",
            Technology::Hydro => "hydro",
            Technology::Thermal => "thermal",
            Technology::Nuclear => "nuclear",
            Technology::Other => "other",
        }
    }

    /// Guess the technology from a component name.
    ///
    /// Only used when a row carries no `carrier` value.
    pub fn classify_name(name: &str) -> Technology {
        let lower = name.to_ascii_lowercase();
        [
            ("solar", Technology::Solar),
            ("pv_", Technology::Solar),
            ("wind", Technology::Wind),
            ("hydro", Technology::Hydro),
            ("nuclear", Technology::Nuclear),
            ("thermal", Technology::Thermal),
            ("coal", Technology::Thermal),
            ("gas", Technology::Thermal),
        ]
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, tech)| *tech)
        .unwrap_or(Technology::Other)
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = PsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" | "pv" => Ok(Technology::Solar),
            "wind" | "onwind" | "offwind" => Ok(Technology::Wind),
            "hydro" => Ok(Technology::Hydro),
            "thermal" | "coal" | "gas" | "ccgt" | "ocgt" => Ok(Technology::Thermal),
            "nuclear" => Ok(Technology::Nuclear),
            "other" | "" => Ok(Technology::Other),
            other => Err(PsaError::Parse(format!("unknown carrier '{}'", other))),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The single time index an analysis run is evaluated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub NaiveDateTime);

impl Snapshot {
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn parse(text: &str) -> PsaResult<Self> {
        Ok(Snapshot(NaiveDateTime::parse_from_str(text.trim(), Self::FORMAT)?))
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Snapshot(start)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

// ============================================================================
// Components
// ============================================================================

/// Planar coordinates used by the rendering boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal voltage in kilovolts
    pub v_nom_kv: f64,
    pub kind: BusKind,
    pub coordinates: Option<Coordinates>,
    /// Voltage magnitude target (per-unit)
    pub v_mag_pu_set: f64,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>, v_nom_kv: f64) -> Self {
        Self {
            id,
            name: name.into(),
            v_nom_kv,
            kind: BusKind::Busbar,
            coordinates: None,
            v_mag_pu_set: 1.0,
        }
    }
}

/// AC transmission line. Absolute impedances are fixed at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    /// Series resistance of the whole line (Ω)
    pub r_ohm: f64,
    /// Series reactance of the whole line (Ω)
    pub x_ohm: f64,
    /// Thermal rating
    pub s_nom_mva: f64,
}

impl Line {
    /// Build a line from per-kilometre parameters, computing absolute R and X.
    #[allow(clippy::too_many_arguments)]
    pub fn from_per_km(
        id: LineId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        length_km: f64,
        r_ohm_per_km: f64,
        x_ohm_per_km: f64,
        s_nom_mva: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            length_km,
            r_ohm_per_km,
            x_ohm_per_km,
            r_ohm: r_ohm_per_km * length_km,
            x_ohm: x_ohm_per_km * length_km,
            s_nom_mva,
        }
    }

    /// Series impedance magnitude per kilometre (Ω/km); `None` for zero length
    pub fn impedance_per_km(&self) -> Option<f64> {
        if self.length_km > 0.0 {
            Some(self.r_ohm.hypot(self.x_ohm) / self.length_km)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transformer {
    pub id: TransformerId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub s_nom_mva: f64,
    /// Off-nominal tap ratio applied at the from side
    pub tap_ratio: f64,
    pub phase_shift_deg: f64,
    pub vector_group: String,
    /// Series resistance (per-unit on `s_nom_mva`)
    pub r_pu: f64,
    /// Series reactance (per-unit on `s_nom_mva`)
    pub x_pu: f64,
}

/// Reactive rating of a static VAR compensator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensatorRating {
    pub q_nom_mvar: f64,
    pub q_min_mvar: f64,
    pub q_max_mvar: f64,
    pub v_set_pu: f64,
}

/// Discriminates ordinary generators from compensators sharing the [`Gen`] entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InjectionKind {
    Generator,
    Compensator(CompensatorRating),
}

/// Dispatchable injection: a generator or a reactive compensator
#[derive(Debug, Clone, PartialEq)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    pub kind: InjectionKind,
    pub technology: Technology,
    pub p_nom_mw: f64,
    pub marginal_cost_eur_per_mwh: f64,
    pub control: ControlMode,
    /// Active power set-point (MW)
    pub p_set_mw: f64,
    /// Reactive power set-point (Mvar), used in PQ mode
    pub q_set_mvar: f64,
    /// Voltage magnitude target (per-unit), used in Slack/PV mode
    pub v_mag_pu_set: Option<f64>,
    pub q_min_mvar: Option<f64>,
    pub q_max_mvar: Option<f64>,
}

impl Gen {
    pub fn new(id: GenId, name: impl Into<String>, bus: BusId, control: ControlMode) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            kind: InjectionKind::Generator,
            technology: Technology::Other,
            p_nom_mw: 0.0,
            marginal_cost_eur_per_mwh: 0.0,
            control,
            p_set_mw: 0.0,
            q_set_mvar: 0.0,
            v_mag_pu_set: None,
            q_min_mvar: None,
            q_max_mvar: None,
        }
    }

    /// Build the generator variant standing in for a static VAR compensator.
    ///
    /// The compensator has no active power and starts in PV control at its
    /// voltage set-point.
    pub fn compensator(
        id: GenId,
        name: impl Into<String>,
        bus: BusId,
        rating: CompensatorRating,
    ) -> Self {
        Self {
            kind: InjectionKind::Compensator(rating),
            v_mag_pu_set: Some(rating.v_set_pu),
            q_min_mvar: Some(rating.q_min_mvar),
            q_max_mvar: Some(rating.q_max_mvar),
            ..Gen::new(id, name, bus, ControlMode::PV)
        }
    }

    pub fn with_rating(mut self, p_nom_mw: f64) -> Self {
        self.p_nom_mw = p_nom_mw;
        self
    }

    pub fn with_technology(mut self, technology: Technology) -> Self {
        self.technology = technology;
        self
    }

    pub fn with_marginal_cost(mut self, cost: f64) -> Self {
        self.marginal_cost_eur_per_mwh = cost;
        self
    }

    pub fn is_compensator(&self) -> bool {
        matches!(self.kind, InjectionKind::Compensator(_))
    }

    pub fn compensator_rating(&self) -> Option<&CompensatorRating> {
        match &self.kind {
            InjectionKind::Compensator(rating) => Some(rating),
            InjectionKind::Generator => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (MW)
    pub p_set_mw: f64,
    /// Reactive power demand (Mvar)
    pub q_set_mvar: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    pub id: StorageId,
    pub name: String,
    pub bus: BusId,
    pub p_nom_mw: f64,
    /// Energy capacity expressed in hours at rated power
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub cyclic_state_of_charge: bool,
    pub state_of_charge_initial_mwh: f64,
    /// Active power set-point (MW); positive = dispatching
    pub p_set_mw: f64,
}

impl StorageUnit {
    pub fn energy_capacity_mwh(&self) -> f64 {
        self.p_nom_mw * self.max_hours
    }
}

/// Controllable HVDC link between two buses
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub p_nom_mw: f64,
    pub efficiency: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    /// Power withdrawn at `from_bus` (MW); `to_bus` receives `p_set_mw * efficiency`
    pub p_set_mw: f64,
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
    Storage(StorageUnit),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    Line(Line),
    Transformer(Transformer),
    Link(Link),
}

impl Node {
    /// Returns the component name
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Gen(gen) => &gen.name,
            Node::Load(load) => &load.name,
            Node::Storage(storage) => &storage.name,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Node::Bus(_) => ComponentKind::Bus,
            Node::Gen(gen) if gen.is_compensator() => ComponentKind::Compensator,
            Node::Gen(_) => ComponentKind::Generator,
            Node::Load(_) => ComponentKind::Load,
            Node::Storage(_) => ComponentKind::StorageUnit,
        }
    }
}

impl Edge {
    /// Returns the component name
    pub fn label(&self) -> &str {
        match self {
            Edge::Line(line) => &line.name,
            Edge::Transformer(tx) => &tx.name,
            Edge::Link(link) => &link.name,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Edge::Line(_) => ComponentKind::Line,
            Edge::Transformer(_) => ComponentKind::Transformer,
            Edge::Link(_) => ComponentKind::Link,
        }
    }

    pub fn endpoints(&self) -> (BusId, BusId) {
        match self {
            Edge::Line(line) => (line.from_bus, line.to_bus),
            Edge::Transformer(tx) => (tx.from_bus, tx.to_bus),
            Edge::Link(link) => (link.from_bus, link.to_bus),
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// The power network graph for one analysis run
#[derive(Debug, Default, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    pub snapshot: Snapshot,
    bus_index: HashMap<BusId, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            snapshot: Snapshot::default(),
            bus_index: HashMap::new(),
        }
    }

    /// Add a bus node; bus ids and bus names must both be unique.
    pub fn add_bus(&mut self, bus: Bus) -> PsaResult<NodeIndex> {
        if self.bus_index.contains_key(&bus.id) {
            return Err(PsaError::Network(format!(
                "bus id {} is used by more than one bus",
                bus.id
            )));
        }
        if self.buses().iter().any(|b| b.name == bus.name) {
            return Err(PsaError::DuplicateName {
                kind: ComponentKind::Bus,
                name: bus.name,
            });
        }
        let id = bus.id;
        let idx = self.graph.add_node(Node::Bus(bus));
        self.bus_index.insert(id, idx);
        Ok(idx)
    }

    /// Add a single-bus component (generator, load or storage unit).
    pub fn add_injection(&mut self, node: Node) -> PsaResult<NodeIndex> {
        let bus = match &node {
            Node::Bus(_) => {
                return Err(PsaError::Network(
                    "buses must be added with add_bus".to_string(),
                ))
            }
            Node::Gen(gen) => gen.bus,
            Node::Load(load) => load.bus,
            Node::Storage(storage) => storage.bus,
        };
        self.require_bus(bus, node.label())?;
        let kind = node.kind();
        let duplicate = self.graph.node_weights().any(|n| {
            same_name_space(n.kind(), kind) && n.label() == node.label()
        });
        if duplicate {
            return Err(PsaError::DuplicateName {
                kind,
                name: node.label().to_string(),
            });
        }
        Ok(self.graph.add_node(node))
    }

    pub fn add_line(&mut self, line: Line) -> PsaResult<EdgeIndex> {
        self.add_branch(Edge::Line(line))
    }

    pub fn add_transformer(&mut self, transformer: Transformer) -> PsaResult<EdgeIndex> {
        self.add_branch(Edge::Transformer(transformer))
    }

    pub fn add_link(&mut self, link: Link) -> PsaResult<EdgeIndex> {
        self.add_branch(Edge::Link(link))
    }

    fn add_branch(&mut self, edge: Edge) -> PsaResult<EdgeIndex> {
        let (from, to) = edge.endpoints();
        let from_idx = self.require_bus(from, edge.label())?;
        let to_idx = self.require_bus(to, edge.label())?;
        let kind = edge.kind();
        if self
            .graph
            .edge_weights()
            .any(|e| e.kind() == kind && e.label() == edge.label())
        {
            return Err(PsaError::DuplicateName {
                kind,
                name: edge.label().to_string(),
            });
        }
        Ok(self.graph.add_edge(from_idx, to_idx, edge))
    }

    fn require_bus(&self, bus: BusId, owner: &str) -> PsaResult<NodeIndex> {
        self.bus_index.get(&bus).copied().ok_or_else(|| {
            PsaError::Network(format!("'{}' is attached to unknown bus id {}", owner, bus))
        })
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        let idx = self.bus_index.get(&id)?;
        match &self.graph[*idx] {
            Node::Bus(bus) => Some(bus),
            _ => None,
        }
    }

    /// Name of a bus, if the id resolves
    pub fn bus_name(&self, id: BusId) -> Option<&str> {
        self.bus(id).map(|b| b.name.as_str())
    }

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// All dispatchable injections, compensators included
    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn compensators(&self) -> Vec<&Gen> {
        self.generators()
            .into_iter()
            .filter(|g| g.is_compensator())
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn storage_units(&self) -> Vec<&StorageUnit> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Storage(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn lines(&self) -> Vec<&Line> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Line(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn transformers(&self) -> Vec<&Transformer> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Transformer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn links(&self) -> Vec<&Link> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Link(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Look up a generator (or compensator) by name
    pub fn generator(&self, name: &str) -> Option<&Gen> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Gen(g) if g.name == name => Some(g),
            _ => None,
        })
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(g) if g.is_compensator() => stats.num_compensators += 1,
                Node::Gen(g) => {
                    stats.num_generators += 1;
                    stats.total_gen_capacity_mw += g.p_nom_mw;
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.p_set_mw;
                    stats.total_load_mvar += l.q_set_mvar;
                }
                Node::Storage(s) => {
                    stats.num_storage_units += 1;
                    stats.total_storage_mwh += s.energy_capacity_mwh();
                }
            }
        }
        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Line(_) => stats.num_lines += 1,
                Edge::Transformer(_) => stats.num_transformers += 1,
                Edge::Link(_) => stats.num_links += 1,
            }
        }

        stats
    }
}

// Compensators share the generator table namespace once loaded.
fn same_name_space(a: ComponentKind, b: ComponentKind) -> bool {
    let gen_like = |k| matches!(k, ComponentKind::Generator | ComponentKind::Compensator);
    a == b || (gen_like(a) && gen_like(b))
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_transformers: usize,
    pub num_links: usize,
    pub num_generators: usize,
    pub num_compensators: usize,
    pub num_loads: usize,
    pub num_storage_units: usize,
    pub total_gen_capacity_mw: f64,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
    pub total_storage_mwh: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} transformers, {} links, {} gens ({:.0} MW), {} SVCs, {} loads ({:.0} MW), {} storage units ({:.0} MWh)",
            self.num_buses,
            self.num_lines,
            self.num_transformers,
            self.num_links,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_compensators,
            self.num_loads,
            self.total_load_mw,
            self.num_storage_units,
            self.total_storage_mwh
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "Bus 1", 110.0)).unwrap();
        network.add_bus(Bus::new(BusId::new(2), "Bus 2", 110.0)).unwrap();
        network
    }

    #[test]
    fn test_line_absolute_impedance_from_per_km() {
        let line = Line::from_per_km(
            LineId::new(0),
            "L",
            BusId::new(1),
            BusId::new(2),
            20.0,
            0.1,
            0.3,
            150.0,
        );
        assert!((line.r_ohm - 2.0).abs() < 1e-12);
        assert!((line.x_ohm - 6.0).abs() < 1e-12);
        let z = line.impedance_per_km().unwrap();
        assert!((z - (0.1f64.hypot(0.3))).abs() < 1e-12);
    }

    #[test]
    fn test_network_rejects_unknown_bus() {
        let mut network = two_bus_network();
        let result = network.add_injection(Node::Load(Load {
            id: LoadId::new(0),
            name: "Load 1".into(),
            bus: BusId::new(99),
            p_set_mw: 10.0,
            q_set_mvar: 1.0,
        }));
        assert!(matches!(result, Err(PsaError::Network(_))));
    }

    #[test]
    fn test_network_rejects_duplicate_bus_name() {
        let mut network = two_bus_network();
        let result = network.add_bus(Bus::new(BusId::new(3), "Bus 1", 110.0));
        assert!(matches!(result, Err(PsaError::DuplicateName { .. })));
    }

    #[test]
    fn test_compensator_shares_generator_name_space() {
        let mut network = two_bus_network();
        network
            .add_injection(Node::Gen(Gen::new(
                GenId::new(0),
                "X",
                BusId::new(1),
                ControlMode::PQ,
            )))
            .unwrap();
        let rating = CompensatorRating {
            q_nom_mvar: 10.0,
            q_min_mvar: -10.0,
            q_max_mvar: 10.0,
            v_set_pu: 1.0,
        };
        let result = network.add_injection(Node::Gen(Gen::compensator(
            GenId::new(1),
            "X",
            BusId::new(1),
            rating,
        )));
        assert!(matches!(result, Err(PsaError::DuplicateName { .. })));
    }

    #[test]
    fn test_compensator_variant_is_tagged() {
        let mut network = two_bus_network();
        let rating = CompensatorRating {
            q_nom_mvar: 100.0,
            q_min_mvar: -100.0,
            q_max_mvar: 100.0,
            v_set_pu: 1.02,
        };
        network
            .add_injection(Node::Gen(Gen::compensator(
                GenId::new(0),
                "SVC_A",
                BusId::new(2),
                rating,
            )))
            .unwrap();
        network
            .add_injection(Node::Gen(
                Gen::new(GenId::new(1), "G", BusId::new(1), ControlMode::Slack).with_rating(50.0),
            ))
            .unwrap();

        assert_eq!(network.generators().len(), 2);
        let svcs = network.compensators();
        assert_eq!(svcs.len(), 1);
        assert_eq!(svcs[0].control, ControlMode::PV);
        assert_eq!(svcs[0].v_mag_pu_set, Some(1.02));
        assert_eq!(svcs[0].p_set_mw, 0.0);
    }

    #[test]
    fn test_network_stats() {
        let mut network = two_bus_network();
        network
            .add_line(Line::from_per_km(
                LineId::new(0),
                "L12",
                BusId::new(1),
                BusId::new(2),
                10.0,
                0.1,
                0.3,
                100.0,
            ))
            .unwrap();
        network
            .add_injection(Node::Gen(
                Gen::new(GenId::new(0), "G", BusId::new(1), ControlMode::Slack).with_rating(100.0),
            ))
            .unwrap();
        network
            .add_injection(Node::Load(Load {
                id: LoadId::new(0),
                name: "D".into(),
                bus: BusId::new(2),
                p_set_mw: 50.0,
                q_set_mvar: 10.0,
            }))
            .unwrap();

        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_lines, 1);
        assert_eq!(stats.num_generators, 1);
        assert_eq!(stats.num_loads, 1);
        assert!((stats.total_load_mw - 50.0).abs() < 1e-9);
        assert!(stats.to_string().starts_with("2 buses, 1 lines"));
    }

    #[test]
    fn test_bus_name_resolution() {
        let network = two_bus_network();
        assert_eq!(network.bus_name(BusId::new(2)), Some("Bus 2"));
        assert_eq!(network.bus_name(BusId::new(7)), None);
    }

    #[test]
    fn test_parse_enumerations() {
        assert_eq!("Slack".parse::<ControlMode>().unwrap(), ControlMode::Slack);
        assert_eq!("pq".parse::<ControlMode>().unwrap(), ControlMode::PQ);
        assert!("droop".parse::<ControlMode>().is_err());
        assert_eq!("b".parse::<BusKind>().unwrap(), BusKind::Busbar);
        assert_eq!("l".parse::<BusKind>().unwrap(), BusKind::LineNode);
        assert_eq!(BusKind::LineNode.code(), "l");
        assert!("x".parse::<BusKind>().is_err());
        assert_eq!("wind".parse::<Technology>().unwrap(), Technology::Wind);
    }

    #[test]
    fn test_technology_name_heuristic() {
        assert_eq!(Technology::classify_name("Solar_Farm_Rural"), Technology::Solar);
        assert_eq!(Technology::classify_name("Wind_Turbines"), Technology::Wind);
        assert_eq!(Technology::classify_name("Thermal_Plant_A"), Technology::Thermal);
        assert_eq!(Technology::classify_name("Unit 7"), Technology::Other);
    }

    #[test]
    fn test_snapshot_roundtrip_text() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.to_string(), "2025-01-01 00:00:00");
        assert_eq!(Snapshot::parse("2025-01-01 00:00:00").unwrap(), snapshot);
        assert!(Snapshot::parse("yesterday").is_err());
    }
}
