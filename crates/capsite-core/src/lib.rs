//! # capsite-core: Radial Feeder Data Model
//!
//! Typed, validated representation of a radial distribution feeder prepared
//! for capacitor placement studies: buses with typed loads, branches with
//! series impedance and thermal rating, a per-period load profile, a catalog
//! of capacitor bank options, and the economic parameters used to annualize
//! costs.
//!
//! ## Design Philosophy
//!
//! Input arrives as *records* in physical units ([`BusRecord`], [`LineRecord`],
//! [`CapacitorRecord`]). A [`FeederBuilder`] checks them, converts every
//! quantity to per-unit exactly once through [`PerUnitBases`], and produces an
//! immutable [`Feeder`]. Nothing downstream ever sees kW, Ω or kA.
//!
//! ```rust
//! use capsite_core::*;
//!
//! let bases = PerUnitBases::new(1.0, 1.0).unwrap();
//! let limits = VoltageLimits::new(0.9, 1.1);
//! let economics = EconomicParams::new(100.0, 0.1, 10, 1);
//!
//! let feeder = FeederBuilder::new(bases, limits, economics)
//!     .bus(BusRecord::new(1, "Substation").slack(1.0))
//!     .bus(BusRecord::new(2, "Lateral").with_load(LoadType::Residential, 500.0, 300.0))
//!     .line(LineRecord::new(1, 1, 2, 0.02, 0.02, 1.0))
//!     .period(TimePeriod::new("1", 1.0, 1.0, 1.0))
//!     .capacitor(CapacitorRecord::new(1, "fixed", 300.0, 1.0))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(feeder.buses().len(), 2);
//! assert_eq!(feeder.slack_bus().id, BusId::new(1));
//! ```
//!
//! ## Modules
//!
//! - [`units`] - physical/per-unit newtypes and [`PerUnitBases`]
//! - [`topology`] - radial tree index (parents, children, orientation)
//! - [`diagnostics`] - issue collection for data checks
//! - [`error`] - [`CapsiteError`] taxonomy

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

pub mod diagnostics;
pub mod error;
pub mod topology;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CapsiteError, CapsiteResult};
pub use topology::{OrientedBranch, TopologyIndex};
pub use units::{
    CurrentPu, ImpedancePu, Kiloamperes, Kilovars, Kilovolts, Kilowatts, MegavoltAmperes, Ohms,
    PerUnit, PerUnitBases,
};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacitorId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    /// Entity reference used in diagnostics and errors
    pub fn entity(&self) -> String {
        format!("bus {}", self.0)
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    pub fn entity(&self) -> String {
        format!("branch {}", self.0)
    }
}

impl CapacitorId {
    #[inline]
    pub fn new(value: usize) -> Self {
        CapacitorId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    pub fn entity(&self) -> String {
        format!("capacitor {}", self.0)
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for CapacitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Load classification
// =============================================================================

/// Customer class of a load point; selects which profile column scales it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadType {
    Residential,
    Commercial,
    Industrial,
}

impl LoadType {
    pub const ALL: [LoadType; 3] = [
        LoadType::Residential,
        LoadType::Commercial,
        LoadType::Industrial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Residential => "Residential",
            LoadType::Commercial => "Commercial",
            LoadType::Industrial => "Industrial",
        }
    }
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "residential" => Ok(LoadType::Residential),
            "commercial" => Ok(LoadType::Commercial),
            "industrial" => Ok(LoadType::Industrial),
            other => Err(format!(
                "unknown load type '{other}' (expected Residential, Commercial or Industrial)"
            )),
        }
    }
}

/// Which load classes are energized in a study.
///
/// Under a restricted filter, buses of the other classes carry zero demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoadTypeFilter {
    #[default]
    All,
    Only(LoadType),
}

impl LoadTypeFilter {
    pub fn admits(&self, load_type: LoadType) -> bool {
        match self {
            LoadTypeFilter::All => true,
            LoadTypeFilter::Only(only) => *only == load_type,
        }
    }
}

impl std::fmt::Display for LoadTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadTypeFilter::All => f.write_str("All"),
            LoadTypeFilter::Only(t) => write!(f, "{t}"),
        }
    }
}

impl FromStr for LoadTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(LoadTypeFilter::All);
        }
        s.parse::<LoadType>()
            .map(LoadTypeFilter::Only)
            .map_err(|_| {
                format!(
                    "unknown load-type filter '{}' (expected All, Residential, Commercial or Industrial)",
                    s.trim()
                )
            })
    }
}

// =============================================================================
// Input records (physical units)
// =============================================================================

/// Bus as it appears in the input tables.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub id: BusId,
    pub name: String,
    pub load_type: Option<LoadType>,
    /// Peak active load
    pub p_load: Kilowatts,
    /// Peak reactive load
    pub q_load: Kilovars,
    pub slack: bool,
    /// Scheduled voltage magnitude, required on the slack bus
    pub v_sched: Option<PerUnit>,
}

impl BusRecord {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id: BusId::new(id),
            name: name.into(),
            load_type: None,
            p_load: Kilowatts(0.0),
            q_load: Kilovars(0.0),
            slack: false,
            v_sched: None,
        }
    }

    /// Attach a typed peak load in kW / kVAr.
    pub fn with_load(mut self, load_type: LoadType, p_kw: f64, q_kvar: f64) -> Self {
        self.load_type = Some(load_type);
        self.p_load = Kilowatts(p_kw);
        self.q_load = Kilovars(q_kvar);
        self
    }

    /// Mark as the slack (feeder head) bus with a scheduled voltage in per-unit.
    pub fn slack(mut self, v_sched_pu: f64) -> Self {
        self.slack = true;
        self.v_sched = Some(PerUnit(v_sched_pu));
        self
    }
}

/// Line as it appears in the input tables.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub id: BranchId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub resistance: Ohms,
    pub reactance: Ohms,
    /// Thermal current rating (rate A)
    pub rating: Kiloamperes,
}

impl LineRecord {
    pub fn new(
        id: usize,
        from_bus: usize,
        to_bus: usize,
        r_ohm: f64,
        x_ohm: f64,
        rating_ka: f64,
    ) -> Self {
        Self {
            id: BranchId::new(id),
            from_bus: BusId::new(from_bus),
            to_bus: BusId::new(to_bus),
            resistance: Ohms(r_ohm),
            reactance: Ohms(x_ohm),
            rating: Kiloamperes(rating_ka),
        }
    }
}

/// Capacitor bank option from the catalog.
#[derive(Debug, Clone)]
pub struct CapacitorRecord {
    pub id: CapacitorId,
    /// Free-form type tag (e.g. "fixed", "switched")
    pub kind: String,
    pub size: Kilovars,
    /// Unit price in currency per kVAr
    pub cost_per_kvar: f64,
}

impl CapacitorRecord {
    pub fn new(id: usize, kind: impl Into<String>, size_kvar: f64, cost_per_kvar: f64) -> Self {
        Self {
            id: CapacitorId::new(id),
            kind: kind.into(),
            size: Kilovars(size_kvar),
            cost_per_kvar,
        }
    }
}

/// One period of the load horizon with its profile multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub label: String,
    pub residential: f64,
    pub commercial: f64,
    pub industrial: f64,
}

impl TimePeriod {
    pub fn new(label: impl Into<String>, residential: f64, commercial: f64, industrial: f64) -> Self {
        Self {
            label: label.into(),
            residential,
            commercial,
            industrial,
        }
    }

    /// Fraction of peak load for the given class in this period
    pub fn multiplier(&self, load_type: LoadType) -> f64 {
        match load_type {
            LoadType::Residential => self.residential,
            LoadType::Commercial => self.commercial,
            LoadType::Industrial => self.industrial,
        }
    }
}

// =============================================================================
// Study parameters
// =============================================================================

/// Voltage magnitude band applied to every non-slack bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageLimits {
    pub lower: PerUnit,
    pub upper: PerUnit,
}

impl VoltageLimits {
    pub fn new(lower_pu: f64, upper_pu: f64) -> Self {
        Self {
            lower: PerUnit(lower_pu),
            upper: PerUnit(upper_pu),
        }
    }
}

/// Prices and planning horizon used to annualize the objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicParams {
    /// Energy loss price per MWh
    pub loss_price: f64,
    /// Discount rate r
    pub discount_rate: f64,
    /// Capacitor asset life M in years
    pub asset_life_years: u32,
    /// Network-wide cap Y on capacitor placements
    pub max_placements: usize,
}

impl EconomicParams {
    pub fn new(
        loss_price: f64,
        discount_rate: f64,
        asset_life_years: u32,
        max_placements: usize,
    ) -> Self {
        Self {
            loss_price,
            discount_rate,
            asset_life_years,
            max_placements,
        }
    }

    /// Capital Recovery Factor converting a one-time investment into equal annual payments
    ///
    /// CRF = r(1+r)^M / ((1+r)^M - 1)
    pub fn capital_recovery_factor(&self) -> f64 {
        let r = self.discount_rate;
        let n = self.asset_life_years as f64;
        if r < 1e-10 {
            // No discounting
            1.0 / n
        } else {
            r * (1.0 + r).powf(n) / ((1.0 + r).powf(n) - 1.0)
        }
    }

    /// Annual charge equivalent to a one-time investment
    pub fn annualized(&self, investment: f64) -> f64 {
        investment * self.capital_recovery_factor()
    }
}

// =============================================================================
// Validated model (per-unit)
// =============================================================================

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub load_type: Option<LoadType>,
    /// Peak active load (per-unit)
    pub p_load: PerUnit,
    /// Peak reactive load (per-unit)
    pub q_load: PerUnit,
    pub slack: bool,
    /// Scheduled voltage, present on the slack bus
    pub v_sched: Option<PerUnit>,
    /// Lower bound on squared voltage magnitude
    pub vsq_min: f64,
    /// Upper bound on squared voltage magnitude
    pub vsq_max: f64,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub resistance: ImpedancePu,
    pub reactance: ImpedancePu,
    pub rating: CurrentPu,
}

#[derive(Debug, Clone)]
pub struct CapacitorOption {
    pub id: CapacitorId,
    pub kind: String,
    /// Reactive size (per-unit)
    pub size: PerUnit,
    /// Unit price per MVAr
    pub cost_per_mvar: f64,
}

/// Size summary reported by CLI front-ends.
#[derive(Debug, Clone, Serialize)]
pub struct FeederStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_periods: usize,
    pub num_capacitor_options: usize,
    pub num_load_buses: usize,
    pub peak_load_kw: f64,
    pub peak_load_kvar: f64,
}

/// Validated radial feeder study data, all quantities per-unit.
#[derive(Debug, Clone)]
pub struct Feeder {
    bases: PerUnitBases,
    limits: VoltageLimits,
    economics: EconomicParams,
    load_filter: LoadTypeFilter,
    buses: Vec<Bus>,
    branches: Vec<Branch>,
    periods: Vec<TimePeriod>,
    capacitors: Vec<CapacitorOption>,
    bus_lookup: HashMap<BusId, usize>,
    slack: usize,
}

impl Feeder {
    pub fn bases(&self) -> &PerUnitBases {
        &self.bases
    }

    pub fn voltage_limits(&self) -> &VoltageLimits {
        &self.limits
    }

    pub fn economics(&self) -> &EconomicParams {
        &self.economics
    }

    pub fn load_filter(&self) -> LoadTypeFilter {
        self.load_filter
    }

    /// Buses in declaration order
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    /// Branches in declaration order
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn periods(&self) -> &[TimePeriod] {
        &self.periods
    }

    pub fn capacitors(&self) -> &[CapacitorOption] {
        &self.capacitors
    }

    /// Position of a bus in declaration order
    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.bus_lookup.get(&id).copied()
    }

    pub fn slack_index(&self) -> usize {
        self.slack
    }

    pub fn slack_bus(&self) -> &Bus {
        &self.buses[self.slack]
    }

    /// Demand (P, Q) at a bus in a period: peak load times the profile
    /// multiplier of the bus's class, or zero when the bus has no class or
    /// its class is excluded by the load-type filter.
    pub fn demand(&self, bus: usize, period: usize) -> (PerUnit, PerUnit) {
        let b = &self.buses[bus];
        match b.load_type {
            Some(load_type) if self.load_filter.admits(load_type) => {
                let m = self.periods[period].multiplier(load_type);
                (b.p_load * m, b.q_load * m)
            }
            _ => (PerUnit::ZERO, PerUnit::ZERO),
        }
    }

    /// Copy of this feeder with a different placement cap Y
    pub fn with_max_placements(&self, max_placements: usize) -> Feeder {
        let mut feeder = self.clone();
        feeder.economics.max_placements = max_placements;
        feeder
    }

    /// Copy of this feeder with a different load-type filter
    pub fn with_load_filter(&self, filter: LoadTypeFilter) -> Feeder {
        let mut feeder = self.clone();
        feeder.load_filter = filter;
        feeder
    }

    pub fn stats(&self) -> FeederStats {
        let loads: Vec<&Bus> = self
            .buses
            .iter()
            .filter(|b| b.load_type.is_some())
            .collect();
        FeederStats {
            num_buses: self.buses.len(),
            num_branches: self.branches.len(),
            num_periods: self.periods.len(),
            num_capacitor_options: self.capacitors.len(),
            num_load_buses: loads.len(),
            peak_load_kw: loads
                .iter()
                .map(|b| self.bases.active_from_pu(b.p_load).value())
                .sum(),
            peak_load_kvar: loads
                .iter()
                .map(|b| self.bases.reactive_from_pu(b.q_load).value())
                .sum(),
        }
    }
}

/// Collects physical-unit records and produces a validated [`Feeder`].
#[derive(Debug, Clone)]
pub struct FeederBuilder {
    bases: PerUnitBases,
    limits: VoltageLimits,
    economics: EconomicParams,
    load_filter: LoadTypeFilter,
    buses: Vec<BusRecord>,
    lines: Vec<LineRecord>,
    periods: Vec<TimePeriod>,
    capacitors: Vec<CapacitorRecord>,
}

impl FeederBuilder {
    pub fn new(bases: PerUnitBases, limits: VoltageLimits, economics: EconomicParams) -> Self {
        Self {
            bases,
            limits,
            economics,
            load_filter: LoadTypeFilter::All,
            buses: Vec::new(),
            lines: Vec::new(),
            periods: Vec::new(),
            capacitors: Vec::new(),
        }
    }

    pub fn load_filter(mut self, filter: LoadTypeFilter) -> Self {
        self.load_filter = filter;
        self
    }

    pub fn bus(mut self, record: BusRecord) -> Self {
        self.buses.push(record);
        self
    }

    pub fn line(mut self, record: LineRecord) -> Self {
        self.lines.push(record);
        self
    }

    pub fn period(mut self, period: TimePeriod) -> Self {
        self.periods.push(period);
        self
    }

    pub fn capacitor(mut self, record: CapacitorRecord) -> Self {
        self.capacitors.push(record);
        self
    }

    pub fn buses(mut self, records: impl IntoIterator<Item = BusRecord>) -> Self {
        self.buses.extend(records);
        self
    }

    pub fn lines(mut self, records: impl IntoIterator<Item = LineRecord>) -> Self {
        self.lines.extend(records);
        self
    }

    pub fn periods(mut self, periods: impl IntoIterator<Item = TimePeriod>) -> Self {
        self.periods.extend(periods);
        self
    }

    pub fn capacitors(mut self, records: impl IntoIterator<Item = CapacitorRecord>) -> Self {
        self.capacitors.extend(records);
        self
    }

    /// Check every record and setting, collecting all issues.
    pub fn diagnose(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        self.diagnose_settings(&mut diag);
        self.diagnose_buses(&mut diag);
        self.diagnose_lines(&mut diag);
        self.diagnose_periods(&mut diag);
        self.diagnose_capacitors(&mut diag);
        diag
    }

    /// First error from [`FeederBuilder::diagnose`] as a configuration error.
    pub fn validate(&self) -> CapsiteResult<()> {
        self.diagnose().to_result()
    }

    fn diagnose_settings(&self, diag: &mut Diagnostics) {
        let lo = self.limits.lower.value();
        let hi = self.limits.upper.value();
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo < hi) {
            diag.add_error(
                "voltage",
                format!("voltage limits must satisfy 0 < volt_lower < volt_upper, got [{lo}, {hi}]"),
                "config",
            );
        }
        let econ = &self.economics;
        if !(econ.loss_price.is_finite() && econ.loss_price >= 0.0) {
            diag.add_error(
                "cost",
                format!("loss price c_delta_a must be non-negative, got {}", econ.loss_price),
                "config",
            );
        }
        if !(econ.discount_rate.is_finite() && econ.discount_rate >= 0.0) {
            diag.add_error(
                "cost",
                format!("discount rate r must be non-negative, got {}", econ.discount_rate),
                "config",
            );
        }
        if econ.asset_life_years == 0 {
            diag.add_error("cost", "capacitor life M must be at least one year", "config");
        }
    }

    fn diagnose_buses(&self, diag: &mut Diagnostics) {
        let mut seen = HashSet::new();
        let mut slack: Option<BusId> = None;
        for bus in &self.buses {
            let entity = bus.id.entity();
            if !seen.insert(bus.id) {
                diag.add_error("duplicate", "bus id declared more than once", &entity);
            }
            if !(bus.p_load.is_finite() && bus.q_load.is_finite()) {
                diag.add_error("load", "load must be a finite number", &entity);
            } else if bus.p_load.is_negative() || bus.q_load.is_negative() {
                diag.add_error(
                    "load",
                    "load must be non-negative; reverse flow breaks the conic relaxation",
                    &entity,
                );
            }
            if bus.load_type.is_none() && (bus.p_load.value() != 0.0 || bus.q_load.value() != 0.0)
            {
                diag.add_warning(
                    "load",
                    "bus has a load but no load type; it is treated as zero demand",
                    &entity,
                );
            }
            if bus.slack {
                match slack {
                    Some(first) => diag.add_error(
                        "slack",
                        format!(
                            "bus also claims the slack role; bus {} is already the slack bus",
                            first
                        ),
                        &entity,
                    ),
                    None => slack = Some(bus.id),
                }
                match bus.v_sched {
                    None => diag.add_error(
                        "slack",
                        "slack bus has no scheduled voltage (Vsch)",
                        &entity,
                    ),
                    Some(v) if !(v.is_finite() && v.value() > 0.0) => diag.add_error(
                        "slack",
                        format!("scheduled voltage must be positive, got {}", v.value()),
                        &entity,
                    ),
                    Some(v) if v < self.limits.lower || v > self.limits.upper => diag
                        .add_warning(
                            "slack",
                            format!(
                                "scheduled voltage {} lies outside the voltage limits",
                                v.value()
                            ),
                            &entity,
                        ),
                    Some(_) => {}
                }
            }
        }
        if self.buses.is_empty() {
            diag.add_error("network", "no buses declared", "network");
        } else if slack.is_none() {
            diag.add_error("slack", "no slack bus declared (Code = 3)", "network");
        }
        if !self.buses.iter().any(|b| b.load_type.is_some()) {
            diag.add_warning("load", "no bus carries a typed load", "network");
        }
    }

    fn diagnose_lines(&self, diag: &mut Diagnostics) {
        let mut seen = HashSet::new();
        for line in &self.lines {
            let entity = line.id.entity();
            if !seen.insert(line.id) {
                diag.add_error("duplicate", "branch id declared more than once", &entity);
            }
            let (r, x) = (line.resistance, line.reactance);
            if !(r.is_finite() && x.is_finite()) {
                diag.add_error("impedance", "impedance must be finite", &entity);
            } else if r.is_negative() || x.is_negative() {
                diag.add_error(
                    "impedance",
                    format!(
                        "negative impedance R = {}, X = {} breaks the conic relaxation",
                        r.value(),
                        x.value()
                    ),
                    &entity,
                );
            } else if r.value() == 0.0 && x.value() == 0.0 {
                diag.add_warning("impedance", "zero-impedance branch", &entity);
            }
            if !(line.rating.is_finite() && line.rating.value() > 0.0) {
                diag.add_error(
                    "rating",
                    format!("current rating must be positive, got {}", line.rating.value()),
                    &entity,
                );
            }
        }
    }

    fn diagnose_periods(&self, diag: &mut Diagnostics) {
        if self.periods.is_empty() {
            diag.add_error("profile", "load profile has no periods", "network");
        }
        let mut seen = HashSet::new();
        for period in &self.periods {
            let entity = format!("period {}", period.label);
            if !seen.insert(period.label.as_str()) {
                diag.add_error("duplicate", "period label declared more than once", &entity);
            }
            for load_type in LoadType::ALL {
                let m = period.multiplier(load_type);
                if !(m.is_finite() && m >= 0.0) {
                    diag.add_error(
                        "profile",
                        format!("{load_type} multiplier must be non-negative, got {m}"),
                        &entity,
                    );
                } else if m > 1.0 {
                    diag.add_warning(
                        "profile",
                        format!("{load_type} multiplier {m} exceeds peak load"),
                        &entity,
                    );
                }
            }
        }
    }

    fn diagnose_capacitors(&self, diag: &mut Diagnostics) {
        if self.capacitors.is_empty() {
            diag.add_warning("catalog", "capacitor catalog is empty", "network");
        }
        let mut seen = HashSet::new();
        for cap in &self.capacitors {
            let entity = cap.id.entity();
            if !seen.insert(cap.id) {
                diag.add_error("duplicate", "capacitor id declared more than once", &entity);
            }
            if !(cap.size.is_finite() && cap.size.value() > 0.0) {
                diag.add_error(
                    "catalog",
                    format!("capacitor size must be positive, got {}", cap.size.value()),
                    &entity,
                );
            }
            if !(cap.cost_per_kvar.is_finite() && cap.cost_per_kvar >= 0.0) {
                diag.add_error(
                    "cost",
                    format!("capacitor cost must be non-negative, got {}", cap.cost_per_kvar),
                    &entity,
                );
            }
        }
    }

    /// Validate and convert to per-unit. Fails on the first error issue.
    pub fn build(self) -> CapsiteResult<Feeder> {
        self.validate()?;

        let bases = self.bases;
        let vsq_min = self.limits.lower.squared();
        let vsq_max = self.limits.upper.squared();

        let buses: Vec<Bus> = self
            .buses
            .into_iter()
            .map(|rec| Bus {
                id: rec.id,
                name: rec.name,
                load_type: rec.load_type,
                p_load: bases.active_to_pu(rec.p_load),
                q_load: bases.reactive_to_pu(rec.q_load),
                slack: rec.slack,
                v_sched: rec.v_sched,
                vsq_min,
                vsq_max,
            })
            .collect();

        let bus_lookup: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
        let slack = buses
            .iter()
            .position(|b| b.slack)
            .ok_or_else(|| CapsiteError::config("network", "no slack bus declared (Code = 3)"))?;

        let branches = self
            .lines
            .into_iter()
            .map(|rec| Branch {
                id: rec.id,
                from_bus: rec.from_bus,
                to_bus: rec.to_bus,
                resistance: bases.impedance_to_pu(rec.resistance),
                reactance: bases.impedance_to_pu(rec.reactance),
                rating: bases.current_to_pu(rec.rating),
            })
            .collect();

        let capacitors = self
            .capacitors
            .into_iter()
            .map(|rec| CapacitorOption {
                id: rec.id,
                kind: rec.kind,
                size: bases.reactive_to_pu(rec.size),
                cost_per_mvar: bases.cost_per_mvar(rec.cost_per_kvar),
            })
            .collect();

        Ok(Feeder {
            bases,
            limits: self.limits,
            economics: self.economics,
            load_filter: self.load_filter,
            buses,
            branches,
            periods: self.periods,
            capacitors,
            bus_lookup,
            slack,
        })
    }
}
