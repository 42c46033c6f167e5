//! CSV ingestion of the four case tables.
//!
//! | file              | columns                                                    |
//! |-------------------|------------------------------------------------------------|
//! | `bus.csv`         | `ID, Name, Type, Pload[kW], Qload[kVAr], Code, Vsch[pu]`   |
//! | `line.csv`        | `ID, FromBus, ToBus, R[Ohm], X[Ohm], rateA[kA]`            |
//! | `loadprofile.csv` | `Time, Residential, Commercial, Industrial`                |
//! | `capacitor.csv`   | `ID, Type, Size[kVAr], Cost[$/kVAr]`                       |
//!
//! `Code == 3` marks the slack bus. A blank `Type` means the bus carries no
//! typed load. Blank cells in any other required column are errors naming
//! the row's entity.

use anyhow::{Context, Result};
use capsite_core::{
    BranchId, BusId, BusRecord, CapacitorId, CapacitorRecord, CapsiteError, Kilovars, Kilowatts,
    LineRecord, LoadType, PerUnit, TimePeriod,
};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Bus type code of the slack (swing) bus
pub const SLACK_CODE: i64 = 3;

#[derive(Debug, Deserialize)]
struct BusRow {
    #[serde(rename = "ID")]
    id: Option<usize>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Type")]
    load_type: Option<String>,
    #[serde(rename = "Pload[kW]")]
    p_load: Option<f64>,
    #[serde(rename = "Qload[kVAr]")]
    q_load: Option<f64>,
    #[serde(rename = "Code")]
    code: Option<i64>,
    #[serde(rename = "Vsch[pu]")]
    v_sched: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LineRow {
    #[serde(rename = "ID")]
    id: Option<usize>,
    #[serde(rename = "FromBus")]
    from_bus: Option<usize>,
    #[serde(rename = "ToBus")]
    to_bus: Option<usize>,
    #[serde(rename = "R[Ohm]")]
    r: Option<f64>,
    #[serde(rename = "X[Ohm]")]
    x: Option<f64>,
    #[serde(rename = "rateA[kA]")]
    rate_a: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "Residential")]
    residential: Option<f64>,
    #[serde(rename = "Commercial")]
    commercial: Option<f64>,
    #[serde(rename = "Industrial")]
    industrial: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CapacitorRow {
    #[serde(rename = "ID")]
    id: Option<usize>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Size[kVAr]")]
    size: Option<f64>,
    #[serde(rename = "Cost[$/kVAr]")]
    cost: Option<f64>,
}

fn required<T>(value: Option<T>, column: &str, entity: &str) -> Result<T> {
    value.ok_or_else(|| CapsiteError::config(entity, format!("missing value in column '{column}'")).into())
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn parse_buses<R: Read>(input: R) -> Result<Vec<BusRecord>> {
    let mut rdr = reader(input);
    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<BusRow>().enumerate() {
        let raw = result.with_context(|| format!("parsing bus.csv row {}", row + 1))?;
        let id = required(raw.id, "ID", &format!("bus.csv row {}", row + 1))?;
        let entity = BusId::new(id).entity();

        let load_type = blank_to_none(raw.load_type)
            .map(|tag| tag.parse::<LoadType>())
            .transpose()
            .map_err(|msg| CapsiteError::config(&entity, msg))?;
        let slack = raw.code == Some(SLACK_CODE);
        let v_sched = if slack {
            Some(PerUnit(required(raw.v_sched, "Vsch[pu]", &entity)?))
        } else {
            raw.v_sched.map(PerUnit)
        };

        records.push(BusRecord {
            id: BusId::new(id),
            name: blank_to_none(raw.name).unwrap_or_else(|| format!("Bus {id}")),
            load_type,
            p_load: Kilowatts(required(raw.p_load, "Pload[kW]", &entity)?),
            q_load: Kilovars(required(raw.q_load, "Qload[kVAr]", &entity)?),
            slack,
            v_sched,
        });
    }
    Ok(records)
}

pub fn parse_lines<R: Read>(input: R) -> Result<Vec<LineRecord>> {
    let mut rdr = reader(input);
    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<LineRow>().enumerate() {
        let raw = result.with_context(|| format!("parsing line.csv row {}", row + 1))?;
        let id = required(raw.id, "ID", &format!("line.csv row {}", row + 1))?;
        let entity = BranchId::new(id).entity();
        records.push(LineRecord::new(
            id,
            required(raw.from_bus, "FromBus", &entity)?,
            required(raw.to_bus, "ToBus", &entity)?,
            required(raw.r, "R[Ohm]", &entity)?,
            required(raw.x, "X[Ohm]", &entity)?,
            required(raw.rate_a, "rateA[kA]", &entity)?,
        ));
    }
    Ok(records)
}

pub fn parse_load_profile<R: Read>(input: R) -> Result<Vec<TimePeriod>> {
    let mut rdr = reader(input);
    let mut periods = Vec::new();
    for (row, result) in rdr.deserialize::<ProfileRow>().enumerate() {
        let raw = result.with_context(|| format!("parsing loadprofile.csv row {}", row + 1))?;
        let entity = format!("period {}", row + 1);
        let label = required(blank_to_none(raw.time), "Time", &entity)?;
        periods.push(TimePeriod::new(
            label,
            required(raw.residential, "Residential", &entity)?,
            required(raw.commercial, "Commercial", &entity)?,
            required(raw.industrial, "Industrial", &entity)?,
        ));
    }
    Ok(periods)
}

pub fn parse_capacitors<R: Read>(input: R) -> Result<Vec<CapacitorRecord>> {
    let mut rdr = reader(input);
    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<CapacitorRow>().enumerate() {
        let raw = result.with_context(|| format!("parsing capacitor.csv row {}", row + 1))?;
        let id = required(raw.id, "ID", &format!("capacitor.csv row {}", row + 1))?;
        let entity = CapacitorId::new(id).entity();
        records.push(CapacitorRecord::new(
            id,
            blank_to_none(raw.kind).unwrap_or_default(),
            required(raw.size, "Size[kVAr]", &entity)?,
            required(raw.cost, "Cost[$/kVAr]", &entity)?,
        ));
    }
    Ok(records)
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).with_context(|| format!("opening '{}'", path.display()))
}

pub fn read_buses(path: &Path) -> Result<Vec<BusRecord>> {
    parse_buses(open(path)?).with_context(|| format!("reading buses from '{}'", path.display()))
}

pub fn read_lines(path: &Path) -> Result<Vec<LineRecord>> {
    parse_lines(open(path)?).with_context(|| format!("reading lines from '{}'", path.display()))
}

pub fn read_load_profile(path: &Path) -> Result<Vec<TimePeriod>> {
    parse_load_profile(open(path)?)
        .with_context(|| format!("reading load profile from '{}'", path.display()))
}

pub fn read_capacitors(path: &Path) -> Result<Vec<CapacitorRecord>> {
    parse_capacitors(open(path)?)
        .with_context(|| format!("reading capacitors from '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_of(err: &anyhow::Error) -> Option<String> {
        err.chain()
            .find_map(|e| e.downcast_ref::<CapsiteError>())
            .and_then(|e| e.entity().map(str::to_string))
    }

    #[test]
    fn buses_read_slack_and_untyped_rows() {
        let csv = "ID,Name,Type,Pload[kW],Qload[kVAr],Code,Vsch[pu]\n\
                   1,Source,,0,0,3,1.02\n\
                   2,Feeder A, Residential ,100,60,1,\n\
                   3,,commercial,90,40,,\n";
        let buses = parse_buses(csv.as_bytes()).unwrap();
        assert_eq!(buses.len(), 3);
        assert!(buses[0].slack);
        assert_eq!(buses[0].v_sched, Some(PerUnit(1.02)));
        assert_eq!(buses[0].load_type, None);
        assert_eq!(buses[1].load_type, Some(LoadType::Residential));
        assert_eq!(buses[1].p_load, Kilowatts(100.0));
        assert_eq!(buses[2].name, "Bus 3");
        assert_eq!(buses[2].load_type, Some(LoadType::Commercial));
        assert!(!buses[2].slack);
    }

    #[test]
    fn slack_without_vsch_names_the_bus() {
        let csv = "ID,Name,Type,Pload[kW],Qload[kVAr],Code,Vsch[pu]\n\
                   7,Source,,0,0,3,\n";
        let err = parse_buses(csv.as_bytes()).unwrap_err();
        assert_eq!(entity_of(&err).as_deref(), Some("bus 7"));
        assert!(err.to_string().contains("Vsch[pu]"));
    }

    #[test]
    fn unknown_load_type_is_rejected() {
        let csv = "ID,Name,Type,Pload[kW],Qload[kVAr],Code,Vsch[pu]\n\
                   4,Farm,Agricultural,10,5,1,\n";
        let err = parse_buses(csv.as_bytes()).unwrap_err();
        assert_eq!(entity_of(&err).as_deref(), Some("bus 4"));
    }

    #[test]
    fn blank_line_rating_names_the_branch() {
        let csv = "ID,FromBus,ToBus,R[Ohm],X[Ohm],rateA[kA]\n\
                   1,1,2,0.0922,0.047,0.4\n\
                   2,2,3,0.493,0.2511,\n";
        let err = parse_lines(csv.as_bytes()).unwrap_err();
        assert_eq!(entity_of(&err).as_deref(), Some("branch 2"));
        assert!(err.to_string().contains("rateA[kA]"));
    }

    #[test]
    fn profile_and_catalog_parse() {
        let profile = "Time,Residential,Commercial,Industrial\n1,0.5,0.6,0.9\n2,1.0,0.8,0.9\n";
        let periods = parse_load_profile(profile.as_bytes()).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].label, "2");
        assert_eq!(periods[0].multiplier(LoadType::Industrial), 0.9);

        let catalog = "ID,Type,Size[kVAr],Cost[$/kVAr]\n1,fixed,150,3.5\n2,,300,3.0\n";
        let caps = parse_capacitors(catalog.as_bytes()).unwrap();
        assert_eq!(caps[0].size, Kilovars(150.0));
        assert_eq!(caps[1].kind, "");
        assert_eq!(caps[1].cost_per_kvar, 3.0);
    }

    #[test]
    fn malformed_number_reports_the_row() {
        let csv = "ID,Type,Size[kVAr],Cost[$/kVAr]\n1,fixed,lots,3.5\n";
        let err = parse_capacitors(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"), "{err}");
    }
}
