//! Lift marker tables (`P<n>_AllLifts`).
//!
//! The document is `{"columns": [...], "data": [[...], ...]}` with one row per
//! lift.  Fields are located by column name through a [`MarkerSchema`] that
//! is resolved once when the table is loaded; nothing downstream indexes
//! rows positionally.
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Column names for each semantic field.  `run` and `led_on` are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkerSchema {
    pub run: String,
    pub led_on: String,
    pub lift: Option<String>,
    pub led_off: Option<String>,
    pub weight: Option<String>,
    pub surface: Option<String>,
}

impl Default for MarkerSchema {
    fn default() -> Self {
        Self {
            run: "Run".into(),
            led_on: "LEDOn".into(),
            lift: Some("Lift".into()),
            led_off: Some("LEDOff".into()),
            weight: Some("CurW".into()),
            surface: Some("CurS".into()),
        }
    }
}

/// Schema resolved against a concrete column list.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    run: usize,
    led_on: usize,
    lift: Option<usize>,
    led_off: Option<usize>,
    weight: Option<usize>,
    surface: Option<usize>,
}

impl MarkerSchema {
    fn resolve(&self, columns: &[String]) -> Result<ColumnIndex> {
        let find = |name: &str| columns.iter().position(|c| c == name);
        let required = |name: &str| {
            find(name).ok_or_else(|| Error::InvalidData(format!("marker table has no '{name}' column")))
        };
        // Optional fields silently resolve to None when the column is absent.
        let optional = |name: &Option<String>| name.as_deref().and_then(find);
        Ok(ColumnIndex {
            run: required(&self.run)?,
            led_on: required(&self.led_on)?,
            lift: optional(&self.lift),
            led_off: optional(&self.led_off),
            weight: optional(&self.weight),
            surface: optional(&self.surface),
        })
    }
}

/// One marker row.  `led_on` is `None` when the cell was null.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftEvent {
    pub run: u32,
    pub led_on: Option<f64>,
    pub lift: Option<u32>,
    pub led_off: Option<f64>,
    pub weight: Option<f64>,
    pub surface: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    columns: Vec<String>,
    data: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    events: Vec<LiftEvent>,
}

impl MarkerTable {
    pub fn load(path: &Path, schema: &MarkerSchema) -> Result<Self> {
        let raw: RawTable = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Self::from_raw(raw, schema)
    }

    pub fn from_json_str(text: &str, schema: &MarkerSchema) -> Result<Self> {
        Self::from_raw(serde_json::from_str(text)?, schema)
    }

    fn from_raw(raw: RawTable, schema: &MarkerSchema) -> Result<Self> {
        let idx = schema.resolve(&raw.columns)?;
        let width = raw.columns.len();
        let mut events = Vec::with_capacity(raw.data.len());
        for (i, row) in raw.data.iter().enumerate() {
            if row.len() != width {
                return Err(Error::InvalidData(format!(
                    "marker row {i} has {} cells, expected {width}",
                    row.len()
                )));
            }
            let run = row[idx.run]
                .and_then(as_id)
                .ok_or_else(|| Error::InvalidData(format!("marker row {i} has no valid run")))?;
            let cell = |c: Option<usize>| c.and_then(|c| row[c]);
            let lift = cell(idx.lift)
                .map(|v| {
                    as_id(v).ok_or_else(|| {
                        Error::InvalidData(format!("marker row {i}: lift {v} is not a whole number"))
                    })
                })
                .transpose()?;
            events.push(LiftEvent {
                run,
                led_on: row[idx.led_on],
                lift,
                led_off: cell(idx.led_off),
                weight: cell(idx.weight),
                surface: cell(idx.surface),
            });
        }
        debug!("loaded {} marker rows", events.len());
        Ok(Self { events })
    }

    pub fn from_events(events: Vec<LiftEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[LiftEvent] {
        &self.events
    }

    /// `LEDOn` onsets in seconds grouped by run, ascending within each run.
    /// Rows with a null onset contribute nothing.
    pub fn onsets_by_run(&self) -> BTreeMap<u32, Vec<f64>> {
        let mut by_run: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for ev in &self.events {
            if let Some(t) = ev.led_on {
                by_run.entry(ev.run).or_default().push(t);
            }
        }
        for onsets in by_run.values_mut() {
            onsets.sort_by(f64::total_cmp);
        }
        by_run
    }
}

/// A non-negative whole number that fits in `u32`.
fn as_id(v: f64) -> Option<u32> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then_some(v as u32)
}
