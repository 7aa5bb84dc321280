// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types
//!
//! The table keeps detections in model order (descending confidence)
//! and serializes row keys as decimal strings starting at "0".

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::request::Orient;
use crate::vision::Detection;

/// Column names in output order
pub const COLUMNS: [&str; 7] = [
    "xmin",
    "ymin",
    "xmax",
    "ymax",
    "confidence",
    "class",
    "name",
];

/// One row of the detection table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_id: usize,
    pub name: String,
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        Self {
            xmin: d.xmin,
            ymin: d.ymin,
            xmax: d.xmax,
            ymax: d.ymax,
            confidence: d.confidence,
            class_id: d.class_id,
            name: d.name.clone(),
        }
    }
}

/// Rows of a detection result, serialized as `{"0": row, "1": row, ...}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionTable {
    rows: Vec<DetectionRecord>,
}

impl DetectionTable {
    pub fn new(detections: &[Detection]) -> Self {
        Self {
            rows: detections.iter().map(DetectionRecord::from).collect(),
        }
    }

    pub fn rows(&self) -> &[DetectionRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn serialize_records<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }

    fn serialize_columns<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMNS.len()))?;
        map.serialize_entry("xmin", &Column::new(&self.rows, |r| Cell::Float(r.xmin)))?;
        map.serialize_entry("ymin", &Column::new(&self.rows, |r| Cell::Float(r.ymin)))?;
        map.serialize_entry("xmax", &Column::new(&self.rows, |r| Cell::Float(r.xmax)))?;
        map.serialize_entry("ymax", &Column::new(&self.rows, |r| Cell::Float(r.ymax)))?;
        map.serialize_entry(
            "confidence",
            &Column::new(&self.rows, |r| Cell::Float(r.confidence)),
        )?;
        map.serialize_entry("class", &Column::new(&self.rows, |r| Cell::Int(r.class_id)))?;
        map.serialize_entry("name", &Column::new(&self.rows, |r| Cell::Text(&r.name)))?;
        map.end()
    }
}

impl Serialize for DetectionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (index, row) in self.rows.iter().enumerate() {
            map.serialize_entry(&index.to_string(), row)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Cell<'a> {
    Float(f32),
    Int(usize),
    Text(&'a str),
}

/// One column keyed by row index
struct Column<'a> {
    cells: Vec<Cell<'a>>,
}

impl<'a> Column<'a> {
    fn new(rows: &'a [DetectionRecord], pick: impl Fn(&'a DetectionRecord) -> Cell<'a>) -> Self {
        Self {
            cells: rows.iter().map(pick).collect(),
        }
    }
}

impl Serialize for Column<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (index, cell) in self.cells.iter().enumerate() {
            map.serialize_entry(&index.to_string(), cell)?;
        }
        map.end()
    }
}

/// Body of a successful POST /detect
#[derive(Debug, Clone)]
pub struct DetectionResponse {
    pub table: DetectionTable,
    pub orient: Orient,
}

impl DetectionResponse {
    pub fn new(detections: &[Detection], orient: Orient) -> Self {
        Self {
            table: DetectionTable::new(detections),
            orient,
        }
    }
}

impl Serialize for DetectionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.orient {
            Orient::Index => self.table.serialize(serializer),
            Orient::Records => self.table.serialize_records(serializer),
            Orient::Columns => self.table.serialize_columns(serializer),
        }
    }
}
