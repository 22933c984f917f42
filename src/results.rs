//! Typed result variants assembled at the end of a workflow invocation.
//!
//! Three shapes exist: a spatial grid result, a time-series result, and a
//! virtual spatial result for simulated communities (identical to the
//! spatial shape but stripped of species-identity metadata). All variants
//! share the [`IndicatorMetadata`] snapshot taken from the filtered input
//! population and are immutable after construction.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::core::domain::{BoundingBox, SpatialLevel};
use crate::indicators::calculators::GroupValue;
use crate::indicators::registry::{dispatch_key, DimType, IndicatorKind};

/// Run metadata describing the *input* population of one invocation,
/// snapshotted before any spatial reduction.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorMetadata {
    pub indicator: IndicatorKind,
    pub dim_type: DimType,
    pub level: Option<SpatialLevel>,
    pub region: Option<String>,
    pub cell_size_km: Option<f64>,
    pub first_year: i32,
    pub last_year: i32,
    pub num_records: usize,
    pub num_species: usize,
    pub num_families: usize,
    pub num_kingdoms: usize,
    /// Species actually observed in the filtered input.
    pub species: BTreeSet<String>,
    /// Years actually observed in the filtered input.
    pub years: BTreeSet<i32>,
}

impl IndicatorMetadata {
    /// Drops species identities while keeping the counts, for virtual
    /// (simulated-community) results.
    pub fn without_species_identities(mut self) -> Self {
        self.species.clear();
        self
    }
}

/// One grid cell's indicator value. Cells with zero matched occurrences
/// appear with the indicator's neutral value, never dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellValue {
    pub cell_id: u32,
    pub area_km2: f64,
    pub value: GroupValue,
}

/// One year's indicator value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub value: GroupValue,
}

/// Indicator values keyed by grid cell, carrying the full grid's cells.
#[derive(Debug, Clone, Serialize)]
pub struct SpatialResult {
    pub metadata: IndicatorMetadata,
    pub cells: Vec<CellValue>,
}

/// Indicator values keyed by year, carrying the coordinate bounding box of
/// the filtered data instead of a grid.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesResult {
    pub metadata: IndicatorMetadata,
    pub bbox: Option<BoundingBox>,
    pub points: Vec<YearValue>,
}

/// The three result shapes, selected explicitly by the orchestrator from
/// the cube kind and dimension type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum IndicatorResult {
    Spatial(SpatialResult),
    TimeSeries(TimeSeriesResult),
    VirtualSpatial(SpatialResult),
}

impl IndicatorResult {
    pub fn metadata(&self) -> &IndicatorMetadata {
        match self {
            IndicatorResult::Spatial(r) | IndicatorResult::VirtualSpatial(r) => &r.metadata,
            IndicatorResult::TimeSeries(r) => &r.metadata,
        }
    }

    /// General shape tag used by rendering code for dispatch.
    pub fn shape_tag(&self) -> &'static str {
        match self {
            IndicatorResult::Spatial(_) => "indicator_map",
            IndicatorResult::TimeSeries(_) => "indicator_ts",
            IndicatorResult::VirtualSpatial(_) => "virtual_indicator_map",
        }
    }

    /// Specific tag naming the indicator and dimension type, e.g.
    /// `obs_richness_map`.
    pub fn indicator_tag(&self) -> String {
        let meta = self.metadata();
        dispatch_key(meta.indicator, meta.dim_type)
    }

    /// Serializes the result rows under the renderer contract: stable
    /// `cell_id` / `area_km2` / `year` fields plus one value column named
    /// after the indicator.
    pub fn to_renderer_json(&self) -> Value {
        let value_column = self.metadata().indicator.key();
        let rows: Vec<Value> = match self {
            IndicatorResult::Spatial(r) | IndicatorResult::VirtualSpatial(r) => r
                .cells
                .iter()
                .map(|c| {
                    let mut row = Map::new();
                    row.insert("cell_id".to_string(), json!(c.cell_id));
                    row.insert("area_km2".to_string(), json!(c.area_km2));
                    row.insert(value_column.to_string(), json!(c.value));
                    Value::Object(row)
                })
                .collect(),
            IndicatorResult::TimeSeries(r) => r
                .points
                .iter()
                .map(|p| {
                    let mut row = Map::new();
                    row.insert("year".to_string(), json!(p.year));
                    row.insert(value_column.to_string(), json!(p.value));
                    Value::Object(row)
                })
                .collect(),
        };
        json!({
            "shape": self.shape_tag(),
            "indicator": self.indicator_tag(),
            "rows": rows,
        })
    }
}
