//! Workflow orchestration: one invocation from raw cube to typed result.
//!
//! The orchestrator is a state machine over seven steps: validate, filter,
//! collect metadata, spatialize (map path), dispatch, compute, assemble.
//! All validation errors are raised before any spatial work; a fully
//! assembled [`IndicatorResult`] or a propagated error are the only
//! terminal states. Each invocation is a pure function of its inputs:
//! grids and boundaries are rebuilt per call and nothing is shared across
//! invocations, so callers may run independent indicators in parallel.

use std::collections::BTreeMap;

use crate::core::domain::{BoundingBox, CubeKind, DataCube, OccurrenceRecord, SpatialLevel};
use crate::error::{CubeError, CubeResult};
use crate::indicators::calculators::{dispatch, DatasetContext, ObservationGroup};
use crate::indicators::registry::{resolve, DimType, IndicatorKind};
use crate::results::{
    CellValue, IndicatorMetadata, IndicatorResult, SpatialResult, TimeSeriesResult, YearValue,
};
use crate::sources::BoundarySource;
use crate::spatial::grid::{default_cell_size_km, Grid};
use crate::spatial::join::spatial_join;

/// Parameters of one indicator computation.
#[derive(Debug, Clone)]
pub struct IndicatorParams {
    pub indicator: IndicatorKind,
    pub dim_type: DimType,
    /// Requested year window; clamped to the cube's own range.
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    /// Spatial level, required on the map path.
    pub level: Option<SpatialLevel>,
    /// Region name, required at country and continent level.
    pub region: Option<String>,
    /// Cell side length in km; defaults from the spatial level.
    pub cell_size_km: Option<f64>,
}

impl IndicatorParams {
    pub fn new(indicator: IndicatorKind, dim_type: DimType) -> Self {
        Self {
            indicator,
            dim_type,
            first_year: None,
            last_year: None,
            level: None,
            region: None,
            cell_size_km: None,
        }
    }
}

/// Runs one indicator workflow over a cube.
///
/// The boundary source is only consulted on the map path. Re-running with
/// identical inputs produces bit-identical results.
pub fn run_indicator(
    cube: &DataCube,
    params: &IndicatorParams,
    boundaries: &dyn BoundarySource,
) -> CubeResult<IndicatorResult> {
    // Step 1: validate indicator and dim type before any spatial work.
    resolve(params.indicator, params.dim_type)?;
    let level = match (params.dim_type, params.level) {
        (DimType::Map, None) => {
            return Err(CubeError::Configuration(
                "map workflows require a spatial level (country, continent, or world)"
                    .to_string(),
            ))
        }
        (_, level) => level,
    };

    // Step 2: clamp the requested year window to the cube's range.
    let (first_year, last_year) = clamp_years(cube, params.first_year, params.last_year)?;

    // Step 3: filter, then snapshot metadata from the input population
    // before any spatial reduction.
    let filtered: Vec<OccurrenceRecord> = cube
        .records()
        .iter()
        .filter(|r| r.year >= first_year && r.year <= last_year)
        .cloned()
        .collect();
    if filtered.is_empty() {
        log::warn!(
            "year window [{}, {}] matched no occurrences; all groups will be empty",
            first_year,
            last_year
        );
    }
    let metadata = snapshot_metadata(&filtered, params, first_year, last_year);

    // Steps 4-7 diverge per dimension type.
    match (params.dim_type, level) {
        (DimType::Map, Some(level)) => {
            run_map(cube, params, level, &filtered, metadata, boundaries)
        }
        _ => run_time_series(params, &filtered, metadata),
    }
}

/// Narrows the requested window to the cube's year range.
///
/// Both bounds are clamped explicitly against the caller-supplied values;
/// the upper bound in particular is honored rather than silently ignored.
/// A window that is inverted or entirely outside the cube's range is an
/// input error.
fn clamp_years(
    cube: &DataCube,
    first_year: Option<i32>,
    last_year: Option<i32>,
) -> CubeResult<(i32, i32)> {
    let requested_first = first_year.unwrap_or_else(|| cube.first_year());
    let requested_last = last_year.unwrap_or_else(|| cube.last_year());
    if requested_first > requested_last {
        return Err(CubeError::InvalidInput(format!(
            "requested year window is inverted: {} > {}",
            requested_first, requested_last
        )));
    }
    let first = requested_first.max(cube.first_year());
    let last = requested_last.min(cube.last_year());
    if first > last {
        return Err(CubeError::InvalidInput(format!(
            "requested year window [{}, {}] lies outside the cube range [{}, {}]",
            requested_first,
            requested_last,
            cube.first_year(),
            cube.last_year()
        )));
    }
    Ok((first, last))
}

fn snapshot_metadata(
    filtered: &[OccurrenceRecord],
    params: &IndicatorParams,
    first_year: i32,
    last_year: i32,
) -> IndicatorMetadata {
    let species: std::collections::BTreeSet<String> = filtered
        .iter()
        .map(|r| r.scientific_name.clone())
        .collect();
    let families: std::collections::BTreeSet<&str> =
        filtered.iter().map(|r| r.family.as_str()).collect();
    let kingdoms: std::collections::BTreeSet<&str> =
        filtered.iter().map(|r| r.kingdom.as_str()).collect();
    let years: std::collections::BTreeSet<i32> = filtered.iter().map(|r| r.year).collect();
    IndicatorMetadata {
        indicator: params.indicator,
        dim_type: params.dim_type,
        level: params.level,
        region: params.region.clone(),
        cell_size_km: params.cell_size_km.or_else(|| {
            params
                .level
                .filter(|_| params.dim_type == DimType::Map)
                .map(default_cell_size_km)
        }),
        first_year,
        last_year,
        num_records: filtered.len(),
        num_species: species.len(),
        num_families: families.len(),
        num_kingdoms: kingdoms.len(),
        species,
        years,
    }
}

/// Map path: fetch boundary, generate grid, join, compute per cell, and
/// left-join the values back onto the full grid.
fn run_map(
    cube: &DataCube,
    params: &IndicatorParams,
    level: SpatialLevel,
    filtered: &[OccurrenceRecord],
    metadata: IndicatorMetadata,
    boundaries: &dyn BoundarySource,
) -> CubeResult<IndicatorResult> {
    let region = boundaries.fetch(level, params.region.as_deref())?;
    if region.crs != cube.crs() {
        return Err(CubeError::ProjectionMismatch(format!(
            "cube uses '{}' but region '{}' is in '{}'",
            cube.crs(),
            region.name,
            region.crs
        )));
    }

    let cell_size_km = params
        .cell_size_km
        .unwrap_or_else(|| default_cell_size_km(level));
    let grid = Grid::generate(&region, cell_size_km)?;
    let summary = grid.summary();
    log::debug!(
        "generated {} cells of {} km over '{}' ({} outside the boundary)",
        summary.num_cells,
        summary.cell_size_km,
        region.name,
        summary.empty_cells
    );
    let joined = spatial_join(cube.crs(), filtered, &grid)?;

    // Step 5: resolve the calculator for the composite dispatch tag.
    let mut calculator = dispatch(params.indicator, params.dim_type)?;
    let context = DatasetContext::from_joined(&joined);

    let mut by_cell: BTreeMap<u32, Vec<&OccurrenceRecord>> = BTreeMap::new();
    for j in &joined {
        by_cell.entry(j.cell_id).or_default().push(&j.record);
    }

    // Step 7: every grid cell appears, empty ones with the indicator's
    // neutral value.
    let mut empty_cells = 0usize;
    let cells: Vec<CellValue> = grid
        .cells()
        .iter()
        .map(|cell| {
            let group = ObservationGroup {
                records: by_cell.get(&cell.cell_id).cloned().unwrap_or_default(),
                area_km2: Some(cell.area_km2),
                context: &context,
            };
            if group.is_empty() {
                empty_cells += 1;
            }
            CellValue {
                cell_id: cell.cell_id,
                area_km2: cell.area_km2,
                value: calculator.compute(&group),
            }
        })
        .collect();
    if empty_cells > 0 {
        log::warn!(
            "{} of {} grid cells matched no occurrences; neutral values assigned",
            empty_cells,
            grid.len()
        );
    }

    let result = SpatialResult { metadata, cells };
    Ok(match cube.kind() {
        CubeKind::Real => IndicatorResult::Spatial(result),
        CubeKind::Virtual => IndicatorResult::VirtualSpatial(SpatialResult {
            metadata: result.metadata.without_species_identities(),
            cells: result.cells,
        }),
    })
}

/// Time-series path: no grid, just the bounding box of the filtered data
/// and per-year groups over the clamped window.
fn run_time_series(
    params: &IndicatorParams,
    filtered: &[OccurrenceRecord],
    metadata: IndicatorMetadata,
) -> CubeResult<IndicatorResult> {
    let bbox = BoundingBox::of_records(filtered);
    let mut calculator = dispatch(params.indicator, params.dim_type)?;
    let context = DatasetContext::from_records(filtered);

    let mut by_year: BTreeMap<i32, Vec<&OccurrenceRecord>> = BTreeMap::new();
    for rec in filtered {
        by_year.entry(rec.year).or_default().push(rec);
    }

    let mut empty_years = 0usize;
    let points: Vec<YearValue> = (metadata.first_year..=metadata.last_year)
        .map(|year| {
            let group = ObservationGroup {
                records: by_year.get(&year).cloned().unwrap_or_default(),
                area_km2: None,
                context: &context,
            };
            if group.is_empty() {
                empty_years += 1;
            }
            YearValue {
                year,
                value: calculator.compute(&group),
            }
        })
        .collect();
    if empty_years > 0 {
        log::warn!(
            "{} of {} years in the window have no occurrences; neutral values assigned",
            empty_years,
            points.len()
        );
    }

    Ok(IndicatorResult::TimeSeries(TimeSeriesResult {
        metadata,
        bbox,
        points,
    }))
}
