//! Domain models for occurrence records, data cubes, and regions.
//!
//! This module provides the core data structures of the indicator pipeline:
//! individual species occurrence records, the data cube that owns them, and
//! the region polygons that spatial workflows operate over.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use geo::{Area, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeResult};

/// A single species occurrence aggregated from the source cube.
///
/// Coordinates are expressed in a projected, linear reference system with
/// kilometre units (e.g. EPSG:3035 rescaled to km). Records are immutable
/// once loaded; the ingestion collaborator is responsible for reprojection.
///
/// # Examples
///
/// ```
/// use divcube::core::domain::OccurrenceRecord;
///
/// let rec = OccurrenceRecord {
///     scientific_name: "Vanessa atalanta".to_string(),
///     kingdom: "Animalia".to_string(),
///     family: "Nymphalidae".to_string(),
///     year: 2011,
///     x: 3842.5,
///     y: 3097.0,
///     count: 4,
/// };
///
/// assert_eq!(rec.count, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub scientific_name: String,
    pub kingdom: String,
    pub family: String,
    pub year: i32,
    pub x: f64,
    pub y: f64,
    pub count: u64,
}

/// Kind of data cube: real observational data or a simulated community.
///
/// Virtual cubes flow through the same pipeline but their results omit
/// species-identity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeKind {
    Real,
    Virtual,
}

/// Axis-aligned bounding box in the cube's projected reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Computes the bounding box of a set of records.
    ///
    /// Returns `None` for an empty slice.
    pub fn of_records(records: &[OccurrenceRecord]) -> Option<Self> {
        let first = records.first()?;
        let mut bbox = BoundingBox {
            xmin: first.x,
            ymin: first.y,
            xmax: first.x,
            ymax: first.y,
        };
        for rec in &records[1..] {
            bbox.xmin = bbox.xmin.min(rec.x);
            bbox.ymin = bbox.ymin.min(rec.y);
            bbox.xmax = bbox.xmax.max(rec.x);
            bbox.ymax = bbox.ymax.max(rec.y);
        }
        Some(bbox)
    }
}

/// An occurrence data cube: an ordered record collection plus cube-level
/// metadata.
///
/// Cubes are created by the (out-of-scope) ingestion collaborator and are
/// read-only to the core. The constructor enforces the cube invariant that
/// every record's year lies within `[first_year, last_year]`.
///
/// # Examples
///
/// ```
/// use divcube::core::domain::{CubeKind, DataCube, OccurrenceRecord};
///
/// let records = vec![OccurrenceRecord {
///     scientific_name: "Bufo bufo".to_string(),
///     kingdom: "Animalia".to_string(),
///     family: "Bufonidae".to_string(),
///     year: 2015,
///     x: 10.0,
///     y: 20.0,
///     count: 2,
/// }];
///
/// let cube = DataCube::new(CubeKind::Real, "EPSG:3035", records).unwrap();
/// assert_eq!(cube.first_year(), 2015);
/// assert_eq!(cube.num_species(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCube {
    kind: CubeKind,
    crs: String,
    records: Vec<OccurrenceRecord>,
    first_year: i32,
    last_year: i32,
    /// Cell resolution in km when the cube was pre-gridded upstream.
    resolution_km: Option<f64>,
}

impl DataCube {
    /// Creates a cube, deriving the year range from the records.
    ///
    /// Fails with [`CubeError::InvalidInput`] when no records are supplied,
    /// since an empty cube has no defined year range.
    pub fn new(
        kind: CubeKind,
        crs: impl Into<String>,
        records: Vec<OccurrenceRecord>,
    ) -> CubeResult<Self> {
        if records.is_empty() {
            return Err(CubeError::InvalidInput(
                "data cube must contain at least one occurrence record".to_string(),
            ));
        }
        let first_year = records.iter().map(|r| r.year).min().unwrap_or(0);
        let last_year = records.iter().map(|r| r.year).max().unwrap_or(0);
        Self::with_year_range(kind, crs, records, first_year, last_year)
    }

    /// Creates a cube with an explicit year range, validating the record
    /// invariant.
    pub fn with_year_range(
        kind: CubeKind,
        crs: impl Into<String>,
        records: Vec<OccurrenceRecord>,
        first_year: i32,
        last_year: i32,
    ) -> CubeResult<Self> {
        if first_year > last_year {
            return Err(CubeError::InvalidInput(format!(
                "cube year range is inverted: {} > {}",
                first_year, last_year
            )));
        }
        if let Some(bad) = records
            .iter()
            .find(|r| r.year < first_year || r.year > last_year)
        {
            return Err(CubeError::InvalidInput(format!(
                "record for '{}' has year {} outside cube range [{}, {}]",
                bad.scientific_name, bad.year, first_year, last_year
            )));
        }
        Ok(Self {
            kind,
            crs: crs.into(),
            records,
            first_year,
            last_year,
            resolution_km: None,
        })
    }

    /// Marks the cube as pre-gridded at the given resolution.
    pub fn with_resolution_km(mut self, resolution_km: f64) -> Self {
        self.resolution_km = Some(resolution_km);
        self
    }

    pub fn kind(&self) -> CubeKind {
        self.kind
    }

    /// Identifier of the projected reference system the coordinates use.
    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn records(&self) -> &[OccurrenceRecord] {
        &self.records
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.last_year
    }

    pub fn resolution_km(&self) -> Option<f64> {
        self.resolution_km
    }

    /// Distinct scientific names present in the cube, sorted.
    pub fn species(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .map(|r| r.scientific_name.clone())
            .collect()
    }

    pub fn num_species(&self) -> usize {
        self.species().len()
    }

    pub fn num_families(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.family.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn num_kingdoms(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.kingdom.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct years with at least one occurrence, sorted.
    pub fn years_observed(&self) -> BTreeSet<i32> {
        self.records.iter().map(|r| r.year).collect()
    }

    /// Coordinate bounding box of all records.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::of_records(&self.records)
    }
}

/// Geographic granularity of a spatial analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialLevel {
    Country,
    Continent,
    World,
}

impl SpatialLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialLevel::Country => "country",
            SpatialLevel::Continent => "continent",
            SpatialLevel::World => "world",
        }
    }
}

impl fmt::Display for SpatialLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpatialLevel {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country" => Ok(SpatialLevel::Country),
            "continent" => Ok(SpatialLevel::Continent),
            "world" => Ok(SpatialLevel::World),
            other => Err(CubeError::Configuration(format!(
                "unrecognized spatial level: '{}' (expected country, continent, or world)",
                other
            ))),
        }
    }
}

/// A region of interest: one or more simple polygons (holes permitted) in
/// the same projected reference system as the occurrences.
///
/// Obtained from a [`BoundarySource`](crate::sources::BoundarySource) and
/// owned by one workflow invocation.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub level: SpatialLevel,
    pub crs: String,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        level: SpatialLevel,
        crs: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            crs: crs.into(),
            geometry,
        }
    }

    /// Total region area in km², from the polygon geometry.
    pub fn area_km2(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, year: i32, x: f64, y: f64) -> OccurrenceRecord {
        OccurrenceRecord {
            scientific_name: name.to_string(),
            kingdom: "Animalia".to_string(),
            family: "Testidae".to_string(),
            year,
            x,
            y,
            count: 1,
        }
    }

    #[test]
    fn cube_derives_metadata_from_records() {
        let cube = DataCube::new(
            CubeKind::Real,
            "EPSG:3035",
            vec![
                rec("Species a", 2010, 0.0, 0.0),
                rec("Species b", 2015, 5.0, 5.0),
                rec("Species a", 2012, 2.0, 8.0),
            ],
        )
        .unwrap();

        assert_eq!(cube.first_year(), 2010);
        assert_eq!(cube.last_year(), 2015);
        assert_eq!(cube.num_species(), 2);
        assert_eq!(cube.num_families(), 1);
        assert_eq!(cube.num_kingdoms(), 1);
        assert_eq!(
            cube.years_observed().into_iter().collect::<Vec<_>>(),
            vec![2010, 2012, 2015]
        );

        let bbox = cube.bbox().unwrap();
        assert_eq!(bbox.xmin, 0.0);
        assert_eq!(bbox.ymax, 8.0);
    }

    #[test]
    fn empty_cube_is_rejected() {
        let err = DataCube::new(CubeKind::Real, "EPSG:3035", vec![]).unwrap_err();
        assert!(matches!(err, CubeError::InvalidInput(_)));
    }

    #[test]
    fn year_outside_explicit_range_is_rejected() {
        let err = DataCube::with_year_range(
            CubeKind::Real,
            "EPSG:3035",
            vec![rec("Species a", 2009, 0.0, 0.0)],
            2010,
            2020,
        )
        .unwrap_err();
        assert!(matches!(err, CubeError::InvalidInput(_)));
    }

    #[test]
    fn spatial_level_parses_known_values() {
        assert_eq!(
            "country".parse::<SpatialLevel>().unwrap(),
            SpatialLevel::Country
        );
        assert_eq!("world".parse::<SpatialLevel>().unwrap(), SpatialLevel::World);
        assert!(matches!(
            "county".parse::<SpatialLevel>(),
            Err(CubeError::Configuration(_))
        ));
    }
}
