//! Interfaces to the out-of-scope collaborators: cube ingestion and
//! boundary retrieval.
//!
//! The core never parses flat files or downloads basemaps itself; it
//! consumes whatever these traits supply. In-memory implementations are
//! provided for tests and embedding callers.

use std::collections::BTreeMap;

use geo::MultiPolygon;

use crate::core::domain::{DataCube, Region, SpatialLevel};
use crate::error::{CubeError, CubeResult};

/// Supplies a fully materialized data cube (ingestion collaborator).
pub trait CubeSource {
    fn load_cube(&self) -> CubeResult<DataCube>;
}

/// Supplies region polygons for a spatial level (boundary collaborator).
///
/// An unknown region must surface as an error, never as a silently empty
/// polygon.
pub trait BoundarySource {
    fn fetch(&self, level: SpatialLevel, name: Option<&str>) -> CubeResult<Region>;
}

/// Cube source backed by an already-built cube.
#[derive(Debug, Clone)]
pub struct InMemoryCubeSource {
    cube: DataCube,
}

impl InMemoryCubeSource {
    pub fn new(cube: DataCube) -> Self {
        Self { cube }
    }
}

impl CubeSource for InMemoryCubeSource {
    fn load_cube(&self) -> CubeResult<DataCube> {
        Ok(self.cube.clone())
    }
}

/// Boundary source backed by a static name → polygon table.
#[derive(Debug, Clone, Default)]
pub struct StaticBoundarySource {
    crs: String,
    world: Option<MultiPolygon<f64>>,
    regions: BTreeMap<(SpatialLevel, String), MultiPolygon<f64>>,
}

impl StaticBoundarySource {
    pub fn new(crs: impl Into<String>) -> Self {
        Self {
            crs: crs.into(),
            world: None,
            regions: BTreeMap::new(),
        }
    }

    pub fn with_world(mut self, geometry: MultiPolygon<f64>) -> Self {
        self.world = Some(geometry);
        self
    }

    pub fn with_region(
        mut self,
        level: SpatialLevel,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        self.regions.insert((level, name.into()), geometry);
        self
    }
}

impl BoundarySource for StaticBoundarySource {
    fn fetch(&self, level: SpatialLevel, name: Option<&str>) -> CubeResult<Region> {
        if level == SpatialLevel::World {
            let geometry = self.world.clone().ok_or_else(|| {
                CubeError::Configuration("no world boundary is configured".to_string())
            })?;
            return Ok(Region::new("world", level, self.crs.clone(), geometry));
        }
        let name = name.ok_or_else(|| {
            CubeError::Configuration(format!(
                "a region name is required at {} level",
                level
            ))
        })?;
        let geometry = self
            .regions
            .get(&(level, name.to_string()))
            .cloned()
            .ok_or_else(|| {
                CubeError::Configuration(format!("unknown {} '{}'", level, name))
            })?;
        Ok(Region::new(name, level, self.crs.clone(), geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn fetch_known_region() {
        let source = StaticBoundarySource::new("EPSG:3035").with_region(
            SpatialLevel::Country,
            "Denmark",
            unit_square(),
        );
        let region = source
            .fetch(SpatialLevel::Country, Some("Denmark"))
            .unwrap();
        assert_eq!(region.name, "Denmark");
        assert_eq!(region.crs, "EPSG:3035");
    }

    #[test]
    fn unknown_region_is_an_error_not_an_empty_polygon() {
        let source = StaticBoundarySource::new("EPSG:3035");
        let err = source
            .fetch(SpatialLevel::Country, Some("Atlantis"))
            .unwrap_err();
        assert!(matches!(err, CubeError::Configuration(_)));
    }

    #[test]
    fn country_level_requires_a_name() {
        let source = StaticBoundarySource::new("EPSG:3035");
        let err = source.fetch(SpatialLevel::Country, None).unwrap_err();
        assert!(matches!(err, CubeError::Configuration(_)));
    }

    #[test]
    fn world_level_ignores_the_name() {
        let source = StaticBoundarySource::new("EPSG:3035").with_world(unit_square());
        let region = source.fetch(SpatialLevel::World, None).unwrap();
        assert_eq!(region.name, "world");
    }
}
