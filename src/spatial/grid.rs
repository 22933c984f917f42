//! Equal-size spatial grid generation over a region polygon.

use geo::{Area, BooleanOps, BoundingRect, Coord, MultiPolygon, Rect};
use serde::Serialize;

use crate::core::domain::{Region, SpatialLevel};
use crate::error::{CubeError, CubeResult};

/// Upper bound on cells per grid; keeps cell identifiers within `u32` and
/// rejects cell sizes far too fine for the region extent.
const MAX_CELLS: usize = 4_000_000;

/// Default cell side length in km for a spatial level.
///
/// Country-level analyses default to 10 km cells, continent and world to
/// 100 km.
pub fn default_cell_size_km(level: SpatialLevel) -> f64 {
    match level {
        SpatialLevel::Country => 10.0,
        SpatialLevel::Continent | SpatialLevel::World => 100.0,
    }
}

/// One cell of a spatial grid.
///
/// The geometry is the nominal square clipped to the region boundary, so
/// edge cells are smaller than `cell_size × cell_size` and cells entirely
/// outside the region are empty with zero area.
#[derive(Debug, Clone)]
pub struct GridCell {
    /// Dense, 1-based identifier, unique within the grid.
    pub cell_id: u32,
    pub geometry: MultiPolygon<f64>,
    /// Area of the clipped geometry in km², not the nominal cell size.
    pub area_km2: f64,
}

/// An ordered collection of grid cells over a region's bounding extent.
///
/// A grid is generated fresh per workflow invocation and owned solely by
/// that invocation; nothing is cached across calls.
#[derive(Debug, Clone)]
pub struct Grid {
    pub crs: String,
    pub cell_size_km: f64,
    cells: Vec<GridCell>,
}

/// Summary row describing a grid, for diagnostics and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct GridSummary {
    pub num_cells: usize,
    pub cell_size_km: f64,
    pub total_area_km2: f64,
    pub empty_cells: usize,
}

impl Grid {
    /// Generates a grid of `cell_size_km`-sided cells covering the region's
    /// bounding extent, each clipped to the region boundary.
    ///
    /// Cell identifiers are assigned row-major over the bounding extent
    /// (x fastest, starting from the south-west corner), so the numbering is
    /// stable and deterministic for a given region and cell size. Degenerate
    /// and zero-area cells are retained; discarding them is a caller's
    /// concern (see [`Grid::retain_above_area_fraction`]).
    pub fn generate(region: &Region, cell_size_km: f64) -> CubeResult<Self> {
        if !(cell_size_km > 0.0) || !cell_size_km.is_finite() {
            return Err(CubeError::Configuration(format!(
                "cell size must be a positive number of km, got {}",
                cell_size_km
            )));
        }

        let extent = region.geometry.bounding_rect().ok_or_else(|| {
            CubeError::Configuration(format!("region '{}' has no spatial extent", region.name))
        })?;

        let width = extent.max().x - extent.min().x;
        let height = extent.max().y - extent.min().y;
        let ncols = (width / cell_size_km).ceil().max(1.0);
        let nrows = (height / cell_size_km).ceil().max(1.0);
        if ncols * nrows > MAX_CELLS as f64 {
            return Err(CubeError::Configuration(format!(
                "cell size {} km yields {} x {} cells over the region extent, more than the {} supported",
                cell_size_km, ncols, nrows, MAX_CELLS
            )));
        }
        let ncols = ncols as usize;
        let nrows = nrows as usize;

        let mut cells = Vec::with_capacity(nrows * ncols);
        let mut cell_id: u32 = 0;
        for row in 0..nrows {
            for col in 0..ncols {
                cell_id += 1;
                let x0 = extent.min().x + col as f64 * cell_size_km;
                let y0 = extent.min().y + row as f64 * cell_size_km;
                let nominal = Rect::new(
                    Coord { x: x0, y: y0 },
                    Coord {
                        x: x0 + cell_size_km,
                        y: y0 + cell_size_km,
                    },
                );
                let nominal = MultiPolygon::new(vec![nominal.to_polygon()]);
                let clipped = nominal.intersection(&region.geometry);
                let area_km2 = clipped.unsigned_area();
                cells.push(GridCell {
                    cell_id,
                    geometry: clipped,
                    area_km2,
                });
            }
        }

        Ok(Self {
            crs: region.crs.clone(),
            cell_size_km,
            cells,
        })
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of all clipped cell areas in km².
    pub fn total_area_km2(&self) -> f64 {
        self.cells.iter().map(|c| c.area_km2).sum()
    }

    /// Area of the largest cell in km².
    pub fn max_cell_area_km2(&self) -> f64 {
        self.cells.iter().map(|c| c.area_km2).fold(0.0, f64::max)
    }

    pub fn summary(&self) -> GridSummary {
        GridSummary {
            num_cells: self.cells.len(),
            cell_size_km: self.cell_size_km,
            total_area_km2: self.total_area_km2(),
            empty_cells: self.cells.iter().filter(|c| c.area_km2 == 0.0).count(),
        }
    }

    /// Optional post-filter: drops cells smaller than `fraction` of the
    /// largest cell's area.
    ///
    /// The fraction must lie in `[0, 1]`. Not part of the default workflow.
    /// Retained cells keep their original identifiers, so the id sequence of
    /// a filtered grid is no longer contiguous.
    pub fn retain_above_area_fraction(mut self, fraction: f64) -> CubeResult<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(CubeError::Configuration(format!(
                "area fraction must lie in [0, 1], got {}",
                fraction
            )));
        }
        let threshold = self.max_cell_area_km2() * fraction;
        self.cells.retain(|c| c.area_km2 >= threshold);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString, Polygon};

    fn square_region(side: f64) -> Region {
        let poly: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: side, y: 0.0),
            (x: side, y: side),
            (x: 0.0, y: side),
            (x: 0.0, y: 0.0),
        ];
        Region::new(
            "square",
            SpatialLevel::Country,
            "EPSG:3035",
            MultiPolygon::new(vec![poly]),
        )
    }

    #[test]
    fn ids_are_dense_and_one_based() {
        let grid = Grid::generate(&square_region(20.0), 10.0).unwrap();
        assert_eq!(grid.len(), 4);
        let ids: Vec<u32> = grid.cells().iter().map(|c| c.cell_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cell_areas_sum_to_region_area() {
        let region = square_region(25.0);
        let grid = Grid::generate(&region, 10.0).unwrap();
        // 3x3 cells over a 25x25 extent; edge cells are clipped.
        assert_eq!(grid.len(), 9);
        assert!((grid.total_area_km2() - region.area_km2()).abs() < 1e-6);
    }

    #[test]
    fn edge_cells_are_smaller_than_nominal() {
        let grid = Grid::generate(&square_region(25.0), 10.0).unwrap();
        // Row-major from the south-west corner: cell 3 is the east edge.
        let edge = &grid.cells()[2];
        assert_eq!(edge.cell_id, 3);
        assert!((edge.area_km2 - 50.0).abs() < 1e-6);
        let full = &grid.cells()[0];
        assert!((full.area_km2 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn zero_area_cells_are_retained() {
        // An L-shaped region leaves the north-east quadrant of the extent
        // entirely outside the boundary.
        let l_shape: Polygon<f64> = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (20.0, 0.0),
                (20.0, 10.0),
                (10.0, 10.0),
                (10.0, 20.0),
                (0.0, 20.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let region = Region::new(
            "l-shape",
            SpatialLevel::Country,
            "EPSG:3035",
            MultiPolygon::new(vec![l_shape]),
        );
        let grid = Grid::generate(&region, 10.0).unwrap();
        assert_eq!(grid.len(), 4);
        let empty = &grid.cells()[3];
        assert_eq!(empty.cell_id, 4);
        assert_eq!(empty.area_km2, 0.0);
        assert!((grid.total_area_km2() - region.area_km2()).abs() < 1e-6);

        let summary = grid.summary();
        assert_eq!(summary.num_cells, 4);
        assert_eq!(summary.empty_cells, 1);
        assert!((summary.total_area_km2 - 300.0).abs() < 1e-6);
    }

    #[test]
    fn small_cell_filter_is_opt_in() {
        let grid = Grid::generate(&square_region(21.0), 10.0).unwrap();
        assert_eq!(grid.len(), 9);
        let filtered = grid.retain_above_area_fraction(0.2).unwrap();
        // 1x10 slivers (10 km²) fall below 20% of the 100 km² maximum.
        assert!(filtered.len() < 9);
        assert!(filtered.cells().iter().all(|c| c.area_km2 >= 20.0));
    }

    #[test]
    fn invalid_area_fractions_are_rejected() {
        let grid = Grid::generate(&square_region(20.0), 10.0).unwrap();
        assert!(matches!(
            grid.clone().retain_above_area_fraction(f64::NAN),
            Err(CubeError::Configuration(_))
        ));
        assert!(matches!(
            grid.clone().retain_above_area_fraction(-0.1),
            Err(CubeError::Configuration(_))
        ));
        assert!(matches!(
            grid.retain_above_area_fraction(1.5),
            Err(CubeError::Configuration(_))
        ));
    }

    #[test]
    fn holes_are_excluded_from_cell_areas() {
        // 20x20 square with a 10x10 hole straddling all four cells.
        let ring: Polygon<f64> = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (20.0, 0.0),
                (20.0, 20.0),
                (0.0, 20.0),
                (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (5.0, 5.0),
                (5.0, 15.0),
                (15.0, 15.0),
                (15.0, 5.0),
                (5.0, 5.0),
            ])],
        );
        let region = Region::new(
            "ring",
            SpatialLevel::Country,
            "EPSG:3035",
            MultiPolygon::new(vec![ring]),
        );
        let grid = Grid::generate(&region, 10.0).unwrap();
        assert_eq!(grid.len(), 4);
        // Each cell loses a 5x5 corner of the hole.
        for cell in grid.cells() {
            assert!((cell.area_km2 - 75.0).abs() < 1e-6, "cell {}", cell.cell_id);
        }
        assert!((grid.total_area_km2() - region.area_km2()).abs() < 1e-6);
        assert!((grid.total_area_km2() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_cell_size_is_a_configuration_error() {
        let err = Grid::generate(&square_region(10.0), 0.0).unwrap_err();
        assert!(matches!(err, CubeError::Configuration(_)));
    }

    #[test]
    fn grids_too_fine_for_the_extent_are_rejected() {
        let err = Grid::generate(&square_region(60.0), 1e-6).unwrap_err();
        assert!(matches!(err, CubeError::Configuration(_)));
    }

    #[test]
    fn default_cell_sizes_by_level() {
        assert_eq!(default_cell_size_km(SpatialLevel::Country), 10.0);
        assert_eq!(default_cell_size_km(SpatialLevel::Continent), 100.0);
        assert_eq!(default_cell_size_km(SpatialLevel::World), 100.0);
    }
}
