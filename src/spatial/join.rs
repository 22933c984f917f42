//! Point-in-cell assignment of occurrence records.

use geo::{BoundingRect, Intersects, Point, Rect};

use crate::core::domain::OccurrenceRecord;
use crate::error::{CubeError, CubeResult};
use crate::spatial::grid::Grid;

/// An occurrence record extended with the grid cell it falls in.
#[derive(Debug, Clone)]
pub struct JoinedOccurrence {
    pub cell_id: u32,
    pub record: OccurrenceRecord,
}

/// Assigns each occurrence to exactly one grid cell by strict geometric
/// intersection.
///
/// Occurrences outside every cell are silently dropped; they contribute to
/// no indicator. A point exactly on a shared cell boundary is assigned to
/// the lowest-numbered intersecting cell, never duplicated. The output is
/// sorted by `cell_id` with the input order preserved within a cell, so
/// downstream aggregation is deterministic.
///
/// Fails with [`CubeError::ProjectionMismatch`] when the occurrence
/// reference system differs from the grid's.
pub fn spatial_join(
    occurrence_crs: &str,
    records: &[OccurrenceRecord],
    grid: &Grid,
) -> CubeResult<Vec<JoinedOccurrence>> {
    if occurrence_crs != grid.crs {
        return Err(CubeError::ProjectionMismatch(format!(
            "occurrences use '{}' but the grid was built in '{}'",
            occurrence_crs, grid.crs
        )));
    }

    // Bounding rects give a cheap reject before the exact polygon test.
    let cell_rects: Vec<Option<Rect<f64>>> = grid
        .cells()
        .iter()
        .map(|c| c.geometry.bounding_rect())
        .collect();

    let mut joined = Vec::with_capacity(records.len());
    for record in records {
        let point = Point::new(record.x, record.y);
        for (cell, rect) in grid.cells().iter().zip(&cell_rects) {
            let Some(rect) = rect else { continue };
            let inside_rect = record.x >= rect.min().x
                && record.x <= rect.max().x
                && record.y >= rect.min().y
                && record.y <= rect.max().y;
            if inside_rect && cell.geometry.intersects(&point) {
                joined.push(JoinedOccurrence {
                    cell_id: cell.cell_id,
                    record: record.clone(),
                });
                break;
            }
        }
    }

    if joined.len() < records.len() {
        log::debug!(
            "spatial join dropped {} of {} occurrences outside the grid",
            records.len() - joined.len(),
            records.len()
        );
    }

    joined.sort_by_key(|j| j.cell_id);
    Ok(joined)
}
