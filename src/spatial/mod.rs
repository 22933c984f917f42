//! Spatial partitioning and occurrence-to-cell assignment.
//!
//! This module provides the two spatial stages of the map workflow:
//!
//! - [`grid`]: build an equal-size cell partition over a region polygon
//! - [`join`]: assign each occurrence to exactly one grid cell
//!
//! Both stages operate in a projected reference system with kilometre units;
//! reprojection is the ingestion collaborator's concern.

pub mod grid;
pub mod join;

pub use grid::{default_cell_size_km, Grid, GridCell};
pub use join::{spatial_join, JoinedOccurrence};
