//! Core domain models for occurrence data cubes.

pub mod domain;

pub use domain::{BoundingBox, CubeKind, DataCube, OccurrenceRecord, Region, SpatialLevel};
