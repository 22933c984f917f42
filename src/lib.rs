//! divcube: biodiversity indicator computation for occurrence data cubes.
//!
//! This crate computes biodiversity indicators (species richness, Hill
//! diversity, evenness, rarity, taxonomic distinctness, temporal trends)
//! from in-memory tabular occurrence datasets, aggregated either spatially
//! over a generated grid or temporally by year.
//!
//! Architecture:
//! - `core`: occurrence records, data cubes, regions
//! - `spatial`: grid generation and point-in-cell joins
//! - `indicators`: the static indicator registry and the calculator family
//! - `workflow`: the orchestrator routing a cube through validation, year
//!   filtering, spatialization, dispatch, and assembly
//! - `results`: the three typed result shapes handed to rendering code
//! - `sources`: trait interfaces to the out-of-scope ingestion and
//!   boundary collaborators
//!
//! ```
//! use divcube::core::domain::{CubeKind, DataCube, OccurrenceRecord, SpatialLevel};
//! use divcube::indicators::{DimType, IndicatorKind};
//! use divcube::sources::StaticBoundarySource;
//! use divcube::workflow::{run_indicator, IndicatorParams};
//! use geo::{polygon, MultiPolygon};
//!
//! let cube = DataCube::new(
//!     CubeKind::Real,
//!     "EPSG:3035",
//!     vec![OccurrenceRecord {
//!         scientific_name: "Vanessa atalanta".to_string(),
//!         kingdom: "Animalia".to_string(),
//!         family: "Nymphalidae".to_string(),
//!         year: 2011,
//!         x: 5.0,
//!         y: 5.0,
//!         count: 4,
//!     }],
//! )
//! .unwrap();
//!
//! let boundaries = StaticBoundarySource::new("EPSG:3035").with_region(
//!     SpatialLevel::Country,
//!     "Testland",
//!     MultiPolygon::new(vec![polygon![
//!         (x: 0.0, y: 0.0),
//!         (x: 10.0, y: 0.0),
//!         (x: 10.0, y: 10.0),
//!         (x: 0.0, y: 10.0),
//!         (x: 0.0, y: 0.0),
//!     ]]),
//! );
//!
//! let mut params = IndicatorParams::new(IndicatorKind::ObsRichness, DimType::Map);
//! params.level = Some(SpatialLevel::Country);
//! params.region = Some("Testland".to_string());
//!
//! let result = run_indicator(&cube, &params, &boundaries).unwrap();
//! assert_eq!(result.shape_tag(), "indicator_map");
//! ```

pub mod core;
pub mod error;
pub mod indicators;
pub mod results;
pub mod sources;
pub mod spatial;
pub mod workflow;

pub use error::{CubeError, CubeResult};
pub use results::IndicatorResult;
