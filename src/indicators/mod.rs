//! Indicator registry and diversity calculators.
//!
//! The registry is a process-wide, read-only table declaring which
//! indicators exist and which dimension types (map, time series) each
//! supports. The calculators implement the per-group aggregation semantics
//! behind a shared [`Calculator`](calculators::Calculator) interface,
//! selected through an explicit dispatch table keyed by
//! `(indicator, dim_type)`.

pub mod calculators;
pub mod registry;

pub use calculators::{dispatch, Calculator, DatasetContext, GroupValue, ObservationGroup};
pub use registry::{registry, DimType, IndicatorKind, IndicatorSpec};
