//! Static registry of indicator keys and their supported dimension types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::CubeError;

/// The family of biodiversity indicators this crate computes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    ObsRichness,
    CumRichness,
    TotalOcc,
    Density,
    Hill0,
    Hill1,
    Hill2,
    WilliamsEvenness,
    PielouEvenness,
    AbRarity,
    AreaRarity,
    TaxDistinct,
    Newness,
    SpecOcc,
}

impl IndicatorKind {
    /// The stable string key used in dispatch tags and serialized output.
    pub fn key(&self) -> &'static str {
        match self {
            IndicatorKind::ObsRichness => "obs_richness",
            IndicatorKind::CumRichness => "cum_richness",
            IndicatorKind::TotalOcc => "total_occ",
            IndicatorKind::Density => "density",
            IndicatorKind::Hill0 => "hill0",
            IndicatorKind::Hill1 => "hill1",
            IndicatorKind::Hill2 => "hill2",
            IndicatorKind::WilliamsEvenness => "williams_evenness",
            IndicatorKind::PielouEvenness => "pielou_evenness",
            IndicatorKind::AbRarity => "ab_rarity",
            IndicatorKind::AreaRarity => "area_rarity",
            IndicatorKind::TaxDistinct => "tax_distinct",
            IndicatorKind::Newness => "newness",
            IndicatorKind::SpecOcc => "spec_occ",
        }
    }

    pub fn all() -> &'static [IndicatorKind] {
        &[
            IndicatorKind::ObsRichness,
            IndicatorKind::CumRichness,
            IndicatorKind::TotalOcc,
            IndicatorKind::Density,
            IndicatorKind::Hill0,
            IndicatorKind::Hill1,
            IndicatorKind::Hill2,
            IndicatorKind::WilliamsEvenness,
            IndicatorKind::PielouEvenness,
            IndicatorKind::AbRarity,
            IndicatorKind::AreaRarity,
            IndicatorKind::TaxDistinct,
            IndicatorKind::Newness,
            IndicatorKind::SpecOcc,
        ]
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IndicatorKind {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorKind::all()
            .iter()
            .find(|k| k.key() == s)
            .copied()
            .ok_or_else(|| {
                CubeError::UnsupportedIndicator(format!("unknown indicator '{}'", s))
            })
    }
}

/// Whether an indicator is computed per grid cell or per year.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DimType {
    Map,
    Ts,
}

impl DimType {
    pub fn key(&self) -> &'static str {
        match self {
            DimType::Map => "map",
            DimType::Ts => "ts",
        }
    }
}

impl fmt::Display for DimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DimType {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(DimType::Map),
            "ts" => Ok(DimType::Ts),
            other => Err(CubeError::InvalidInput(format!(
                "dim_type must be 'map' or 'ts', got '{}'",
                other
            ))),
        }
    }
}

/// Composite tag `{indicator}_{dim_type}` that selects a calculator variant.
pub fn dispatch_key(kind: IndicatorKind, dim: DimType) -> String {
    format!("{}_{}", kind.key(), dim.key())
}

/// Registry entry declaring what an indicator supports and requires.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub label: &'static str,
    pub supports_map: bool,
    pub supports_ts: bool,
    /// True when the map variant needs per-cell area (density only).
    pub requires_cell_area: bool,
}

impl IndicatorSpec {
    pub fn supports(&self, dim: DimType) -> bool {
        match dim {
            DimType::Map => self.supports_map,
            DimType::Ts => self.supports_ts,
        }
    }
}

fn spec(
    kind: IndicatorKind,
    label: &'static str,
    supports_map: bool,
    supports_ts: bool,
) -> (IndicatorKind, IndicatorSpec) {
    (
        kind,
        IndicatorSpec {
            kind,
            label,
            supports_map,
            supports_ts,
            requires_cell_area: kind == IndicatorKind::Density,
        },
    )
}

static REGISTRY: Lazy<BTreeMap<IndicatorKind, IndicatorSpec>> = Lazy::new(|| {
    BTreeMap::from([
        spec(IndicatorKind::ObsRichness, "Observed Species Richness", true, true),
        spec(IndicatorKind::CumRichness, "Cumulative Species Richness", false, true),
        spec(IndicatorKind::TotalOcc, "Total Occurrences", true, true),
        spec(IndicatorKind::Density, "Occurrence Density", true, false),
        spec(IndicatorKind::Hill0, "Species Richness (Hill 0)", true, true),
        spec(IndicatorKind::Hill1, "Hill-Shannon Diversity (Hill 1)", true, true),
        spec(IndicatorKind::Hill2, "Hill-Simpson Diversity (Hill 2)", true, true),
        spec(IndicatorKind::WilliamsEvenness, "Williams' Evenness", true, true),
        spec(IndicatorKind::PielouEvenness, "Pielou's Evenness", true, true),
        spec(IndicatorKind::AbRarity, "Abundance-Based Rarity", true, true),
        spec(IndicatorKind::AreaRarity, "Area-Based Rarity", true, false),
        spec(IndicatorKind::TaxDistinct, "Taxonomic Distinctness", true, true),
        spec(IndicatorKind::Newness, "Mean Year of Occurrence", true, true),
        spec(IndicatorKind::SpecOcc, "Species Occurrences", true, true),
    ])
});

/// The process-wide, read-only indicator registry.
///
/// Initialized once on first access and never mutated thereafter.
pub fn registry() -> &'static BTreeMap<IndicatorKind, IndicatorSpec> {
    &REGISTRY
}

/// Looks up an indicator and checks that it supports the requested
/// dimension type.
pub fn resolve(kind: IndicatorKind, dim: DimType) -> Result<&'static IndicatorSpec, CubeError> {
    let spec = registry().get(&kind).ok_or_else(|| {
        CubeError::UnsupportedIndicator(format!("indicator '{}' is not registered", kind))
    })?;
    if !spec.supports(dim) {
        return Err(CubeError::UnsupportedIndicator(format!(
            "'{}' is not a registered computation",
            dispatch_key(kind, dim)
        )));
    }
    Ok(spec)
}
