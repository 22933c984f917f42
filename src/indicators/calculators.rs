//! Per-group diversity, rarity, and evenness calculators.
//!
//! Every calculator implements [`Calculator`] and consumes one
//! [`ObservationGroup`]: the occurrences joined to a single grid cell (map)
//! or falling in a single year (time series), plus group-level context such
//! as the cell area and dataset-wide species weights. Calculators are
//! selected through the explicit [`dispatch`] table keyed by
//! `(indicator, dim_type)`.
//!
//! All calculators tolerate empty groups and produce the indicator's
//! documented neutral value (zero for count-like indicators, missing for
//! ratio-based indices) instead of raising. Entropy sums exclude
//! zero-abundance species outright rather than clamping, so `log(0)` never
//! occurs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::domain::OccurrenceRecord;
use crate::error::{CubeError, CubeResult};
use crate::indicators::registry::{resolve, DimType, IndicatorKind};
use crate::spatial::join::JoinedOccurrence;

/// Value produced for one group.
///
/// Serializes as a bare number, `null` (missing), or a species → count map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupValue {
    Scalar(f64),
    Missing,
    PerSpecies(BTreeMap<String, u64>),
}

impl GroupValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            GroupValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, GroupValue::Missing)
    }
}

/// Dataset-wide aggregates the rarity calculators weight species by.
///
/// Built once per workflow invocation from the filtered (and, on the map
/// path, joined) dataset, never from a single group.
#[derive(Debug, Clone, Default)]
pub struct DatasetContext {
    /// Summed occurrence count over the whole dataset.
    pub total_abundance: u64,
    /// Per-species summed occurrence count over the whole dataset.
    pub species_abundance: BTreeMap<String, u64>,
    /// Number of distinct grid cells each species occupies (map path only).
    pub species_cell_counts: BTreeMap<String, usize>,
    /// Number of grid cells with at least one occurrence (map path only).
    pub occupied_cells: usize,
}

impl DatasetContext {
    /// Context for the time-series path: abundance totals only.
    pub fn from_records(records: &[OccurrenceRecord]) -> Self {
        let mut species_abundance: BTreeMap<String, u64> = BTreeMap::new();
        let mut total_abundance = 0u64;
        for rec in records {
            *species_abundance
                .entry(rec.scientific_name.clone())
                .or_insert(0) += rec.count;
            total_abundance += rec.count;
        }
        Self {
            total_abundance,
            species_abundance,
            species_cell_counts: BTreeMap::new(),
            occupied_cells: 0,
        }
    }

    /// Context for the map path: abundance totals plus spatial occupancy.
    pub fn from_joined(joined: &[JoinedOccurrence]) -> Self {
        let mut species_abundance: BTreeMap<String, u64> = BTreeMap::new();
        let mut total_abundance = 0u64;
        let mut species_cells: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        let mut occupied: BTreeSet<u32> = BTreeSet::new();
        for j in joined {
            *species_abundance
                .entry(j.record.scientific_name.clone())
                .or_insert(0) += j.record.count;
            total_abundance += j.record.count;
            species_cells
                .entry(j.record.scientific_name.clone())
                .or_default()
                .insert(j.cell_id);
            occupied.insert(j.cell_id);
        }
        Self {
            total_abundance,
            species_abundance,
            species_cell_counts: species_cells
                .into_iter()
                .map(|(name, cells)| (name, cells.len()))
                .collect(),
            occupied_cells: occupied.len(),
        }
    }
}

/// The records of one grid cell or one year, with group-level context.
#[derive(Debug)]
pub struct ObservationGroup<'a> {
    pub records: Vec<&'a OccurrenceRecord>,
    /// Clipped area of the cell in km² (map groups only).
    pub area_km2: Option<f64>,
    pub context: &'a DatasetContext,
}

impl<'a> ObservationGroup<'a> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-species summed counts within the group, zero-abundance species
    /// excluded.
    fn species_counts(&self) -> BTreeMap<&'a str, u64> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for rec in &self.records {
            *counts.entry(rec.scientific_name.as_str()).or_insert(0) += rec.count;
        }
        counts.retain(|_, n| *n > 0);
        counts
    }

    /// Relative abundances of the group's species, all strictly positive.
    fn relative_abundances(&self) -> Vec<f64> {
        let counts = self.species_counts();
        let total: u64 = counts.values().sum();
        if total == 0 {
            return Vec::new();
        }
        counts
            .values()
            .map(|&n| n as f64 / total as f64)
            .collect()
    }
}

/// Shared interface of all diversity calculators.
///
/// `compute` takes `&mut self` because the cumulative-richness calculator
/// carries state across the year groups of one invocation; a fresh
/// calculator is built per workflow call, so invocations stay independent.
pub trait Calculator {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue;
}

/// Hill number of order `q` from strictly positive relative abundances.
fn hill_number(q: u8, proportions: &[f64]) -> f64 {
    match q {
        0 => proportions.len() as f64,
        1 => shannon_entropy(proportions).exp(),
        2 => {
            let simpson: f64 = proportions.iter().map(|p| p * p).sum();
            1.0 / simpson
        }
        _ => unreachable!("only Hill orders 0, 1, 2 are registered"),
    }
}

/// Shannon entropy over strictly positive proportions.
fn shannon_entropy(proportions: &[f64]) -> f64 {
    -proportions.iter().map(|p| p * p.ln()).sum::<f64>()
}

/// Count of distinct species present in the group.
struct ObsRichness;

impl Calculator for ObsRichness {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        GroupValue::Scalar(group.species_counts().len() as f64)
    }
}

/// Running count of distinct species seen up to and including this group.
///
/// Only meaningful when groups arrive in ascending year order, which the
/// time-series computation guarantees.
struct CumulativeRichness {
    seen: BTreeSet<String>,
}

impl Calculator for CumulativeRichness {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        for rec in &group.records {
            if rec.count > 0 {
                self.seen.insert(rec.scientific_name.clone());
            }
        }
        GroupValue::Scalar(self.seen.len() as f64)
    }
}

/// Sum of occurrence counts in the group.
struct TotalOcc;

impl Calculator for TotalOcc {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let total: u64 = group.records.iter().map(|r| r.count).sum();
        GroupValue::Scalar(total as f64)
    }
}

/// Total occurrences divided by the clipped cell area.
struct Density;

impl Calculator for Density {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let area = match group.area_km2 {
            Some(a) if a > 0.0 => a,
            // Zero-area edge slivers have no defined density.
            _ => return GroupValue::Missing,
        };
        let total: u64 = group.records.iter().map(|r| r.count).sum();
        GroupValue::Scalar(total as f64 / area)
    }
}

/// Hill number of a fixed order, from within-group relative abundances.
struct Hill {
    order: u8,
}

impl Calculator for Hill {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let proportions = group.relative_abundances();
        if proportions.is_empty() {
            // Hill 0 of an empty group is a richness of zero; the entropy
            // orders are undefined.
            return if self.order == 0 {
                GroupValue::Scalar(0.0)
            } else {
                GroupValue::Missing
            };
        }
        GroupValue::Scalar(hill_number(self.order, &proportions))
    }
}

/// Williams' evenness: `1 - sqrt(sum(p²) - 1/S)`.
///
/// Well-defined for a single species (exactly 1, maximal evenness).
struct WilliamsEvenness;

impl Calculator for WilliamsEvenness {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let proportions = group.relative_abundances();
        let s = proportions.len();
        if s == 0 {
            return GroupValue::Missing;
        }
        let sum_sq: f64 = proportions.iter().map(|p| p * p).sum();
        GroupValue::Scalar(1.0 - (sum_sq - 1.0 / s as f64).max(0.0).sqrt())
    }
}

/// Pielou's evenness: Shannon entropy normalized by `ln(S)`.
///
/// Undefined (missing) when richness is 0 or 1.
struct PielouEvenness;

impl Calculator for PielouEvenness {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let proportions = group.relative_abundances();
        let s = proportions.len();
        if s <= 1 {
            return GroupValue::Missing;
        }
        GroupValue::Scalar(shannon_entropy(&proportions) / (s as f64).ln())
    }
}

/// Abundance-weighted rarity: each species contributes one minus its share
/// of the dataset-wide abundance. A species carrying all abundance
/// contributes nothing.
struct AbRarity;

impl Calculator for AbRarity {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let ctx = group.context;
        if ctx.total_abundance == 0 {
            return GroupValue::Scalar(0.0);
        }
        let total = ctx.total_abundance as f64;
        let sum = group
            .species_counts()
            .keys()
            .map(|name| {
                let n = ctx.species_abundance.get(*name).copied().unwrap_or(0) as f64;
                1.0 - n / total
            })
            .sum();
        GroupValue::Scalar(sum)
    }
}

/// Occupancy-weighted rarity: each species contributes one minus the share
/// of occupied cells it is found in. A ubiquitous species contributes
/// nothing.
struct AreaRarity;

impl Calculator for AreaRarity {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let ctx = group.context;
        if ctx.occupied_cells == 0 {
            return GroupValue::Scalar(0.0);
        }
        let occupied = ctx.occupied_cells as f64;
        let sum = group
            .species_counts()
            .keys()
            .map(|name| {
                let cells = ctx.species_cell_counts.get(*name).copied().unwrap_or(0) as f64;
                1.0 - cells / occupied
            })
            .sum();
        GroupValue::Scalar(sum)
    }
}

/// Mean pairwise taxonomic distance among co-occurring species.
///
/// Distances from the rank relationships in the cube: same family 1, same
/// kingdom but different family 2, different kingdom 3. Undefined for
/// fewer than two species.
struct TaxDistinct;

impl Calculator for TaxDistinct {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        // Species name → (kingdom, family) from the first record seen.
        let mut taxa: BTreeMap<&str, (&str, &str)> = BTreeMap::new();
        for rec in &group.records {
            if rec.count > 0 {
                taxa.entry(rec.scientific_name.as_str())
                    .or_insert((rec.kingdom.as_str(), rec.family.as_str()));
            }
        }
        let species: Vec<_> = taxa.values().collect();
        if species.len() < 2 {
            return GroupValue::Missing;
        }
        let mut sum = 0.0;
        let mut pairs = 0usize;
        for i in 0..species.len() {
            for j in (i + 1)..species.len() {
                let (kingdom_a, family_a) = species[i];
                let (kingdom_b, family_b) = species[j];
                sum += if kingdom_a != kingdom_b {
                    3.0
                } else if family_a != family_b {
                    2.0
                } else {
                    1.0
                };
                pairs += 1;
            }
        }
        GroupValue::Scalar(sum / pairs as f64)
    }
}

/// Count-weighted mean occurrence year, a recency signal.
struct Newness;

impl Calculator for Newness {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let total: u64 = group.records.iter().map(|r| r.count).sum();
        if total == 0 {
            return GroupValue::Missing;
        }
        let weighted: f64 = group
            .records
            .iter()
            .map(|r| f64::from(r.year) * r.count as f64)
            .sum();
        GroupValue::Scalar(weighted / total as f64)
    }
}

/// Per-species occurrence counts, retained rather than reduced to a scalar.
struct SpecOcc;

impl Calculator for SpecOcc {
    fn compute(&mut self, group: &ObservationGroup<'_>) -> GroupValue {
        let counts = group
            .species_counts()
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();
        GroupValue::PerSpecies(counts)
    }
}

/// Explicit dispatch table from `(indicator, dim_type)` to a calculator.
///
/// Resolves the combination against the registry first, so an unsupported
/// pairing fails with [`CubeError::UnsupportedIndicator`] before any
/// computation. A fresh calculator is returned per call; the cumulative
/// variant owns its accumulation state.
pub fn dispatch(kind: IndicatorKind, dim: DimType) -> CubeResult<Box<dyn Calculator>> {
    resolve(kind, dim)?;
    let calculator: Box<dyn Calculator> = match kind {
        IndicatorKind::ObsRichness => Box::new(ObsRichness),
        IndicatorKind::CumRichness => Box::new(CumulativeRichness {
            seen: BTreeSet::new(),
        }),
        IndicatorKind::TotalOcc => Box::new(TotalOcc),
        IndicatorKind::Density => Box::new(Density),
        IndicatorKind::Hill0 => Box::new(Hill { order: 0 }),
        IndicatorKind::Hill1 => Box::new(Hill { order: 1 }),
        IndicatorKind::Hill2 => Box::new(Hill { order: 2 }),
        IndicatorKind::WilliamsEvenness => Box::new(WilliamsEvenness),
        IndicatorKind::PielouEvenness => Box::new(PielouEvenness),
        IndicatorKind::AbRarity => Box::new(AbRarity),
        IndicatorKind::AreaRarity => Box::new(AreaRarity),
        IndicatorKind::TaxDistinct => Box::new(TaxDistinct),
        IndicatorKind::Newness => Box::new(Newness),
        IndicatorKind::SpecOcc => Box::new(SpecOcc),
    };
    Ok(calculator)
}
