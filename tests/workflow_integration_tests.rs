//! End-to-end workflow tests over synthetic occurrence cubes.

use divcube::core::domain::{CubeKind, DataCube, OccurrenceRecord, SpatialLevel};
use divcube::error::CubeError;
use divcube::indicators::{registry, DimType, IndicatorKind};
use divcube::results::IndicatorResult;
use divcube::sources::{BoundarySource, CubeSource, InMemoryCubeSource, StaticBoundarySource};
use divcube::workflow::{run_indicator, IndicatorParams};
use geo::{polygon, MultiPolygon};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn rec(name: &str, year: i32, x: f64, y: f64, count: u64) -> OccurrenceRecord {
    OccurrenceRecord {
        scientific_name: name.to_string(),
        kingdom: "Animalia".to_string(),
        family: "Testidae".to_string(),
        year,
        x,
        y,
        count,
    }
}

fn square_boundaries(side: f64) -> StaticBoundarySource {
    StaticBoundarySource::new("EPSG:3035").with_region(
        SpatialLevel::Country,
        "Testland",
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: side, y: 0.0),
            (x: side, y: side),
            (x: 0.0, y: side),
            (x: 0.0, y: 0.0),
        ]]),
    )
}

fn sample_cube() -> DataCube {
    DataCube::new(
        CubeKind::Real,
        "EPSG:3035",
        vec![
            rec("Vanessa atalanta", 2015, 5.0, 5.0, 4),
            rec("Pieris brassicae", 2015, 6.0, 4.0, 2),
            rec("Vanessa atalanta", 2017, 15.0, 5.0, 1),
            rec("Bufo bufo", 2018, 15.0, 15.0, 7),
            rec("Pieris brassicae", 2019, 5.0, 15.0, 3),
        ],
    )
    .unwrap()
}

fn map_params(indicator: IndicatorKind) -> IndicatorParams {
    let mut params = IndicatorParams::new(indicator, DimType::Map);
    params.level = Some(SpatialLevel::Country);
    params.region = Some("Testland".to_string());
    params.cell_size_km = Some(10.0);
    params
}

#[test]
fn every_registered_map_indicator_runs_end_to_end() {
    // The cube arrives through the ingestion trait, as embedding callers
    // supply it.
    let source = InMemoryCubeSource::new(sample_cube());
    let cube = source.load_cube().unwrap();
    let boundaries = square_boundaries(20.0);
    for spec in registry().values().filter(|s| s.supports_map) {
        let result = run_indicator(&cube, &map_params(spec.kind), &boundaries)
            .unwrap_or_else(|e| panic!("{} failed: {}", spec.kind, e));
        let IndicatorResult::Spatial(spatial) = result else {
            panic!("{} did not produce a spatial result", spec.kind);
        };
        // The full 2x2 grid appears, zero-observation cells included.
        assert_eq!(spatial.cells.len(), 4, "{}", spec.kind);
    }
}

#[test]
fn every_registered_ts_indicator_runs_end_to_end() {
    let source = InMemoryCubeSource::new(sample_cube());
    let cube = source.load_cube().unwrap();
    let boundaries = StaticBoundarySource::new("EPSG:3035");
    for spec in registry().values().filter(|s| s.supports_ts) {
        let params = IndicatorParams::new(spec.kind, DimType::Ts);
        let result = run_indicator(&cube, &params, &boundaries)
            .unwrap_or_else(|e| panic!("{} failed: {}", spec.kind, e));
        let IndicatorResult::TimeSeries(ts) = result else {
            panic!("{} did not produce a time-series result", spec.kind);
        };
        // One point per year of the cube's range, 2015..=2019.
        assert_eq!(ts.points.len(), 5, "{}", spec.kind);
    }
}

#[test]
fn hill0_map_matches_observed_richness_map() {
    let cube = sample_cube();
    let boundaries = square_boundaries(20.0);
    let hill0 = run_indicator(&cube, &map_params(IndicatorKind::Hill0), &boundaries).unwrap();
    let richness =
        run_indicator(&cube, &map_params(IndicatorKind::ObsRichness), &boundaries).unwrap();
    let (IndicatorResult::Spatial(hill0), IndicatorResult::Spatial(richness)) = (hill0, richness)
    else {
        panic!("expected spatial results");
    };
    for (h, r) in hill0.cells.iter().zip(&richness.cells) {
        assert_eq!(h.value, r.value, "cell {}", h.cell_id);
    }
}

#[test]
fn renderer_output_carries_the_indicator_column() {
    let cube = sample_cube();
    let result = run_indicator(
        &cube,
        &map_params(IndicatorKind::Density),
        &square_boundaries(20.0),
    )
    .unwrap();
    let json = result.to_renderer_json();
    assert_eq!(json["shape"], "indicator_map");
    assert_eq!(json["indicator"], "density_map");
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    for row in rows {
        assert!(row.get("cell_id").is_some());
        assert!(row.get("area_km2").is_some());
        assert!(row.get("density").is_some());
    }
}

#[test]
fn metadata_describes_the_filtered_input_population() {
    let cube = sample_cube();
    let mut params = map_params(IndicatorKind::ObsRichness);
    params.first_year = Some(2015);
    params.last_year = Some(2017);
    let result = run_indicator(&cube, &params, &square_boundaries(20.0)).unwrap();
    let meta = result.metadata();
    assert_eq!((meta.first_year, meta.last_year), (2015, 2017));
    assert_eq!(meta.num_records, 3);
    assert_eq!(meta.num_species, 2);
    assert_eq!(meta.years.iter().copied().collect::<Vec<_>>(), vec![2015, 2017]);
    assert!(!meta.species.contains("Bufo bufo"));
}

#[test]
fn unknown_region_surfaces_as_a_configuration_error() {
    let cube = sample_cube();
    let mut params = map_params(IndicatorKind::ObsRichness);
    params.region = Some("Atlantis".to_string());
    let err = run_indicator(&cube, &params, &square_boundaries(20.0)).unwrap_err();
    assert!(matches!(err, CubeError::Configuration(_)));
}

#[test]
fn unregistered_indicator_names_fail_with_unsupported_indicator() {
    let err = "shannon_wiener".parse::<IndicatorKind>().unwrap_err();
    assert!(matches!(err, CubeError::UnsupportedIndicator(_)));
}

prop_compose! {
    fn arb_records()(
        raw in prop::collection::vec(
            (0usize..5, 2000i32..2020, 0.0f64..50.0, 0.0f64..50.0, 1u64..20),
            1..40,
        )
    ) -> Vec<OccurrenceRecord> {
        let names = ["Species a", "Species b", "Species c", "Species d", "Species e"];
        raw.into_iter()
            .map(|(s, year, x, y, count)| rec(names[s], year, x, y, count))
            .collect()
    }
}

proptest! {
    #[test]
    fn grid_ids_are_contiguous_for_any_region_and_cell_size(
        side in 5.0f64..60.0,
        cell_size in 5.0f64..30.0,
    ) {
        use divcube::spatial::grid::Grid;

        let region = square_boundaries(side)
            .fetch(SpatialLevel::Country, Some("Testland"))
            .unwrap();
        prop_assert_eq!(&region.name, "Testland");
        let grid = Grid::generate(&region, cell_size).unwrap();
        for (i, cell) in grid.cells().iter().enumerate() {
            prop_assert_eq!(cell.cell_id as usize, i + 1);
        }
        let region_area = region.area_km2();
        prop_assert!((grid.total_area_km2() - region_area).abs() < 1e-6 * region_area);
    }

    #[test]
    fn clamped_year_windows_stay_inside_the_cube_range(
        records in arb_records(),
        first in 1990i32..2030,
        span in 0i32..40,
    ) {
        let cube = DataCube::new(CubeKind::Real, "EPSG:3035", records).unwrap();
        let mut params = IndicatorParams::new(IndicatorKind::TotalOcc, DimType::Ts);
        params.first_year = Some(first);
        params.last_year = Some(first + span);
        let boundaries = StaticBoundarySource::new("EPSG:3035");
        match run_indicator(&cube, &params, &boundaries) {
            Ok(result) => {
                let meta = result.metadata();
                prop_assert!(meta.first_year <= meta.last_year);
                prop_assert!(meta.first_year >= cube.first_year());
                prop_assert!(meta.last_year <= cube.last_year());
                prop_assert!(meta.first_year >= first);
                prop_assert!(meta.last_year <= first + span);
            }
            Err(CubeError::InvalidInput(_)) => {
                // Window disjoint from the cube range.
                prop_assert!(first + span < cube.first_year() || first > cube.last_year());
            }
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        }
    }

    #[test]
    fn workflows_are_deterministic(records in arb_records()) {
        let cube = DataCube::new(CubeKind::Real, "EPSG:3035", records).unwrap();
        let boundaries = square_boundaries(50.0);
        let params = map_params(IndicatorKind::AbRarity);
        let first = run_indicator(&cube, &params, &boundaries).unwrap();
        let second = run_indicator(&cube, &params, &boundaries).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn joined_occurrences_lie_within_their_cells(records in arb_records()) {
        use divcube::spatial::{grid::Grid, join::spatial_join};
        use geo::{Intersects, Point};

        let region = square_boundaries(50.0)
            .fetch(SpatialLevel::Country, Some("Testland"))
            .unwrap();
        let grid = Grid::generate(&region, 10.0).unwrap();
        let joined = spatial_join("EPSG:3035", &records, &grid).unwrap();
        for j in &joined {
            let cell = &grid.cells()[(j.cell_id - 1) as usize];
            prop_assert!(cell
                .geometry
                .intersects(&Point::new(j.record.x, j.record.y)));
        }
    }
}
