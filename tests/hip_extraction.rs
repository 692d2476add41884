/// Integration tests for HIP data extraction
///
/// Tests verify:
/// 1. Soil column pruning and unit handling on a DK1 stratigraphy
/// 2. Topmost aquifer lookup on extracted columns
/// 3. Per-pixel top-aquifer potential selection, including data voids
/// 4. Grid cell resolution (exact nodes, snapping, out of bounds)
/// 5. Daisy input preparation and the DDF pressure table
/// 6. JSON dataset files
///
/// All datasets are synthetic and built in memory; no HIP download needed.
///
/// Run with: cargo test --test hip_extraction

use std::env;
use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{Array3, Array4};

use daisy_tools::dataset::{ElevationLayer, Grid, PotentialDataset, StratigraphyDataset};
use daisy_tools::hip::{
    self, HeadElevationOptions, SoilColumnOptions, TopAquiferOptions, extract_soil_column,
    extract_top_aquifer_potential, find_topmost_aquifer, prepare_for_daisy,
};
use daisy_tools::model::{AxisLocator, CellLocator, DkModel, HipError, SoilColumn};
use daisy_tools::units::{Unit, missing_sentinel};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const X: [f64; 3] = [0.0, 100.0, 200.0];
const Y: [f64; 2] = [1000.0, 900.0];
const TERRAIN: f64 = 50.0;
const LAYER_THICKNESS: f64 = 4.0;

fn times() -> Vec<NaiveDateTime> {
    (1..=2)
        .map(|day| {
            NaiveDate::from_ymd_opt(2020, 1, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid test date")
        })
        .collect()
}

fn grid() -> Grid {
    Grid::new(X.to_vec(), Y.to_vec())
}

/// CompLayer numbers absent at pixel (j, i).
///
/// (0, 0): none
/// (0, 1): CompLayer_3 (ks1)
/// (0, 2): CompLayer_3 and CompLayer_5 (ks1, ks2)
/// (1, 0): every aquifer
/// (1, 1): CompLayer_9 (ks4)
/// (1, 2): none
fn absent_layers(j: usize, i: usize) -> &'static [usize] {
    match (j, i) {
        (0, 1) => &[3],
        (0, 2) => &[3, 5],
        (1, 0) => &[3, 5, 7, 9, 11],
        (1, 1) => &[9],
        _ => &[],
    }
}

/// Elevation of the bottom of layer `k` (0 = ground surface) at (j, i).
fn elevation(k: usize, j: usize, i: usize) -> f64 {
    let absent = absent_layers(j, i);
    let mut value = TERRAIN;
    for layer in 1..=k {
        value -= if absent.contains(&layer) { 0.5 } else { LAYER_THICKNESS };
    }
    value
}

/// DK1 stratigraphy: Topography + CompLayer_1..CompLayer_11 on a 3x2 grid.
fn dk1_stratigraphy(units: &str) -> StratigraphyDataset {
    let scale = if units == "cm" { 100.0 } else { 1.0 };
    let layers = (0..=11)
        .map(|k| ElevationLayer {
            name: if k == 0 { "Topography".to_string() } else { format!("CompLayer_{}", k) },
            units: units.to_string(),
            values: Array3::from_shape_fn((1, Y.len(), X.len()), |(_, j, i)| elevation(k, j, i) * scale),
        })
        .collect();
    StratigraphyDataset::new(grid(), times().into_iter().take(1).collect(), layers)
        .expect("valid stratigraphy")
}

/// Head elevation distinct per layer, time step and pixel.
fn head(t: usize, layer: u8, j: usize, i: usize) -> f64 {
    30.0 + 2.0 * f64::from(layer) + 0.5 * t as f64 + 0.25 * j as f64 + 0.125 * i as f64
}

fn dk1_potential_on(grid: Grid) -> PotentialDataset {
    let layers: Vec<u8> = (0..=10).collect();
    let values = Array4::from_shape_fn((2, layers.len(), grid.y.len(), grid.x.len()), |(t, k, j, i)| {
        head(t, k as u8, j, i)
    });
    PotentialDataset::new(grid, times(), layers, "EumUnit.eumUmeter", values).expect("valid potential")
}

fn dk1_potential() -> PotentialDataset {
    dk1_potential_on(grid())
}

fn unit(s: &str) -> Unit {
    Unit::parse(s).unwrap_or_else(|e| panic!("{s:?} should parse: {e}"))
}

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("daisy_tools_{}_{}", std::process::id(), name))
}

// ---------------------------------------------------------------------------
// Soil column and aquifer lookup
// ---------------------------------------------------------------------------

#[test]
fn test_dk1_absent_layer_is_omitted_and_ks1_is_topmost_aquifer() {
    let ds = dk1_stratigraphy("m");
    let column = extract_soil_column(&ds, &CellLocator::index(1, 1), &SoilColumnOptions::default())
        .expect("extraction should succeed");

    let names: Vec<&str> = column.layer_names().collect();
    assert_eq!(names.len(), 10);
    assert!(!names.contains(&"CompLayer_9"));
    assert_eq!(column.terrain_height, TERRAIN);

    // CompLayer_10 is measured from CompLayer_8, the nearest kept layer above.
    let layer_10 = column.layers.iter().find(|l| l.name == "CompLayer_10").expect("kept");
    assert_eq!(layer_10.thickness, LAYER_THICKNESS + 0.5);

    let top = find_topmost_aquifer(DkModel::Dk1, column.layer_names()).expect("aquifer present");
    assert_eq!(top.elevation, "CompLayer_3");
    assert_eq!(top.dk2019, "ks1");
    assert_eq!(top.head_elevation, 8);
    assert_eq!(top.aquifer, Some("glw1"));
}

#[test]
fn test_topmost_aquifer_skips_absent_aquifers() {
    let ds = dk1_stratigraphy("m");
    let column = extract_soil_column(&ds, &CellLocator::index(2, 0), &SoilColumnOptions::default())
        .expect("extraction should succeed");
    let top = find_topmost_aquifer(DkModel::Dk1, column.layer_names()).expect("aquifer present");
    assert_eq!(top.dk2019, "ks3");
    assert_eq!(top.head_elevation, 4);
}

#[test]
fn test_order_below_match_does_not_matter() {
    let ds = dk1_stratigraphy("m");
    let column = extract_soil_column(&ds, &CellLocator::index(0, 0), &SoilColumnOptions::default())
        .expect("extraction should succeed");
    let mut names: Vec<&str> = column.layer_names().collect();
    let expected = find_topmost_aquifer(DkModel::Dk1, names.iter().copied()).expect("aquifer present");

    names[3..].reverse();
    let reordered = find_topmost_aquifer(DkModel::Dk1, names.iter().copied()).expect("aquifer present");
    assert_eq!(expected, reordered);
}

#[test]
fn test_no_aquifer_in_column() {
    let ds = dk1_stratigraphy("m");
    let column = extract_soil_column(&ds, &CellLocator::index(0, 1), &SoilColumnOptions::default())
        .expect("extraction should succeed");
    assert_eq!(column.layers.len(), 6);
    assert!(matches!(
        find_topmost_aquifer(DkModel::Dk1, column.layer_names()),
        Err(HipError::NoAquiferFound)
    ));
}

#[test]
fn test_soil_column_is_unit_agnostic() {
    let ds = dk1_stratigraphy("m");
    let cell = CellLocator::index(1, 1);
    let in_m = extract_soil_column(&ds, &cell, &SoilColumnOptions::with_base_unit(unit("m")))
        .expect("extraction in m");
    let in_cm = extract_soil_column(&ds, &cell, &SoilColumnOptions::with_base_unit(unit("cm")))
        .expect("extraction in cm");

    assert_eq!(in_m.layers.len(), in_cm.layers.len());
    assert_relative_eq!(in_m.terrain_height * 100.0, in_cm.terrain_height);
    for (m, cm) in in_m.layers.iter().zip(&in_cm.layers) {
        assert_eq!(m.name, cm.name);
        assert_relative_eq!(m.elevation * 100.0, cm.elevation, max_relative = 1e-12);
        assert_relative_eq!(m.thickness * 100.0, cm.thickness, max_relative = 1e-12);
    }
}

#[test]
fn test_dataset_in_cm_gives_same_column() {
    let in_m = extract_soil_column(&dk1_stratigraphy("m"), &CellLocator::index(1, 1), &SoilColumnOptions::default())
        .expect("extraction in m");
    let in_cm = extract_soil_column(
        &dk1_stratigraphy("cm"),
        &CellLocator::index(1, 1),
        &SoilColumnOptions::with_base_unit(unit("m")),
    )
    .expect("extraction from cm data");
    assert_eq!(
        in_m.layer_names().collect::<Vec<_>>(),
        in_cm.layer_names().collect::<Vec<_>>()
    );
}

/// Feed an extracted column back in as a one-cell stratigraphy and extract again.
fn reextract(column: &SoilColumn) -> SoilColumn {
    let mut layers = vec![ElevationLayer {
        name: "Topography".to_string(),
        units: column.unit.to_string(),
        values: Array3::from_elem((1, 1, 1), column.terrain_height),
    }];
    layers.extend(column.layers.iter().map(|l| ElevationLayer {
        name: l.name.clone(),
        units: column.unit.to_string(),
        values: Array3::from_elem((1, 1, 1), l.elevation),
    }));
    let rebuilt = StratigraphyDataset::new(Grid::new(vec![column.x], vec![column.y]), times()[..1].to_vec(), layers)
        .expect("valid single-cell dataset");
    extract_soil_column(&rebuilt, &CellLocator::index(0, 0), &SoilColumnOptions::default())
        .expect("extraction should succeed")
}

#[test]
fn test_pruning_is_idempotent() {
    let ds = dk1_stratigraphy("m");
    let first = extract_soil_column(&ds, &CellLocator::index(2, 0), &SoilColumnOptions::default())
        .expect("extraction should succeed");
    let sentinel = missing_sentinel(&first.unit).expect("length unit");
    assert!(first.layers.iter().all(|l| l.thickness != sentinel));
    assert_eq!(first.layers, reextract(&first).layers);

    // An empty layer directly below an absent one.
    let layers = [("Topography", 20.0), ("CompLayer_1", 19.5), ("CompLayer_2", 19.5), ("CompLayer_3", 15.0)]
        .iter()
        .map(|&(name, value)| ElevationLayer {
            name: name.to_string(),
            units: "m".to_string(),
            values: Array3::from_elem((1, 1, 1), value),
        })
        .collect();
    let ds = StratigraphyDataset::new(Grid::new(vec![0.0], vec![0.0]), times()[..1].to_vec(), layers)
        .expect("valid single-cell dataset");
    let first = extract_soil_column(&ds, &CellLocator::index(0, 0), &SoilColumnOptions::default())
        .expect("extraction should succeed");
    assert!(first.layers.iter().all(|l| l.thickness != sentinel));
    assert_eq!(first.layer_names().collect::<Vec<_>>(), vec!["CompLayer_3"]);
    assert_eq!(first.layers, reextract(&first).layers);
}

// ---------------------------------------------------------------------------
// Grid cell resolution
// ---------------------------------------------------------------------------

#[test]
fn test_coordinate_on_node_is_not_snapped() {
    let cell = grid().resolve(&CellLocator::coordinate(100.0, 900.0)).expect("inside grid");
    assert_eq!((cell.i, cell.j), (1, 1));
    assert!(!cell.snapped);
}

#[test]
fn test_coordinate_between_nodes_snaps_to_nearest() {
    let cell = grid().resolve(&CellLocator::coordinate(130.0, 990.0)).expect("inside grid");
    assert_eq!((cell.i, cell.j), (1, 0));
    assert_eq!((cell.x, cell.y), (100.0, 1000.0));
    assert!(cell.snapped);

    let edge = grid().resolve(&CellLocator::coordinate(240.0, 900.0)).expect("within half a spacing");
    assert_eq!(edge.i, 2);
}

#[test]
fn test_coordinate_one_spacing_outside_is_out_of_bounds() {
    assert!(matches!(
        grid().resolve(&CellLocator::coordinate(300.0, 900.0)),
        Err(HipError::OutOfBounds { axis: "X", .. })
    ));
    assert!(matches!(
        grid().resolve(&CellLocator::coordinate(100.0, 800.0)),
        Err(HipError::OutOfBounds { axis: "Y", .. })
    ));
    assert!(matches!(
        grid().resolve(&CellLocator::index(3, 0)),
        Err(HipError::OutOfBounds { .. })
    ));
}

#[test]
fn test_axes_are_located_independently() {
    let locator = CellLocator {
        x: AxisLocator::Index(2),
        y: AxisLocator::Coordinate(1000.0),
    };
    let cell = grid().resolve(&locator).expect("inside grid");
    assert_eq!((cell.i, cell.j, cell.x, cell.y), (2, 0, 200.0, 1000.0));
}

// ---------------------------------------------------------------------------
// Head elevation
// ---------------------------------------------------------------------------

#[test]
fn test_head_elevation_rows_grouped_by_layer() {
    let ds = dk1_potential();
    let options = HeadElevationOptions {
        layers: Some(vec![8, 6]),
        base_unit: Some(unit("cm")),
    };
    let series = hip::extract_head_elevation(&ds, &CellLocator::index(1, 0), &options).expect("layers exist");

    let got: Vec<(u8, f64)> = series.rows.iter().map(|r| (r.layer, r.head_elevation)).collect();
    assert_eq!(got.len(), 4);
    assert_eq!(got[0].0, 8);
    assert_eq!(got[2].0, 6);
    assert_relative_eq!(got[0].1, head(0, 8, 0, 1) * 100.0);
    assert_relative_eq!(got[1].1, head(1, 8, 0, 1) * 100.0);
    assert!(series.rows[0].time < series.rows[1].time);
}

#[test]
fn test_head_elevation_missing_layer() {
    let options = HeadElevationOptions {
        layers: Some(vec![11]),
        base_unit: None,
    };
    assert!(matches!(
        hip::extract_head_elevation(&dk1_potential(), &CellLocator::index(0, 0), &options),
        Err(HipError::MissingLayer(11))
    ));
}

// ---------------------------------------------------------------------------
// Top-aquifer potential raster
// ---------------------------------------------------------------------------

#[test]
fn test_raster_rejects_malformed_datasets() {
    let mut hs_model = dk1_stratigraphy("m");
    hs_model.layers.clear();
    assert!(matches!(
        extract_top_aquifer_potential(&hs_model, &dk1_potential(), DkModel::Dk1, &TopAquiferOptions::default()),
        Err(HipError::InvalidDataset(_))
    ));

    let mut gw_potential = dk1_potential();
    gw_potential.values = Array4::zeros((1, 1, 1, 1));
    assert!(matches!(
        extract_top_aquifer_potential(&dk1_stratigraphy("m"), &gw_potential, DkModel::Dk1, &TopAquiferOptions::default()),
        Err(HipError::InvalidDataset(_))
    ));
    assert!(matches!(
        hip::extract_head_elevation(&gw_potential, &CellLocator::index(0, 0), &HeadElevationOptions::default()),
        Err(HipError::InvalidDataset(_))
    ));
}

#[test]
fn test_raster_picks_first_present_aquifer_per_pixel() {
    let raster = extract_top_aquifer_potential(
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        DkModel::Dk1,
        &TopAquiferOptions::default(),
    )
    .expect("raster should build");

    assert_eq!(raster.values.shape(), &[2, 2, 3]);
    // (j, i) -> expected pressure layer
    let expected = [((0, 0), 8), ((0, 1), 6), ((0, 2), 4), ((1, 1), 8), ((1, 2), 8)];
    for ((j, i), layer) in expected {
        assert_eq!(raster.source_layer[[j, i]], Some(layer), "pixel ({j}, {i})");
        for t in 0..2 {
            assert_eq!(raster.values[[t, j, i]], head(t, layer, j, i), "pixel ({j}, {i}) t={t}");
        }
    }
}

#[test]
fn test_raster_void_pixel_is_nan() {
    let raster = extract_top_aquifer_potential(
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        DkModel::Dk1,
        &TopAquiferOptions::default(),
    )
    .expect("raster should build");

    assert_eq!(raster.source_layer[[1, 0]], None);
    assert!(raster.values[[0, 1, 0]].is_nan());
    assert!(raster.values[[1, 1, 0]].is_nan());
    assert_eq!(raster.void_count(), 1);
}

#[test]
fn test_raster_unit_conversion_and_metadata() {
    let options = TopAquiferOptions {
        base_unit: Some(unit("cm")),
        ..TopAquiferOptions::default()
    };
    let raster = extract_top_aquifer_potential(&dk1_stratigraphy("m"), &dk1_potential(), DkModel::Dk1, &options)
        .expect("raster should build");
    assert_relative_eq!(raster.values[[1, 0, 0]], head(1, 8, 0, 0) * 100.0);
    assert_eq!(raster.units.to_string(), "cm");
    assert_eq!(raster.x, X.to_vec());
    assert_eq!(raster.x_axis.long_name, "Easting");
    assert_eq!(raster.y_axis.standard_name, "projection_y_coordinates");
}

#[test]
fn test_raster_incompatible_unit() {
    let options = TopAquiferOptions {
        base_unit: Some(unit("s")),
        ..TopAquiferOptions::default()
    };
    assert!(matches!(
        extract_top_aquifer_potential(&dk1_stratigraphy("m"), &dk1_potential(), DkModel::Dk1, &options),
        Err(HipError::IncompatibleUnits { .. })
    ));
}

#[test]
fn test_raster_grid_mismatch() {
    let shifted = dk1_potential_on(Grid::new(vec![50.0, 150.0, 250.0], Y.to_vec()));
    assert!(matches!(
        extract_top_aquifer_potential(&dk1_stratigraphy("m"), &shifted, DkModel::Dk1, &TopAquiferOptions::default()),
        Err(HipError::GridMismatch { axis: "X", .. })
    ));
}

#[test]
fn test_raster_on_potential_subgrid() {
    let sub = dk1_potential_on(Grid::new(vec![100.0, 200.0], vec![1000.0]));
    let raster = extract_top_aquifer_potential(&dk1_stratigraphy("m"), &sub, DkModel::Dk1, &TopAquiferOptions::default())
        .expect("subgrid matches");
    assert_eq!(raster.values.shape(), &[2, 1, 2]);
    assert_eq!(raster.source_layer[[0, 0]], Some(6));
    assert_eq!(raster.source_layer[[0, 1]], Some(4));
}

#[test]
fn test_raster_layer_unknown_to_model() {
    assert!(matches!(
        extract_top_aquifer_potential(&dk1_stratigraphy("m"), &dk1_potential(), DkModel::Dk7, &TopAquiferOptions::default()),
        Err(HipError::UnknownLayer { .. })
    ));
}

// ---------------------------------------------------------------------------
// Daisy input
// ---------------------------------------------------------------------------

#[test]
fn test_prepare_pressure_is_terrain_minus_head() {
    let input = prepare_for_daisy(
        DkModel::Dk1,
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        &CellLocator::index(0, 0),
        &unit("meter"),
    )
    .expect("prepare should succeed");

    assert_eq!(input.top_aquifer.dk2019, "ks1");
    let pressure: Vec<f64> = input.pressure.iter().map(|r| r.pressure).collect();
    assert_eq!(pressure, vec![TERRAIN - head(0, 8, 0, 0), TERRAIN - head(1, 8, 0, 0)]);

    let ddf = input.pressure_table().to_string();
    let lines: Vec<&str> = ddf.split('\n').collect();
    assert_eq!(lines[0], "ddf-0.0 --- pressure table with header");
    assert_eq!(lines[3], "\t\t\t\tmeter");
    assert_eq!(lines[4], "2020\t1\t1\t0\t4.0");
    assert_eq!(lines[5], "2020\t1\t2\t0\t3.5");
}

#[test]
fn test_prepare_in_cm() {
    let input = prepare_for_daisy(
        DkModel::Dk1,
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        &CellLocator::index(0, 0),
        &unit("cm"),
    )
    .expect("prepare should succeed");
    assert_relative_eq!(input.pressure[0].pressure, 400.0);
    assert_relative_eq!(input.soil_column.terrain_height, 5000.0);
}

#[test]
fn test_prepare_csv_outputs() {
    let input = prepare_for_daisy(
        DkModel::Dk1,
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        &CellLocator::coordinate(200.0, 900.0),
        &unit("m"),
    )
    .expect("prepare should succeed");

    let soil = input.soil_column_csv();
    let lines: Vec<&str> = soil.lines().collect();
    assert_eq!(lines[0], "dk_model,X,Y,terrain_height,layer,aquifer,elevation,thickness,unit");
    assert_eq!(lines.len(), 12);
    assert!(lines.iter().any(|l| l.starts_with("DK1,200,900,50,CompLayer_3,true,")));
    assert_eq!(lines.iter().filter(|l| l.contains(",true,")).count(), 1);

    let pressure = input.pressure_csv();
    assert_eq!(pressure.lines().next(), Some("time,pressure,unit"));
    assert_eq!(pressure.lines().count(), 3);
}

#[test]
fn test_prepare_without_aquifer_fails() {
    assert!(matches!(
        prepare_for_daisy(
            DkModel::Dk1,
            &dk1_stratigraphy("m"),
            &dk1_potential(),
            &CellLocator::index(0, 1),
            &unit("m"),
        ),
        Err(HipError::NoAquiferFound)
    ));
}

// ---------------------------------------------------------------------------
// Dataset files
// ---------------------------------------------------------------------------

#[test]
fn test_json_dataset_files() {
    let hs_path = temp_path("hs.json");
    let gw_path = temp_path("gw.json");
    let hs = dk1_stratigraphy("m");
    let gw = dk1_potential();
    hs.save_json(&hs_path).expect("write stratigraphy");
    gw.save_json(&gw_path).expect("write potential");

    let hs_loaded = StratigraphyDataset::open(&hs_path).expect("read stratigraphy");
    let gw_loaded = PotentialDataset::open(&gw_path).expect("read potential");
    let _ = fs::remove_file(&hs_path);
    let _ = fs::remove_file(&gw_path);

    let input = prepare_for_daisy(DkModel::Dk1, &hs_loaded, &gw_loaded, &CellLocator::index(0, 0), &unit("m"))
        .expect("prepare from files");
    assert_eq!(input.pressure.len(), 2);
}

#[test]
fn test_ddf_file_ends_with_newline() {
    let path = temp_path("pressure_table.ddf");
    let input = prepare_for_daisy(
        DkModel::Dk1,
        &dk1_stratigraphy("m"),
        &dk1_potential(),
        &CellLocator::index(0, 0),
        &unit("m"),
    )
    .expect("prepare should succeed");
    input.pressure_table().save(&path).expect("write ddf");
    let text = fs::read_to_string(&path).expect("read ddf");
    let _ = fs::remove_file(&path);
    assert!(text.ends_with("3.5\n"));
    assert_eq!(text.lines().count(), 6);
}
