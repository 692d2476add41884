/// Top-aquifer potential raster.
///
/// For every pixel of the potential grid, independently, pick the
/// shallowest aquifer layer that is physically present at that pixel and
/// take the potential of that layer for all time steps. The per-pixel
/// choice is a fold over the candidate aquifers in top-to-bottom order,
/// carrying a "not yet selected" mask.
///
/// Pixels where no candidate is present are NaN, with `source_layer` None.

use std::path::Path;

use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, Zip, s};
use serde::Serialize;

use crate::dataset::{self, PotentialDataset, StratigraphyDataset};
use crate::layers;
use crate::logging::{self, DataSource};
use crate::model::{DkModel, HEAD_ELEVATION_VARIABLE, HipError};
use crate::units::{self, Unit};

/// Options for [`extract_top_aquifer_potential`].
#[derive(Debug, Clone)]
pub struct TopAquiferOptions {
    /// Output unit. `None` keeps the potential dataset unit.
    pub base_unit: Option<Unit>,
    /// Thickness of absent layers, expressed as a unit (default `0.5m`).
    pub missing_layer_unit: Unit,
}

impl Default for TopAquiferOptions {
    fn default() -> Self {
        Self {
            base_unit: None,
            missing_layer_unit: Unit::missing_layer_default(),
        }
    }
}

/// Descriptive attributes of a projected coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisMetadata {
    pub axis: &'static str,
    pub long_name: &'static str,
    pub standard_name: &'static str,
}

pub const X_AXIS: AxisMetadata = AxisMetadata {
    axis: "x",
    long_name: "Easting",
    standard_name: "projection_x_coordinates",
};

pub const Y_AXIS: AxisMetadata = AxisMetadata {
    axis: "y",
    long_name: "Northing",
    standard_name: "projection_y_coordinates",
};

/// Potential of the topmost present aquifer, indexed (time, y, x).
#[derive(Debug, Clone, Serialize)]
pub struct TopAquiferPotential {
    pub time: Vec<NaiveDateTime>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub units: Unit,
    pub values: Array3<f64>,
    /// Pressure layer each pixel was taken from, indexed (y, x).
    pub source_layer: Array2<Option<u8>>,
    pub x_axis: AxisMetadata,
    pub y_axis: AxisMetadata,
}

impl TopAquiferPotential {
    /// Number of pixels with no present aquifer.
    pub fn void_count(&self) -> usize {
        self.source_layer.iter().filter(|l| l.is_none()).count()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), HipError> {
        dataset::write_json(path.as_ref(), self)
    }

    #[cfg(feature = "netcdf")]
    pub fn save_netcdf(&self, path: impl AsRef<Path>) -> Result<(), HipError> {
        dataset::nc::write_top_aquifer_potential(path.as_ref(), self)
    }
}

/// A candidate aquifer: its position in the stratigraphy and its pressure layer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    layer_index: usize,
    pressure: u8,
}

/// Build the top-aquifer potential raster on the potential dataset's grid.
///
/// Every potential grid coordinate must also be a stratigraphy grid
/// coordinate (`GridMismatch` otherwise).
pub fn extract_top_aquifer_potential(
    hs_model: &StratigraphyDataset,
    gw_potential: &PotentialDataset,
    model: DkModel,
    options: &TopAquiferOptions,
) -> Result<TopAquiferPotential, HipError> {
    hs_model.validate()?;
    gw_potential.validate()?;

    let gw_unit = Unit::parse(&gw_potential.units)?;
    let base = options.base_unit.clone().unwrap_or_else(|| gw_unit.clone());
    let factor = units::conversion_factor(HEAD_ELEVATION_VARIABLE, &gw_unit, &base)?;

    let candidates = possible_aquifers(hs_model, model)?;
    let present = layers_present(hs_model, gw_potential, &candidates, &options.missing_layer_unit)?;
    let selected = select_first_present(&present);

    let (ny, nx) = gw_potential.grid.shape();
    let mut values = Array3::from_elem((gw_potential.time.len(), ny, nx), f64::NAN);
    let mut source_layer = Array2::from_elem((ny, nx), None);

    for (candidate, mask) in candidates.iter().zip(&selected) {
        if !mask.iter().any(|&m| m) {
            continue;
        }
        let slab = gw_potential.slab(candidate.pressure)?;
        for ((j, i), _) in mask.indexed_iter().filter(|(_, m)| **m) {
            values.slice_mut(s![.., j, i]).assign(&slab.slice(s![.., j, i]));
            source_layer[[j, i]] = Some(candidate.pressure);
        }
    }

    if factor != 1.0 {
        values.mapv_inplace(|v| v * factor);
    }

    let raster = TopAquiferPotential {
        time: gw_potential.time.clone(),
        x: gw_potential.grid.x.clone(),
        y: gw_potential.grid.y.clone(),
        units: base,
        values,
        source_layer,
        x_axis: X_AXIS,
        y_axis: Y_AXIS,
    };

    let voids = raster.void_count();
    if voids > 0 {
        logging::warn(
            DataSource::Hip,
            None,
            &format!("{} of {} pixels have no aquifer present, left as NaN", voids, ny * nx),
        );
    }
    Ok(raster)
}

/// Aquifer layers below the ground surface, top to bottom.
fn possible_aquifers(hs_model: &StratigraphyDataset, model: DkModel) -> Result<Vec<Candidate>, HipError> {
    let mut candidates = Vec::new();
    for (k, name) in hs_model.layer_names().enumerate().skip(1) {
        let layer = layers::resolve(model, name)?;
        if layer.aquifer.is_some() {
            candidates.push(Candidate {
                layer_index: k,
                pressure: layer.head_elevation,
            });
        }
    }
    if candidates.is_empty() {
        return Err(HipError::NoAquiferFound);
    }
    Ok(candidates)
}

/// Index of every coordinate of `wanted` along `axis`, matched exactly.
fn match_axis(axis: &'static str, axis_coords: &[f64], wanted: &[f64]) -> Result<Vec<usize>, HipError> {
    wanted
        .iter()
        .map(|&value| {
            axis_coords
                .iter()
                .position(|&c| c == value)
                .ok_or(HipError::GridMismatch { axis, value })
        })
        .collect()
}

/// Per-candidate (y, x) mask of pixels where the layer is present.
fn layers_present(
    hs_model: &StratigraphyDataset,
    gw_potential: &PotentialDataset,
    candidates: &[Candidate],
    missing_layer_unit: &Unit,
) -> Result<Vec<Array2<bool>>, HipError> {
    let cols = match_axis("X", &hs_model.grid.x, &gw_potential.grid.x)?;
    let rows = match_axis("Y", &hs_model.grid.y, &gw_potential.grid.y)?;

    let units = hs_model
        .layers
        .iter()
        .map(|l| Unit::parse(&l.units))
        .collect::<Result<Vec<_>, _>>()?;
    let elevation_unit = &units[0];
    let sentinel = units::sentinel_thickness(missing_layer_unit, elevation_unit)?;

    // Elevation of layer k on the potential grid, in the ground-surface unit.
    let elevation = |k: usize| -> Result<Array2<f64>, HipError> {
        let factor = units::conversion_factor(&hs_model.layers[k].name, &units[k], elevation_unit)?;
        let values = &hs_model.layers[k].values;
        Ok(Array2::from_shape_fn((rows.len(), cols.len()), |(j, i)| {
            values[[0, rows[j], cols[i]]] * factor
        }))
    };

    candidates
        .iter()
        .map(|candidate| {
            let above = elevation(candidate.layer_index - 1)?;
            let bottom = elevation(candidate.layer_index)?;
            Ok(Zip::from(&above).and(&bottom).map_collect(|&a, &b| a - b != sentinel))
        })
        .collect()
}

/// First-present-wins selection, top to bottom, independently per pixel.
///
/// Returns, for each candidate, the pixels it is selected at. A pixel is
/// selected by at most one candidate.
pub fn select_first_present(present: &[Array2<bool>]) -> Vec<Array2<bool>> {
    let Some(first) = present.first() else {
        return Vec::new();
    };
    let mut not_selected = Array2::from_elem(first.raw_dim(), true);
    present
        .iter()
        .map(|layer_present| {
            let selected = Zip::from(layer_present)
                .and(&not_selected)
                .map_collect(|&p, &n| p && n);
            Zip::from(&mut not_selected).and(&selected).for_each(|n, &s| *n ^= s);
            selected
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_first_present_layer_wins_per_pixel() {
        let present = vec![
            array![[true, false, false, false]],
            array![[true, true, false, false]],
            array![[true, true, true, false]],
        ];
        let selected = select_first_present(&present);
        assert_eq!(selected[0], array![[true, false, false, false]]);
        assert_eq!(selected[1], array![[false, true, false, false]]);
        assert_eq!(selected[2], array![[false, false, true, false]]);
    }

    #[test]
    fn test_selection_masks_are_disjoint() {
        let present = vec![array![[true, true], [false, true]], array![[true, false], [true, true]]];
        let selected = select_first_present(&present);
        for j in 0..2 {
            for i in 0..2 {
                let hits = selected.iter().filter(|m| m[[j, i]]).count();
                let any_present = present.iter().any(|m| m[[j, i]]);
                assert_eq!(hits, usize::from(any_present));
            }
        }
    }

    #[test]
    fn test_no_candidates_selects_nothing() {
        assert!(select_first_present(&[]).is_empty());
    }

    #[test]
    fn test_axis_metadata() {
        assert_eq!(X_AXIS.standard_name, "projection_x_coordinates");
        assert_eq!(Y_AXIS.long_name, "Northing");
    }
}
