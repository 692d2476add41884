/// Core data types for the HIP → Daisy extraction tools.
///
/// This module defines the shared domain model imported by all other
/// modules: the DK-model tag, grid-cell locators, the per-cell query
/// results (soil column, head elevation series, top-layer matches) and the
/// `HipError` taxonomy. It holds no extraction logic.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::Unit;

// ---------------------------------------------------------------------------
// Dataset variable names
// ---------------------------------------------------------------------------

/// Name of the ground-surface pseudo-layer that tops every HIP elevation map.
pub const TOPOGRAPHY_LAYER: &str = "Topography";

/// Name of the data variable in HIP head elevation / potential time series.
pub const HEAD_ELEVATION_VARIABLE: &str = "head elevation in saturated zone";

// ---------------------------------------------------------------------------
// DK models
// ---------------------------------------------------------------------------

/// One of the seven regional DK-model variants published through HIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DkModel {
    #[serde(rename = "DK1")]
    Dk1,
    #[serde(rename = "DK2")]
    Dk2,
    #[serde(rename = "DK3")]
    Dk3,
    #[serde(rename = "DK4")]
    Dk4,
    #[serde(rename = "DK5")]
    Dk5,
    #[serde(rename = "DK6")]
    Dk6,
    #[serde(rename = "DK7")]
    Dk7,
}

impl DkModel {
    pub const ALL: [DkModel; 7] = [
        DkModel::Dk1,
        DkModel::Dk2,
        DkModel::Dk3,
        DkModel::Dk4,
        DkModel::Dk5,
        DkModel::Dk6,
        DkModel::Dk7,
    ];

    /// Model number, 1..=7.
    pub fn number(self) -> u8 {
        match self {
            DkModel::Dk1 => 1,
            DkModel::Dk2 => 2,
            DkModel::Dk3 => 3,
            DkModel::Dk4 => 4,
            DkModel::Dk5 => 5,
            DkModel::Dk6 => 6,
            DkModel::Dk7 => 7,
        }
    }

    pub fn from_number(number: u8) -> Result<Self, HipError> {
        DkModel::ALL
            .iter()
            .copied()
            .find(|m| m.number() == number)
            .ok_or_else(|| HipError::UnknownModel(format!("DK{}", number)))
    }

    /// Guess the model from a HIP file name such as `DK1_hydrostratigraphy.nc`.
    ///
    /// HIP names its downloads `DK<N>...`, so the model number is the third
    /// character of the file name.
    pub fn from_filename(path: &str) -> Result<Self, HipError> {
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        file_name
            .chars()
            .nth(2)
            .and_then(|c| c.to_digit(10))
            .and_then(|d| DkModel::from_number(d as u8).ok())
            .ok_or_else(|| HipError::UnknownModel(file_name.to_string()))
    }
}

impl fmt::Display for DkModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DK{}", self.number())
    }
}

impl FromStr for DkModel {
    type Err = HipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_prefix("DK")
            .or_else(|| trimmed.strip_prefix("dk"))
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| HipError::UnknownModel(trimmed.to_string()))?;
        DkModel::from_number(number).map_err(|_| HipError::UnknownModel(trimmed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Grid cells
// ---------------------------------------------------------------------------

/// How to find a grid cell along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisLocator {
    /// Exact integer index into the axis.
    Index(usize),
    /// Projected coordinate; snapped to the nearest grid node.
    Coordinate(f64),
}

/// A grid-cell query. Each axis is located independently, so an index
/// along X may be combined with a coordinate along Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLocator {
    pub x: AxisLocator,
    pub y: AxisLocator,
}

impl CellLocator {
    pub fn index(i: usize, j: usize) -> Self {
        Self {
            x: AxisLocator::Index(i),
            y: AxisLocator::Index(j),
        }
    }

    pub fn coordinate(x: f64, y: f64) -> Self {
        Self {
            x: AxisLocator::Coordinate(x),
            y: AxisLocator::Coordinate(y),
        }
    }
}

/// A grid cell after resolution: indices plus the coordinates of the node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedCell {
    pub i: usize,
    pub j: usize,
    pub x: f64,
    pub y: f64,
    /// True if a requested coordinate was not on a grid node.
    pub snapped: bool,
}

// ---------------------------------------------------------------------------
// Soil column
// ---------------------------------------------------------------------------

/// One physically present stratigraphic layer at a grid cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilLayer {
    /// Layer name in elevation space, e.g. `CompLayer_3`.
    pub name: String,
    /// Elevation of the bottom of the layer.
    pub elevation: f64,
    pub thickness: f64,
}

/// Layer-by-layer stratigraphy at one grid cell, ordered top to bottom.
///
/// Layers whose thickness equals the missing-layer sentinel are not part
/// of the column. `thickness[k] = elevation[k-1] - elevation[k]` with the
/// terrain height standing in for `elevation[-1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilColumn {
    pub x: f64,
    pub y: f64,
    pub unit: Unit,
    /// Ground-surface elevation at the cell.
    pub terrain_height: f64,
    pub layers: Vec<SoilLayer>,
}

impl SoilColumn {
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Head elevation
// ---------------------------------------------------------------------------

/// Head elevation of one pressure-space layer at one time step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadRow {
    /// Layer index in pressure space (0 = deepest).
    pub layer: u8,
    pub time: NaiveDateTime,
    pub head_elevation: f64,
}

/// Head elevation time series at one grid cell, grouped by layer and
/// ordered by time within each layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadElevation {
    pub x: f64,
    pub y: f64,
    pub unit: Unit,
    pub rows: Vec<HeadRow>,
}

// ---------------------------------------------------------------------------
// Layer matches
// ---------------------------------------------------------------------------

/// A layer expressed in every naming space, as returned by the
/// aquifer/aquitard locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopLayer {
    /// HIP elevation name, e.g. `CompLayer_3`.
    pub elevation: &'static str,
    /// HIP pressure index, e.g. `8`.
    pub head_elevation: u8,
    /// DK-model2019 name, e.g. `ks1`.
    pub dk2019: &'static str,
    /// Canonical aquifer id, e.g. `glw1`. `None` for aquitards.
    pub aquifer: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while resolving layers, reconciling units or
/// extracting data from HIP datasets.
#[derive(Debug, Error)]
pub enum HipError {
    /// The model identifier is not one of DK1..DK7.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The layer name is not part of the model's elevation table.
    #[error("Unknown layer {layer} for model {model}")]
    UnknownLayer { model: DkModel, layer: String },

    /// The unit string could not be parsed.
    #[error("Unknown unit: {0:?}")]
    UnknownUnit(String),

    /// A conversion between dimensionally different units was attempted.
    #[error("{layer} does not have a unit equivalent to the base unit: {from} cannot be converted to {to}")]
    IncompatibleUnits {
        layer: String,
        from: String,
        to: String,
    },

    /// The requested grid position lies outside the dataset extent.
    #[error("{axis} = {value} is outside the grid extent [{min}, {max}]")]
    OutOfBounds {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("No aquifer in soil column")]
    NoAquiferFound,

    #[error("No aquitard in soil column")]
    NoAquitardFound,

    /// A requested pressure-space layer is not present in the dataset.
    #[error("Layer {0} not found in head elevation dataset")]
    MissingLayer(u8),

    /// A potential grid coordinate has no counterpart in the stratigraphy grid.
    #[error("{axis} = {value} from the potential grid is not on the stratigraphy grid")]
    GridMismatch { axis: &'static str, value: f64 },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_round_trips_through_display() {
        for model in DkModel::ALL {
            let parsed: DkModel = model.to_string().parse().expect("display form should parse");
            assert_eq!(parsed, model);
        }
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(matches!("DK8".parse::<DkModel>(), Err(HipError::UnknownModel(_))));
        assert!(matches!("DK".parse::<DkModel>(), Err(HipError::UnknownModel(_))));
        assert!(matches!("model1".parse::<DkModel>(), Err(HipError::UnknownModel(_))));
    }

    #[test]
    fn test_model_guessed_from_hip_file_name() {
        let model = DkModel::from_filename("/data/hip/DK4_hydrostratigraphy.nc")
            .expect("DK4 file name should be recognised");
        assert_eq!(model, DkModel::Dk4);
        assert!(DkModel::from_filename("DK9_potential.nc").is_err());
        assert!(DkModel::from_filename("topography.nc").is_err());
    }

    #[test]
    fn test_incompatible_units_message_names_layer() {
        let err = HipError::IncompatibleUnits {
            layer: "CompLayer_4".to_string(),
            from: "s".to_string(),
            to: "meter".to_string(),
        };
        assert!(err.to_string().contains("CompLayer_4"));
    }
}
