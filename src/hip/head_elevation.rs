/// Head elevation / potential time series at a single grid cell.

use crate::dataset::PotentialDataset;
use crate::model::{CellLocator, HEAD_ELEVATION_VARIABLE, HeadElevation, HeadRow, HipError};
use crate::units::{self, Unit};

/// Options for [`extract_head_elevation`].
#[derive(Debug, Clone, Default)]
pub struct HeadElevationOptions {
    /// Pressure-space layers to extract, in output order. `None` = all.
    pub layers: Option<Vec<u8>>,
    /// Output unit. `None` keeps the dataset unit.
    pub base_unit: Option<Unit>,
}

/// Extract one row per (layer, time step) at the cell, grouped by layer.
pub fn extract_head_elevation(
    ds: &PotentialDataset,
    locator: &CellLocator,
    options: &HeadElevationOptions,
) -> Result<HeadElevation, HipError> {
    ds.validate()?;
    let cell = ds.grid.resolve(locator)?;

    let unit = Unit::parse(&ds.units)?;
    let base = options.base_unit.clone().unwrap_or_else(|| unit.clone());
    let factor = units::conversion_factor(HEAD_ELEVATION_VARIABLE, &unit, &base)?;

    let layers = options.layers.as_deref().unwrap_or(&ds.layers);
    let mut rows = Vec::with_capacity(layers.len() * ds.time.len());
    for &layer in layers {
        let k = ds.layer_index(layer)?;
        for (t, &time) in ds.time.iter().enumerate() {
            rows.push(HeadRow {
                layer,
                time,
                head_elevation: ds.values[[t, k, cell.j, cell.i]] * factor,
            });
        }
    }

    Ok(HeadElevation {
        x: cell.x,
        y: cell.y,
        unit: base,
        rows,
    })
}

/// Render a head elevation series as CSV with columns
/// `X,Y,layer,time,unit,head_elevation`.
pub fn to_csv(series: &HeadElevation) -> String {
    let mut out = String::from("X,Y,layer,time,unit,head_elevation\n");
    for row in &series.rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            series.x,
            series.y,
            row.layer,
            row.time.format("%Y-%m-%d %H:%M:%S"),
            series.unit,
            row.head_elevation
        ));
    }
    out
}
