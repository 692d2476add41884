/// Soil column extraction at a single grid cell.
///
/// Reads every layer's elevation at the cell, brings all layers onto one
/// working unit, and drops layers HIP marks as absent (thickness equal to
/// the missing-layer sentinel). The ground surface seeds the first
/// thickness and is returned as the terrain height, never as a row.

use crate::dataset::StratigraphyDataset;
use crate::logging::{self, DataSource};
use crate::model::{CellLocator, HipError, SoilColumn, SoilLayer};
use crate::units::{self, Unit};

/// Options for [`extract_soil_column`].
#[derive(Debug, Clone)]
pub struct SoilColumnOptions {
    /// Thickness of absent layers, expressed as a unit (default `0.5m`).
    pub missing_layer_unit: Unit,
    /// Working unit. `None` keeps the unit of the ground-surface layer.
    pub base_unit: Option<Unit>,
}

impl Default for SoilColumnOptions {
    fn default() -> Self {
        Self {
            missing_layer_unit: Unit::missing_layer_default(),
            base_unit: None,
        }
    }
}

impl SoilColumnOptions {
    pub fn with_base_unit(base_unit: Unit) -> Self {
        Self {
            base_unit: Some(base_unit),
            ..Self::default()
        }
    }
}

/// Extract the soil column at one grid cell, top to bottom.
///
/// Elevation is static, so only the first time step is read. Each layer
/// is converted into the working unit before thicknesses are computed;
/// a layer whose unit is not a length fails with `IncompatibleUnits`
/// naming that layer.
pub fn extract_soil_column(
    ds: &StratigraphyDataset,
    locator: &CellLocator,
    options: &SoilColumnOptions,
) -> Result<SoilColumn, HipError> {
    ds.validate()?;
    let cell = ds.grid.resolve(locator)?;

    let names: Vec<&str> = ds.layer_names().collect();
    let units = ds
        .layers
        .iter()
        .map(|l| Unit::parse(&l.units))
        .collect::<Result<Vec<_>, _>>()?;
    let mut elevation: Vec<f64> = ds.layers.iter().map(|l| l.values[[0, cell.j, cell.i]]).collect();

    let base = match &options.base_unit {
        Some(unit) => unit.clone(),
        None => units[0].clone(),
    };
    units::reconcile(&names, &units, &base, &mut elevation)?;

    let sentinel = units::sentinel_thickness(&options.missing_layer_unit, &base)?;

    // A layer is absent when its own thickness, or its thickness below the
    // nearest kept layer, equals the sentinel. Kept layers never carry the
    // sentinel thickness, so re-extracting a column prunes nothing.
    let terrain_height = elevation[0];
    let mut layers = Vec::with_capacity(names.len() - 1);
    let mut above = terrain_height;
    for k in 1..elevation.len() {
        let thickness = above - elevation[k];
        if elevation[k - 1] - elevation[k] == sentinel || thickness == sentinel {
            logging::debug(
                DataSource::Hip,
                Some(&format!("{},{}", cell.x, cell.y)),
                &format!("{} is absent", names[k]),
            );
            continue;
        }
        layers.push(SoilLayer {
            name: names[k].to_string(),
            elevation: elevation[k],
            thickness,
        });
        above = elevation[k];
    }

    Ok(SoilColumn {
        x: cell.x,
        y: cell.y,
        unit: base,
        terrain_height,
        layers,
    })
}

/// Render a soil column as CSV with columns `X,Y,layer,unit,elevation,thickness`.
pub fn to_csv(column: &SoilColumn) -> String {
    let mut out = String::from("X,Y,layer,unit,elevation,thickness\n");
    for layer in &column.layers {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            column.x, column.y, layer.name, column.unit, layer.elevation, layer.thickness
        ));
    }
    out
}
