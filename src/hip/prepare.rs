/// Assemble Daisy input for one grid cell from HIP data.
///
/// The soil column at the cell determines the topmost aquifer; its head
/// elevation series is turned into a groundwater pressure level relative
/// to the terrain (terrain height − head elevation).

use chrono::NaiveDateTime;
use serde::Serialize;

use super::aquifer::find_topmost_aquifer;
use super::head_elevation::{HeadElevationOptions, extract_head_elevation};
use super::soil_column::{SoilColumnOptions, extract_soil_column};
use crate::dataset::{PotentialDataset, StratigraphyDataset};
use crate::ddf::PressureTable;
use crate::logging::{self, DataSource};
use crate::model::{CellLocator, DkModel, HeadElevation, HipError, SoilColumn, TopLayer};
use crate::units::Unit;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureRow {
    pub time: NaiveDateTime,
    pub pressure: f64,
}

/// Everything Daisy needs from HIP at one cell, in one unit.
#[derive(Debug, Clone, Serialize)]
pub struct DaisyInput {
    pub model: DkModel,
    pub soil_column: SoilColumn,
    pub top_aquifer: TopLayer,
    pub head_elevation: HeadElevation,
    pub pressure: Vec<PressureRow>,
}

pub fn prepare_for_daisy(
    model: DkModel,
    hs_model: &StratigraphyDataset,
    gw_potential: &PotentialDataset,
    locator: &CellLocator,
    unit: &Unit,
) -> Result<DaisyInput, HipError> {
    let soil_column = extract_soil_column(hs_model, locator, &SoilColumnOptions::with_base_unit(unit.clone()))?;
    let top_aquifer = find_topmost_aquifer(model, soil_column.layer_names())?;

    // The head series is read at the node the soil column resolved to.
    let cell = CellLocator::coordinate(soil_column.x, soil_column.y);
    let head_elevation = extract_head_elevation(
        gw_potential,
        &cell,
        &HeadElevationOptions {
            layers: Some(vec![top_aquifer.head_elevation]),
            base_unit: Some(unit.clone()),
        },
    )?;

    let pressure = head_elevation
        .rows
        .iter()
        .map(|row| PressureRow {
            time: row.time,
            pressure: soil_column.terrain_height - row.head_elevation,
        })
        .collect();

    logging::info(
        DataSource::Hip,
        Some(&format!("{},{}", soil_column.x, soil_column.y)),
        &format!(
            "{}: top aquifer {} ({}, pressure layer {}), {} layers in column",
            model,
            top_aquifer.elevation,
            top_aquifer.dk2019,
            top_aquifer.head_elevation,
            soil_column.layers.len()
        ),
    );

    Ok(DaisyInput {
        model,
        soil_column,
        top_aquifer,
        head_elevation,
        pressure,
    })
}

impl DaisyInput {
    pub fn unit(&self) -> &Unit {
        &self.soil_column.unit
    }

    /// Soil column CSV: `dk_model,X,Y,terrain_height,layer,aquifer,elevation,thickness,unit`.
    pub fn soil_column_csv(&self) -> String {
        let column = &self.soil_column;
        let mut out = String::from("dk_model,X,Y,terrain_height,layer,aquifer,elevation,thickness,unit\n");
        for layer in &column.layers {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                self.model,
                column.x,
                column.y,
                column.terrain_height,
                layer.name,
                layer.name == self.top_aquifer.elevation,
                layer.elevation,
                layer.thickness,
                column.unit
            ));
        }
        out
    }

    /// Pressure CSV: `time,pressure,unit`.
    pub fn pressure_csv(&self) -> String {
        let mut out = String::from("time,pressure,unit\n");
        for row in &self.pressure {
            out.push_str(&format!(
                "{},{},{}\n",
                row.time.format("%Y-%m-%d %H:%M:%S"),
                row.pressure,
                self.unit()
            ));
        }
        out
    }

    pub fn pressure_table(&self) -> PressureTable {
        PressureTable::new(
            self.unit().to_string(),
            self.pressure.iter().map(|r| (r.time, r.pressure)).collect(),
        )
    }
}
