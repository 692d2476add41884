/// NetCDF I/O for HIP downloads (feature `netcdf`).
///
/// HIP files carry `X`, `Y` and `time` coordinate variables. Stratigraphy
/// files hold one variable per layer (`Topography`, `CompLayer_1`, ...) in
/// file order; head elevation files hold a single
/// `head elevation in saturated zone` variable with an extra `layer` axis.
/// Dimension order varies between products, so variables are permuted into
/// (time, [layer,] y, x) by dimension name.

use std::path::Path;

use ndarray::{ArrayD, Ix3, Ix4, IxDyn};

use super::{ElevationLayer, Grid, PotentialDataset, StratigraphyDataset, decode_time};
use crate::hip::top_aquifer::TopAquiferPotential;
use crate::model::{HEAD_ELEVATION_VARIABLE, HipError};

const X_NAMES: &[&str] = &["X", "x"];
const Y_NAMES: &[&str] = &["Y", "y"];
const TIME_NAMES: &[&str] = &["time"];
const LAYER_NAMES: &[&str] = &["layer"];

/// Coordinate variables that never hold layer data.
const COORDINATE_VARIABLES: &[&str] = &["X", "x", "Y", "y", "time", "layer", "crs", "transverse_mercator"];

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub fn read_stratigraphy(path: &Path) -> Result<StratigraphyDataset, HipError> {
    let file = ::netcdf::open(path)?;
    let grid = read_grid(&file)?;
    let time = read_time(&file)?;

    let mut layers = Vec::new();
    for var in file.variables() {
        let name = var.name();
        if COORDINATE_VARIABLES.contains(&name.as_str()) {
            continue;
        }
        let values = read_ordered(&var, &[TIME_NAMES, Y_NAMES, X_NAMES])?
            .into_dimensionality::<Ix3>()
            .map_err(|e| HipError::InvalidDataset(format!("{}: {}", name, e)))?;
        layers.push(ElevationLayer {
            units: string_attribute(&var, "units").unwrap_or_default(),
            name,
            values,
        });
    }

    StratigraphyDataset::new(grid, time, layers)
}

pub fn read_potential(path: &Path) -> Result<PotentialDataset, HipError> {
    let file = ::netcdf::open(path)?;
    let grid = read_grid(&file)?;
    let time = read_time(&file)?;

    let layers: Vec<u8> = read_coordinate(&file, LAYER_NAMES)?
        .into_iter()
        .map(|l| {
            if l.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&l) {
                Ok(l as u8)
            } else {
                Err(HipError::InvalidDataset(format!("layer coordinate {} is not a layer index", l)))
            }
        })
        .collect::<Result<_, _>>()?;

    let var = file
        .variable(HEAD_ELEVATION_VARIABLE)
        .ok_or_else(|| HipError::InvalidDataset(format!("missing variable '{}'", HEAD_ELEVATION_VARIABLE)))?;
    let values = read_ordered(&var, &[TIME_NAMES, LAYER_NAMES, Y_NAMES, X_NAMES])?
        .into_dimensionality::<Ix4>()
        .map_err(|e| HipError::InvalidDataset(format!("{}: {}", HEAD_ELEVATION_VARIABLE, e)))?;
    let units = string_attribute(&var, "units").unwrap_or_default();

    PotentialDataset::new(grid, time, layers, units, values)
}

fn read_grid(file: &::netcdf::File) -> Result<Grid, HipError> {
    Ok(Grid::new(read_coordinate(file, X_NAMES)?, read_coordinate(file, Y_NAMES)?))
}

fn read_time(file: &::netcdf::File) -> Result<Vec<chrono::NaiveDateTime>, HipError> {
    let var = TIME_NAMES
        .iter()
        .find_map(|name| file.variable(name))
        .ok_or_else(|| HipError::InvalidDataset("missing time coordinate".to_string()))?;
    let offsets: Vec<f64> = var.get_values(..)?;
    let units = string_attribute(&var, "units")
        .ok_or_else(|| HipError::InvalidDataset("time coordinate has no units".to_string()))?;
    let calendar = string_attribute(&var, "calendar");
    decode_time(&units, calendar.as_deref(), &offsets)
}

fn read_coordinate(file: &::netcdf::File, names: &[&str]) -> Result<Vec<f64>, HipError> {
    for name in names {
        if let Some(var) = file.variable(name) {
            return Ok(var.get_values(..)?);
        }
    }
    Err(HipError::InvalidDataset(format!("missing coordinate {}", names.join(" or "))))
}

fn string_attribute(var: &::netcdf::Variable, name: &str) -> Option<String> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            ::netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        })
}

/// Read a variable and permute its axes into `order`, matched by dimension name.
fn read_ordered(var: &::netcdf::Variable, order: &[&[&str]]) -> Result<ArrayD<f64>, HipError> {
    let name = var.name();
    let dims: Vec<(String, usize)> = var.dimensions().iter().map(|d| (d.name(), d.len())).collect();
    if dims.len() != order.len() {
        return Err(HipError::InvalidDataset(format!(
            "{} has {} dimensions, expected {}",
            name,
            dims.len(),
            order.len()
        )));
    }

    let mut permutation = Vec::with_capacity(order.len());
    for wanted in order {
        let position = dims
            .iter()
            .position(|(d, _)| wanted.contains(&d.as_str()))
            .ok_or_else(|| HipError::InvalidDataset(format!("{} has no {} dimension", name, wanted[0])))?;
        permutation.push(position);
    }

    let shape: Vec<usize> = dims.iter().map(|(_, len)| *len).collect();
    let data: Vec<f64> = var.get_values(..)?;
    let array = ArrayD::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| HipError::InvalidDataset(format!("{}: {}", name, e)))?;
    Ok(array.permuted_axes(IxDyn(&permutation)).as_standard_layout().into_owned())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a top-aquifer potential raster as a CF-style (time, y, x) variable.
pub fn write_top_aquifer_potential(path: &Path, raster: &TopAquiferPotential) -> Result<(), HipError> {
    let mut file = ::netcdf::create(path)?;
    let (nt, ny, nx) = raster.values.dim();
    file.add_dimension("time", nt)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;

    {
        let origin = raster.time.first().copied().unwrap_or_default();
        let hours: Vec<f64> = raster
            .time
            .iter()
            .map(|t| (*t - origin).num_seconds() as f64 / 3600.0)
            .collect();
        let mut var = file.add_variable::<f64>("time", &["time"])?;
        var.put_attribute("standard_name", "time")?;
        var.put_attribute("units", format!("hours since {}", origin.format("%Y-%m-%d %H:%M:%S")))?;
        var.put_attribute("calendar", "proleptic_gregorian")?;
        var.put_values(&hours, ..)?;
    }

    for (name, coords, meta) in [("x", &raster.x, &raster.x_axis), ("y", &raster.y, &raster.y_axis)] {
        let mut var = file.add_variable::<f64>(name, &[name])?;
        var.put_attribute("axis", meta.axis)?;
        var.put_attribute("long_name", meta.long_name)?;
        var.put_attribute("standard_name", meta.standard_name)?;
        var.put_values(coords, ..)?;
    }

    let mut var = file.add_variable::<f64>("top_aquifer_potential", &["time", "y", "x"])?;
    var.put_attribute("units", raster.units.to_string())?;
    var.put_attribute("_FillValue", f64::NAN)?;
    let flat: Vec<f64> = raster.values.iter().copied().collect();
    var.put_values(&flat, ..)?;
    Ok(())
}
