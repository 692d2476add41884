/// In-memory HIP datasets.
///
/// Two dataset shapes cover everything the extractors read:
///   - `StratigraphyDataset`: a hydrostratigraphic model, one elevation grid
///     per named layer, ordered top to bottom with the ground surface first
///   - `PotentialDataset`: a head elevation / potential time series over
///     pressure-space layers
///
/// Both carry a `Grid` of projected X/Y node coordinates. Datasets are read
/// from JSON files, or from HIP NetCDF downloads when the `netcdf` feature
/// is enabled.

#[cfg(feature = "netcdf")]
pub mod nc;

use std::fs;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array3, Array4, ArrayView3, s};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logging::{self, DataSource};
use crate::model::{AxisLocator, CellLocator, HipError, ResolvedCell, TOPOGRAPHY_LAYER};

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Node coordinates of a regular projected grid.
///
/// Axes may be ascending or descending but must be monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Grid {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    /// Shape of a (y, x) plane on this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Resolve a cell locator to grid indices.
    ///
    /// Coordinates snap to the nearest node. A snap that moves the point is
    /// logged as a warning; a coordinate further than half a grid spacing
    /// beyond the outermost node is `OutOfBounds`.
    pub fn resolve(&self, locator: &CellLocator) -> Result<ResolvedCell, HipError> {
        let (i, x, snapped_x) = resolve_axis("X", &self.x, locator.x)?;
        let (j, y, snapped_y) = resolve_axis("Y", &self.y, locator.y)?;

        let snapped = snapped_x || snapped_y;
        if snapped {
            let requested = format!("{},{}", describe(locator.x), describe(locator.y));
            logging::warn(
                DataSource::Hip,
                Some(&requested),
                &format!("Coordinate not on a grid node, snapped to ({}, {}) at index ({}, {})", x, y, i, j),
            );
        }

        Ok(ResolvedCell { i, j, x, y, snapped })
    }

    /// Middle index of each axis, the default cell when none is given.
    pub fn center(&self) -> CellLocator {
        CellLocator::index(self.x.len() / 2, self.y.len() / 2)
    }

    fn validate(&self) -> Result<(), HipError> {
        for (name, axis) in [("X", &self.x), ("Y", &self.y)] {
            if axis.is_empty() {
                return Err(HipError::InvalidDataset(format!("{} axis is empty", name)));
            }
            if axis.iter().any(|v| !v.is_finite()) {
                return Err(HipError::InvalidDataset(format!("{} axis has non-finite coordinates", name)));
            }
            let ascending = axis.windows(2).all(|w| w[0] < w[1]);
            let descending = axis.windows(2).all(|w| w[0] > w[1]);
            if !ascending && !descending {
                return Err(HipError::InvalidDataset(format!("{} axis is not monotonic", name)));
            }
        }
        Ok(())
    }
}

fn describe(locator: AxisLocator) -> String {
    match locator {
        AxisLocator::Index(i) => format!("#{}", i),
        AxisLocator::Coordinate(c) => c.to_string(),
    }
}

/// Resolve one axis: (index, node coordinate, snapped).
fn resolve_axis(
    axis: &'static str,
    coords: &[f64],
    locator: AxisLocator,
) -> Result<(usize, f64, bool), HipError> {
    let (first, last) = match (coords.first(), coords.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(HipError::InvalidDataset(format!("{} axis is empty", axis))),
    };
    let (min, max) = (first.min(last), first.max(last));

    match locator {
        AxisLocator::Index(i) => {
            if i >= coords.len() {
                return Err(HipError::OutOfBounds {
                    axis,
                    value: i as f64,
                    min: 0.0,
                    max: (coords.len() - 1) as f64,
                });
            }
            Ok((i, coords[i], false))
        }
        AxisLocator::Coordinate(value) => {
            let half_spacing = if coords.len() > 1 {
                (max - min) / (coords.len() - 1) as f64 / 2.0
            } else {
                0.0
            };
            if !value.is_finite() || value < min - half_spacing || value > max + half_spacing {
                return Err(HipError::OutOfBounds { axis, value, min, max });
            }

            let mut best = 0;
            for (k, c) in coords.iter().enumerate() {
                if (c - value).abs() < (coords[best] - value).abs() {
                    best = k;
                }
            }
            let node = coords[best];
            Ok((best, node, node != value))
        }
    }
}

// ---------------------------------------------------------------------------
// Stratigraphy
// ---------------------------------------------------------------------------

/// One named layer of a hydrostratigraphic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationLayer {
    /// Layer name in elevation space, `Topography` for the ground surface.
    pub name: String,
    /// Unit attribute as stored in the source, e.g. `EumUnit.eumUmeter`.
    pub units: String,
    /// Elevation of the bottom of the layer, indexed (time, y, x).
    pub values: Array3<f64>,
}

/// A HIP hydrostratigraphic model: elevation layers ordered top to bottom,
/// the first one being the ground surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratigraphyDataset {
    #[serde(flatten)]
    pub grid: Grid,
    pub time: Vec<NaiveDateTime>,
    pub layers: Vec<ElevationLayer>,
}

impl StratigraphyDataset {
    pub fn new(grid: Grid, time: Vec<NaiveDateTime>, layers: Vec<ElevationLayer>) -> Result<Self, HipError> {
        let ds = Self { grid, time, layers };
        ds.validate()?;
        Ok(ds)
    }

    /// Read a dataset, by extension: `.nc` (feature `netcdf`) or JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HipError> {
        let path = path.as_ref();
        let ds: Self = if is_netcdf(path) {
            open_netcdf_stratigraphy(path)?
        } else {
            read_json(path)?
        };
        ds.validate()?;
        logging::debug(
            DataSource::Hip,
            None,
            &format!("Loaded {} layers on a {}x{} grid from {}", ds.layers.len(), ds.grid.x.len(), ds.grid.y.len(), path.display()),
        );
        Ok(ds)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), HipError> {
        write_json(path.as_ref(), self)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    pub fn validate(&self) -> Result<(), HipError> {
        self.grid.validate()?;
        if self.time.is_empty() {
            return Err(HipError::InvalidDataset("stratigraphy has no time steps".to_string()));
        }
        if self.layers.len() < 2 {
            return Err(HipError::InvalidDataset(
                "stratigraphy needs a ground surface and at least one layer".to_string(),
            ));
        }
        if self.layers[0].name != TOPOGRAPHY_LAYER {
            logging::debug(
                DataSource::Hip,
                None,
                &format!("First layer is {}, treating it as the ground surface", self.layers[0].name),
            );
        }
        let (ny, nx) = self.grid.shape();
        let expected = [self.time.len(), ny, nx];
        for layer in &self.layers {
            if layer.values.shape() != expected {
                return Err(HipError::InvalidDataset(format!(
                    "layer {} has shape {:?}, expected {:?}",
                    layer.name,
                    layer.values.shape(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Potential / head elevation
// ---------------------------------------------------------------------------

/// A HIP head elevation / groundwater potential time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialDataset {
    #[serde(flatten)]
    pub grid: Grid,
    pub time: Vec<NaiveDateTime>,
    /// Pressure-space layer index of each slab along the layer axis.
    pub layers: Vec<u8>,
    /// Unit attribute of the head elevation variable.
    pub units: String,
    /// Head elevation, indexed (time, layer, y, x).
    pub values: Array4<f64>,
}

impl PotentialDataset {
    pub fn new(
        grid: Grid,
        time: Vec<NaiveDateTime>,
        layers: Vec<u8>,
        units: impl Into<String>,
        values: Array4<f64>,
    ) -> Result<Self, HipError> {
        let ds = Self {
            grid,
            time,
            layers,
            units: units.into(),
            values,
        };
        ds.validate()?;
        Ok(ds)
    }

    /// Read a dataset, by extension: `.nc` (feature `netcdf`) or JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HipError> {
        let path = path.as_ref();
        let ds: Self = if is_netcdf(path) {
            open_netcdf_potential(path)?
        } else {
            read_json(path)?
        };
        ds.validate()?;
        logging::debug(
            DataSource::Hip,
            None,
            &format!("Loaded {} time steps of {} layers from {}", ds.time.len(), ds.layers.len(), path.display()),
        );
        Ok(ds)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), HipError> {
        write_json(path.as_ref(), self)
    }

    /// Position of pressure layer `layer` along the layer axis.
    pub fn layer_index(&self, layer: u8) -> Result<usize, HipError> {
        self.layers
            .iter()
            .position(|&l| l == layer)
            .ok_or(HipError::MissingLayer(layer))
    }

    /// The (time, y, x) slab of one pressure layer.
    pub fn slab(&self, layer: u8) -> Result<ArrayView3<'_, f64>, HipError> {
        let k = self.layer_index(layer)?;
        Ok(self.values.slice(s![.., k, .., ..]))
    }

    pub fn validate(&self) -> Result<(), HipError> {
        self.grid.validate()?;
        if self.time.is_empty() {
            return Err(HipError::InvalidDataset("potential has no time steps".to_string()));
        }
        let (ny, nx) = self.grid.shape();
        let expected = [self.time.len(), self.layers.len(), ny, nx];
        if self.values.shape() != expected {
            return Err(HipError::InvalidDataset(format!(
                "potential has shape {:?}, expected {:?}",
                self.values.shape(),
                expected
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn is_netcdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("nc"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, HipError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), HipError> {
    let text = serde_json::to_string(value)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(feature = "netcdf")]
fn open_netcdf_stratigraphy(path: &Path) -> Result<StratigraphyDataset, HipError> {
    nc::read_stratigraphy(path)
}

#[cfg(not(feature = "netcdf"))]
fn open_netcdf_stratigraphy(path: &Path) -> Result<StratigraphyDataset, HipError> {
    Err(netcdf_disabled(path))
}

#[cfg(feature = "netcdf")]
fn open_netcdf_potential(path: &Path) -> Result<PotentialDataset, HipError> {
    nc::read_potential(path)
}

#[cfg(not(feature = "netcdf"))]
fn open_netcdf_potential(path: &Path) -> Result<PotentialDataset, HipError> {
    Err(netcdf_disabled(path))
}

#[cfg(not(feature = "netcdf"))]
fn netcdf_disabled(path: &Path) -> HipError {
    HipError::InvalidDataset(format!(
        "{}: NetCDF support is not enabled, rebuild with --features netcdf",
        path.display()
    ))
}

// ---------------------------------------------------------------------------
// CF time decoding
// ---------------------------------------------------------------------------

/// Day the Gregorian calendar takes over in the CF `standard` calendar.
const GREGORIAN_REFORM: (i32, u32, u32) = (1582, 10, 15);

/// CF calendars that decode onto chrono's proleptic Gregorian dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Calendar {
    /// Julian before 1582-10-15, Gregorian after (`standard`, `gregorian`, or no attribute).
    Standard,
    ProlepticGregorian,
}

impl Calendar {
    fn parse(calendar: Option<&str>) -> Result<Self, HipError> {
        match calendar.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("standard") | Some("gregorian") => Ok(Calendar::Standard),
            Some("proleptic_gregorian") => Ok(Calendar::ProlepticGregorian),
            Some(other) => Err(HipError::InvalidDataset(format!("unsupported calendar '{}'", other))),
        }
    }
}

fn before_reform(t: &NaiveDateTime) -> bool {
    (t.year(), t.month(), t.day()) < GREGORIAN_REFORM
}

/// The proleptic Gregorian date-time of a Julian calendar date-time.
fn julian_to_gregorian(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month, day) = (i64::from(t.year()), i64::from(t.month()), i64::from(t.day()));
    let a = (14 - month) / 12;
    let y = year + 4800 - a;
    let m = month + 12 * a - 3;
    let julian_day = day + (153 * m + 2) / 5 + 365 * y + y / 4 - 32083;
    // Julian day 1721426 is 0001-01-01 in the proleptic Gregorian calendar.
    let days_from_ce = i32::try_from(julian_day - 1_721_425).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days_from_ce).map(|d| d.and_time(t.time()))
}

/// Decode CF-style time offsets, e.g. units `hours since 1990-01-01 00:00:00`.
///
/// `calendar` is the variable's CF `calendar` attribute. Under the default
/// `standard` calendar an origin before 1582-10-15 is a Julian date, as in
/// HIP files counting from year 1; decoded times before the reform are
/// rejected.
pub fn decode_time(units: &str, calendar: Option<&str>, offsets: &[f64]) -> Result<Vec<NaiveDateTime>, HipError> {
    let invalid = || HipError::InvalidDataset(format!("unsupported time units '{}'", units));
    let calendar = Calendar::parse(calendar)?;

    let (step, origin) = units.split_once(" since ").ok_or_else(invalid)?;
    let seconds_per_step = match step.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "s" => 1.0,
        "minutes" | "minute" | "min" => 60.0,
        "hours" | "hour" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        _ => return Err(invalid()),
    };

    let origin = origin.trim();
    let origin = NaiveDateTime::parse_from_str(origin, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(origin, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(origin, "%Y-%m-%d %H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(origin, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| invalid())?;
    let origin = if calendar == Calendar::Standard && before_reform(&origin) {
        julian_to_gregorian(origin).ok_or_else(invalid)?
    } else {
        origin
    };

    offsets
        .iter()
        .map(|&offset| {
            if !offset.is_finite() {
                return Err(invalid());
            }
            let millis = (offset * seconds_per_step * 1000.0).round() as i64;
            let time = origin
                .checked_add_signed(Duration::milliseconds(millis))
                .ok_or_else(invalid)?;
            if calendar == Calendar::Standard && before_reform(&time) {
                return Err(HipError::InvalidDataset(format!(
                    "time offset {} {} falls before the Gregorian calendar",
                    offset, units
                )));
            }
            Ok(time)
        })
        .collect()
}
