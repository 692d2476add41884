/// Helpers for DMI queries: datetime arguments, distances and the Danish
/// square grid used for DMI's gridded climate data.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::DmiError;

/// Mean Earth diameter in km.
pub const EARTH_DIAMETER_KM: f64 = 12742.0;

// ---------------------------------------------------------------------------
// Query arguments
// ---------------------------------------------------------------------------

/// Build the `datetime` query argument: `from/to`, a single instant, or none.
pub fn construct_datetime_argument(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Option<String> {
    let iso = |t: NaiveDateTime| format!("{}Z", t.format("%Y-%m-%dT%H:%M:%S"));
    match (from, to) {
        (None, None) => None,
        (Some(from), None) => Some(iso(from)),
        (None, Some(to)) => Some(iso(to)),
        (Some(from), Some(to)) => Some(format!("{}/{}", iso(from), iso(to))),
    }
}

/// Haversine distance in km between two WGS84 points.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p = std::f64::consts::PI / 180.0;
    let a = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
        + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lon2 - lon1) * p).cos()) / 2.0;
    EARTH_DIAMETER_KM * a.sqrt().asin()
}

// ---------------------------------------------------------------------------
// ETRS89 / UTM zone 32N (EPSG:25832)
// ---------------------------------------------------------------------------

/// GRS80 and WGS84 differ by < 0.1 mm at these latitudes; WGS84 constants are used.
const ELLIPSOID_A: f64 = 6378137.0;
const ELLIPSOID_F: f64 = 1.0 / 298.257223563;
const ELLIPSOID_B: f64 = ELLIPSOID_A * (1.0 - ELLIPSOID_F);
const ELLIPSOID_E2: f64 = 2.0 * ELLIPSOID_F - ELLIPSOID_F * ELLIPSOID_F;
const ELLIPSOID_EP2: f64 = ELLIPSOID_E2 / (1.0 - ELLIPSOID_E2);
const UTM_K0: f64 = 0.9996;
const UTM_ZONE: u8 = 32;

/// Project WGS84 (lat, lon) to UTM 32N (easting, northing) in meters.
pub fn utm32_from_wgs84(latitude: f64, longitude: f64) -> Result<(f64, f64), DmiError> {
    if !(-80.0..=84.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(DmiError::InvalidCoordinate { latitude, longitude });
    }

    let lat = latitude.to_radians();
    let central_lon = (f64::from(UTM_ZONE) * 6.0 - 183.0).to_radians();

    let n = ELLIPSOID_A / (1.0 - ELLIPSOID_E2 * lat.sin().powi(2)).sqrt();
    let t = lat.tan().powi(2);
    let c = ELLIPSOID_EP2 * lat.cos().powi(2);
    let a = (longitude.to_radians() - central_lon) * lat.cos();
    let m = meridian_arc(lat);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ELLIPSOID_EP2) * a.powi(5) / 120.0);
    let y = UTM_K0
        * (m + n
            * lat.tan()
            * (a.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ELLIPSOID_EP2) * a.powi(6) / 720.0));

    let easting = x + 500000.0;
    let northing = if latitude >= 0.0 { y } else { y + 10000000.0 };
    Ok((easting, northing))
}

fn meridian_arc(lat: f64) -> f64 {
    let n = (ELLIPSOID_A - ELLIPSOID_B) / (ELLIPSOID_A + ELLIPSOID_B);
    let a0 = ELLIPSOID_A * (1.0 - n + (5.0 / 4.0) * (n.powi(2) - n.powi(3)) + (81.0 / 64.0) * (n.powi(4) - n.powi(5)));
    let a2 = (3.0 / 2.0) * ELLIPSOID_A * (n - n.powi(2) + (7.0 / 8.0) * (n.powi(3) - n.powi(4)) + (55.0 / 64.0) * n.powi(5));
    let a4 = (15.0 / 16.0) * ELLIPSOID_A * (n.powi(2) - n.powi(3) + (3.0 / 4.0) * (n.powi(4) - n.powi(5)));
    let a6 = (35.0 / 48.0) * ELLIPSOID_A * (n.powi(3) - n.powi(4) + (11.0 / 16.0) * n.powi(5));
    let a8 = (315.0 / 512.0) * ELLIPSOID_A * (n.powi(4) - n.powi(5));
    a0 * lat - a2 * (2.0 * lat).sin() + a4 * (4.0 * lat).sin() - a6 * (6.0 * lat).sin() + a8 * (8.0 * lat).sin()
}

// ---------------------------------------------------------------------------
// Danish square grid
// ---------------------------------------------------------------------------

/// Cell size of DMI's gridded climate data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSize {
    Km10,
    Km20,
}

impl GridSize {
    fn resolution_m(self) -> f64 {
        match self {
            GridSize::Km10 => 10000.0,
            GridSize::Km20 => 20000.0,
        }
    }

    /// Cell ids count in units of 10 km regardless of size.
    fn multiplier(self) -> i64 {
        match self {
            GridSize::Km10 => 1,
            GridSize::Km20 => 2,
        }
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridSize::Km10 => write!(f, "10km"),
            GridSize::Km20 => write!(f, "20km"),
        }
    }
}

impl FromStr for GridSize {
    type Err = DmiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "10km" => Ok(GridSize::Km10),
            "20km" => Ok(GridSize::Km20),
            other => Err(DmiError::UnsupportedGridSize(other.to_string())),
        }
    }
}

/// Id of the grid cell containing a WGS84 point, e.g. `10km_617_72`.
pub fn grid_cell_id(latitude: f64, longitude: f64, size: GridSize) -> Result<String, DmiError> {
    let (east, north) = utm32_from_wgs84(latitude, longitude)?;
    let r = size.resolution_m();
    let m = size.multiplier();
    let n = (north / r).trunc() as i64 * m;
    let e = (east / r).trunc() as i64 * m;
    Ok(format!("{}_{}_{}", size, n, e))
}
