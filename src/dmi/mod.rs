/// Danish Meteorological Institute (DMI) open data.
///
/// `client` talks to the metObs and climateData APIs, `table` assembles the
/// returned series, `util` holds query helpers and the Danish grid.

pub mod client;
pub mod table;
pub mod util;

use thiserror::Error;

pub use client::{DmiApi, DmiClient, Query};
pub use table::{StationMatch, WeatherTable, matches_to_csv};
pub use util::{GridSize, grid_cell_id};

/// Parameters fetched by default: precipitation, temperature, humidity,
/// wind speed and global radiation.
pub const DEFAULT_PARAMETERS: &[&str] = &[
    "acc_precip",
    "mean_temp",
    "mean_relative_hum",
    "mean_wind_speed",
    "mean_radiation",
];

pub const DEFAULT_TIME_RESOLUTION: &str = "hour";

#[derive(Debug, Error)]
pub enum DmiError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Unsupported API: {0}")]
    UnsupportedApi(String),

    #[error("Unsupported API version: {0}")]
    UnsupportedVersion(String),

    #[error("Unsupported grid size: {0} (expected 10km or 20km)")]
    UnsupportedGridSize(String),

    #[error("Coordinate ({latitude}, {longitude}) cannot be projected to UTM 32N")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status in the response body.
    #[error("Failed HTTP request with HTTP status code {status} and message: {message}")]
    Api { status: u64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No station with parameter {0} found")]
    NoStation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
