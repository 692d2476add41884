/// DMI Open Data API Client
///
/// Retrieves weather station metadata, observations (metObs) and climate
/// data (climateData) from the Danish Meteorological Institute. Responses
/// are GeoJSON feature collections.
///
/// API Documentation: https://opendatadocs.dmi.govcloud.dk/en/APIs
/// Base URL: https://dmigw.govcloud.dk/{version}/{api}

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::DmiError;
use super::table::{StationMatch, WeatherTable};
use super::util::{GridSize, construct_datetime_argument, distance_km};
use crate::logging::{self, DataSource};

const DMI_BASE_URL: &str = "https://dmigw.govcloud.dk";
const SUPPORTED_VERSIONS: &[&str] = &["v2"];

/// Attempts per query before giving up.
pub const MAX_ATTEMPTS: u32 = 10;
/// Bounds of the random wait between attempts, in seconds.
pub const RETRY_WAIT_SECS: (f64, f64) = (0.1, 1.0);

pub const DEFAULT_LIMIT: usize = 10000;
/// Limit for full station series.
pub const SERIES_LIMIT: usize = 200000;
/// Limit for full grid-cell series.
pub const GRID_CELL_LIMIT: usize = 300000;

// ============================================================================
// DMI API Response Structures
// ============================================================================

/// GeoJSON feature collection
#[derive(Debug, Deserialize)]
pub struct FeatureCollection<P> {
    #[serde(default = "Vec::new")]
    pub features: Vec<Feature<P>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature<P> {
    pub geometry: Option<Geometry>,
    pub properties: P,
}

/// Point geometry, coordinates are `[lon, lat]`.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

impl Geometry {
    /// (lat, lon) if both are present.
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [Some(lon), Some(lat), ..] => Some((*lat, *lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationProperties {
    pub station_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub parameter_id: Vec<String>,
}

/// Single metObs observation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationProperties {
    pub parameter_id: String,
    pub station_id: Option<String>,
    pub observed: String, // ISO 8601 timestamp
    pub value: Option<f64>,
}

/// Aggregated climateData value over `[from, to)`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueProperties {
    pub parameter_id: Option<String>,
    pub station_id: Option<String>,
    pub cell_id: Option<String>,
    pub from: Option<String>,
    pub to: String,
    pub value: Option<f64>,
}

pub type Station = Feature<StationProperties>;

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmiApi {
    MetObs,
    ClimateData,
}

impl fmt::Display for DmiApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmiApi::MetObs => write!(f, "metObs"),
            DmiApi::ClimateData => write!(f, "climateData"),
        }
    }
}

impl FromStr for DmiApi {
    type Err = DmiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metObs" => Ok(DmiApi::MetObs),
            "climateData" => Ok(DmiApi::ClimateData),
            other => Err(DmiError::UnsupportedApi(other.to_string())),
        }
    }
}

/// Optional filters shared by observation and climate data queries.
#[derive(Debug, Clone, Default)]
pub struct Query<'a> {
    pub parameter: Option<&'a str>,
    pub station_id: Option<&'a str>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub time_resolution: Option<&'a str>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub struct DmiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    api: DmiApi,
    version: String,
}

impl DmiClient {
    pub fn new(api_key: &str, api: DmiApi, version: &str) -> Result<Self, DmiError> {
        if api_key.trim().is_empty() {
            return Err(DmiError::InvalidApiKey);
        }
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DmiError::UnsupportedVersion(version.to_string()));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api,
            version: version.to_string(),
        })
    }

    pub fn base_url(&self, api: DmiApi) -> String {
        format!("{}/{}/{}", DMI_BASE_URL, self.version, api)
    }

    /// GET `service` with retries; fails on transport errors or an error
    /// status carried in the body.
    fn query<T: DeserializeOwned>(
        &self,
        api: DmiApi,
        service: &str,
        params: &[(&str, Option<String>)],
    ) -> Result<T, DmiError> {
        let url = format!("{}/{}", self.base_url(api), service);
        let mut query: Vec<(&str, String)> = vec![("api-key", self.api_key.clone())];
        query.extend(params.iter().filter_map(|(k, v)| v.clone().map(|v| (*k, v))));

        let mut attempt = 1;
        loop {
            match self.query_once(&url, &query) {
                Ok(body) => return serde_json::from_value(body).map_err(|e| DmiError::Parse(e.to_string())),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    let wait = rand::thread_rng().gen_range(RETRY_WAIT_SECS.0..=RETRY_WAIT_SECS.1);
                    logging::debug(
                        DataSource::Dmi,
                        Some(service),
                        &format!("Attempt {}/{} failed ({}), retrying in {:.2}s", attempt, MAX_ATTEMPTS, e, wait),
                    );
                    thread::sleep(Duration::from_secs_f64(wait));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn query_once(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value, DmiError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()?;
        let text = response.text()?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| DmiError::Parse(format!("invalid JSON: {}", e)))?;
        check_status(&body)?;
        Ok(body)
    }

    pub fn get_stations(&self, limit: usize, offset: usize) -> Result<Vec<Station>, DmiError> {
        let res: FeatureCollection<StationProperties> = self.query(
            self.api,
            "collections/station/items",
            &[("limit", Some(limit.to_string())), ("offset", Some(offset.to_string()))],
        )?;
        Ok(res.features)
    }

    /// Raw observations from the metObs API.
    pub fn get_observations(&self, q: &Query<'_>) -> Result<Vec<Feature<ObservationProperties>>, DmiError> {
        let res: FeatureCollection<ObservationProperties> = self.query(
            DmiApi::MetObs,
            "collections/observation/items",
            &[
                ("parameterId", q.parameter.map(String::from)),
                ("stationId", q.station_id.map(String::from)),
                ("datetime", construct_datetime_argument(q.from, q.to)),
                ("limit", Some(q.limit.unwrap_or(DEFAULT_LIMIT).to_string())),
                ("offset", Some(q.offset.to_string())),
            ],
        )?;
        Ok(res.features)
    }

    /// Station values from the climateData API.
    pub fn get_climate_data(&self, q: &Query<'_>) -> Result<Vec<Feature<ValueProperties>>, DmiError> {
        let res: FeatureCollection<ValueProperties> = self.query(
            DmiApi::ClimateData,
            "collections/stationValue/items",
            &[
                ("parameterId", q.parameter.map(String::from)),
                ("stationId", q.station_id.map(String::from)),
                ("datetime", construct_datetime_argument(q.from, q.to)),
                ("timeResolution", q.time_resolution.map(String::from)),
                ("limit", Some(q.limit.unwrap_or(DEFAULT_LIMIT).to_string())),
                ("offset", Some(q.offset.to_string())),
            ],
        )?;
        Ok(res.features)
    }

    /// Nearest station measuring every one of `parameters`.
    pub fn get_closest_station(
        &self,
        latitude: f64,
        longitude: f64,
        parameters: &[&str],
    ) -> Result<Option<(Station, f64)>, DmiError> {
        let stations = self.get_stations(DEFAULT_LIMIT, 0)?;
        Ok(closest_station(stations, latitude, longitude, parameters))
    }

    /// Full climate data series of one parameter at one station.
    pub fn get_series(
        &self,
        parameter: &str,
        station_id: &str,
        time_resolution: &str,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, DmiError> {
        let data = self.get_climate_data(&Query {
            parameter: Some(parameter),
            station_id: Some(station_id),
            time_resolution: Some(time_resolution),
            limit: Some(SERIES_LIMIT),
            ..Query::default()
        })?;
        logging::debug(
            DataSource::Dmi,
            Some(station_id),
            &format!("{}: {} datapoints", parameter, data.len()),
        );
        series_from_features(&data, None)
    }

    /// Weather table for a location, each parameter taken from the nearest
    /// station that measures it, plus where each parameter came from.
    pub fn get_data(
        &self,
        latitude: f64,
        longitude: f64,
        time_resolution: &str,
        parameters: &[&str],
    ) -> Result<(WeatherTable, Vec<StationMatch>), DmiError> {
        let stations = self.get_stations(DEFAULT_LIMIT, 0)?;
        let mut table = WeatherTable::new();
        let mut matches = Vec::new();
        let mut failed = 0;

        for &parameter in parameters {
            let Some((station, dist)) = closest_station(stations.clone(), latitude, longitude, &[parameter]) else {
                let err = DmiError::NoStation(parameter.to_string());
                logging::log_dmi_failure(parameter, "Station lookup", &err);
                failed += 1;
                continue;
            };
            let station_id = station.properties.station_id.clone();
            let (lat, lon) = station.geometry.as_ref().and_then(Geometry::lat_lon).unwrap_or_default();
            logging::info(
                DataSource::Dmi,
                Some(&station_id),
                &format!("Found {} in station {}, {:.1} km away", parameter, station_id, dist),
            );

            matches.push(StationMatch {
                parameter: parameter.to_string(),
                station_id: station_id.clone(),
                distance_km: dist,
                latitude: lat,
                longitude: lon,
            });

            match self.get_series(parameter, &station_id, time_resolution) {
                Ok(series) if series.is_empty() => {
                    logging::warn(DataSource::Dmi, Some(&station_id), &format!("No data for {}, ignoring", parameter));
                    failed += 1;
                }
                Ok(series) => table.insert_series(parameter, &series),
                Err(e) => {
                    logging::log_dmi_failure(&station_id, &format!("Series {}", parameter), &e);
                    failed += 1;
                }
            }
        }

        logging::log_fetch_summary(DataSource::Dmi, parameters.len(), parameters.len() - failed, failed);
        Ok((table, matches))
    }

    /// Gridded climate data series of one parameter in one grid cell,
    /// sorted by time with duplicate timestamps collapsed to the last value.
    pub fn get_grid_cell_data(
        &self,
        cell_id: &str,
        parameter: &str,
        size: GridSize,
        time_resolution: &str,
        limit: usize,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, DmiError> {
        let res: FeatureCollection<ValueProperties> = self.query(
            DmiApi::ClimateData,
            &format!("collections/{}GridValue/items", size),
            &[
                ("cellId", Some(cell_id.to_string())),
                ("limit", Some(limit.to_string())),
                ("timeResolution", Some(time_resolution.to_string())),
                ("parameterId", Some(parameter.to_string())),
            ],
        )?;
        let series = series_from_features(&res.features, Some(parameter))?;
        logging::debug(DataSource::Dmi, Some(cell_id), &format!("{}: {} entries", parameter, series.len()));
        Ok(dedup_keep_last(series))
    }
}

// ============================================================================
// Response Processing
// ============================================================================

/// Fail if the body carries an `http_status_code` other than 200.
pub fn check_status(body: &serde_json::Value) -> Result<(), DmiError> {
    let status = body.get("http_status_code").and_then(|s| s.as_u64()).unwrap_or(200);
    if status != 200 {
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(DmiError::Api { status, message });
    }
    Ok(())
}

/// Nearest station listing every wanted parameter, with its distance in km.
pub fn closest_station(
    stations: Vec<Station>,
    latitude: f64,
    longitude: f64,
    parameters: &[&str],
) -> Option<(Station, f64)> {
    let mut best: Option<(Station, f64)> = None;
    for station in stations {
        let Some((lat, lon)) = station.geometry.as_ref().and_then(Geometry::lat_lon) else {
            continue;
        };
        let has_all = parameters
            .iter()
            .all(|p| station.properties.parameter_id.iter().any(|have| have == p));
        if !has_all {
            continue;
        }
        let dist = distance_km(latitude, longitude, lat, lon);
        if best.as_ref().is_none_or(|(_, d)| dist < *d) {
            best = Some((station, dist));
        }
    }
    best
}

/// (`to`, `value`) pairs, optionally restricted to one parameter. Features
/// without a value are skipped.
pub fn series_from_features(
    features: &[Feature<ValueProperties>],
    parameter: Option<&str>,
) -> Result<Vec<(DateTime<Utc>, f64)>, DmiError> {
    let mut series = Vec::with_capacity(features.len());
    for f in features {
        if let Some(p) = parameter {
            if f.properties.parameter_id.as_deref() != Some(p) {
                continue;
            }
        }
        let Some(value) = f.properties.value else {
            continue;
        };
        series.push((parse_timestamp(&f.properties.to)?, value));
    }
    Ok(series)
}

/// Sort by time; of several values at the same time the last one wins.
pub fn dedup_keep_last(series: Vec<(DateTime<Utc>, f64)>) -> Vec<(DateTime<Utc>, f64)> {
    let unique: std::collections::BTreeMap<_, _> = series.into_iter().collect();
    unique.into_iter().collect()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DmiError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DmiError::Parse(format!("timestamp '{}': {}", s, e)))
}

// ============================================================================
// Tests
// ============================================================================
