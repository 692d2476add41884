/// Time-indexed weather tables assembled from DMI series.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a parameter's series was taken from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMatch {
    pub parameter: String,
    pub station_id: String,
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Render station matches as CSV with columns `par,id,dist,lat,lon`.
pub fn matches_to_csv(matches: &[StationMatch]) -> String {
    let mut out = String::from("par,id,dist,lat,lon\n");
    for m in matches {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            m.parameter, m.station_id, m.distance_km, m.latitude, m.longitude
        ));
    }
    out
}

/// One column per parameter, rows sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherTable {
    columns: Vec<String>,
    rows: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>>,
}

impl WeatherTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter column. Later values for the same time overwrite
    /// earlier ones.
    pub fn insert_series(&mut self, parameter: &str, series: &[(DateTime<Utc>, f64)]) {
        if !self.columns.iter().any(|c| c == parameter) {
            self.columns.push(parameter.to_string());
        }
        for (time, value) in series {
            self.rows
                .entry(*time)
                .or_default()
                .insert(parameter.to_string(), *value);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, time: &DateTime<Utc>, parameter: &str) -> Option<f64> {
        self.rows.get(time).and_then(|r| r.get(parameter)).copied()
    }

    /// CSV with a leading `time` column; missing values are empty fields.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("time");
        for column in &self.columns {
            out.push(',');
            out.push_str(column);
        }
        out.push('\n');

        for (time, values) in &self.rows {
            out.push_str(&time.format("%Y-%m-%d %H:%M:%S").to_string());
            for column in &self.columns {
                out.push(',');
                if let Some(v) = values.get(column) {
                    out.push_str(&v.to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 6, 1, h, 0, 0).single().expect("valid test time")
    }

    #[test]
    fn test_rows_sorted_and_gaps_left_empty() {
        let mut table = WeatherTable::new();
        table.insert_series("mean_temp", &[(hour(2), 14.5), (hour(1), 13.0)]);
        table.insert_series("acc_precip", &[(hour(2), 0.25)]);

        let csv = table.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "time,mean_temp,acc_precip");
        assert_eq!(lines[1], "2022-06-01 01:00:00,13,");
        assert_eq!(lines[2], "2022-06-01 02:00:00,14.5,0.25");
    }

    #[test]
    fn test_duplicate_time_keeps_last_value() {
        let mut table = WeatherTable::new();
        table.insert_series("mean_temp", &[(hour(1), 10.0), (hour(1), 11.0)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&hour(1), "mean_temp"), Some(11.0));
    }

    #[test]
    fn test_station_matches_csv() {
        let csv = matches_to_csv(&[StationMatch {
            parameter: "mean_temp".to_string(),
            station_id: "06186".to_string(),
            distance_km: 3.5,
            latitude: 55.6761,
            longitude: 12.5683,
        }]);
        assert_eq!(csv.lines().nth(1), Some("mean_temp,06186,3.5,55.6761,12.5683"));
    }
}
