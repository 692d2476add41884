/// Daisy data file (DDF) pressure tables.
///
/// Tab-separated text with a fixed four-line header:
///
/// ```text
/// ddf-0.0 --- pressure table with header
/// ---
/// Year	Month	Day	Hour	Level
/// 				<unit>
/// ```
///
/// followed by one `year month day hour level` row per time step.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDateTime, Timelike};

pub const HEADER: &str = "ddf-0.0 --- pressure table with header";

#[derive(Debug, Clone, PartialEq)]
pub struct PressureTable {
    pub unit: String,
    pub rows: Vec<(NaiveDateTime, f64)>,
}

impl PressureTable {
    pub fn new(unit: impl Into<String>, rows: Vec<(NaiveDateTime, f64)>) -> Self {
        Self {
            unit: unit.into(),
            rows,
        }
    }

    /// Write the table followed by a trailing newline.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, format!("{}\n", self))
    }
}

impl fmt::Display for PressureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", HEADER)?;
        writeln!(f, "---")?;
        writeln!(f, "Year\tMonth\tDay\tHour\tLevel")?;
        write!(f, "\t\t\t\t{}", self.unit)?;
        for (time, level) in &self.rows {
            write!(
                f,
                "\n{}\t{}\t{}\t{}\t{}",
                time.year(),
                time.month(),
                time.day(),
                time.hour(),
                format_level(*level)
            )?;
        }
        Ok(())
    }
}

/// Whole numbers keep one decimal (`-3.0`) so levels always read as reals.
fn format_level(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
