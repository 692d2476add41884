/// Physical units for HIP quantities.
///
/// HIP tags every data variable with a unit string (in practice always
/// `EumUnit.eumUmeter`), and callers ask for results in units such as
/// `meter`, `cm` or `cm h-1`. This module parses those strings into a
/// scale factor over SI base dimensions, so that values can be converted
/// between equivalent units and conversions across dimensions are refused.
///
/// Grammar accepted by [`Unit::parse`]:
///   - an optional leading number scaling the unit, e.g. `0.5m`, `1e-3`
///   - whitespace, `*` or `.` separated factors, each a symbol with an
///     optional integer exponent (`m`, `s-1`, `m^2`)
///   - at most one `/`, dividing by every factor after it (`m/s`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::HipError;

/// Thickness HIP assigns to layers that are absent at a grid cell, in meters.
pub const MISSING_LAYER_THICKNESS_M: f64 = 0.5;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

const LENGTH: usize = 0;
const MASS: usize = 1;
const TIME: usize = 2;
const TEMPERATURE: usize = 3;

type Dimensions = [i8; 4];

const DIMENSIONLESS: Dimensions = [0; 4];

fn dim(index: usize) -> Dimensions {
    let mut d = DIMENSIONLESS;
    d[index] = 1;
    d
}

/// Known unit symbols: (aliases, factor to SI, base dimension).
const SYMBOLS: &[(&[&str], f64, usize)] = &[
    (&["m", "meter", "meters", "metre", "metres"], 1.0, LENGTH),
    (&["cm", "centimeter", "centimeters", "centimetre", "centimetres"], 0.01, LENGTH),
    (&["mm", "millimeter", "millimeters", "millimetre", "millimetres"], 0.001, LENGTH),
    (&["km", "kilometer", "kilometers", "kilometre", "kilometres"], 1000.0, LENGTH),
    (&["ft", "foot", "feet"], 0.3048, LENGTH),
    (&["in", "inch", "inches"], 0.0254, LENGTH),
    (&["s", "sec", "second", "seconds"], 1.0, TIME),
    (&["min", "minute", "minutes"], 60.0, TIME),
    (&["h", "hr", "hour", "hours"], 3600.0, TIME),
    (&["d", "day", "days"], 86400.0, TIME),
    (&["kg", "kilogram", "kilograms"], 1.0, MASS),
    (&["g", "gram", "grams"], 0.001, MASS),
    (&["K", "kelvin"], 1.0, TEMPERATURE),
];

/// HIP (MIKE SHE "EUM") unit codes and the unit they denote.
const HIP_UNIT_CODES: &[(&str, &str)] = &[
    ("EumUnit.eumUmeter", "meter"),
    ("EumUnit.eumUcentimeter", "centimeter"),
    ("EumUnit.eumUmillimeter", "millimeter"),
    ("EumUnit.eumUfeet", "feet"),
];

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// A parsed unit: a scale factor relative to SI and its dimensions.
///
/// Two units compare equal when they have the same dimensions and factor,
/// regardless of spelling (`m` == `meter`).
#[derive(Debug, Clone)]
pub struct Unit {
    symbol: String,
    factor: f64,
    dims: Dimensions,
}

impl Unit {
    pub fn parse(s: &str) -> Result<Self, HipError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(HipError::UnknownUnit(s.to_string()));
        }
        if let Some((_, alias)) = HIP_UNIT_CODES.iter().find(|(code, _)| *code == trimmed) {
            return Unit::parse(alias);
        }

        let (scale, rest) = split_numeric_prefix(trimmed);
        let mut factor = scale;
        let mut dims = DIMENSIONLESS;

        let (numerator, denominator) = match rest.split_once('/') {
            Some((n, d)) => (n, Some(d)),
            None => (rest, None),
        };

        for (part, sign) in [(numerator, 1i8), (denominator.unwrap_or(""), -1i8)] {
            for token in part
                .split(|c: char| c.is_whitespace() || c == '*' || c == '.')
                .filter(|t| !t.is_empty())
            {
                let (symbol_factor, symbol_dims, exponent) =
                    parse_factor(token).ok_or_else(|| HipError::UnknownUnit(s.to_string()))?;
                let exponent = exponent * sign;
                factor *= symbol_factor.powi(i32::from(exponent));
                for (d, sd) in dims.iter_mut().zip(symbol_dims) {
                    *d += sd * exponent;
                }
            }
        }

        if denominator.is_some_and(|d| d.trim().is_empty()) || rest.matches('/').count() > 1 {
            return Err(HipError::UnknownUnit(s.to_string()));
        }

        Ok(Unit {
            symbol: trimmed.to_string(),
            factor,
            dims,
        })
    }

    pub fn meter() -> Self {
        Unit {
            symbol: "meter".to_string(),
            factor: 1.0,
            dims: dim(LENGTH),
        }
    }

    /// Unit whose magnitude is the default missing-layer thickness, `0.5 m`.
    pub fn missing_layer_default() -> Self {
        Unit {
            symbol: "0.5 m".to_string(),
            factor: MISSING_LAYER_THICKNESS_M,
            dims: dim(LENGTH),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// True if values in `self` can be converted to `other`.
    pub fn equivalent(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }

    /// Multiplier taking values in `self` to values in `to`.
    ///
    /// Exactly `1.0` for equal units so that unconverted values stay bit
    /// identical.
    pub fn factor_to(&self, to: &Unit) -> Option<f64> {
        if !self.equivalent(to) {
            return None;
        }
        if self == to {
            return Some(1.0);
        }
        Some(self.factor / to.factor)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.factor == other.factor
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

impl FromStr for Unit {
    type Err = HipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.symbol)
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Unit::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Split `"0.5m"` into `(0.5, "m")`. Strings without a leading number get
/// a scale of one.
fn split_numeric_prefix(s: &str) -> (f64, &str) {
    let starts_numeric = s
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+');
    if !starts_numeric {
        return (1.0, s);
    }
    let candidate_end = s
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    // Back off until the prefix parses, so `2m` and `1e-3 m` both work.
    (1..=candidate_end)
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f64>().ok().map(|v| (v, &s[end..])))
        .unwrap_or((1.0, s))
}

/// Parse one factor such as `m`, `s-1` or `m^2`.
fn parse_factor(token: &str) -> Option<(f64, Dimensions, i8)> {
    let split = token
        .char_indices()
        .find(|&(_, c)| c.is_ascii_digit() || c == '-' || c == '+' || c == '^')
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    let (symbol, exponent) = token.split_at(split);
    let exponent = match exponent.trim_start_matches('^') {
        "" => 1,
        e => e.parse::<i8>().ok()?,
    };
    if symbol == "1" || symbol.is_empty() {
        return None;
    }
    SYMBOLS
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&symbol))
        .map(|(_, factor, base)| (*factor, dim(*base), exponent))
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert `value` from `from` to `to`.
pub fn convert(value: f64, from: &Unit, to: &Unit) -> Result<f64, HipError> {
    Ok(value * conversion_factor("value", from, to)?)
}

/// Multiplier from `from` to `to`, failing with `IncompatibleUnits` naming
/// `layer` when the dimensions differ.
pub fn conversion_factor(layer: &str, from: &Unit, to: &Unit) -> Result<f64, HipError> {
    from.factor_to(to).ok_or_else(|| HipError::IncompatibleUnits {
        layer: layer.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// The fixed 0.5 m missing-layer thickness expressed in `unit`.
pub fn missing_sentinel(unit: &Unit) -> Result<f64, HipError> {
    sentinel_thickness(&Unit::missing_layer_default(), unit)
}

/// Magnitude of a missing-layer unit (e.g. `0.5m`) expressed in `unit`.
pub fn sentinel_thickness(missing_layer_unit: &Unit, unit: &Unit) -> Result<f64, HipError> {
    conversion_factor("missing layer thickness", missing_layer_unit, unit)
}

/// Bring per-layer values onto `base`, in place. `units[k]` is the native
/// unit of `values[k]` and `names[k]` names the layer in error messages.
pub fn reconcile(
    names: &[&str],
    units: &[Unit],
    base: &Unit,
    values: &mut [f64],
) -> Result<(), HipError> {
    for ((name, unit), value) in names.iter().zip(units).zip(values.iter_mut()) {
        let factor = conversion_factor(name, unit, base)?;
        *value *= factor;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit(s: &str) -> Unit {
        Unit::parse(s).unwrap_or_else(|e| panic!("{s:?} should parse: {e}"))
    }

    #[test]
    fn test_spellings_of_meter_are_equal() {
        assert_eq!(unit("m"), unit("meter"));
        assert_eq!(unit("metre"), unit("meters"));
        assert_eq!(unit("EumUnit.eumUmeter"), Unit::meter());
    }

    #[test]
    fn test_hip_unit_code_displays_as_meter() {
        assert_eq!(unit("EumUnit.eumUmeter").to_string(), "meter");
    }

    #[test]
    fn test_length_conversions() {
        assert_eq!(convert(1.25, &unit("m"), &unit("cm")).unwrap(), 125.0);
        assert_relative_eq!(convert(250.0, &unit("mm"), &unit("m")).unwrap(), 0.25);
        assert_relative_eq!(convert(1.0, &unit("ft"), &unit("m")).unwrap(), 0.3048);
        assert_relative_eq!(convert(2.0, &unit("km"), &unit("m")).unwrap(), 2000.0);
    }

    #[test]
    fn test_equal_units_convert_exactly() {
        let v = 0.1 + 0.2;
        assert_eq!(convert(v, &unit("m"), &unit("meter")).unwrap(), v);
    }

    #[test]
    fn test_compound_units() {
        let ms = unit("m s-1");
        let cmh = unit("cm h-1");
        assert!(ms.equivalent(&cmh));
        assert!(ms.equivalent(&unit("m/s")));
        assert_relative_eq!(convert(1.0, &ms, &cmh).unwrap(), 360_000.0, max_relative = 1e-12);
        assert_relative_eq!(convert(1.0, &unit("m^2"), &unit("cm2")).unwrap(), 10_000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_scaled_units() {
        assert_eq!(convert(1.0, &unit("0.5m"), &unit("m")).unwrap(), 0.5);
        assert_eq!(convert(1.0, &unit("0.5 m"), &unit("cm")).unwrap(), 50.0);
        assert_relative_eq!(convert(3.0, &unit("2m"), &unit("m")).unwrap(), 6.0);
    }

    #[test]
    fn test_cross_dimension_conversion_is_rejected() {
        let err = convert(1.0, &unit("m"), &unit("s")).unwrap_err();
        assert!(matches!(err, HipError::IncompatibleUnits { .. }));
        assert!(!unit("m").equivalent(&unit("m s-1")));
    }

    #[test]
    fn test_incompatible_layer_is_named() {
        let err = conversion_factor("CompLayer_5", &unit("h"), &unit("m")).unwrap_err();
        match err {
            HipError::IncompatibleUnits { layer, .. } => assert_eq!(layer, "CompLayer_5"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_units_are_rejected() {
        for s in ["", "furlong", "m/", "m/s/s", "EumUnit.eumUfathom", "m s-x"] {
            assert!(
                matches!(Unit::parse(s), Err(HipError::UnknownUnit(_))),
                "{s:?} should not parse"
            );
        }
    }

    #[test]
    fn test_missing_sentinel_in_common_units() {
        assert_eq!(missing_sentinel(&unit("m")).unwrap(), 0.5);
        assert_eq!(missing_sentinel(&unit("cm")).unwrap(), 50.0);
        assert_eq!(missing_sentinel(&unit("mm")).unwrap(), 500.0);
        assert!(missing_sentinel(&unit("s")).is_err());
    }

    #[test]
    fn test_reconcile_converts_each_layer_from_its_own_unit() {
        let names = ["Topography", "CompLayer_1", "CompLayer_2"];
        let units = [unit("m"), unit("cm"), unit("mm")];
        let mut values = [10.0, 900.0, 8000.0];
        reconcile(&names, &units, &unit("m"), &mut values).unwrap();
        assert_relative_eq!(values[0], 10.0);
        assert_relative_eq!(values[1], 9.0);
        assert_relative_eq!(values[2], 8.0);
    }

    #[test]
    fn test_unit_serializes_as_its_symbol() {
        let json = serde_json::to_string(&unit("cm h-1")).unwrap();
        assert_eq!(json, "\"cm h-1\"");
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit("cm h-1"));
    }
}
