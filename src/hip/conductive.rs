/// Hydraulic conductivity of DK-model2019 aquitards.
///
/// Values are in m s-1 as published for each model family. Layers without
/// a published value (and every DK7 layer) have no entry.

use crate::model::{DkModel, HipError};
use crate::units::{self, Unit};

/// Unit of the published conductivities.
pub const SOURCE_UNIT: &str = "m s-1";

/// Default output unit, the one Daisy uses.
pub const DEFAULT_UNIT: &str = "cm h-1";

static CONDUCTIVITY_DK1_DK2: &[(&str, f64)] = &[
    ("kl1", 6.73e-6),
    ("kl2", 2.67e-8),
    ("kl3", 2.67e-8),
    ("kl4", 2.67e-8),
];

static CONDUCTIVITY_DK3: &[(&str, f64)] = &[("kl1", 1.25e-6), ("kl3", 1.15e-8)];

static CONDUCTIVITY_DK4_DK6: &[(&str, f64)] = &[("kl1", 6.02e-7), ("kl4", 5.65e-8), ("kl5", 2.13e-7)];

fn table(model: DkModel) -> &'static [(&'static str, f64)] {
    match model {
        DkModel::Dk1 | DkModel::Dk2 => CONDUCTIVITY_DK1_DK2,
        DkModel::Dk3 => CONDUCTIVITY_DK3,
        DkModel::Dk4 | DkModel::Dk5 | DkModel::Dk6 => CONDUCTIVITY_DK4_DK6,
        DkModel::Dk7 => &[],
    }
}

/// Conductivity of `layer` (DK2019 name) in `model`, expressed in `unit`.
///
/// `Ok(None)` if the model has no value for the layer.
pub fn conductive_properties(model: DkModel, layer: &str, unit: &Unit) -> Result<Option<(f64, Unit)>, HipError> {
    let Some(&(_, value)) = table(model).iter().find(|(name, _)| *name == layer) else {
        return Ok(None);
    };
    let source = Unit::parse(SOURCE_UNIT)?;
    let factor = units::conversion_factor(layer, &source, unit)?;
    Ok(Some((value * factor, unit.clone())))
}
