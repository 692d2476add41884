/// Layer name registry for the HIP DK-models.
///
/// HIP data products name the same stratigraphic layers three ways:
///   - elevation space: `CompLayer_<N>` in the hydrostratigraphic model,
///     numbered from the top
///   - pressure space: integer layer index in head elevation / potential
///     time series, 0 being the deepest layer
///   - DK2019 space: the DK-model2019 layer names (`kl1`, `ks1`, `kalk`, ...)
///
/// This module is the single source of truth for how those spaces map onto
/// each other per model, and for which DK2019 layers are aquifers or
/// aquitards. All other modules should look layers up here rather than
/// branching on the model themselves.
///
/// Sources:
///   - Pressure → DK2019: Tabel 1 at https://hip.dataforsyningen.dk/pages/help.html
///   - Elevation → pressure: layer ordering of the HIP downloads

use crate::model::{DkModel, HipError, TopLayer};

// ---------------------------------------------------------------------------
// Elevation → pressure tables
// ---------------------------------------------------------------------------

/// DK1, DK2, DK4, DK5, DK6: eleven computational layers.
static ELEVATION_11: &[(&str, u8)] = &[
    ("CompLayer_1", 10),
    ("CompLayer_2", 9),
    ("CompLayer_3", 8),
    ("CompLayer_4", 7),
    ("CompLayer_5", 6),
    ("CompLayer_6", 5),
    ("CompLayer_7", 4),
    ("CompLayer_8", 3),
    ("CompLayer_9", 2),
    ("CompLayer_10", 1),
    ("CompLayer_11", 0),
];

static ELEVATION_DK3: &[(&str, u8)] = &[
    ("CompLayer_1", 8),
    ("CompLayer_2", 7),
    ("CompLayer_3", 6),
    ("CompLayer_4", 5),
    ("CompLayer_5", 4),
    ("CompLayer_6", 3),
    ("CompLayer_7", 2),
    ("CompLayer_8", 1),
    ("CompLayer_9", 0),
];

static ELEVATION_DK7: &[(&str, u8)] = &[
    ("CompLayer_1", 6),
    ("CompLayer_2", 5),
    ("CompLayer_3", 4),
    ("CompLayer_4", 3),
    ("CompLayer_5", 2),
    ("CompLayer_6", 1),
    ("CompLayer_7", 0),
];

// ---------------------------------------------------------------------------
// Pressure → DK2019 tables
// ---------------------------------------------------------------------------

static PRESSURE_DK1_DK2: &[(u8, &str)] = &[
    (10, "top2m"),
    (9, "kl1"),
    (8, "ks1"), // glw1
    (7, "kl2"),
    (6, "ks2"), // glw2
    (5, "kl3"),
    (4, "ks3"), // glw3
    (3, "kl4"),
    (2, "ks4"), // glw4
    (1, "kl5"),
    (0, "kalk"), // glw6
];

static PRESSURE_DK3: &[(u8, &str)] = &[
    (8, "top2m"),
    (7, "kl1"),
    (6, "ks1"), // glw1
    (5, "kl2"),
    (4, "ks2"), // glw2
    (3, "kl3"),
    (2, "ks3"), // glw3
    (1, "kl4"),
    (0, "kalk"), // glw6
];

static PRESSURE_DK4_DK6: &[(u8, &str)] = &[
    (10, "top2m"),
    (9, "kl1/kl2 + ks1/ks2"), // glw1
    (8, "kl3"),
    (7, "ks3"), // glw2
    (6, "kl4"),
    (5, "ks4"), // glw3
    (4, "kl5"),
    (3, "ks5 - ps1"), // glw4
    (2, "pl2"),
    (1, "ps2 - ps6"), // glw5
    (0, "kalk"),      // glw6
];

static PRESSURE_DK7: &[(u8, &str)] = &[
    (6, "top2m"),
    (5, "blag1"), // glw1
    (4, "blag2"), // glw2
    (3, "blag3"), // glw3
    (2, "blag4"), // glw4
    (1, "blag5"), // glw5
    (0, "blag6"), // glw6
];

// ---------------------------------------------------------------------------
// Aquifer / aquitard classification
// ---------------------------------------------------------------------------

/// DK2019 layers that are aquifers, with their canonical aquifer id.
pub static DK2019_TO_AQUIFER: &[(&str, &str)] = &[
    ("ks1", "glw1"),
    ("ks2", "glw2"),
    ("ks3", "glw3"),
    ("ks4", "glw4"),
    ("kalk", "glw6"),
    ("kl1/kl2 + ks1/ks2", "glw1"),
    ("ks5 - ps1", "glw4"),
    ("ps2 - ps6", "glw5"),
    ("blag1", "glw1"),
    ("blag2", "glw2"),
    ("blag3", "glw3"),
    ("blag4", "glw4"),
    ("blag5", "glw5"),
    ("blag6", "glw6"),
];

/// DK2019 layers that are aquitards.
pub static DK2019_AQUITARDS: &[&str] = &["kl1", "kl2", "kl3", "kl4", "kl5"];

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Elevation name → pressure index for `model`, ordered top to bottom.
pub fn hip_elevation_to_hip_pressure(model: DkModel) -> &'static [(&'static str, u8)] {
    match model {
        DkModel::Dk1 | DkModel::Dk2 | DkModel::Dk4 | DkModel::Dk5 | DkModel::Dk6 => ELEVATION_11,
        DkModel::Dk3 => ELEVATION_DK3,
        DkModel::Dk7 => ELEVATION_DK7,
    }
}

/// Pressure index → DK2019 name for `model`, ordered top to bottom.
pub fn hip_pressure_to_dkm2019(model: DkModel) -> &'static [(u8, &'static str)] {
    match model {
        DkModel::Dk1 | DkModel::Dk2 => PRESSURE_DK1_DK2,
        DkModel::Dk3 => PRESSURE_DK3,
        DkModel::Dk4 | DkModel::Dk5 | DkModel::Dk6 => PRESSURE_DK4_DK6,
        DkModel::Dk7 => PRESSURE_DK7,
    }
}

/// Elevation name → DK2019 name for `model`, derived from the two tables above.
pub fn hip_elevation_to_dkm2019(model: DkModel) -> Vec<(&'static str, &'static str)> {
    hip_elevation_to_hip_pressure(model)
        .iter()
        .filter_map(|&(elevation, pressure)| {
            pressure_to_dkm2019(model, pressure).map(|dk| (elevation, dk))
        })
        .collect()
}

pub fn elevation_to_pressure(model: DkModel, elevation: &str) -> Option<u8> {
    hip_elevation_to_hip_pressure(model)
        .iter()
        .find(|(name, _)| *name == elevation)
        .map(|&(_, pressure)| pressure)
}

pub fn pressure_to_dkm2019(model: DkModel, pressure: u8) -> Option<&'static str> {
    hip_pressure_to_dkm2019(model)
        .iter()
        .find(|(index, _)| *index == pressure)
        .map(|&(_, name)| name)
}

pub fn elevation_to_dkm2019(model: DkModel, elevation: &str) -> Option<&'static str> {
    elevation_to_pressure(model, elevation).and_then(|p| pressure_to_dkm2019(model, p))
}

/// Canonical aquifer id of a DK2019 layer, `None` if it is not an aquifer.
pub fn dkm2019_to_aquifer(dk2019: &str) -> Option<&'static str> {
    DK2019_TO_AQUIFER
        .iter()
        .find(|(name, _)| *name == dk2019)
        .map(|&(_, aquifer)| aquifer)
}

pub fn is_aquitard(dk2019: &str) -> bool {
    DK2019_AQUITARDS.contains(&dk2019)
}

/// Express an elevation-space layer in every naming space.
///
/// Fails with `UnknownLayer` if `elevation` is not in the model's table.
pub fn resolve(model: DkModel, elevation: &str) -> Result<TopLayer, HipError> {
    let unknown = || HipError::UnknownLayer {
        model,
        layer: elevation.to_string(),
    };
    let &(name, pressure) = hip_elevation_to_hip_pressure(model)
        .iter()
        .find(|(name, _)| *name == elevation)
        .ok_or_else(unknown)?;
    let dk2019 = pressure_to_dkm2019(model, pressure).ok_or_else(unknown)?;
    Ok(TopLayer {
        elevation: name,
        head_elevation: pressure,
        dk2019,
        aquifer: dkm2019_to_aquifer(dk2019),
    })
}

/// Every layer of `model` in every naming space, ordered top to bottom.
pub fn all_layers(model: DkModel) -> Vec<TopLayer> {
    hip_elevation_to_hip_pressure(model)
        .iter()
        .filter_map(|(elevation, _)| resolve(model, elevation).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
