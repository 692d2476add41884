/// Extraction of Daisy-relevant data from HIP datasets.
///
/// Single-cell extractors (`soil_column`, `head_elevation`), the aquifer
/// locator, the full-grid top-aquifer raster, and `prepare`, which chains
/// them into the per-cell Daisy input.

pub mod aquifer;
pub mod conductive;
pub mod head_elevation;
pub mod prepare;
pub mod soil_column;
pub mod top_aquifer;

pub use aquifer::{find_topmost_aquifer, find_topmost_aquitard};
pub use conductive::conductive_properties;
pub use head_elevation::{HeadElevationOptions, extract_head_elevation};
pub use prepare::{DaisyInput, PressureRow, prepare_for_daisy};
pub use soil_column::{SoilColumnOptions, extract_soil_column};
pub use top_aquifer::{TopAquiferOptions, TopAquiferPotential, extract_top_aquifer_potential};
