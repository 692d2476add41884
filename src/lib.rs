/// HIP groundwater data extraction and DMI weather retrieval for the Daisy
/// soil-plant-atmosphere model.
///
/// `hip` holds the extractors, `dataset` the gridded inputs they read,
/// `layers` and `units` the naming and unit rules they share, `ddf` the
/// Daisy output format. `dmi` and `db` fetch weather and stored potentials.

pub mod config;
pub mod dataset;
pub mod db;
pub mod ddf;
pub mod dmi;
pub mod hip;
pub mod layers;
pub mod logging;
pub mod model;
pub mod units;
