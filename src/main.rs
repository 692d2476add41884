/// daisy-tools: prepare HIP groundwater and DMI weather data for Daisy.
///
/// One subcommand per task. Results go to stdout unless an output file or
/// directory is given; logging goes to stderr (and optionally a log file).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use daisy_tools::config::Config;
use daisy_tools::dataset::{Grid, PotentialDataset, StratigraphyDataset};
use daisy_tools::dmi::{self, DmiApi, DmiClient, GridSize, WeatherTable};
use daisy_tools::hip::{self, HeadElevationOptions, SoilColumnOptions, TopAquiferOptions};
use daisy_tools::logging::{self, DataSource, LogLevel};
use daisy_tools::model::{AxisLocator, CellLocator, DkModel};
use daisy_tools::units::Unit;
use daisy_tools::{db, ddf};

#[derive(Parser)]
#[command(name = "daisy-tools")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract HIP groundwater and DMI weather data for Daisy", long_about = None)]
struct Cli {
    /// Configuration file (default: daisy_tools.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (debug, info, warn, error); overrides the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Soil column at one grid cell
    SoilColumn(SoilColumnArgs),
    /// Head elevation series at one grid cell
    HeadElevation(HeadElevationArgs),
    /// Soil column, pressure series and DDF pressure table for one cell
    Prepare(PrepareArgs),
    /// Potential of the topmost present aquifer on the full grid
    TopAquiferPotential(TopAquiferArgs),
    /// Hydraulic conductivity of a DK-model2019 aquitard
    Conductance(ConductanceArgs),
    /// Weather series from the nearest DMI stations
    DmiStation(DmiStationArgs),
    /// Gridded DMI climate data for the cell containing a point
    DmiGridCell(DmiGridCellArgs),
    /// Top-aquifer potential at a point from a PostGIS table
    PotentialFromDb(PotentialFromDbArgs),
}

/// Grid cell selection. Each axis takes an index or a coordinate; a
/// missing axis defaults to the middle of the grid.
#[derive(Args, Debug, Clone)]
struct CellArgs {
    /// X coordinate (snapped to the nearest node)
    #[arg(short = 'x', long, conflicts_with = "i", allow_negative_numbers = true)]
    x: Option<f64>,
    /// Y coordinate (snapped to the nearest node)
    #[arg(short = 'y', long, conflicts_with = "j", allow_negative_numbers = true)]
    y: Option<f64>,
    /// X index
    #[arg(short = 'i', long)]
    i: Option<usize>,
    /// Y index
    #[arg(short = 'j', long)]
    j: Option<usize>,
}

impl CellArgs {
    fn locator(&self, grid: &Grid) -> CellLocator {
        let center = grid.center();
        let axis = |index: Option<usize>, coord: Option<f64>, default: AxisLocator| match (index, coord) {
            (Some(i), _) => AxisLocator::Index(i),
            (None, Some(c)) => AxisLocator::Coordinate(c),
            (None, None) => default,
        };
        CellLocator {
            x: axis(self.i, self.x, center.x),
            y: axis(self.j, self.y, center.y),
        }
    }
}

#[derive(Args)]
struct SoilColumnArgs {
    /// Stratigraphy (elevation) dataset
    hs_model: PathBuf,
    #[command(flatten)]
    cell: CellArgs,
    /// Output unit (default: from configuration)
    #[arg(long)]
    unit: Option<String>,
    #[arg(short, long)]
    outfile: Option<PathBuf>,
}

#[derive(Args)]
struct HeadElevationArgs {
    /// Head elevation dataset
    gw_potential: PathBuf,
    #[command(flatten)]
    cell: CellArgs,
    /// Pressure layers to extract (default: all)
    #[arg(long, value_delimiter = ',')]
    layers: Option<Vec<u8>>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(short, long)]
    outfile: Option<PathBuf>,
}

#[derive(Args)]
struct PrepareArgs {
    /// Topography / stratigraphy dataset, e.g. DK1_HS_model.nc
    hs_model: PathBuf,
    /// Head elevation dataset
    gw_potential: PathBuf,
    /// DK model number 1..7 (default: guessed from the stratigraphy file name)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
    dk_model: Option<u8>,
    #[command(flatten)]
    cell: CellArgs,
    #[arg(long)]
    unit: Option<String>,
    /// Directory for soil_column.csv, pressure.csv and pressure_table.ddf
    #[arg(long)]
    outdir: Option<PathBuf>,
}

#[derive(Args)]
struct TopAquiferArgs {
    hs_model: PathBuf,
    gw_potential: PathBuf,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
    dk_model: Option<u8>,
    #[arg(long)]
    unit: Option<String>,
    /// Output raster (.json, or .nc with NetCDF support)
    #[arg(short, long)]
    outfile: PathBuf,
}

#[derive(Args)]
struct ConductanceArgs {
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
    dk_model: u8,
    /// DK-model2019 layer, e.g. kl1
    layer: String,
    #[arg(long, default_value = hip::conductive::DEFAULT_UNIT)]
    unit: String,
}

#[derive(Args)]
struct DmiStationArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    /// Parameters (default: from configuration)
    #[arg(long, value_delimiter = ',')]
    parameters: Option<Vec<String>>,
    #[arg(long)]
    time_resolution: Option<String>,
    /// Directory for dmidata.csv and dmimeta.csv
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

#[derive(Args)]
struct DmiGridCellArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    #[arg(long, default_value = "10km")]
    size: GridSize,
    #[arg(long, value_delimiter = ',')]
    parameters: Option<Vec<String>>,
    #[arg(long)]
    time_resolution: Option<String>,
    #[arg(long, default_value_t = dmi::client::GRID_CELL_LIMIT)]
    limit: usize,
    /// Directory for {cell_id}_{time_resolution}.csv
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

#[derive(Args)]
struct PotentialFromDbArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    #[arg(long, default_value = db::DEFAULT_UNIT)]
    unit: String,
    /// Raster table (default: from configuration)
    #[arg(long)]
    table: Option<String>,
    /// DDF output file
    #[arg(short, long)]
    outfile: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let level = match &cli.log_level {
        Some(level) => level.parse::<LogLevel>().map_err(anyhow::Error::msg)?,
        None => config.log_level()?,
    };
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.console_timestamps);

    match cli.command {
        Command::SoilColumn(args) => soil_column(&config, args),
        Command::HeadElevation(args) => head_elevation(&config, args),
        Command::Prepare(args) => prepare(&config, args),
        Command::TopAquiferPotential(args) => top_aquifer_potential(&config, args),
        Command::Conductance(args) => conductance(args),
        Command::DmiStation(args) => dmi_station(&config, args),
        Command::DmiGridCell(args) => dmi_grid_cell(&config, args),
        Command::PotentialFromDb(args) => potential_from_db(&config, args),
    }
}

// ---------------------------------------------------------------------------
// HIP
// ---------------------------------------------------------------------------

fn unit_or_default(config: &Config, unit: Option<&str>) -> Result<Unit> {
    match unit {
        Some(u) => Ok(Unit::parse(u)?),
        None => Ok(config.unit()?),
    }
}

fn dk_model(number: Option<u8>, hs_model: &Path) -> Result<DkModel> {
    match number {
        Some(n) => Ok(DkModel::from_number(n)?),
        None => {
            let name = hs_model
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Cannot guess DK model from {}", hs_model.display()))?;
            let model = DkModel::from_filename(name)
                .with_context(|| format!("Cannot guess DK model from {}, pass --dk-model", name))?;
            logging::info(DataSource::Hip, None, &format!("Using model {} from file name {}", model, name));
            Ok(model)
        }
    }
}

fn open_stratigraphy(path: &Path) -> Result<StratigraphyDataset> {
    StratigraphyDataset::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn open_potential(path: &Path) -> Result<PotentialDataset> {
    PotentialDataset::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn emit(outfile: Option<&Path>, content: &str) -> Result<()> {
    match outfile {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            logging::info(DataSource::System, None, &format!("Wrote {}", path.display()));
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn soil_column(config: &Config, args: SoilColumnArgs) -> Result<()> {
    let ds = open_stratigraphy(&args.hs_model)?;
    let options = SoilColumnOptions {
        missing_layer_unit: config.missing_layer_unit()?,
        base_unit: Some(unit_or_default(config, args.unit.as_deref())?),
    };
    let column = hip::extract_soil_column(&ds, &args.cell.locator(&ds.grid), &options)?;
    emit(args.outfile.as_deref(), &hip::soil_column::to_csv(&column))
}

fn head_elevation(config: &Config, args: HeadElevationArgs) -> Result<()> {
    let ds = open_potential(&args.gw_potential)?;
    let options = HeadElevationOptions {
        layers: args.layers,
        base_unit: Some(unit_or_default(config, args.unit.as_deref())?),
    };
    let series = hip::extract_head_elevation(&ds, &args.cell.locator(&ds.grid), &options)?;
    emit(args.outfile.as_deref(), &hip::head_elevation::to_csv(&series))
}

fn prepare(config: &Config, args: PrepareArgs) -> Result<()> {
    let model = dk_model(args.dk_model, &args.hs_model)?;
    let unit = unit_or_default(config, args.unit.as_deref())?;
    let hs = open_stratigraphy(&args.hs_model)?;
    let gw = open_potential(&args.gw_potential)?;

    let input = hip::prepare_for_daisy(model, &hs, &gw, &args.cell.locator(&hs.grid), &unit)?;
    let table = input.pressure_table();

    match args.outdir {
        Some(dir) => {
            fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            emit(Some(&dir.join("soil_column.csv")), &input.soil_column_csv())?;
            emit(Some(&dir.join("pressure.csv")), &input.pressure_csv())?;
            let ddf_path = dir.join("pressure_table.ddf");
            table
                .save(&ddf_path)
                .with_context(|| format!("Failed to write {}", ddf_path.display()))?;
            logging::info(DataSource::System, None, &format!("Wrote {}", ddf_path.display()));
        }
        None => {
            print_section("Soil column", &input.soil_column_csv());
            print_section("Pressure", &input.pressure_csv());
            print_section("Pressure table", &format!("{}\n", table));
        }
    }
    Ok(())
}

fn print_section(title: &str, body: &str) {
    println!("===== {:^20} =====", title);
    print!("{}", body);
}

fn top_aquifer_potential(config: &Config, args: TopAquiferArgs) -> Result<()> {
    let model = dk_model(args.dk_model, &args.hs_model)?;
    let hs = open_stratigraphy(&args.hs_model)?;
    let gw = open_potential(&args.gw_potential)?;

    let options = TopAquiferOptions {
        base_unit: args.unit.as_deref().map(Unit::parse).transpose()?,
        missing_layer_unit: config.missing_layer_unit()?,
    };
    let raster = hip::extract_top_aquifer_potential(&hs, &gw, model, &options)?;

    match args.outfile.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "netcdf")]
        Some("nc") => raster.save_netcdf(&args.outfile)?,
        Some("json") => raster.save_json(&args.outfile)?,
        _ => bail!("Unsupported raster output {}", args.outfile.display()),
    }
    logging::info(DataSource::Hip, None, &format!("Wrote {}", args.outfile.display()));
    Ok(())
}

fn conductance(args: ConductanceArgs) -> Result<()> {
    let model = DkModel::from_number(args.dk_model)?;
    let unit = Unit::parse(&args.unit)?;
    match hip::conductive_properties(model, &args.layer, &unit)? {
        Some((value, unit)) => println!("{}\t{}\t{} {}", model, args.layer, value, unit),
        None => println!("{}\t{}\tno conductive properties", model, args.layer),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DMI
// ---------------------------------------------------------------------------

fn dmi_client(config: &Config, api: DmiApi) -> Result<DmiClient> {
    let key = config
        .dmi
        .api_key
        .as_deref()
        .context("No DMI API key, set DMI_API_KEY or dmi.api_key")?;
    Ok(DmiClient::new(key, api, &config.dmi.version)?)
}

fn parameters(config: &Config, parameters: Option<Vec<String>>) -> Vec<String> {
    parameters.unwrap_or_else(|| config.dmi.parameters.clone())
}

fn dmi_station(config: &Config, args: DmiStationArgs) -> Result<()> {
    let client = dmi_client(config, config.dmi_api()?)?;
    let names = parameters(config, args.parameters);
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let time_resolution = args.time_resolution.as_deref().unwrap_or(&config.dmi.time_resolution);

    let (table, matches) = client.get_data(args.lat, args.lon, time_resolution, &names)?;

    fs::create_dir_all(&args.outdir).with_context(|| format!("Failed to create {}", args.outdir.display()))?;
    emit(Some(&args.outdir.join("dmidata.csv")), &table.to_csv())?;
    emit(Some(&args.outdir.join("dmimeta.csv")), &dmi::matches_to_csv(&matches))
}

fn dmi_grid_cell(config: &Config, args: DmiGridCellArgs) -> Result<()> {
    let client = dmi_client(config, DmiApi::ClimateData)?;
    let names = parameters(config, args.parameters);
    let time_resolution = args.time_resolution.as_deref().unwrap_or(&config.dmi.time_resolution);
    let cell_id = dmi::grid_cell_id(args.lat, args.lon, args.size)?;
    logging::info(DataSource::Dmi, Some(&cell_id), &format!("Grid cell for ({}, {})", args.lat, args.lon));

    let mut table = WeatherTable::new();
    let mut failed = 0;
    for parameter in &names {
        match client.get_grid_cell_data(&cell_id, parameter, args.size, time_resolution, args.limit) {
            Ok(series) => table.insert_series(parameter, &series),
            Err(e) => {
                logging::log_dmi_failure(&cell_id, &format!("Grid series {}", parameter), &e);
                failed += 1;
            }
        }
    }
    logging::log_fetch_summary(DataSource::Dmi, names.len(), names.len() - failed, failed);
    if table.is_empty() {
        bail!("No data for grid cell {}", cell_id);
    }

    fs::create_dir_all(&args.outdir).with_context(|| format!("Failed to create {}", args.outdir.display()))?;
    let path = args.outdir.join(format!("{}_{}.csv", cell_id, time_resolution));
    emit(Some(&path), &table.to_csv())
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

fn potential_from_db(config: &Config, args: PotentialFromDbArgs) -> Result<()> {
    let unit = Unit::parse(&args.unit)?;
    let table_name = args.table.as_deref().unwrap_or(&config.database.table);

    let mut client = db::connect(&config.database.url)?;
    let rows = db::fetch_potential(&mut client, args.lon, args.lat, table_name)?;
    if rows.is_empty() {
        logging::warn(
            DataSource::Database,
            Some(&format!("{},{}", args.lon, args.lat)),
            "No potential found at this point",
        );
    }
    let table: ddf::PressureTable = db::to_pressure_table(&rows, &unit)?;
    emit(args.outfile.as_deref(), &format!("{}\n", table))
}
