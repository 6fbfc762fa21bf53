use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ngff_pyramid::{
    ImageCatalog, PyramidImage, chunk::ChunkLayout, histogram::HistogramOptions,
    rechunk::RechunkOutcome, shader::DEFAULT_MAD_SCALE,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warning => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Describe the images of an OME-NGFF Zarr hierarchy.")]
struct Cli {
    /// Root of the OME-NGFF Zarr hierarchy
    input_zarr: PathBuf,
    /// Logging verbosity; RUST_LOG takes precedence
    #[arg(long, value_enum, default_value = "info", ignore_case = true)]
    log_level: LogLevel,
    /// Multiple of the MAD either side of the median for display windows
    #[arg(long, default_value_t = DEFAULT_MAD_SCALE)]
    mad_scale: f64,
    /// Histogram bins used for statistics
    #[arg(long, default_value_t = ngff_pyramid::histogram::DEFAULT_BIN_COUNT)]
    bins: usize,
    /// Rechunk every level to this spatial chunk size before describing it
    #[arg(long, value_name = "SIZE")]
    rechunk: Option<u64>,
    /// Skip the shader parameters, which read every pixel
    #[arg(long)]
    no_stats: bool,
}

fn describe(image: &PyramidImage, cli: &Cli) -> ngff_pyramid::Result<()> {
    for level in 0..image.level_count() {
        let array = image.level_array(level)?;
        let layout = ChunkLayout::from_metadata(array.metadata())?;
        println!(
            "\tarray level {level}: {} {:?} {} chunks of {:?}",
            image.level_path(level)?,
            layout.shape(),
            array.chunk_grid_shape().iter().product::<u64>(),
            layout.chunks()
        );
    }
    println!("\tzarr path: {}", image.path().display());
    println!("\tdims: {}", image.dims());
    println!("\tshader type: {}", image.shader_type());
    println!("\tNGFF dims: {}", image.ngff_dims());

    if !cli.no_stats {
        let options = HistogramOptions::default().with_bin_count(cli.bins);
        let params = image.shader_parameters_opt(cli.mad_scale, &options)?;
        println!("\tshader params: {}", serde_json::to_string(&params)?);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level.into())
        .parse_default_env()
        .init();

    let catalog = ImageCatalog::open(&cli.input_zarr)?;
    let keys = catalog.list_series()?;
    println!("zarr groups: {keys:?}");
    match catalog.ome_xml_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("no OME-XML"),
    }

    for (name, image) in catalog.iter_series()? {
        println!("image name: \"{name}\"");
        let image = match image {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Skipping \"{name}\": {e}");
                continue;
            }
        };
        if let Some(size) = cli.rechunk {
            for (level, outcome) in image.rechunk(size)?.into_iter().enumerate() {
                if let RechunkOutcome::Rewritten { from, to } = outcome {
                    log::info!("Rechunked level {level} from {from:?} to {to:?}");
                }
            }
        }
        describe(&image, &cli)?;
    }
    Ok(())
}
