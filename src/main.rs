use clap::{Parser, Subcommand};
use poster_frame::compose::{self, CompositionRequest, Template, TemplateSet};
use poster_frame::imaging::Rect;
use poster_frame::{batch, config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crop rectangle flags for `compose`.
#[derive(clap::Args, Clone)]
struct CropArgs {
    /// Left edge of the crop in source pixels
    #[arg(long, default_value_t = 0)]
    crop_x: u32,
    /// Top edge of the crop in source pixels
    #[arg(long, default_value_t = 0)]
    crop_y: u32,
    /// Crop width in source pixels
    #[arg(long, default_value_t = 100)]
    crop_width: u32,
    /// Crop height in source pixels
    #[arg(long, default_value_t = 100)]
    crop_height: u32,
}

impl CropArgs {
    fn rect(&self) -> Rect {
        Rect::new(self.crop_x, self.crop_y, self.crop_width, self.crop_height)
    }
}

#[derive(Parser)]
#[command(name = "poster-frame")]
#[command(about = "Composite a cropped photo and a caption onto a poster template")]
#[command(long_about = "\
Composite a cropped photo and a caption onto a poster template

Templates are defined in poster.toml: a background asset, the rect the photo
lands in, an optional circular mask, and an optional caption box.

  poster.toml                     # Template definitions (optional)
  base-image.png                  # Default template asset
  fonts/Caption.ttf               # Optional caption font

The photo crop is clamped to the photo; a crop entirely outside it is an
error. Captions are cut to max_chars characters, then trimmed until they fit
their box. Output is always PNG.

Set RUST_LOG=debug to trace each pipeline stage.

Run 'poster-frame gen-config' to generate a documented poster.toml.")]
#[command(version)]
struct Cli {
    /// Poster configuration file
    #[arg(long, default_value = "poster.toml", global = true)]
    config: PathBuf,

    /// Directory template assets and fonts are resolved against
    #[arg(long, default_value = ".", global = true)]
    assets: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a single poster
    Compose {
        /// Source photo
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        crop: CropArgs,
        /// Caption for the template's text box
        #[arg(long)]
        text: Option<String>,
        /// Template name (defaults to default_template from config)
        #[arg(long)]
        template: Option<String>,
        /// Output file
        #[arg(long, default_value = "custom-image.png")]
        out: PathBuf,
    },
    /// Compose every job in a JSON job list, in parallel
    Batch {
        /// Job list; source paths are relative to its directory
        jobs: PathBuf,
        /// Directory posters are written to
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,
        /// Disable the output cache and compose every job
        #[arg(long)]
        no_cache: bool,
    },
    /// Validate config and load every template asset
    Check,
    /// Print a stock poster.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Compose {
            image,
            crop,
            text,
            template,
            out,
        } => {
            let config = config::load_config(&cli.config)?;
            let templates = TemplateSet::load(&config, &cli.assets)?;
            let template = templates.get(template.as_deref())?;

            let source = read_source(&image)?;
            let request = CompositionRequest {
                source,
                crop: Some(crop.rect()),
                text,
            };
            let result = compose::compose(template, &request)?;

            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &result.encoded.bytes)?;
            output::print_compose_result(
                &result,
                &template.name,
                &image.display().to_string(),
                &out.display().to_string(),
            );
        }
        Command::Batch {
            jobs,
            out_dir,
            no_cache,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let templates = TemplateSet::load(&config, &cli.assets)?;
            let job_list = batch::load_jobs(&jobs)?;
            let jobs_dir = jobs.parent().unwrap_or(Path::new("."));

            println!("==> Composing {} jobs → {}", job_list.len(), out_dir.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let outcome = batch::run_batch(
                &job_list,
                jobs_dir,
                &templates,
                &out_dir,
                !no_cache,
                Some(tx),
            )?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_batch_summary(&outcome);

            if outcome.failed > 0 {
                return Err(format!("{} of {} jobs failed", outcome.failed, job_list.len()).into());
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            let checks: Vec<_> = config
                .templates
                .iter()
                .map(|(name, tc)| (name.clone(), Template::load(name, tc, &cli.assets)))
                .collect();
            output::print_check_output(&config.default_template, &checks);

            let failed = checks.iter().filter(|(_, r)| r.is_err()).count();
            if failed > 0 {
                return Err(format!("{failed} template(s) failed to load").into());
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Send `tracing` output to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Read the source photo, rejecting missing or empty files up front.
fn read_source(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("source image not found: {}", path.display()).into());
    }
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(format!("source image is empty: {}", path.display()).into());
    }
    Ok(bytes)
}
