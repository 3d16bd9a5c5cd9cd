use clap::{Parser, Subcommand};
use image_thumbs::config::{self, Configuration, Settings};
use image_thumbs::entity::{ImageFactory, ImageInfo};
use image_thumbs::output;
use image_thumbs::thumbnails::{ResizePolicy, ThumbnailRequest};
use image_thumbs::types::ImageSize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Base URI used when neither the settings file nor `--base-uri` sets one.
const FALLBACK_BASE_URI: &str = "http://localhost/";

#[derive(Parser)]
#[command(name = "image-thumbs")]
#[command(about = "Inspect, crop, resize and thumbnail local or remote images")]
#[command(long_about = "\
Inspect, crop, resize and thumbnail local or remote images

An image source is a filesystem path, a path relative to the web root, or a
URL. URLs under base_uri resolve to files below web_root and are read from
disk; other URLs are fetched over HTTP, probing only the first bytes when
just the metadata is needed.

  base_uri = https://example.com/     web_root = /var/www

  https://example.com/a/b.jpg  →  /var/www/a/b.jpg   (read from disk)
  /var/www/a/b.jpg             →  https://example.com/a/b.jpg
  a/b.jpg                      →  both of the above
  https://cdn.example.org/c.png      (fetched)

Thumbnail policies:
  stretch  exactly the requested box, aspect ignored
  fit      largest size inside the box keeping the aspect
  area     same pixel count as the box keeping the aspect

Set RUST_LOG=debug for detailed logs on stderr.
Run 'image-thumbs gen-config' to generate a documented image-thumbs.toml.")]
#[command(version)]
struct Cli {
    /// Settings file (stock defaults apply when it does not exist)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Public URL of the web root (overrides the settings file)
    #[arg(long, global = true)]
    base_uri: Option<String>,

    /// Directory served at the base URI (overrides the settings file)
    #[arg(long, global = true)]
    web_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print type, dimensions and file size without decoding pixels
    Info {
        src: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Cut a rectangle out of an image
    Crop {
        src: String,
        #[arg(long, default_value_t = 0)]
        x: u32,
        #[arg(long, default_value_t = 0)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Output file; the format follows its extension
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Resize an image to exact dimensions
    Resize {
        src: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Output file; the format follows its extension
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write a scaled thumbnail set
    Thumbnails {
        src: String,
        /// Base box width (defaults to the settings file)
        #[arg(long)]
        width: Option<u32>,
        /// Base box height (defaults to the settings file)
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        policy: Option<ResizePolicy>,
        /// Scale factor; repeat for several
        #[arg(long = "scale")]
        scales: Vec<f64>,
        /// Output directory (defaults to the settings file)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a stock image-thumbs.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let settings = load_settings(&cli)?;
    let factory = ImageFactory::new(Configuration::from_settings(&settings)?);

    match cli.command {
        Command::Info { src, json } => {
            let image = factory.create(&src)?;
            let report = output::ImageReport::collect(&src, &image)?;
            if json {
                println!("{}", output::format_info_json(&report)?);
            } else {
                output::print_info(&report);
            }
        }
        Command::Crop {
            src,
            x,
            y,
            width,
            height,
            output: path,
        } => {
            let mut image = factory.create(&src)?;
            let before = image.size()?;
            image.crop(x, y, width, height)?.save(&path)?;
            println!("{}", output::format_saved(&src, before, image.size()?, &path));
        }
        Command::Resize {
            src,
            width,
            height,
            output: path,
        } => {
            let mut image = factory.create(&src)?;
            let before = image.size()?;
            image.resize(width, height)?.save(&path)?;
            println!("{}", output::format_saved(&src, before, image.size()?, &path));
        }
        Command::Thumbnails {
            src,
            width,
            height,
            policy,
            scales,
            output: dir,
        } => {
            let mut request = ThumbnailRequest::from_settings(&settings.thumbnails)?;
            if width.is_some() || height.is_some() {
                request.size = ImageSize::new(width, height)?;
            }
            if let Some(policy) = policy {
                request.policy = policy;
            }
            if !scales.is_empty() {
                request.scales = scales;
            }
            if let Some(dir) = dir {
                request.output_dir = dir;
            }
            let result = factory.create_with_thumbnails(&src, &request)?;
            let original = result.image.size()?;
            output::print_thumbnails(&src, original, &request, &result);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the
/// default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Settings file, then command-line overrides, then fallbacks for the two
/// location settings that have no stock value.
fn load_settings(cli: &Cli) -> Result<Settings, config::ConfigError> {
    let mut settings = config::load_settings(&cli.config)?;
    if let Some(base_uri) = &cli.base_uri {
        settings.base_uri = base_uri.clone();
    }
    if let Some(web_root) = &cli.web_root {
        settings.web_root = web_root.display().to_string();
    }
    if settings.base_uri.is_empty() {
        settings.base_uri = FALLBACK_BASE_URI.to_string();
    }
    if settings.web_root.is_empty() {
        settings.web_root = ".".to_string();
    }
    Ok(settings)
}
