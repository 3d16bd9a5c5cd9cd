//! Configuration loading and validation.
//!
//! There are two layers:
//!
//! - [`Settings`] is the file format: a sparse `image-thumbs.toml` merged on
//!   top of stock defaults. Every key is optional and unknown keys are
//!   rejected to catch typos early.
//! - [`Configuration`] is the validated runtime object built from settings
//!   (or directly in code). It is constructed once and then passed by
//!   reference into the resolver and the image factory; there is no
//!   process-wide configuration state.
//!
//! ## Configuration Options
//!
//! ```toml
//! base_uri = "https://example.com/"   # Public URL of the web root (required)
//! web_root = "/var/www/html"          # Directory served at base_uri (required)
//! backend_priority = ["fast-resize", "lanczos", "sample"]
//!
//! [encoding]
//! jpeg_quality = 95                   # 1-100
//! png_compression = 9                 # 0-9
//!
//! [http]
//! timeout_secs = 30
//! probe_bytes = 65536                 # Range requested when probing remote images
//! max_download_bytes = 67108864       # Cap for full downloads
//!
//! [thumbnails]
//! width = 200
//! height = 150
//! policy = "fit"                      # stretch | fit | area
//! scales = [1.0, 2.0]
//! output_dir = "thumbnails"
//! ```

use crate::imaging::{BackendKind, Compression, EncodeOptions, Quality, select_backend};
use crate::probe::HttpOptions;
use crate::thumbnails::ResizePolicy;
use crate::types::ImageSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("None of the configured imaging backends is installed (tried: {})", format_priority(.0))]
    NoBackend(Vec<BackendKind>),
}

fn format_priority(kinds: &[BackendKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds.iter().map(|k| k.id()).collect::<Vec<_>>().join(", ")
}

/// Name of the configuration file looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "image-thumbs.toml";

/// File-level settings as read from `image-thumbs.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Public URL that corresponds to `web_root`.
    pub base_uri: String,
    /// Filesystem directory served at `base_uri`.
    pub web_root: String,
    /// Backend identifiers, most preferred first.
    pub backend_priority: Vec<String>,
    pub encoding: EncodingSettings,
    pub http: HttpSettings,
    pub thumbnails: ThumbnailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_uri: String::new(),
            web_root: String::new(),
            backend_priority: BackendKind::DEFAULT_PRIORITY
                .iter()
                .map(|k| k.id().to_string())
                .collect(),
            encoding: EncodingSettings::default(),
            http: HttpSettings::default(),
            thumbnails: ThumbnailSettings::default(),
        }
    }
}

/// Encoder knobs handed through to whichever backend is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingSettings {
    /// JPEG quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
    /// PNG compression level (0 = fastest, 9 = smallest).
    pub png_compression: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            png_compression: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub probe_bytes: u64,
    pub max_download_bytes: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let http = HttpOptions::default();
        Self {
            timeout_secs: http.timeout.as_secs(),
            probe_bytes: http.probe_bytes,
            max_download_bytes: http.max_download_bytes,
        }
    }
}

/// Defaults for the `thumbnails` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub policy: ResizePolicy,
    pub scales: Vec<f64>,
    pub output_dir: String,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            width: Some(200),
            height: Some(150),
            policy: ResizePolicy::Fit,
            scales: vec![1.0, 2.0],
            output_dir: "thumbnails".to_string(),
        }
    }
}

impl ThumbnailSettings {
    pub fn size(&self) -> Result<ImageSize, ConfigError> {
        ImageSize::new(self.width, self.height).map_err(|_| {
            ConfigError::Validation("thumbnails needs a width or a height".into())
        })
    }
}

impl Settings {
    /// Validate values that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.jpeg_quality) {
            return Err(ConfigError::Validation(
                "encoding.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.encoding.png_compression > 9 {
            return Err(ConfigError::Validation(
                "encoding.png_compression must be 0-9".into(),
            ));
        }
        if self.http.probe_bytes == 0 {
            return Err(ConfigError::Validation(
                "http.probe_bytes must be positive".into(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be positive".into(),
            ));
        }
        if self.thumbnails.scales.is_empty() {
            return Err(ConfigError::Validation(
                "thumbnails.scales must not be empty".into(),
            ));
        }
        if self.thumbnails.scales.iter().any(|s| !s.is_finite()) {
            return Err(ConfigError::Validation(
                "thumbnails.scales must be finite numbers".into(),
            ));
        }
        self.thumbnails.size()?;
        self.backend_kinds()?;
        Ok(())
    }

    fn backend_kinds(&self) -> Result<Vec<BackendKind>, ConfigError> {
        if self.backend_priority.is_empty() {
            return Err(ConfigError::Validation(
                "backend_priority must not be empty".into(),
            ));
        }
        self.backend_priority
            .iter()
            .map(|id| {
                id.parse::<BackendKind>()
                    .map_err(|e| ConfigError::Validation(e.to_string()))
            })
            .collect()
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    base_uri: Url,
    web_root: PathBuf,
    backend_priority: Vec<BackendKind>,
    encoding: EncodeOptions,
    http: HttpOptions,
}

impl Configuration {
    /// Build a configuration with default backend priority, encoding and HTTP options.
    ///
    /// `base_uri` gets a trailing `/` if missing; `web_root` must be an
    /// existing directory and is canonicalized.
    pub fn new(base_uri: &str, web_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_uri: parse_base_uri(base_uri)?,
            web_root: canonical_web_root(web_root.as_ref())?,
            backend_priority: BackendKind::DEFAULT_PRIORITY.to_vec(),
            encoding: EncodeOptions::default(),
            http: HttpOptions::default(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let config = Self::new(&settings.base_uri, &settings.web_root)?
            .with_backend_priority(settings.backend_kinds()?)
            .with_encoding(EncodeOptions {
                jpeg_quality: Quality::new(settings.encoding.jpeg_quality),
                png_compression: Compression::new(settings.encoding.png_compression),
            })
            .with_http(HttpOptions {
                timeout: Duration::from_secs(settings.http.timeout_secs),
                probe_bytes: settings.http.probe_bytes,
                max_download_bytes: settings.http.max_download_bytes,
            });
        Ok(config)
    }

    pub fn with_backend_priority(mut self, priority: Vec<BackendKind>) -> Self {
        self.backend_priority = priority;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodeOptions) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_http(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }

    /// Base URI as a string, always ending in `/`.
    pub fn base_uri(&self) -> &str {
        self.base_uri.as_str()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_uri
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    pub fn backend_priority(&self) -> &[BackendKind] {
        &self.backend_priority
    }

    pub fn encoding(&self) -> &EncodeOptions {
        &self.encoding
    }

    pub fn http(&self) -> &HttpOptions {
        &self.http
    }

    /// Pick the first installed backend from the priority list.
    pub fn select_backend(&self) -> Result<BackendKind, ConfigError> {
        select_backend(&self.backend_priority, BackendKind::is_available)
    }
}

fn parse_base_uri(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation("base_uri can't be empty".into()));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::Validation(format!("base_uri \"{trimmed}\" is invalid: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "base_uri \"{trimmed}\" must be an absolute http(s) URL"
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Validation(format!(
            "base_uri \"{trimmed}\" must not carry a query or fragment"
        )));
    }
    Ok(url)
}

fn canonical_web_root(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("web_root can't be empty".into()));
    }
    let canonical = fs::canonicalize(path).map_err(|_| {
        ConfigError::Validation(format!("web_root \"{}\" does not exist", path.display()))
    })?;
    if !canonical.is_dir() {
        return Err(ConfigError::Validation(format!(
            "web_root \"{}\" is not a directory",
            path.display()
        )));
    }
    Ok(canonical)
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a settings file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_settings(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults and deserialize.
pub fn resolve_settings(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, falling back to stock defaults if it is absent.
///
/// The result is validated as far as possible without the filesystem;
/// `base_uri` and `web_root` are only checked by [`Configuration::from_settings`].
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    resolve_settings(load_raw_settings(path)?)
}

/// Load `image-thumbs.toml` from `dir` and build the runtime configuration.
pub fn load_config(dir: &Path) -> Result<Configuration, ConfigError> {
    let settings = load_settings(&dir.join(CONFIG_FILENAME))?;
    Configuration::from_settings(&settings)
}

/// A fully commented stock settings file. Printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# image-thumbs configuration
# ==========================
# All settings except base_uri and web_root are optional.
# Values shown below are the defaults. Unknown keys cause an error.

# Public URL that corresponds to web_root. A trailing "/" is added if missing.
base_uri = "https://example.com/"

# Directory served at base_uri. Must exist.
web_root = "/var/www/html"

# Imaging backends, most preferred first. The first installed one is used.
#   fast-resize  SIMD Lanczos3 resampling (cargo feature "fast-resize")
#   lanczos      image crate, Lanczos3 resampling
#   sample       image crate, fast integer area sampling
backend_priority = ["fast-resize", "lanczos", "sample"]

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# JPEG quality (1 = worst, 100 = best).
jpeg_quality = 95

# PNG compression level (0 = fastest, 9 = smallest).
png_compression = 9

# ---------------------------------------------------------------------------
# Remote images
# ---------------------------------------------------------------------------
[http]
timeout_secs = 30

# Bytes requested (Range: bytes=0-N) when probing a remote image's metadata.
probe_bytes = 65536

# Upper bound for full downloads (decoding, or servers that report no size).
max_download_bytes = 67108864

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Base thumbnail box. Either side may be omitted.
width = 200
height = 150

# How the original maps onto the box: stretch | fit | area
policy = "fit"

# Multipliers of the base box. Scales that would not shrink the original are skipped.
scales = [1.0, 2.0]

# Output directory for generated thumbnails.
output_dir = "thumbnails"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_settings_have_backend_priority() {
        let settings = Settings::default();
        assert_eq!(
            settings.backend_priority,
            vec!["fast-resize", "lanczos", "sample"]
        );
        assert_eq!(settings.encoding.jpeg_quality, 95);
        assert_eq!(settings.encoding.png_compression, 9);
        assert_eq!(settings.http.probe_bytes, 65536);
    }

    #[test]
    fn base_uri_gets_trailing_slash() {
        let tmp = TempDir::new().unwrap();
        let config = Configuration::new("https://example.com/site", tmp.path()).unwrap();
        assert_eq!(config.base_uri(), "https://example.com/site/");
    }

    #[test]
    fn empty_base_uri_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = Configuration::new("   ", tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn non_http_base_uri_is_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(Configuration::new("ftp://example.com/", tmp.path()).is_err());
        assert!(Configuration::new("not a url", tmp.path()).is_err());
    }

    #[test]
    fn missing_web_root_is_rejected() {
        let err = Configuration::new("https://example.com/", "/nonexistent/web/root").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn web_root_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = Configuration::new("https://example.com/", &file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn web_root_is_canonicalized() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("www")).unwrap();
        let dotted = tmp.path().join("www").join("..").join("www");
        let config = Configuration::new("https://example.com/", &dotted).unwrap();
        assert_eq!(
            config.web_root(),
            fs::canonicalize(tmp.path().join("www")).unwrap()
        );
    }

    #[test]
    fn parse_partial_settings() {
        let toml = r#"
base_uri = "https://example.com"

[encoding]
jpeg_quality = 80
"#;
        let overlay: toml::Value = toml::from_str(toml).unwrap();
        let settings = resolve_settings(Some(overlay)).unwrap();
        assert_eq!(settings.base_uri, "https://example.com");
        assert_eq!(settings.encoding.jpeg_quality, 80);
        // Defaults preserved
        assert_eq!(settings.encoding.png_compression, 9);
        assert_eq!(settings.thumbnails.policy, ResizePolicy::Fit);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let overlay: toml::Value = toml::from_str("colour = \"red\"").unwrap();
        assert!(matches!(
            resolve_settings(Some(overlay)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let overlay: toml::Value = toml::from_str("backend_priority = [\"gd2\"]").unwrap();
        let err = resolve_settings(Some(overlay)).unwrap_err();
        assert!(err.to_string().contains("gd2"));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let overlay: toml::Value = toml::from_str("[encoding]\njpeg_quality = 0").unwrap();
        assert!(resolve_settings(Some(overlay)).is_err());
        let overlay: toml::Value = toml::from_str("[encoding]\npng_compression = 10").unwrap();
        assert!(resolve_settings(Some(overlay)).is_err());
    }

    #[test]
    fn thumbnails_need_a_dimension() {
        let mut settings = Settings::default();
        settings.thumbnails.width = None;
        settings.thumbnails.height = None;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn merge_overrides_nested_keys_only() {
        let base: toml::Value = toml::from_str("[http]\ntimeout_secs = 30\nprobe_bytes = 10").unwrap();
        let overlay: toml::Value = toml::from_str("[http]\nprobe_bytes = 20").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["http"]["timeout_secs"].as_integer(), Some(30));
        assert_eq!(merged["http"]["probe_bytes"].as_integer(), Some(20));
    }

    #[test]
    fn load_config_from_directory() {
        let tmp = TempDir::new().unwrap();
        let www = tmp.path().join("www");
        fs::create_dir(&www).unwrap();
        let content = format!(
            "base_uri = \"https://example.com/\"\nweb_root = {:?}\nbackend_priority = [\"sample\"]\n\n[encoding]\npng_compression = 3\n",
            www.to_string_lossy()
        );
        fs::write(tmp.path().join(CONFIG_FILENAME), content).unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.base_uri(), "https://example.com/");
        assert_eq!(config.backend_priority(), &[BackendKind::Sample]);
        assert_eq!(config.encoding().png_compression.value(), 3);
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(settings.thumbnails.scales, vec![1.0, 2.0]);
    }

    #[test]
    fn stock_config_parses() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let settings = resolve_settings(Some(value)).unwrap();
        assert_eq!(settings.base_uri, "https://example.com/");
        assert_eq!(settings.thumbnails.output_dir, "thumbnails");
    }

    #[test]
    fn no_backend_error_lists_priority() {
        let err = ConfigError::NoBackend(vec![BackendKind::FastResize, BackendKind::Sample]);
        assert_eq!(
            err.to_string(),
            "None of the configured imaging backends is installed (tried: fast-resize, sample)"
        );
    }
}
