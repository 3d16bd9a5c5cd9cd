//! Image metadata without a full decode.
//!
//! Dimensions and format come from the image header, which sits in the first
//! few kilobytes of every supported format. Local files are read up to
//! [`HttpOptions::probe_bytes`]; remote files are fetched with a `Range`
//! request for the same window.
//!
//! ## Remote file size
//!
//! | Response | Size taken from |
//! |---|---|
//! | `206` + `Content-Range: bytes a-b/N` | `N` |
//! | `200` + numeric `Content-Length` | `Content-Length` |
//! | anything else | length of a full download (bounded by `max_download_bytes`) |
//!
//! The transport sits behind [`HttpFetcher`] so the size logic can be driven
//! by canned responses; [`UreqFetcher`] is the real one.

use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Cannot get size of file \"{0}\"")]
    UnknownSize(String),
    #[error("{url} is larger than the {limit} byte download limit")]
    TooLarge { url: String, limit: u64 },
    #[error("Cannot get size of image \"{0}\"")]
    UnrecognizedImage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits for remote reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Bytes requested when sniffing the header of a remote image.
    pub probe_bytes: u64,
    /// Upper bound for any full download.
    pub max_download_bytes: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            probe_bytes: 65_536,
            max_download_bytes: 64 * 1024 * 1024,
        }
    }
}

/// What a probe learns about an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    #[serde(serialize_with = "serialize_format")]
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Encoded size in bytes. `None` for images that never had a file.
    pub file_size: Option<u64>,
}

fn serialize_format<S: serde::Serializer>(format: &ImageFormat, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(format.to_mime_type())
}

// =============================================================================
// HTTP collaborator
// =============================================================================

/// Inclusive byte range for a `Range` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Raw response as seen on the wire.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// e.g. `HTTP/1.1 206 Partial Content`
    pub status_line: String,
    /// `Name: value` lines in arrival order.
    pub header_lines: Vec<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn headers(&self) -> HttpHeaders {
        let lines = self.header_lines.iter().map(String::as_str);
        HttpHeaders::parse(std::iter::once(self.status_line.as_str()).chain(lines))
    }
}

/// Blocking HTTP GET.
pub trait HttpFetcher: Send + Sync {
    /// Fetch `url`, reading at most `max_bytes` of the body.
    fn fetch(
        &self,
        url: &str,
        range: Option<ByteRange>,
        max_bytes: u64,
    ) -> Result<HttpResponse, ProbeError>;
}

/// Status code plus headers keyed by lower-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    pub status: Option<u16>,
    headers: HashMap<String, String>,
}

impl HttpHeaders {
    /// Parse raw header lines. Lines without a `:` are status lines
    /// (`HTTP/x.y NNN ...`); the last one wins, as after a redirect.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut parsed = Self::default();
        for line in lines {
            match line.split_once(':') {
                Some((name, value)) if !line.starts_with("HTTP/") => {
                    parsed
                        .headers
                        .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                _ => {
                    if let Some(code) = parse_status_code(line) {
                        parsed.status = Some(code);
                    }
                }
            }
        }
        parsed
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Total size of the resource, when the headers state it.
    pub fn file_size(&self) -> Option<u64> {
        match self.status? {
            206 => {
                let range = self.get("content-range")?;
                if !range.contains("bytes") {
                    return None;
                }
                range.split('/').nth(1)?.trim().parse().ok()
            }
            200 => self.get("content-length")?.parse().ok(),
            _ => None,
        }
    }
}

fn parse_status_code(line: &str) -> Option<u16> {
    let rest = line.trim().strip_prefix("HTTP/")?;
    let mut parts = rest.split_whitespace();
    let version = parts.next()?;
    if !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    parts.next()?.parse().ok()
}

/// [`HttpFetcher`] backed by a `ureq` agent.
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new(options: &HttpOptions) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(options.timeout).build();
        Self { agent }
    }
}

impl HttpFetcher for UreqFetcher {
    fn fetch(
        &self,
        url: &str,
        range: Option<ByteRange>,
        max_bytes: u64,
    ) -> Result<HttpResponse, ProbeError> {
        let mut request = self.agent.get(url);
        if let Some(range) = range {
            request = request.set("Range", &range.header_value());
        }
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ProbeError::HttpStatus {
                    url: url.to_string(),
                    status,
                });
            }
            Err(e) => {
                return Err(ProbeError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status_line = format!(
            "{} {} {}",
            response.http_version(),
            response.status(),
            response.status_text()
        );
        let header_lines = response
            .headers_names()
            .iter()
            .filter_map(|name| response.header(name).map(|v| format!("{name}: {v}")))
            .collect();

        let mut body = Vec::new();
        response
            .into_reader()
            .take(max_bytes)
            .read_to_end(&mut body)
            .map_err(|e| ProbeError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(HttpResponse {
            status_line,
            header_lines,
            body,
        })
    }
}

// =============================================================================
// Probes
// =============================================================================

/// Format and dimensions from the start of an encoded image.
pub fn header_info(bytes: &[u8], origin: &str) -> Result<(ImageFormat, u32, u32), ProbeError> {
    let unrecognized = || ProbeError::UnrecognizedImage(origin.to_string());
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or_else(unrecognized)?;
    let (width, height) = reader.into_dimensions().map_err(|_| unrecognized())?;
    Ok((format, width, height))
}

/// Probe a local file, reading only the header window when that suffices.
pub fn probe_file(path: &Path, options: &HttpOptions) -> Result<ImageMetadata, ProbeError> {
    let origin = path.display().to_string();
    let file_size = std::fs::metadata(path)?.len();

    let mut head = Vec::new();
    File::open(path)?
        .take(options.probe_bytes)
        .read_to_end(&mut head)?;

    let (format, width, height) = match header_info(&head, &origin) {
        Ok(info) => info,
        Err(_) if (head.len() as u64) < file_size => {
            debug!(path = %origin, "header not in first {} bytes, reading whole file", head.len());
            header_info(&std::fs::read(path)?, &origin)?
        }
        Err(e) => return Err(e),
    };
    Ok(ImageMetadata {
        format,
        width,
        height,
        file_size: Some(file_size),
    })
}

/// Probe an in-memory image. It has no file, so no file size.
pub fn probe_bytes(bytes: &[u8]) -> Result<ImageMetadata, ProbeError> {
    let (format, width, height) = header_info(bytes, &format!("<{} bytes in memory>", bytes.len()))?;
    Ok(ImageMetadata {
        format,
        width,
        height,
        file_size: None,
    })
}

/// Probe a remote image with a single ranged request where the server allows.
pub fn probe_url(
    url: &str,
    fetcher: &dyn HttpFetcher,
    options: &HttpOptions,
) -> Result<ImageMetadata, ProbeError> {
    let range = ByteRange {
        start: 0,
        end: options.probe_bytes,
    };
    let response = fetcher.fetch(url, Some(range), options.probe_bytes)?;
    let headers = response.headers();
    check_status(url, &headers)?;

    let (file_size, body) = match headers.file_size() {
        Some(size) => (size, response.body),
        None => {
            warn!(url, status = ?headers.status, "size not in response headers, downloading whole file");
            let full = download(url, fetcher, options)?;
            (full.len() as u64, full)
        }
    };
    if file_size == 0 {
        return Err(ProbeError::UnknownSize(url.to_string()));
    }

    let (format, width, height) = match header_info(&body, url) {
        Ok(info) => info,
        Err(_) if (body.len() as u64) < file_size => {
            debug!(url, "header not in probe window, downloading whole file");
            header_info(&download(url, fetcher, options)?, url)?
        }
        Err(e) => return Err(e),
    };
    Ok(ImageMetadata {
        format,
        width,
        height,
        file_size: Some(file_size),
    })
}

/// Download a whole resource, failing when it exceeds `max_download_bytes`.
pub fn download(
    url: &str,
    fetcher: &dyn HttpFetcher,
    options: &HttpOptions,
) -> Result<Vec<u8>, ProbeError> {
    let limit = options.max_download_bytes;
    let response = fetcher.fetch(url, None, limit.saturating_add(1))?;
    check_status(url, &response.headers())?;
    if response.body.len() as u64 > limit {
        return Err(ProbeError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    debug!(url, bytes = response.body.len(), "downloaded");
    Ok(response.body)
}

fn check_status(url: &str, headers: &HttpHeaders) -> Result<(), ProbeError> {
    match headers.status {
        Some(status) if (200..300).contains(&status) => Ok(()),
        Some(status) => Err(ProbeError::HttpStatus {
            url: url.to_string(),
            status,
        }),
        None => Err(ProbeError::Network {
            url: url.to_string(),
            reason: "response has no status line".into(),
        }),
    }
}
