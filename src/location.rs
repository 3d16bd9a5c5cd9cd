//! Mapping between public URLs and files under the web root.
//!
//! An image source is whatever the caller hands in: an absolute http(s) URL,
//! a filesystem path, or a URL relative to the site. [`FileLocation::resolve`]
//! turns it into a URL and, when the source lives on this site, the matching
//! local file. Both halves are immutable once resolved.
//!
//! ## Resolution order
//!
//! 1. `http://` / `https://` → the URL as given; a local path when host
//!    (ignoring `www.`) and path prefix match the base URI and there is no
//!    query string.
//! 2. An existing file → canonical path, URL = base URI + path below web root.
//! 3. Anything without a `scheme://` prefix → relative URL: `.`/`..` are
//!    collapsed, `/x` is resolved against the base host, `x` against the base
//!    URI.
//! 4. Any other scheme is rejected.
//!
//! URLs carry percent-encoded paths; the filesystem side is always decoded,
//! so `resolve(resolve(src).url).path == resolve(src).path`.

use crate::config::Configuration;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::{Position, Url};

/// Characters escaped in a URL path segment, as the WHATWG path set plus `%`.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("\"{src}\" is not a valid URL: {reason}")]
    InvalidSource { src: String, reason: String },
    #[error("\"{0}\" is not inside the web root")]
    PathNotInWebRoot(String),
    #[error("Can't normalize path \"{0}\"")]
    InvalidPath(String),
    #[error("\"{0}\" is not recognized as a path or an http(s) URL")]
    UnsupportedScheme(String),
}

/// Resolved source of an image: a public URL, a local file, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    url: Option<String>,
    path: Option<PathBuf>,
}

impl FileLocation {
    /// Resolve `src` against `config`. See the [module docs](self).
    pub fn resolve(src: &str, config: &Configuration) -> Result<Self, LocationError> {
        if is_http(src) {
            Self::from_url(src, config)
        } else if Path::new(src).exists() {
            Self::from_path(Path::new(src), config)
        } else if !has_scheme(src) {
            Self::from_relative(src, config)
        } else {
            Err(LocationError::UnsupportedScheme(src.to_string()))
        }
    }

    /// An absolute http(s) URL.
    pub fn from_url(src: &str, config: &Configuration) -> Result<Self, LocationError> {
        let url = parse_url(src)?;
        let path = if is_local_url(&url, config) {
            local_path(&url, config)?
        } else {
            None
        };
        Ok(Self {
            url: Some(src.to_string()),
            path,
        })
    }

    /// An existing file, which must sit under the web root.
    pub fn from_path(path: &Path, config: &Configuration) -> Result<Self, LocationError> {
        let shown = path.display().to_string();
        let canonical = path.canonicalize().map_err(|e| LocationError::InvalidSource {
            src: shown.clone(),
            reason: e.to_string(),
        })?;
        let relative = canonical
            .strip_prefix(config.web_root())
            .map_err(|_| LocationError::PathNotInWebRoot(shown))?;
        let encoded: Vec<String> = relative
            .components()
            .map(|c| {
                let segment = c.as_os_str().to_string_lossy();
                utf8_percent_encode(&segment, PATH_SEGMENT).to_string()
            })
            .collect();
        let url = format!("{}{}", config.base_uri(), encoded.join("/"));
        Ok(Self {
            url: Some(url),
            path: Some(canonical),
        })
    }

    fn from_relative(src: &str, config: &Configuration) -> Result<Self, LocationError> {
        let normalized = normalize_path(src)?;
        let absolute = if normalized.starts_with('/') {
            let base = config.base_url();
            format!("{}{}", &base[..Position::BeforePath], normalized)
        } else {
            format!("{}{}", config.base_uri(), normalized)
        };
        let url = parse_url(&absolute)?;
        Ok(Self {
            path: local_path(&url, config)?,
            url: Some(url.as_str().to_string()),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last segment of the path, or of the URL when there is no local file.
    pub fn file_name(&self) -> Option<String> {
        if let Some(name) = self.path.as_deref().and_then(Path::file_name) {
            return Some(name.to_string_lossy().into_owned());
        }
        let url = Url::parse(self.url.as_deref()?).ok()?;
        url.path_segments()?
            .next_back()
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
    }
}

fn is_http(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Matches `^\w+://`.
fn has_scheme(src: &str) -> bool {
    src.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_alphanumeric() || c == '_')
    })
}

fn parse_url(src: &str) -> Result<Url, LocationError> {
    Url::parse(src).map_err(|e| LocationError::InvalidSource {
        src: src.to_string(),
        reason: e.to_string(),
    })
}

fn host_without_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn is_local_url(url: &Url, config: &Configuration) -> bool {
    let base = config.base_url();
    match (url.host_str(), base.host_str()) {
        (Some(host), Some(base_host)) => {
            host_without_www(host) == host_without_www(base_host)
                && url.path().starts_with(base.path())
        }
        _ => false,
    }
}

/// File under the web root that `url` points at. `None` when the URL carries
/// a query string, since the response may not be the file itself.
fn local_path(url: &Url, config: &Configuration) -> Result<Option<PathBuf>, LocationError> {
    if url.query().is_some_and(|q| !q.is_empty()) {
        return Ok(None);
    }
    let not_in_root = || LocationError::PathNotInWebRoot(url.to_string());
    let rest = url
        .path()
        .strip_prefix(config.base_url().path())
        .ok_or_else(not_in_root)?;
    let decoded = percent_decode_str(rest)
        .decode_utf8()
        .map_err(|e| LocationError::InvalidSource {
            src: url.to_string(),
            reason: e.to_string(),
        })?;
    // An encoded `%2F..` only becomes a parent segment after decoding.
    let relative = Path::new(&*decoded);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(not_in_root());
    }
    Ok(Some(config.web_root().join(relative)))
}

/// Collapse `.` and `..` segments of a `/`-separated path.
///
/// Segments are scanned right to left; each `..` removes itself and the one
/// segment before it. A leading `/` is kept.
pub fn normalize_path(path: &str) -> Result<String, LocationError> {
    let parts: Vec<&str> = path.split('/').collect();
    let rooted = parts.first() == Some(&"");
    let mut kept = Vec::with_capacity(parts.len());
    let mut skip = 0usize;

    for (i, part) in parts.iter().enumerate().rev() {
        match *part {
            "." => {}
            ".." => skip += 1,
            _ if i == 0 && rooted => {}
            _ if skip > 0 => skip -= 1,
            other => kept.push(other),
        }
    }
    if skip > 0 {
        return Err(LocationError::InvalidPath(path.to_string()));
    }
    kept.reverse();
    let joined = kept.join("/");
    Ok(if rooted { format!("/{joined}") } else { joined })
}
