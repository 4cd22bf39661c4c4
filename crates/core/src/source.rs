//! Schema sources and body parsing.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::AsyncRead;
use url::Url;

use crate::error::{Error, Result};

/// Virtual location of in-memory and streamed root documents.
pub const VIRTUAL_JSON_URL: &str = "file:///_json";

/// Where a schema document comes from.
pub enum SchemaSource {
    /// A local file, absolute or relative to the working directory.
    Path(PathBuf),
    /// A remote (or `file:`) URL.
    Url(Url),
    /// An already-parsed document.
    Value(Value),
    /// A byte stream drained to completion before parsing.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(&url.as_str()).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl SchemaSource {
    /// Interpret a location string: remote URLs become [`SchemaSource::Url`],
    /// anything else a [`SchemaSource::Path`].
    pub fn from_location(location: &str) -> Result<Self> {
        if is_remote_url(location) {
            return Ok(Self::Url(parse_remote_url(location)?));
        }
        if location.starts_with("file://") {
            let url = Url::parse(location).map_err(|err| Error::not_found(location, err))?;
            return Ok(Self::Url(url));
        }
        Ok(Self::Path(PathBuf::from(location)))
    }
}

/// True for `http://`, `https://` and protocol-relative `//` locations.
pub(crate) fn is_remote_url(location: &str) -> bool {
    location.starts_with("http://")
        || location.starts_with("https://")
        || location.starts_with("//")
}

/// True for `file://` URLs and absolute filesystem paths.
pub(crate) fn is_file_path(location: &str) -> bool {
    location.starts_with("file://") || Path::new(location).is_absolute()
}

/// Parse a remote location, fetching protocol-relative ones over `https:`.
pub(crate) fn parse_remote_url(location: &str) -> Result<Url> {
    let full = if location.starts_with("//") {
        format!("https:{location}")
    } else {
        location.to_string()
    };
    Url::parse(&full).map_err(|err| Error::not_found(location, err))
}

/// Serialization format of a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    Yaml,
}

impl Format {
    pub(crate) fn from_extension(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub(crate) fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("json") {
            Some(Self::Json)
        } else if content_type.contains("yaml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }

    /// Streamed payloads are JSON when they begin with `{`, YAML otherwise.
    pub(crate) fn sniff(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

/// Parse a document body into a JSON value tree.
pub(crate) fn parse_document(text: &str, format: Format, document: &str) -> Result<Value> {
    let parsed = match format {
        Format::Json => serde_json::from_str(text).map_err(|err| err.to_string()),
        Format::Yaml => serde_yaml::from_str(text).map_err(|err| err.to_string()),
    };
    parsed.map_err(|message| Error::Parse {
        document: document.to_string(),
        format: format.name(),
        message,
    })
}
