//! Input data sources for multiple-request jobs
//!
//! Input data is either uploaded from a local file or fetched by the server
//! from an http(s) URL. The raw description is resolved once, before any
//! network call, in this order:
//!
//! 1. a string naming an existing local file
//! 2. an `http`/`https` URL (sent as `inputDataUrl`)
//! 3. a `file://` URL (its path is uploaded)
//!
//! Anything else is rejected with [`CpfError::UnsupportedInput`].

use std::fs::File;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{CpfError, CpfResult};

/// Resolved input data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Uploaded as the `inputData` multipart part
    LocalFile(PathBuf),
    /// Fetched server-side from `inputDataUrl`; `text` is sent as given
    RemoteUrl { url: Url, text: String },
}

impl InputSource {
    /// Resolve a raw input description
    pub fn resolve(raw: &str) -> CpfResult<Self> {
        if Path::new(raw).is_file() {
            return Ok(InputSource::LocalFile(PathBuf::from(raw)));
        }

        match Url::parse(raw) {
            Ok(url) => Ok(match Self::from_url(&url)? {
                InputSource::RemoteUrl { url, .. } => InputSource::RemoteUrl {
                    url,
                    text: raw.to_string(),
                },
                local => local,
            }),
            Err(_) => Err(CpfError::UnsupportedInput(raw.to_string())),
        }
    }

    /// Resolve an already-parsed URL
    pub fn from_url(url: &Url) -> CpfResult<Self> {
        match url.scheme() {
            "http" | "https" => Ok(InputSource::RemoteUrl {
                url: url.clone(),
                text: url.to_string(),
            }),
            "file" => url
                .to_file_path()
                .map(InputSource::LocalFile)
                .map_err(|_| CpfError::UnsupportedInput(url.to_string())),
            _ => Err(CpfError::UnsupportedInput(url.to_string())),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, InputSource::LocalFile(_))
    }

    /// Value of the `inputDataUrl` field for a remote source
    pub fn input_data_url(&self) -> Option<&str> {
        match self {
            InputSource::LocalFile(_) => None,
            InputSource::RemoteUrl { text, .. } => Some(text),
        }
    }

    /// Open a local source for reading; the caller owns the handle.
    pub fn open(&self) -> CpfResult<Option<File>> {
        match self {
            InputSource::LocalFile(path) => Ok(Some(File::open(path)?)),
            InputSource::RemoteUrl { .. } => Ok(None),
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::LocalFile(path) => write!(f, "{}", path.display()),
            InputSource::RemoteUrl { text, .. } => f.write_str(text),
        }
    }
}
