// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! HTTP function that unpacks a case's image archive.
//!
//! A POST names a case and a ZIP URL. The archive is downloaded, every image
//! entry is read, and the response lists one record per image with its
//! checksum and position in the series.

pub mod archive;
pub mod fetch;
pub mod server;

pub use archive::{IMAGE_EXTENSIONS, ImageRecord, extract_images, natural_cmp};
pub use fetch::{ArchiveFetcher, parse_archive_url};
pub use server::{EdgeService, ProcessRequest, ProcessResponse, Reply, bind, serve};

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 200 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeConfig {
    pub listen: String,
    pub max_archive_bytes: u64,
    pub max_extracted_bytes: u64,
    pub fetch_timeout: Duration,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_owned(),
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("zipFileUrl {url:?} is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("archive exceeds the {limit} byte limit")]
    ArchiveTooLarge { limit: u64 },
    #[error("archive is not a readable ZIP file: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive entry could not be read: {0}")]
    InvalidArchive(String),
    #[error("download of {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} was cut off: {source}")]
    FetchBody {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("download of {url} returned HTTP {status}")]
    FetchStatus { url: String, status: u16 },
}

impl EdgeError {
    /// Client mistakes map to 400; failures reaching the archive host to 500.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingField(_)
            | Self::InvalidBody(_)
            | Self::InvalidUrl { .. }
            | Self::ArchiveTooLarge { .. }
            | Self::Zip(_)
            | Self::InvalidArchive(_) => 400,
            Self::Fetch { .. } | Self::FetchBody { .. } | Self::FetchStatus { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EdgeConfig, EdgeError};

    #[test]
    fn client_errors_are_bad_requests() {
        assert_eq!(EdgeError::MissingField("caseId").status_code(), 400);
        assert_eq!(
            EdgeError::FetchStatus {
                url: "https://example.test/a.zip".to_owned(),
                status: 404,
            }
            .status_code(),
            500
        );
        assert_eq!(
            EdgeError::MissingField("userId").to_string(),
            "userId is required"
        );
    }

    #[test]
    fn default_limits_keep_extraction_above_download() {
        let config = EdgeConfig::default();
        assert!(config.max_extracted_bytes >= config.max_archive_bytes);
    }
}
