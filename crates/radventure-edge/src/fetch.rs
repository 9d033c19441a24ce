// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::EdgeError;

#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    http: HttpClient,
    max_bytes: u64,
}

impl ArchiveFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Downloads the archive body, refusing anything over the byte cap.
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, EdgeError> {
        let response = self
            .http
            .get(url.as_str())
            .send()
            .map_err(|source| EdgeError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EdgeError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(EdgeError::ArchiveTooLarge {
                limit: self.max_bytes,
            });
        }

        let mut body = Vec::new();
        response
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|source| EdgeError::FetchBody {
                url: url.to_string(),
                source,
            })?;
        if body.len() as u64 > self.max_bytes {
            return Err(EdgeError::ArchiveTooLarge {
                limit: self.max_bytes,
            });
        }
        debug!(url = %url, bytes = body.len(), "archive downloaded");
        Ok(body)
    }
}

/// Accepts only absolute http and https URLs.
pub fn parse_archive_url(raw: &str) -> Result<Url, EdgeError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|error| EdgeError::InvalidUrl {
        url: trimmed.to_owned(),
        reason: error.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EdgeError::InvalidUrl {
            url: trimmed.to_owned(),
            reason: format!("scheme {other} is not supported; use http or https"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_archive_url;
    use crate::EdgeError;

    #[test]
    fn archive_url_requires_http_scheme() {
        assert!(parse_archive_url("https://files.example.test/case.zip").is_ok());
        assert!(parse_archive_url(" http://127.0.0.1:9000/a.zip ").is_ok());
        assert!(matches!(
            parse_archive_url("ftp://files.example.test/case.zip"),
            Err(EdgeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_archive_url("case.zip"),
            Err(EdgeError::InvalidUrl { .. })
        ));
    }
}
