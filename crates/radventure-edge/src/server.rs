// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{Cursor, Read};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{info, warn};

use crate::archive::{ImageRecord, extract_images};
use crate::fetch::{ArchiveFetcher, parse_archive_url};
use crate::{EdgeConfig, EdgeError};

const MAX_REQUEST_BYTES: u64 = 64 * 1024;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type",
    ),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessRequest {
    pub case_id: String,
    pub zip_file_url: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub images: Vec<ImageRecord>,
    pub case_id: String,
}

/// Status plus optional JSON body, before it is put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
}

impl Reply {
    fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(json!({ "success": false, "error": message.into() })),
        }
    }

    fn into_response(self) -> Result<Response<Cursor<Vec<u8>>>> {
        let mut response = match &self.body {
            Some(body) => {
                let bytes = serde_json::to_vec(body).context("encode response body")?;
                Response::from_data(bytes).with_header(header("Content-Type", "application/json")?)
            }
            None => Response::from_data(Vec::new()),
        }
        .with_status_code(self.status);
        for (name, value) in CORS_HEADERS {
            response.add_header(header(name, value)?);
        }
        Ok(response)
    }
}

pub struct EdgeService {
    fetcher: ArchiveFetcher,
    max_extracted_bytes: u64,
}

impl EdgeService {
    pub fn new(config: &EdgeConfig) -> Result<Self> {
        Ok(Self {
            fetcher: ArchiveFetcher::new(config.fetch_timeout, config.max_archive_bytes)?,
            max_extracted_bytes: config.max_extracted_bytes,
        })
    }

    pub fn handle(&self, method: &Method, body: &[u8]) -> Reply {
        match method {
            Method::Options => Reply::empty(200),
            Method::Post => match self.process(body) {
                Ok(processed) => match serde_json::to_value(&processed) {
                    Ok(value) => Reply {
                        status: 200,
                        body: Some(value),
                    },
                    Err(error) => Reply::error(500, format!("encode response: {error}")),
                },
                Err(error) => {
                    warn!(error = %error, "archive processing failed");
                    Reply::error(error.status_code(), error.to_string())
                }
            },
            other => Reply::error(405, format!("method {other} is not allowed -- use POST")),
        }
    }

    pub fn process(&self, body: &[u8]) -> Result<ProcessResponse, EdgeError> {
        let request: ProcessRequest = serde_json::from_slice(body)
            .map_err(|error| EdgeError::InvalidBody(error.to_string()))?;
        let case_id = required(&request.case_id, "caseId")?;
        let user_id = required(&request.user_id, "userId")?;
        let url = parse_archive_url(required(&request.zip_file_url, "zipFileUrl")?)?;

        let archive = self.fetcher.fetch(&url)?;
        let images = extract_images(&archive, self.max_extracted_bytes)?;
        info!(
            case_id,
            user_id,
            images = images.len(),
            archive_bytes = archive.len(),
            "archive processed"
        );

        let message = match images.len() {
            0 => "archive contains no images".to_owned(),
            1 => "processed 1 image".to_owned(),
            count => format!("processed {count} images"),
        };
        Ok(ProcessResponse {
            success: true,
            message,
            images,
            case_id: case_id.to_owned(),
        })
    }

    /// Reads one request off the wire and answers it.
    pub fn respond(&self, mut request: Request) -> Result<()> {
        let method = request.method().clone();
        let path = request.url().to_owned();

        let mut body = Vec::new();
        request
            .as_reader()
            .take(MAX_REQUEST_BYTES + 1)
            .read_to_end(&mut body)
            .context("read request body")?;
        let reply = if body.len() as u64 > MAX_REQUEST_BYTES {
            Reply::error(
                400,
                format!("request body exceeds {MAX_REQUEST_BYTES} bytes"),
            )
        } else {
            self.handle(&method, &body)
        };

        info!(method = %method, path = %path, status = reply.status, "edge request");
        request
            .respond(reply.into_response()?)
            .context("send response")
    }
}

pub fn bind(listen: &str) -> Result<Server> {
    Server::http(listen)
        .map_err(|error| anyhow!("listen on {listen}: {error} -- choose a free address and retry"))
}

/// Answers requests until the server is unblocked.
pub fn serve(service: &EdgeService, server: &Server) -> Result<()> {
    info!(addr = %server.server_addr(), "edge function listening");
    for request in server.incoming_requests() {
        if let Err(error) = service.respond(request) {
            warn!(error = %format!("{error:#}"), "request failed");
        }
    }
    Ok(())
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, EdgeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EdgeError::MissingField(field));
    }
    Ok(trimmed)
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header {name}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::{EdgeService, Reply};
    use crate::EdgeConfig;
    use serde_json::json;
    use tiny_http::Method;

    fn service() -> EdgeService {
        EdgeService::new(&EdgeConfig::default()).expect("service should build")
    }

    #[test]
    fn options_is_an_empty_ok() {
        assert_eq!(
            service().handle(&Method::Options, b""),
            Reply {
                status: 200,
                body: None
            }
        );
    }

    #[test]
    fn other_methods_are_rejected() {
        let reply = service().handle(&Method::Get, b"");
        assert_eq!(reply.status, 405);
        assert_eq!(reply.body.expect("error body")["success"], json!(false));
    }

    #[test]
    fn missing_fields_are_bad_requests() {
        let reply = service().handle(
            &Method::Post,
            br#"{"caseId":"42","zipFileUrl":"https://example.test/a.zip"}"#,
        );
        assert_eq!(reply.status, 400);
        assert_eq!(
            reply.body.expect("error body")["error"],
            json!("userId is required")
        );
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let reply = service().handle(&Method::Post, b"{not json");
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn non_http_url_is_a_bad_request() {
        let reply = service().handle(
            &Method::Post,
            br#"{"caseId":"42","userId":"u1","zipFileUrl":"file:///etc/passwd"}"#,
        );
        assert_eq!(reply.status, 400);
        let error = reply.body.expect("error body")["error"].clone();
        assert!(error.as_str().is_some_and(|text| text.contains("http or https")));
    }
}
