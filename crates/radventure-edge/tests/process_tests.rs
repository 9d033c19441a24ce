// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use radventure_edge::{EdgeConfig, EdgeError, EdgeService, bind, extract_images, serve};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server, StatusCode};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

fn build_zip(entries: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options)?;
        } else {
            writer.start_file(*name, options)?;
            writer.write_all(data.as_bytes())?;
        }
    }
    Ok(writer.finish()?.into_inner())
}

fn radiology_zip() -> Result<Vec<u8>> {
    build_zip(&[
        ("scan/", ""),
        ("scan/slice10.png", "slice ten"),
        ("scan/slice2.png", "slice two"),
        ("other/slice2.png", "slice two"),
        ("__MACOSX/scan/._slice2.png", "resource fork"),
        ("scan/.DS_Store", "finder"),
        ("notes.txt", "read me"),
        ("series/study.DCM", "DICM"),
    ])
}

/// Serves `body` with `status` for each of the next `count` requests.
fn archive_host(
    status: u16,
    body: Vec<u8>,
    count: usize,
) -> Result<(String, thread::JoinHandle<()>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let url = format!("http://{}/case.zip", server.server_addr());
    let handle = thread::spawn(move || {
        for _ in 0..count {
            let request = server.recv().expect("request expected");
            assert_eq!(request.url(), "/case.zip");
            let response = Response::from_data(body.clone())
                .with_status_code(status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/zip")
                        .expect("valid content type header"),
                );
            let _ = request.respond(response);
        }
    });
    Ok((url, handle))
}

fn request_body(url: &str) -> Vec<u8> {
    json!({ "caseId": "case-17", "zipFileUrl": url, "userId": "user-3" })
        .to_string()
        .into_bytes()
}

#[test]
fn extraction_keeps_images_in_natural_order() -> Result<()> {
    let images = extract_images(&radiology_zip()?, 1024)?;
    let paths: Vec<&str> = images
        .iter()
        .map(|image| image.original_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            "other/slice2.png",
            "scan/slice2.png",
            "scan/slice10.png",
            "series/study.DCM"
        ]
    );
    let names: Vec<&str> = images.iter().map(|image| image.file_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["slice2.png", "slice2-2.png", "slice10.png", "study.DCM"]
    );
    let sequences: Vec<usize> = images.iter().map(|image| image.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);

    assert_eq!(images[0].content_type, "image/png");
    assert_eq!(images[3].content_type, "application/dicom");
    assert_eq!(images[0].size_bytes, 9);
    assert_eq!(images[0].sha256, images[1].sha256);
    assert_ne!(images[0].sha256, images[2].sha256);
    assert_eq!(images[0].sha256.len(), 64);
    Ok(())
}

#[test]
fn renamed_duplicates_do_not_collide_with_real_names() -> Result<()> {
    let archive = build_zip(&[("x/a.png", "one"), ("y/a.png", "two"), ("z/a-2.png", "three")])?;
    let images = extract_images(&archive, 1024)?;
    let names: Vec<&str> = images.iter().map(|image| image.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "a-2.png", "a-2-2.png"]);
    let unique: BTreeSet<String> = names.iter().map(|name| name.to_lowercase()).collect();
    assert_eq!(unique.len(), images.len());
    Ok(())
}

#[test]
fn extraction_enforces_decompressed_limit() -> Result<()> {
    let pixels = "x".repeat(600);
    let archive = build_zip(&[("a.png", pixels.as_str()), ("b.png", pixels.as_str())])?;
    assert_eq!(extract_images(&archive, 2000)?.len(), 2);
    let err = extract_images(&archive, 1000).expect_err("limit should trip");
    assert!(matches!(err, EdgeError::ArchiveTooLarge { limit: 1000 }));
    Ok(())
}

#[test]
fn corrupt_archive_is_a_bad_request() {
    let err = extract_images(b"definitely not a zip", 1024).expect_err("corrupt archive");
    assert!(matches!(err, EdgeError::Zip(_)));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn process_downloads_and_lists_images() -> Result<()> {
    let (url, host) = archive_host(200, radiology_zip()?, 1)?;
    let service = EdgeService::new(&EdgeConfig::default())?;

    let processed = service.process(&request_body(&url))?;
    assert!(processed.success);
    assert_eq!(processed.case_id, "case-17");
    assert_eq!(processed.images.len(), 4);
    assert_eq!(processed.message, "processed 4 images");

    let encoded = serde_json::to_value(&processed)?;
    assert_eq!(encoded["caseId"], json!("case-17"));
    assert_eq!(encoded["images"][1]["fileName"], json!("slice2-2.png"));
    assert_eq!(encoded["images"][1]["originalPath"], json!("scan/slice2.png"));
    assert!(encoded["images"][0]["sizeBytes"].is_u64());

    host.join().expect("archive host should join");
    Ok(())
}

#[test]
fn archive_without_images_succeeds_empty() -> Result<()> {
    let (url, host) = archive_host(200, build_zip(&[("readme.txt", "hi")])?, 1)?;
    let service = EdgeService::new(&EdgeConfig::default())?;
    let processed = service.process(&request_body(&url))?;
    assert!(processed.images.is_empty());
    assert_eq!(processed.message, "archive contains no images");
    host.join().expect("archive host should join");
    Ok(())
}

#[test]
fn missing_archive_is_a_server_error() -> Result<()> {
    let (url, host) = archive_host(404, b"gone".to_vec(), 1)?;
    let service = EdgeService::new(&EdgeConfig::default())?;
    let err = service
        .process(&request_body(&url))
        .expect_err("404 should fail");
    assert!(matches!(err, EdgeError::FetchStatus { status: 404, .. }));
    assert_eq!(err.status_code(), 500);
    host.join().expect("archive host should join");
    Ok(())
}

#[test]
fn truncated_download_is_a_server_error() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let url = format!("http://{}/case.zip", server.server_addr());
    let host = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        // Promises more bytes than it sends.
        let response = Response::new(
            StatusCode(200),
            Vec::new(),
            Cursor::new(b"PK\x03\x04".to_vec()),
            Some(4096),
            None,
        );
        let _ = request.respond(response);
    });

    let service = EdgeService::new(&EdgeConfig {
        fetch_timeout: Duration::from_millis(500),
        ..EdgeConfig::default()
    })?;
    let err = service
        .process(&request_body(&url))
        .expect_err("short body should fail");
    assert!(matches!(err, EdgeError::FetchBody { .. }), "got {err:?}");
    assert_eq!(err.status_code(), 500);
    host.join().expect("archive host should join");
    Ok(())
}

#[test]
fn oversized_download_is_rejected() -> Result<()> {
    let (url, host) = archive_host(200, radiology_zip()?, 1)?;
    let service = EdgeService::new(&EdgeConfig {
        max_archive_bytes: 64,
        ..EdgeConfig::default()
    })?;
    let err = service
        .process(&request_body(&url))
        .expect_err("download over cap");
    assert!(matches!(err, EdgeError::ArchiveTooLarge { limit: 64 }));
    host.join().expect("archive host should join");
    Ok(())
}

#[test]
fn unreachable_host_is_a_server_error() -> Result<()> {
    let service = EdgeService::new(&EdgeConfig {
        fetch_timeout: Duration::from_millis(200),
        ..EdgeConfig::default()
    })?;
    let err = service
        .process(&request_body("http://127.0.0.1:1/case.zip"))
        .expect_err("connection should fail");
    assert!(matches!(err, EdgeError::Fetch { .. }));
    assert_eq!(err.status_code(), 500);
    Ok(())
}

#[test]
fn live_server_answers_preflight_post_and_rejects_get() -> Result<()> {
    let (archive_url, host) = archive_host(200, radiology_zip()?, 1)?;
    let server = Arc::new(bind("127.0.0.1:0")?);
    let base = format!("http://{}/", server.server_addr());
    let service = EdgeService::new(&EdgeConfig::default())?;
    let serving = Arc::clone(&server);
    let worker = thread::spawn(move || serve(&service, &serving));

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let preflight = client.request(reqwest::Method::OPTIONS, &base).send()?;
    assert_eq!(preflight.status().as_u16(), 200);
    let headers = preflight.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    assert_eq!(
        headers
            .get("access-control-allow-methods")
            .and_then(|value| value.to_str().ok()),
        Some("POST, OPTIONS")
    );
    assert!(preflight.text()?.is_empty());

    let posted = client
        .post(&base)
        .header("content-type", "application/json")
        .body(request_body(&archive_url))
        .send()?;
    assert_eq!(posted.status().as_u16(), 200);
    let body: Value = posted.json()?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["images"].as_array().map(Vec::len), Some(4));

    let rejected = client.get(&base).send()?;
    assert_eq!(rejected.status().as_u16(), 405);
    let body: Value = rejected.json()?;
    assert_eq!(body["success"], json!(false));

    let bad = client.post(&base).body("{}").send()?;
    assert_eq!(bad.status().as_u16(), 400);
    let body: Value = bad.json()?;
    assert_eq!(body["error"], json!("caseId is required"));

    server.unblock();
    worker
        .join()
        .map_err(|_| anyhow!("server thread panicked"))??;
    host.join().expect("archive host should join");
    Ok(())
}
