// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

use crate::EdgeError;

pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "dcm"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub file_name: String,
    pub original_path: String,
    pub sequence: usize,
    pub size_bytes: u64,
    pub content_type: String,
    pub sha256: String,
}

struct Candidate {
    path: String,
    data: Vec<u8>,
}

/// Pulls every image entry out of a ZIP archive in natural path order.
///
/// `max_extracted_bytes` bounds the total decompressed size.
pub fn extract_images(
    archive_bytes: &[u8],
    max_extracted_bytes: u64,
) -> Result<Vec<ImageRecord>, EdgeError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))?;
    let mut candidates = Vec::new();
    let mut extracted = 0u64;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_file() {
            continue;
        }
        let path = entry.name().trim_start_matches('/').to_owned();
        if entry.enclosed_name().is_none() {
            debug!(path = %path, "skipping entry outside archive root");
            continue;
        }
        if is_ignored_path(&path) || image_extension(&path).is_none() {
            debug!(path = %path, "skipping non-image entry");
            continue;
        }

        let remaining = max_extracted_bytes.saturating_sub(extracted);
        let mut data = Vec::new();
        entry
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|error| EdgeError::InvalidArchive(format!("read {path}: {error}")))?;
        extracted = extracted.saturating_add(data.len() as u64);
        if extracted > max_extracted_bytes {
            return Err(EdgeError::ArchiveTooLarge {
                limit: max_extracted_bytes,
            });
        }
        candidates.push(Candidate { path, data });
    }

    candidates.sort_by(|left, right| natural_cmp(&left.path, &right.path));

    let mut seen = BTreeSet::new();
    let records = candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| {
            let base = base_name(&candidate.path);
            let file_name = unique_name(base, &mut seen);
            let extension = image_extension(&candidate.path).unwrap_or_default();
            ImageRecord {
                file_name,
                original_path: candidate.path.clone(),
                sequence: index + 1,
                size_bytes: candidate.data.len() as u64,
                content_type: content_type(&extension).to_owned(),
                sha256: checksum_sha256(&candidate.data),
            }
        })
        .collect();
    Ok(records)
}

fn is_ignored_path(path: &str) -> bool {
    path.split('/')
        .any(|part| part == "__MACOSX" || part.starts_with('.'))
}

fn image_extension(path: &str) -> Option<String> {
    let name = base_name(path);
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Second and later uses of a name get `-2`, `-3` before the extension.
/// Names already emitted, generated ones included, are never reused.
fn unique_name(base: &str, seen: &mut BTreeSet<String>) -> String {
    if seen.insert(base.to_ascii_lowercase()) {
        return base.to_owned();
    }
    let mut suffix = 2usize;
    loop {
        let candidate = match base.rsplit_once('.') {
            Some((stem, extension)) => format!("{stem}-{suffix}.{extension}"),
            None => format!("{base}-{suffix}"),
        };
        if seen.insert(candidate.to_ascii_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "dcm" => "application/dicom",
        _ => "application/octet-stream",
    }
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

/// Orders digit runs by value and everything else case-insensitively, so
/// `slice2` sorts before `slice10`.
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let mut left_chars = left.chars().peekable();
    let mut right_chars = right.chars().peekable();
    loop {
        match (left_chars.peek().copied(), right_chars.peek().copied()) {
            (None, None) => return left.cmp(right),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let left_run = take_digits(&mut left_chars);
                let right_run = take_digits(&mut right_chars);
                let ordering = compare_digit_runs(&left_run, &right_run);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left_chars.next();
                right_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(ch) = chars.peek().copied() {
        if !ch.is_ascii_digit() {
            break;
        }
        run.push(ch);
        chars.next();
    }
    run
}

fn compare_digit_runs(left: &str, right: &str) -> Ordering {
    let left = left.trim_start_matches('0');
    let right = right.trim_start_matches('0');
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}

#[cfg(test)]
mod tests {
    use super::{image_extension, is_ignored_path, natural_cmp, unique_name};
    use std::cmp::Ordering;
    use std::collections::BTreeSet;

    #[test]
    fn natural_order_compares_numbers_by_value() {
        assert_eq!(natural_cmp("slice2.png", "slice10.png"), Ordering::Less);
        assert_eq!(natural_cmp("Slice10.png", "slice9.png"), Ordering::Greater);
        assert_ne!(natural_cmp("a/img007.png", "a/img7.png"), Ordering::Equal);
        assert_eq!(natural_cmp("axial", "axial/1.png"), Ordering::Less);

        let mut names = vec!["s10.png", "s1.png", "S2.png", "s01.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["s01.png", "s1.png", "S2.png", "s10.png"]);
    }

    #[test]
    fn ignored_paths() {
        assert!(is_ignored_path("__MACOSX/scan/a.png"));
        assert!(is_ignored_path("scan/._a.png"));
        assert!(is_ignored_path(".hidden/a.png"));
        assert!(!is_ignored_path("scan/a.png"));
    }

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert_eq!(image_extension("a/B.JPG"), Some("jpg".to_owned()));
        assert_eq!(image_extension("study.dcm"), Some("dcm".to_owned()));
        assert_eq!(image_extension("notes.txt"), None);
        assert_eq!(image_extension("png"), None);
        assert_eq!(image_extension("folder/.png"), None);
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let mut seen = BTreeSet::new();
        assert_eq!(unique_name("a.png", &mut seen), "a.png");
        assert_eq!(unique_name("A.png", &mut seen), "A-2.png");
        assert_eq!(unique_name("a.png", &mut seen), "a-3.png");
        assert_eq!(unique_name("b.png", &mut seen), "b.png");
    }

    #[test]
    fn generated_suffix_never_repeats_an_existing_name() {
        let mut seen = BTreeSet::new();
        assert_eq!(unique_name("a.png", &mut seen), "a.png");
        assert_eq!(unique_name("a.png", &mut seen), "a-2.png");
        assert_eq!(unique_name("A-2.png", &mut seen), "A-2-2.png");
        assert_eq!(unique_name("a.png", &mut seen), "a-3.png");
        assert_eq!(unique_name("scan", &mut seen), "scan");
        assert_eq!(unique_name("scan", &mut seen), "scan-2");
    }
}
