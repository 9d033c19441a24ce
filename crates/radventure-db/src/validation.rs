// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use radventure_app::Modality;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidRadCoins,
    NegativeRadCoins,
    InvalidDifficulty,
    InvalidRange,
    InvalidModality,
    InvalidDate,
    InvalidId,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRadCoins => f.write_str("invalid RadCoin amount"),
            Self::NegativeRadCoins => f.write_str("negative RadCoin amount"),
            Self::InvalidDifficulty => f.write_str("difficulty must be a whole number from 1 to 5"),
            Self::InvalidRange => f.write_str("invalid range, expected MIN:MAX"),
            Self::InvalidModality => f.write_str("unknown imaging modality"),
            Self::InvalidDate => f.write_str("invalid date value"),
            Self::InvalidId => f.write_str("invalid id"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Parses a whole RadCoin amount, allowing thousands separators.
pub fn parse_radcoins(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(ValidationError::NegativeRadCoins);
    }
    let digits: String = trimmed.chars().filter(|ch| *ch != ',').collect();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidRadCoins);
    }
    digits
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidRadCoins)
}

pub fn format_radcoins(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{} RC", comma_format(amount.unsigned_abs()))
}

pub fn format_compact_radcoins(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let value = amount.unsigned_abs() as f64;
    if value < 1000.0 {
        return format!("{sign}{} RC", amount.unsigned_abs());
    }
    let (scaled, suffix) = if value < 1_000_000.0 {
        (value / 1000.0, "k")
    } else {
        (value / 1_000_000.0, "M")
    };
    let rounded = (scaled * 10.0).round() / 10.0;
    if rounded.fract().abs() < f64::EPSILON {
        format!("{sign}{rounded:.0}{suffix} RC")
    } else {
        format!("{sign}{rounded:.1}{suffix} RC")
    }
}

pub fn parse_difficulty(input: &str) -> ValidationResult<i32> {
    let value = input
        .trim()
        .parse::<i32>()
        .map_err(|_| ValidationError::InvalidDifficulty)?;
    if !(1..=5).contains(&value) {
        return Err(ValidationError::InvalidDifficulty);
    }
    Ok(value)
}

/// Parses `MIN:MAX`, where either side may be blank.
pub fn parse_difficulty_range(input: &str) -> ValidationResult<(Option<i32>, Option<i32>)> {
    let (min_raw, max_raw) = input
        .split_once(':')
        .ok_or(ValidationError::InvalidRange)?;
    let parse_side = |raw: &str| -> ValidationResult<Option<i32>> {
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            parse_difficulty(raw).map(Some)
        }
    };
    let min = parse_side(min_raw)?;
    let max = parse_side(max_raw)?;
    if min.is_none() && max.is_none() {
        return Err(ValidationError::InvalidRange);
    }
    Ok((min, max))
}

/// Accepts either the wire name (`x_ray`) or the display label (`X-Ray`).
pub fn parse_modality(input: &str) -> ValidationResult<Modality> {
    let trimmed = input.trim();
    Modality::parse(&trimmed.to_ascii_lowercase())
        .or_else(|| {
            Modality::ALL
                .into_iter()
                .find(|modality| modality.label().eq_ignore_ascii_case(trimmed))
        })
        .ok_or(ValidationError::InvalidModality)
}

/// Splits comma-separated tags, dropping blanks and case-insensitive repeats.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let tag = raw.trim();
        if tag.is_empty() || tags.iter().any(|seen| seen.eq_ignore_ascii_case(tag)) {
            continue;
        }
        tags.push(tag.to_owned());
    }
    tags
}

/// RFC 3339 timestamps, or a bare date taken as midnight UTC.
pub fn parse_optional_datetime(input: &str) -> ValidationResult<Option<OffsetDateTime>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(Some(value));
    }
    time::Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
        .map(|date| Some(date.midnight().assume_utc()))
        .map_err(|_| ValidationError::InvalidDate)
}

pub fn parse_id(input: &str) -> ValidationResult<i64> {
    let value = input
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidId)?;
    if value <= 0 {
        return Err(ValidationError::InvalidId);
    }
    Ok(value)
}

fn comma_format(value: u64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}
