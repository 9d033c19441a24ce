// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! In-memory filtering and sorting for fetched collections.
//!
//! Predicate groups are AND-combined and the values inside one set filter
//! are OR-combined. A record that lacks a constrained field is excluded.
//! When sorting, a missing field ranks as the lowest value, so it comes
//! first ascending and last descending. Equal keys keep their input order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{CaseFilters, Event, MedicalCase, Profile, RadCoinProduct, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Timestamp(OffsetDateTime),
    Bool(bool),
    List(Vec<String>),
}

impl FieldValue {
    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::Timestamp(_) => 2,
            Self::Text(_) => 3,
            Self::List(_) => 4,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::Text(raw) => OffsetDateTime::parse(raw, &Rfc3339).ok(),
            _ => None,
        }
    }

    fn set_keys(&self) -> Vec<String> {
        match self {
            Self::Text(value) => vec![value.clone()],
            Self::Number(value) if value.fract() == 0.0 => vec![format!("{}", *value as i64)],
            Self::Number(value) => vec![value.to_string()],
            Self::Bool(value) => vec![value.to_string()],
            Self::List(values) => values.clone(),
            Self::Timestamp(_) => Vec::new(),
        }
    }

    fn contains_text(&self, needle: &str) -> bool {
        match self {
            Self::Text(value) => value.to_lowercase().contains(needle),
            Self::List(values) => values
                .iter()
                .any(|value| value.to_lowercase().contains(needle)),
            _ => false,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(left), Self::Text(right)) => left.to_lowercase().cmp(&right.to_lowercase()),
            (Self::Number(left), Self::Number(right)) => left.total_cmp(right),
            (Self::Timestamp(left), Self::Timestamp(right)) => left.cmp(right),
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::List(left), Self::List(right)) => left
                .join(",")
                .to_lowercase()
                .cmp(&right.join(",").to_lowercase()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A row the filter engine can inspect by field name.
pub trait Record {
    /// Text fields scanned by free-text search.
    const SEARCH_FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> Option<FieldValue>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub field: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub field: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sets: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub ranges: Vec<NumericRange>,
    #[serde(default)]
    pub date_ranges: Vec<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            direction: SortDirection::Desc,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction.reversed(),
        }
    }
}

impl FilterSpec {
    pub fn with_search(mut self, search: &str) -> Self {
        self.search = search.to_owned();
        self
    }

    pub fn with_set<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .entry(field.to_owned())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_range(mut self, field: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.ranges.push(NumericRange {
            field: field.to_owned(),
            min,
            max,
        });
        self
    }

    pub fn with_date_range(
        mut self,
        field: &str,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Self {
        self.date_ranges.push(DateRange {
            field: field.to_owned(),
            from,
            to,
        });
        self
    }

    pub fn toggle_set_value(&mut self, field: &str, value: &str) {
        let values = self.sets.entry(field.to_owned()).or_default();
        if !values.remove(value) {
            values.insert(value.to_owned());
        }
        if values.is_empty() {
            self.sets.remove(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.sets.values().all(BTreeSet::is_empty)
            && self
                .ranges
                .iter()
                .all(|range| range.min.is_none() && range.max.is_none())
            && self
                .date_ranges
                .iter()
                .all(|range| range.from.is_none() && range.to.is_none())
    }

    /// True when some range has its lower bound above its upper bound.
    pub fn is_unsatisfiable(&self) -> bool {
        let numeric = self.ranges.iter().any(|range| match (range.min, range.max) {
            (Some(min), Some(max)) => min > max,
            _ => false,
        });
        let dates = self
            .date_ranges
            .iter()
            .any(|range| match (range.from, range.to) {
                (Some(from), Some(to)) => from > to,
                _ => false,
            });
        numeric || dates
    }

    pub fn matches<T: Record>(&self, record: &T) -> bool {
        self.matches_search(record)
            && self.matches_sets(record)
            && self.matches_ranges(record)
            && self.matches_date_ranges(record)
    }

    fn matches_search<T: Record>(&self, record: &T) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        T::SEARCH_FIELDS.iter().any(|name| {
            record
                .field(name)
                .is_some_and(|value| value.contains_text(&needle))
        })
    }

    fn matches_sets<T: Record>(&self, record: &T) -> bool {
        self.sets.iter().all(|(field, allowed)| {
            if allowed.is_empty() {
                return true;
            }
            let Some(value) = record.field(field) else {
                return false;
            };
            value.set_keys().iter().any(|key| allowed.contains(key))
        })
    }

    fn matches_ranges<T: Record>(&self, record: &T) -> bool {
        self.ranges.iter().all(|range| {
            if range.min.is_none() && range.max.is_none() {
                return true;
            }
            let Some(value) = record.field(&range.field).and_then(|v| v.as_number()) else {
                return false;
            };
            range.min.is_none_or(|min| value >= min) && range.max.is_none_or(|max| value <= max)
        })
    }

    fn matches_date_ranges<T: Record>(&self, record: &T) -> bool {
        self.date_ranges.iter().all(|range| {
            if range.from.is_none() && range.to.is_none() {
                return true;
            }
            let Some(value) = record
                .field(&range.field)
                .and_then(|v| v.as_timestamp())
            else {
                return false;
            };
            range.from.is_none_or(|from| value >= from) && range.to.is_none_or(|to| value <= to)
        })
    }
}

/// Indices of `records` that pass `filter`, in display order.
pub fn apply_indices<T: Record>(
    records: &[T],
    filter: &FilterSpec,
    sort: Option<&SortSpec>,
) -> Vec<usize> {
    if filter.is_unsatisfiable() {
        return Vec::new();
    }

    let matching = records
        .iter()
        .enumerate()
        .filter(|(_, record)| filter.matches(*record))
        .map(|(index, _)| index);

    let Some(sort) = sort else {
        return matching.collect();
    };

    let mut keyed: Vec<(usize, Option<FieldValue>)> = matching
        .map(|index| (index, records[index].field(&sort.field)))
        .collect();
    keyed.sort_by(|(_, left), (_, right)| {
        let ordering = compare_keys(left.as_ref(), right.as_ref());
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    keyed.into_iter().map(|(index, _)| index).collect()
}

pub fn apply<'a, T: Record>(
    records: &'a [T],
    filter: &FilterSpec,
    sort: Option<&SortSpec>,
) -> Vec<&'a T> {
    apply_indices(records, filter, sort)
        .into_iter()
        .map(|index| &records[index])
        .collect()
}

fn compare_keys(left: Option<&FieldValue>, right: Option<&FieldValue>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => left.compare(right),
    }
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_owned()))
}

fn number<N: Into<f64>>(value: N) -> Option<FieldValue> {
    Some(FieldValue::Number(value.into()))
}

fn count(value: i64) -> Option<FieldValue> {
    Some(FieldValue::Number(value as f64))
}

impl CaseFilters {
    pub fn to_filter_spec(&self) -> FilterSpec {
        let mut spec = FilterSpec::default()
            .with_set("specialty", self.specialties.iter().cloned())
            .with_set(
                "modality",
                self.modalities.iter().map(|modality| modality.as_str()),
            );
        if self.min_difficulty.is_some() || self.max_difficulty.is_some() {
            spec = spec.with_range(
                "difficulty_level",
                self.min_difficulty.map(f64::from),
                self.max_difficulty.map(f64::from),
            );
        }
        spec
    }
}

impl Record for MedicalCase {
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "specialty", "description", "tags"];

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => count(self.id.get()),
            "title" => text(&self.title),
            "specialty" => text(&self.specialty),
            "modality" => text(self.modality.as_str()),
            "difficulty_level" => number(self.difficulty_level),
            "description" => text(&self.description),
            "explanation" => text(&self.explanation),
            "tags" => Some(FieldValue::List(self.tags.clone())),
            "points" => count(self.points),
            "created_at" => Some(FieldValue::Timestamp(self.created_at)),
            "updated_at" => Some(FieldValue::Timestamp(self.updated_at)),
            _ => None,
        }
    }
}

impl Record for Event {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => count(self.id.get()),
            "name" => text(&self.name),
            "description" => text(&self.description),
            "starts_at" => Some(FieldValue::Timestamp(self.starts_at)),
            "ends_at" => Some(FieldValue::Timestamp(self.ends_at)),
            "prize_pool" => count(self.prize_pool),
            "specialties" => Some(FieldValue::List(self.case_filters.specialties.clone())),
            "banner_url" => self.banner_url.as_deref().and_then(text),
            "created_at" => Some(FieldValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

impl Record for Profile {
    const SEARCH_FIELDS: &'static [&'static str] = &["full_name", "email", "institution"];

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => count(self.id.get()),
            "full_name" => text(&self.full_name),
            "email" => text(&self.email),
            "institution" => text(&self.institution),
            "academic_stage" => text(&self.academic_stage),
            "specialty_interest" => text(&self.specialty_interest),
            "radcoin_balance" => count(self.radcoin_balance),
            "total_points" => count(self.total_points),
            "created_at" => Some(FieldValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

impl Record for RadCoinProduct {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description", "category"];

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => count(self.id.get()),
            "name" => text(&self.name),
            "description" => text(&self.description),
            "category" => text(&self.category),
            "price" => count(self.price),
            "is_active" => Some(FieldValue::Bool(self.is_active)),
            _ => None,
        }
    }
}

impl Record for serde_json::Map<String, serde_json::Value> {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["title", "name", "full_name", "description", "specialty"];

    fn field(&self, name: &str) -> Option<FieldValue> {
        match self.get(name)? {
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
            serde_json::Value::Bool(value) => Some(FieldValue::Bool(*value)),
            serde_json::Value::Number(value) => value.as_f64().map(FieldValue::Number),
            serde_json::Value::String(value) => text(value),
            serde_json::Value::Array(values) => Some(FieldValue::List(
                values
                    .iter()
                    .filter_map(|value| match value {
                        serde_json::Value::String(item) => Some(item.clone()),
                        serde_json::Value::Number(item) => Some(item.to_string()),
                        _ => None,
                    })
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterSpec, Record, SortSpec, apply, apply_indices};
    use crate::{CaseFilters, CaseId, MedicalCase, Modality};
    use serde_json::json;
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn case(id: i64, title: &str, specialty: &str, points: i64) -> MedicalCase {
        MedicalCase {
            id: CaseId::new(id),
            title: title.to_owned(),
            specialty: specialty.to_owned(),
            modality: Modality::Ct,
            difficulty_level: 2,
            description: String::new(),
            answer_options: vec!["a".to_owned(), "b".to_owned()],
            correct_answer_index: 0,
            explanation: String::new(),
            tags: Vec::new(),
            points,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn ids(cases: &[&MedicalCase]) -> Vec<i64> {
        cases.iter().map(|case| case.id.get()).collect()
    }

    #[test]
    fn specialty_set_keeps_only_members() {
        let records = vec![case(1, "Heart", "Cardio", 10), case(2, "Brain", "Neuro", 20)];
        let filter = FilterSpec::default().with_set("specialty", ["Neuro"]);

        let result = apply(&records, &filter, None);
        assert_eq!(ids(&result), vec![2]);
        assert_eq!(result[0].points, 20);
    }

    #[test]
    fn empty_inputs_and_empty_spec() {
        let empty: Vec<MedicalCase> = Vec::new();
        assert!(apply(&empty, &FilterSpec::default(), None).is_empty());

        let records = vec![case(3, "C", "Neuro", 1), case(1, "A", "Cardio", 2)];
        let result = apply(&records, &FilterSpec::default(), None);
        assert_eq!(ids(&result), vec![3, 1]);
    }

    #[test]
    fn empty_set_never_excludes() {
        let records = vec![case(1, "A", "Cardio", 1), case(2, "B", "Neuro", 2)];
        let filter = FilterSpec::default().with_set("specialty", Vec::<String>::new());
        assert_eq!(apply_indices(&records, &filter, None), vec![0, 1]);
    }

    #[test]
    fn blank_search_is_identity() {
        let records = vec![case(1, "A", "Cardio", 1), case(2, "B", "Neuro", 2)];
        let blank = FilterSpec::default().with_search("");
        let spaces = FilterSpec::default().with_search("   ");
        assert_eq!(apply_indices(&records, &blank, None), vec![0, 1]);
        assert_eq!(apply_indices(&records, &spaces, None), vec![0, 1]);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let mut tagged = case(3, "Chest film", "Thoracic", 5);
        tagged.tags = vec!["Pneumothorax".to_owned()];
        let records = vec![
            case(1, "Subdural hematoma", "Neuro", 1),
            case(2, "Aortic dissection", "Cardio", 2),
            tagged,
        ];

        let by_title = FilterSpec::default().with_search("HEMATOMA");
        assert_eq!(apply_indices(&records, &by_title, None), vec![0]);

        let by_specialty = FilterSpec::default().with_search("cardio");
        assert_eq!(apply_indices(&records, &by_specialty, None), vec![1]);

        let by_tag = FilterSpec::default().with_search("pneumo");
        assert_eq!(apply_indices(&records, &by_tag, None), vec![2]);
    }

    #[test]
    fn default_points_range_keeps_everything_inside_it() {
        let records = vec![
            case(1, "A", "Cardio", 0),
            case(2, "B", "Neuro", 55),
            case(3, "C", "Neuro", 100),
        ];
        let filter = FilterSpec::default().with_range("points", Some(0.0), Some(100.0));
        assert_eq!(apply_indices(&records, &filter, None), vec![0, 1, 2]);
    }

    #[test]
    fn conflicting_range_yields_nothing() {
        let records = vec![case(1, "A", "Cardio", 10)];
        let filter = FilterSpec::default().with_range("points", Some(50.0), Some(10.0));
        assert!(apply(&records, &filter, None).is_empty());

        let dates = FilterSpec::default().with_date_range(
            "created_at",
            Some(datetime!(2026-02-01 00:00 UTC)),
            Some(datetime!(2026-01-01 00:00 UTC)),
        );
        assert!(apply(&records, &dates, None).is_empty());
    }

    #[test]
    fn missing_field_never_matches_constraints() {
        let records = vec![case(1, "A", "Cardio", 10)];
        let set = FilterSpec::default().with_set("unknown", ["x"]);
        let range = FilterSpec::default().with_range("unknown", Some(0.0), None);
        assert!(apply(&records, &set, None).is_empty());
        assert!(apply(&records, &range, None).is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let mut early = case(1, "A", "Cardio", 1);
        early.created_at = datetime!(2026-01-01 00:00 UTC);
        let mut late = case(2, "B", "Cardio", 1);
        late.created_at = datetime!(2026-03-01 00:00 UTC);
        let records = vec![early, late];

        let filter = FilterSpec::default().with_date_range(
            "created_at",
            Some(datetime!(2026-01-01 00:00 UTC)),
            Some(datetime!(2026-02-01 00:00 UTC)),
        );
        assert_eq!(apply_indices(&records, &filter, None), vec![0]);
    }

    #[test]
    fn groups_are_and_combined_values_or_combined() {
        let records = vec![
            case(1, "A", "Cardio", 10),
            case(2, "B", "Neuro", 90),
            case(3, "C", "MSK", 50),
        ];
        let filter = FilterSpec::default()
            .with_set("specialty", ["Cardio", "Neuro"])
            .with_range("points", Some(20.0), None);
        assert_eq!(apply_indices(&records, &filter, None), vec![1]);
    }

    #[test]
    fn reversing_direction_reverses_tie_free_output() {
        let records = vec![
            case(1, "Delta", "Neuro", 40),
            case(2, "alpha", "Neuro", 10),
            case(3, "Charlie", "Neuro", 30),
            case(4, "bravo", "Neuro", 20),
        ];
        for field in ["title", "points"] {
            let ascending = apply_indices(&records, &FilterSpec::default(), Some(&SortSpec::asc(field)));
            let mut descending =
                apply_indices(&records, &FilterSpec::default(), Some(&SortSpec::desc(field)));
            descending.reverse();
            assert_eq!(ascending, descending, "field {field}");
        }
        let ascending = apply(&records, &FilterSpec::default(), Some(&SortSpec::asc("title")));
        assert_eq!(ids(&ascending), vec![2, 4, 3, 1]);
    }

    #[test]
    fn ties_keep_input_order_in_both_directions() {
        let records = vec![
            case(1, "A", "Neuro", 10),
            case(2, "B", "Neuro", 10),
            case(3, "C", "Neuro", 5),
        ];
        let asc = apply(&records, &FilterSpec::default(), Some(&SortSpec::asc("points")));
        assert_eq!(ids(&asc), vec![3, 1, 2]);
        let desc = apply(&records, &FilterSpec::default(), Some(&SortSpec::desc("points")));
        assert_eq!(ids(&desc), vec![1, 2, 3]);
    }

    #[test]
    fn missing_sort_field_ranks_lowest() {
        let rows = vec![
            json!({"id": 1, "title": "b", "score": 5}),
            json!({"id": 2, "title": "a"}),
            json!({"id": 3, "title": "c", "score": 1}),
        ]
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect::<Vec<_>>();

        let asc = apply_indices(&rows, &FilterSpec::default(), Some(&SortSpec::asc("score")));
        assert_eq!(asc, vec![1, 2, 0]);
        let desc = apply_indices(&rows, &FilterSpec::default(), Some(&SortSpec::desc("score")));
        assert_eq!(desc, vec![0, 2, 1]);
    }

    #[test]
    fn input_collection_is_untouched() {
        let records = vec![case(2, "B", "Neuro", 2), case(1, "A", "Neuro", 1)];
        let before = records.clone();
        let _ = apply(&records, &FilterSpec::default(), Some(&SortSpec::asc("points")));
        assert_eq!(records, before);
    }

    #[test]
    fn case_filters_translate_to_spec() {
        let mut hard = case(1, "A", "Neuro", 10);
        hard.difficulty_level = 5;
        let mut ultrasound = case(2, "B", "Neuro", 10);
        ultrasound.modality = Modality::Ultrasound;
        let records = vec![hard, ultrasound, case(3, "C", "Neuro", 10)];

        let filters = CaseFilters {
            specialties: vec!["Neuro".to_owned()],
            modalities: vec![Modality::Ct],
            min_difficulty: Some(1),
            max_difficulty: Some(3),
        };
        assert_eq!(
            apply_indices(&records, &filters.to_filter_spec(), None),
            vec![2]
        );
        assert!(CaseFilters::default().to_filter_spec().is_empty());
    }

    #[test]
    fn toggling_set_values_removes_empty_groups() {
        let mut filter = FilterSpec::default();
        filter.toggle_set_value("specialty", "Neuro");
        assert!(!filter.is_empty());
        filter.toggle_set_value("specialty", "Neuro");
        assert!(filter.is_empty());
        assert!(filter.sets.is_empty());
    }

    #[test]
    fn json_rows_expose_lists_and_numbers() {
        let row = json!({"tags": ["a", "b"], "difficulty_level": 3, "body": {"x": 1}});
        let row = row.as_object().cloned().unwrap_or_default();
        let filter = FilterSpec::default()
            .with_set("tags", ["b"])
            .with_set("difficulty_level", ["3"]);
        assert!(filter.matches(&row));
        assert!(row.field("body").is_none());
    }
}
