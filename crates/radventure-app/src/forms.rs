// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::wizard::{Wizard, WizardStep};
use crate::{CaseFilters, Event, MedicalCase, Modality, PrizeTier};

pub const MIN_DIFFICULTY: i32 = 1;
pub const MAX_DIFFICULTY: i32 = 5;
pub const MIN_ANSWER_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFormInput {
    pub title: String,
    pub specialty: String,
    pub modality: Option<Modality>,
    pub difficulty_level: i32,
    pub description: String,
    pub answer_options: Vec<String>,
    pub correct_answer_index: Option<usize>,
    pub explanation: String,
    pub tags: Vec<String>,
    pub points: Option<i64>,
}

impl Default for CaseFormInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            specialty: String::new(),
            modality: None,
            difficulty_level: MIN_DIFFICULTY,
            description: String::new(),
            answer_options: vec![String::new(); MIN_ANSWER_OPTIONS],
            correct_answer_index: None,
            explanation: String::new(),
            tags: Vec::new(),
            points: None,
        }
    }
}

impl CaseFormInput {
    pub fn from_case(case: &MedicalCase) -> Self {
        Self {
            title: case.title.clone(),
            specialty: case.specialty.clone(),
            modality: Some(case.modality),
            difficulty_level: case.difficulty_level,
            description: case.description.clone(),
            answer_options: case.answer_options.clone(),
            correct_answer_index: Some(case.correct_answer_index),
            explanation: case.explanation.clone(),
            tags: case.tags.clone(),
            points: Some(case.points),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.check_basics()?;
        self.check_imaging()?;
        self.check_question()?;
        self.check_explanation()
    }

    pub fn check_basics(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("case title is required -- enter a title and retry");
        }
        if self.specialty.trim().is_empty() {
            bail!("case specialty is required -- choose a specialty and retry");
        }
        Ok(())
    }

    pub fn check_imaging(&self) -> Result<()> {
        if self.modality.is_none() {
            bail!("case modality is required -- choose a modality and retry");
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty_level) {
            bail!(
                "case difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {}",
                self.difficulty_level
            );
        }
        if self.points.is_some_and(|points| points < 0) {
            bail!("case points cannot be negative");
        }
        Ok(())
    }

    pub fn check_question(&self) -> Result<()> {
        if self.answer_options.len() < MIN_ANSWER_OPTIONS {
            bail!("case needs at least {MIN_ANSWER_OPTIONS} answer options");
        }
        if let Some(position) = self
            .answer_options
            .iter()
            .position(|option| option.trim().is_empty())
        {
            bail!(
                "answer option {} is empty -- fill it in or remove it",
                position + 1
            );
        }
        match self.correct_answer_index {
            None => bail!("correct answer is required -- mark one option as correct"),
            Some(index) if index >= self.answer_options.len() => bail!(
                "correct answer {} is out of range for {} options",
                index + 1,
                self.answer_options.len()
            ),
            Some(_) => Ok(()),
        }
    }

    pub fn check_explanation(&self) -> Result<()> {
        if self.explanation.trim().is_empty() {
            bail!("case explanation is required -- explain the answer and retry");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventFormInput {
    pub name: String,
    pub description: String,
    pub starts_at: Option<OffsetDateTime>,
    pub ends_at: Option<OffsetDateTime>,
    pub prize_pool: i64,
    pub prize_distribution: Vec<PrizeTier>,
    pub case_filters: CaseFilters,
    pub banner_url: Option<String>,
}

impl EventFormInput {
    pub fn from_event(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            starts_at: Some(event.starts_at),
            ends_at: Some(event.ends_at),
            prize_pool: event.prize_pool,
            prize_distribution: event.prize_distribution.clone(),
            case_filters: event.case_filters.clone(),
            banner_url: event.banner_url.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.check_details()?;
        self.check_schedule()?;
        self.check_prizes()?;
        self.check_case_filters()
    }

    pub fn check_details(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("event name is required -- enter a name and retry");
        }
        if let Some(url) = self.banner_url.as_deref().map(str::trim) {
            if !url.is_empty() && !(url.starts_with("https://") || url.starts_with("http://")) {
                bail!("event banner must be an http(s) URL, got {url:?}");
            }
        }
        Ok(())
    }

    pub fn check_schedule(&self) -> Result<()> {
        let (Some(starts_at), Some(ends_at)) = (self.starts_at, self.ends_at) else {
            bail!("event schedule is required -- set both start and end");
        };
        if ends_at <= starts_at {
            bail!("event end must be after its start");
        }
        Ok(())
    }

    pub fn check_prizes(&self) -> Result<()> {
        if self.prize_pool < 0 {
            bail!("event prize pool cannot be negative");
        }
        let mut ranks = BTreeSet::new();
        let mut total = 0i64;
        for tier in &self.prize_distribution {
            if tier.rank == 0 {
                bail!("prize ranks start at 1");
            }
            if !ranks.insert(tier.rank) {
                bail!("prize rank {} is listed twice", tier.rank);
            }
            if tier.radcoins < 0 {
                bail!("prize for rank {} cannot be negative", tier.rank);
            }
            total = total.saturating_add(tier.radcoins);
        }
        if total > self.prize_pool {
            bail!(
                "prize distribution totals {total} RadCoins but the pool is {}",
                self.prize_pool
            );
        }
        Ok(())
    }

    pub fn check_case_filters(&self) -> Result<()> {
        let filters = &self.case_filters;
        for value in [filters.min_difficulty, filters.max_difficulty]
            .into_iter()
            .flatten()
        {
            if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value) {
                bail!(
                    "difficulty filter must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {value}"
                );
            }
        }
        if let (Some(min), Some(max)) = (filters.min_difficulty, filters.max_difficulty) {
            if min > max {
                bail!("difficulty filter minimum {min} is above maximum {max}");
            }
        }
        Ok(())
    }
}

pub fn case_wizard(data: CaseFormInput) -> Result<Wizard<CaseFormInput>> {
    Wizard::new(
        vec![
            WizardStep {
                name: "basics",
                validate: |form: &CaseFormInput| form.check_basics().is_ok(),
            },
            WizardStep {
                name: "imaging",
                validate: |form: &CaseFormInput| form.check_imaging().is_ok(),
            },
            WizardStep {
                name: "question",
                validate: |form: &CaseFormInput| form.check_question().is_ok(),
            },
            WizardStep {
                name: "explanation",
                validate: |form: &CaseFormInput| form.check_explanation().is_ok(),
            },
        ],
        data,
    )
}

pub fn event_wizard(data: EventFormInput) -> Result<Wizard<EventFormInput>> {
    Wizard::new(
        vec![
            WizardStep {
                name: "details",
                validate: |form: &EventFormInput| form.check_details().is_ok(),
            },
            WizardStep {
                name: "schedule",
                validate: |form: &EventFormInput| form.check_schedule().is_ok(),
            },
            WizardStep {
                name: "prizes",
                validate: |form: &EventFormInput| form.check_prizes().is_ok(),
            },
            WizardStep {
                name: "case filters",
                validate: |form: &EventFormInput| form.check_case_filters().is_ok(),
            },
        ],
        data,
    )
}
