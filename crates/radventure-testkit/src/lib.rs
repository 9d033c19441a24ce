// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use radventure_app::{
    CaseFilters, CaseFormInput, EventFormInput, MAX_DIFFICULTY, MIN_DIFFICULTY, Modality,
    PrizeTier,
};
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const REFERENCE_NOW: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);

const SPECIALTIES: [&str; 8] = [
    "Neuroradiology",
    "Chest",
    "Musculoskeletal",
    "Abdominal",
    "Pediatric",
    "Breast",
    "Cardiac",
    "Interventional",
];

/// Finding, answer, distractor and teaching point per specialty.
const FINDINGS: [(&str, &str, &str, &str); 16] = [
    (
        "Neuroradiology",
        "Epidural hematoma",
        "Subdural hematoma",
        "Lentiform collection that does not cross suture lines.",
    ),
    (
        "Neuroradiology",
        "Acute ischemic stroke",
        "Low-grade glioma",
        "Restricted diffusion in a vascular territory.",
    ),
    (
        "Chest",
        "Tension pneumothorax",
        "Bullous emphysema",
        "Mediastinal shift away from the collapsed lung.",
    ),
    (
        "Chest",
        "Lobar pneumonia",
        "Pulmonary infarct",
        "Air bronchograms within a lobar consolidation.",
    ),
    (
        "Musculoskeletal",
        "Scaphoid fracture",
        "Lunate dislocation",
        "Waist lucency with preserved carpal alignment.",
    ),
    (
        "Musculoskeletal",
        "Osteosarcoma",
        "Ewing sarcoma",
        "Metaphyseal sunburst periosteal reaction.",
    ),
    (
        "Abdominal",
        "Acute appendicitis",
        "Mesenteric adenitis",
        "Dilated appendix with periappendiceal fat stranding.",
    ),
    (
        "Abdominal",
        "Small bowel obstruction",
        "Paralytic ileus",
        "Transition point with collapsed distal loops.",
    ),
    (
        "Pediatric",
        "Intussusception",
        "Midgut volvulus",
        "Target sign in the right upper quadrant.",
    ),
    (
        "Pediatric",
        "Pyloric stenosis",
        "Pylorospasm",
        "Muscle wall over 3 mm that does not relax.",
    ),
    (
        "Breast",
        "Invasive ductal carcinoma",
        "Fibroadenoma",
        "Spiculated mass with posterior shadowing.",
    ),
    (
        "Breast",
        "Simple cyst",
        "Complicated cyst",
        "Anechoic with posterior acoustic enhancement.",
    ),
    (
        "Cardiac",
        "Aortic dissection",
        "Intramural hematoma",
        "Intimal flap separating true and false lumens.",
    ),
    (
        "Cardiac",
        "Pericardial effusion",
        "Pericardial thickening",
        "Fluid surrounding the heart on all views.",
    ),
    (
        "Interventional",
        "Active extravasation",
        "Pseudoaneurysm",
        "Contrast blush that grows on delayed phase.",
    ),
    (
        "Interventional",
        "Portal vein thrombosis",
        "Slow portal flow",
        "Filling defect persisting across phases.",
    ),
];

const EXTRA_DISTRACTORS: [&str; 6] = [
    "Normal study",
    "Imaging artifact",
    "Metastatic disease",
    "Post-surgical change",
    "Infection",
    "Congenital variant",
];

const TAGS: [&str; 8] = [
    "trauma",
    "emergency",
    "classic",
    "board-review",
    "pediatric",
    "oncology",
    "vascular",
    "high-yield",
];

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Turner", "Brooks",
];
const INSTITUTIONS: [&str; 6] = [
    "Lakeside Medical College",
    "Northview University Hospital",
    "Summit Health Sciences",
    "Cedar Valley Medical School",
    "Harbor Teaching Hospital",
    "Ridge State University",
];
const ACADEMIC_STAGES: [&str; 5] = [
    "Medical student",
    "Intern",
    "Resident",
    "Fellow",
    "Attending",
];

const EVENT_THEMES: [&str; 6] = [
    "Night Shift",
    "Trauma Bay",
    "Board Sprint",
    "Rapid Reads",
    "Grand Rounds",
    "Weekend Call",
];

/// Learner details for seeding a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub full_name: String,
    pub email: String,
    pub institution: String,
    pub academic_stage: String,
    pub specialty_interest: String,
    pub radcoin_balance: i64,
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for radiology cases, events and learners.
#[derive(Debug, Clone)]
pub struct CaseFaker {
    rng: DeterministicRng,
    learners: u64,
}

impl CaseFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            learners: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn learner(&mut self) -> Learner {
        self.learners += 1;
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        Learner {
            full_name: format!("{first} {last}"),
            email: format!(
                "{}.{}{}@example.test",
                first.to_lowercase(),
                last.to_lowercase(),
                self.learners
            ),
            institution: self.pick(&INSTITUTIONS).to_owned(),
            academic_stage: self.pick(&ACADEMIC_STAGES).to_owned(),
            specialty_interest: self.pick(&SPECIALTIES).to_owned(),
            radcoin_balance: self.int_range_i64(0, 50) * 10,
        }
    }

    pub fn case_form(&mut self) -> CaseFormInput {
        let (specialty, answer, distractor, teaching) = FINDINGS[self.rng.int_n(FINDINGS.len())];
        self.case_form_for(specialty, answer, distractor, teaching)
    }

    pub fn case_form_in(&mut self, specialty: &str) -> CaseFormInput {
        let matching: Vec<_> = FINDINGS
            .iter()
            .filter(|(name, ..)| *name == specialty)
            .collect();
        if matching.is_empty() {
            let mut form = self.case_form();
            form.specialty = specialty.to_owned();
            return form;
        }
        let (specialty, answer, distractor, teaching) = *matching[self.rng.int_n(matching.len())];
        self.case_form_for(specialty, answer, distractor, teaching)
    }

    pub fn event_form(&mut self) -> EventFormInput {
        let starts_at = self.random_datetime_between(
            REFERENCE_NOW,
            REFERENCE_NOW + Duration::days(90),
        );
        let ends_at = starts_at + Duration::hours(self.int_range_i64(1, 72));
        let prize_pool = self.int_range_i64(10, 100) * 10;
        let first = prize_pool / 2;
        let second = prize_pool * 3 / 10;
        let third = prize_pool / 5;

        let specialty = self.pick(&SPECIALTIES).to_owned();
        let min_difficulty = self.int_range_i32(MIN_DIFFICULTY, 3);
        let max_difficulty = self.int_range_i32(min_difficulty, MAX_DIFFICULTY);

        EventFormInput {
            name: format!("{} {}", specialty, self.pick(&EVENT_THEMES)),
            description: format!("Timed {specialty} cases for every stage of training."),
            starts_at: Some(starts_at),
            ends_at: Some(ends_at),
            prize_pool,
            prize_distribution: vec![
                PrizeTier {
                    rank: 1,
                    radcoins: first,
                },
                PrizeTier {
                    rank: 2,
                    radcoins: second,
                },
                PrizeTier {
                    rank: 3,
                    radcoins: third,
                },
            ],
            case_filters: CaseFilters {
                specialties: vec![specialty],
                modalities: Vec::new(),
                min_difficulty: Some(min_difficulty),
                max_difficulty: Some(max_difficulty),
            },
            banner_url: None,
        }
    }

    fn case_form_for(
        &mut self,
        specialty: &str,
        answer: &str,
        distractor: &str,
        teaching: &str,
    ) -> CaseFormInput {
        let mut options = vec![answer.to_owned(), distractor.to_owned()];
        let extra = self.int_range_i64(0, 2) as usize;
        for _ in 0..extra {
            let candidate = self.pick(&EXTRA_DISTRACTORS).to_owned();
            if !options.contains(&candidate) {
                options.push(candidate);
            }
        }
        let correct_index = self.rng.int_n(options.len());
        options.swap(0, correct_index);

        let mut tags = vec![self.pick(&TAGS).to_owned()];
        if self.rng.bool() {
            let second = self.pick(&TAGS).to_owned();
            if !tags.contains(&second) {
                tags.push(second);
            }
        }

        CaseFormInput {
            title: answer.to_owned(),
            specialty: specialty.to_owned(),
            modality: Some(Modality::ALL[self.rng.int_n(Modality::ALL.len())]),
            difficulty_level: self.int_range_i32(MIN_DIFFICULTY, MAX_DIFFICULTY),
            description: format!("Review the {specialty} images and choose the best diagnosis."),
            answer_options: options,
            correct_answer_index: Some(correct_index),
            explanation: teaching.to_owned(),
            tags,
            points: None,
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i32(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let offset = (self.rng.next_u64() % (span as u64)) as i64;
        (i64::from(min) + offset) as i32
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn random_datetime_between(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> OffsetDateTime {
        let span = (end - start).whole_seconds();
        if span <= 0 {
            return start;
        }
        let offset = self.rng.next_u64() % (span as u64 + 1);
        start + Duration::seconds(offset as i64)
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("radventure.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn reference_now() -> OffsetDateTime {
    REFERENCE_NOW
}

pub fn specialties() -> &'static [&'static str] {
    &SPECIALTIES
}
