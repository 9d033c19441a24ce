// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use radventure_app::{
    AnswerOutcome, Benefits, CaseFilters, CaseFormInput, CaseId, Event, EventFormInput, EventId,
    LevelProgress, MedicalCase, Modality, OfferId, OnboardingState, PrizeTier, ProductId, Profile,
    ProfileId, RadCoinProduct, SpecialOffer, TransactionId, TransactionLogRow, TxType,
    UserBenefits, apply, case_radcoin_reward, default_case_points, pending_level_up,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub mod rows;
pub mod shop;
pub mod validation;

pub use radventure_app::PurchaseError;
pub use rows::{Predicate, RowQuery, Table};

pub const APP_NAME: &str = "radventure";

struct DefaultProduct {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    price: i64,
    benefits: Benefits,
}

const DEFAULT_PRODUCTS: [DefaultProduct; 4] = [
    DefaultProduct {
        name: "Elimination Pack",
        description: "Remove two wrong answers on three cases",
        category: "aids",
        price: 100,
        benefits: Benefits {
            elimination_aids: 3,
            skip_aids: 0,
            ai_tutor_credits: 0,
        },
    },
    DefaultProduct {
        name: "Skip Pack",
        description: "Skip three cases without breaking a streak",
        category: "aids",
        price: 80,
        benefits: Benefits {
            elimination_aids: 0,
            skip_aids: 3,
            ai_tutor_credits: 0,
        },
    },
    DefaultProduct {
        name: "AI Tutor Credits",
        description: "Five guided explanations from the AI tutor",
        category: "tutor",
        price: 150,
        benefits: Benefits {
            elimination_aids: 0,
            skip_aids: 0,
            ai_tutor_credits: 5,
        },
    },
    DefaultProduct {
        name: "Study Bundle",
        description: "Five of every aid",
        category: "bundle",
        price: 300,
        benefits: Benefits {
            elimination_aids: 5,
            skip_aids: 5,
            ai_tutor_credits: 5,
        },
    },
];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "profiles",
        &[
            "id",
            "full_name",
            "email",
            "radcoin_balance",
            "total_points",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "medical_cases",
        &[
            "id",
            "title",
            "specialty",
            "modality",
            "difficulty_level",
            "answer_options",
            "correct_answer_index",
            "tags",
            "points",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "events",
        &[
            "id",
            "name",
            "starts_at",
            "ends_at",
            "prize_pool",
            "prize_distribution",
            "case_filters",
            "created_at",
        ],
    ),
    (
        "radcoin_products",
        &["id", "name", "price", "benefits", "is_active"],
    ),
    (
        "special_offers",
        &[
            "id",
            "product_id",
            "discount_percent",
            "starts_at",
            "ends_at",
            "is_active",
        ],
    ),
    (
        "radcoin_transactions",
        &[
            "id",
            "user_id",
            "tx_type",
            "amount",
            "balance_after",
            "metadata",
            "created_at",
        ],
    ),
    (
        "user_benefits",
        &["user_id", "elimination_aids", "skip_aids", "ai_tutor_credits"],
    ),
    (
        "case_attempts",
        &["id", "user_id", "case_id", "choice", "correct", "created_at"],
    ),
    (
        "onboarding_states",
        &["user_id", "onboarding_completed", "last_seen_level"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_profiles_email",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_email ON profiles (email);",
    },
    RequiredIndex {
        name: "idx_medical_cases_specialty",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_medical_cases_specialty ON medical_cases (specialty);",
    },
    RequiredIndex {
        name: "idx_medical_cases_modality",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_medical_cases_modality ON medical_cases (modality);",
    },
    RequiredIndex {
        name: "idx_events_starts_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_events_starts_at ON events (starts_at);",
    },
    RequiredIndex {
        name: "idx_radcoin_products_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_radcoin_products_name ON radcoin_products (name);",
    },
    RequiredIndex {
        name: "idx_special_offers_product_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_special_offers_product_id ON special_offers (product_id);",
    },
    RequiredIndex {
        name: "idx_radcoin_transactions_user_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_radcoin_transactions_user_id ON radcoin_transactions (user_id, created_at);",
    },
    RequiredIndex {
        name: "idx_case_attempts_user_case",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_case_attempts_user_case ON case_attempts (user_id, case_id);",
    },
];

const PROFILE_COLUMNS: &str = "
  id, full_name, email, radcoin_balance, total_points,
  institution, academic_stage, specialty_interest, created_at, updated_at
";

const CASE_COLUMNS: &str = "
  id, title, specialty, modality, difficulty_level, description,
  answer_options, correct_answer_index, explanation, tags, points,
  created_at, updated_at
";

const EVENT_COLUMNS: &str = "
  id, name, description, starts_at, ends_at, prize_pool,
  prize_distribution, case_filters, banner_url, created_at
";

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, benefits, is_active";

const OFFER_COLUMNS: &str =
    "id, product_id, title, discount_percent, starts_at, ends_at, is_active";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub full_name: String,
    pub email: String,
    pub institution: String,
    pub academic_stage: String,
    pub specialty_interest: String,
    pub radcoin_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCase {
    pub title: String,
    pub specialty: String,
    pub modality: Modality,
    pub difficulty_level: i32,
    pub description: String,
    pub answer_options: Vec<String>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub tags: Vec<String>,
    pub points: i64,
}

impl NewCase {
    /// Validates a finished case form; unset points follow the difficulty.
    pub fn from_form(form: &CaseFormInput) -> Result<Self> {
        form.validate()?;
        let modality = form
            .modality
            .ok_or_else(|| anyhow!("case modality is required -- choose a modality and retry"))?;
        let correct_answer_index = form
            .correct_answer_index
            .ok_or_else(|| anyhow!("correct answer is required -- mark one option as correct"))?;
        Ok(Self {
            title: form.title.trim().to_owned(),
            specialty: form.specialty.trim().to_owned(),
            modality,
            difficulty_level: form.difficulty_level,
            description: form.description.clone(),
            answer_options: form.answer_options.clone(),
            correct_answer_index,
            explanation: form.explanation.clone(),
            tags: form.tags.clone(),
            points: form
                .points
                .unwrap_or_else(|| default_case_points(form.difficulty_level)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub prize_pool: i64,
    pub prize_distribution: Vec<PrizeTier>,
    pub case_filters: CaseFilters,
    pub banner_url: Option<String>,
}

impl NewEvent {
    pub fn from_form(form: &EventFormInput) -> Result<Self> {
        form.validate()?;
        let (Some(starts_at), Some(ends_at)) = (form.starts_at, form.ends_at) else {
            bail!("event schedule is required -- set both start and end");
        };
        Ok(Self {
            name: form.name.trim().to_owned(),
            description: form.description.clone(),
            starts_at,
            ends_at,
            prize_pool: form.prize_pool,
            prize_distribution: form.prize_distribution.clone(),
            case_filters: form.case_filters.clone(),
            banner_url: form
                .banner_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_owned),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub benefits: Benefits,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub product_id: ProductId,
    pub title: String,
    pub discount_percent: i64,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub is_active: bool,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            debug!("creating schema");
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;

        self.seed_defaults()?;
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<()> {
        let now = now_rfc3339()?;
        for product in &DEFAULT_PRODUCTS {
            self.conn
                .execute(
                    "
                    INSERT OR IGNORE INTO radcoin_products (
                      name, description, category, price, benefits, is_active,
                      created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, 1, ?, ?)
                    ",
                    params![
                        product.name,
                        product.description,
                        product.category,
                        product.price,
                        to_json_text(&product.benefits)?,
                        now,
                        now,
                    ],
                )
                .with_context(|| format!("insert default product {}", product.name))?;
        }
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT name
                FROM sqlite_master
                WHERE type = 'table'
                  AND name NOT LIKE 'sqlite_%'
                ORDER BY name ASC
                ",
            )
            .context("prepare table names query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query table names")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect table names")
    }

    pub fn create_profile(&self, profile: &NewProfile) -> Result<ProfileId> {
        if profile.full_name.trim().is_empty() {
            bail!("profile name is required -- enter a name and retry");
        }
        if !profile.email.contains('@') {
            bail!(
                "profile email {:?} is not an address -- use name@host",
                profile.email
            );
        }
        if profile.radcoin_balance < 0 {
            bail!("starting RadCoin balance cannot be negative");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO profiles (
                  full_name, email, radcoin_balance, total_points,
                  institution, academic_stage, specialty_interest,
                  created_at, updated_at
                ) VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?)
                ",
                params![
                    profile.full_name.trim(),
                    profile.email.trim(),
                    profile.radcoin_balance,
                    profile.institution,
                    profile.academic_stage,
                    profile.specialty_interest,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert profile {}", profile.email))?;
        Ok(ProfileId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_profile(&self, profile_id: ProfileId) -> Result<Profile> {
        self.conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"),
                params![profile_id.get()],
                profile_from_row,
            )
            .optional()
            .with_context(|| format!("load profile {profile_id}"))?
            .ok_or_else(|| anyhow!("profile {profile_id} not found"))
    }

    /// Profiles ranked for the leaderboard.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY total_points DESC, id ASC"
            ))
            .context("prepare profiles query")?;
        let rows = stmt
            .query_map([], profile_from_row)
            .context("query profiles")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect profiles")
    }

    /// Credits or debits a balance outside of the shop. The balance never
    /// drops below zero.
    pub fn adjust_balance(&self, user_id: ProfileId, delta: i64, reason: &str) -> Result<i64> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin balance adjustment")?;
        let now = now_rfc3339()?;
        let balance_after = apply_balance_delta(&tx, user_id, delta, &now)?;
        append_transaction(
            &tx,
            user_id,
            TxType::AdminAdjustment,
            delta,
            balance_after,
            &json!({ "reason": reason }),
            &now,
        )?;
        tx.commit().context("commit balance adjustment")?;
        info!(user = %user_id, delta, balance_after, "balance adjusted");
        Ok(balance_after)
    }

    pub fn create_case(&self, case: &NewCase) -> Result<CaseId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO medical_cases (
                  title, specialty, modality, difficulty_level, description,
                  answer_options, correct_answer_index, explanation, tags, points,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    case.title,
                    case.specialty,
                    case.modality.as_str(),
                    case.difficulty_level,
                    case.description,
                    to_json_text(&case.answer_options)?,
                    index_to_sql(case.correct_answer_index)?,
                    case.explanation,
                    to_json_text(&case.tags)?,
                    case.points,
                    now,
                    now,
                ],
            )
            .context("insert case")?;
        Ok(CaseId::new(self.conn.last_insert_rowid()))
    }

    pub fn update_case(&self, case_id: CaseId, case: &NewCase) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE medical_cases
                SET
                  title = ?,
                  specialty = ?,
                  modality = ?,
                  difficulty_level = ?,
                  description = ?,
                  answer_options = ?,
                  correct_answer_index = ?,
                  explanation = ?,
                  tags = ?,
                  points = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    case.title,
                    case.specialty,
                    case.modality.as_str(),
                    case.difficulty_level,
                    case.description,
                    to_json_text(&case.answer_options)?,
                    index_to_sql(case.correct_answer_index)?,
                    case.explanation,
                    to_json_text(&case.tags)?,
                    case.points,
                    now,
                    case_id.get(),
                ],
            )
            .context("update case")?;
        if rows_affected == 0 {
            bail!("case {case_id} not found -- choose an existing case and retry");
        }
        Ok(())
    }

    pub fn get_case(&self, case_id: CaseId) -> Result<MedicalCase> {
        self.conn
            .query_row(
                &format!("SELECT {CASE_COLUMNS} FROM medical_cases WHERE id = ?"),
                params![case_id.get()],
                case_from_row,
            )
            .optional()
            .with_context(|| format!("load case {case_id}"))?
            .ok_or_else(|| anyhow!("case {case_id} not found"))
    }

    pub fn list_cases(&self) -> Result<Vec<MedicalCase>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {CASE_COLUMNS} FROM medical_cases ORDER BY updated_at DESC, id DESC"
            ))
            .context("prepare cases query")?;
        let rows = stmt.query_map([], case_from_row).context("query cases")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect cases")
    }

    pub fn delete_case(&self, case_id: CaseId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM medical_cases WHERE id = ?",
                params![case_id.get()],
            )
            .with_context(|| format!("delete case {case_id}"))?;
        if rows_affected == 0 {
            bail!("case {case_id} not found");
        }
        Ok(())
    }

    /// Deletes every listed case in one transaction; missing ids are skipped.
    pub fn delete_cases(&self, case_ids: &[CaseId]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk delete")?;
        let mut deleted = 0usize;
        for case_id in case_ids {
            deleted += tx
                .execute(
                    "DELETE FROM medical_cases WHERE id = ?",
                    params![case_id.get()],
                )
                .with_context(|| format!("delete case {case_id}"))?;
        }
        tx.commit().context("commit bulk delete")?;
        info!(requested = case_ids.len(), deleted, "bulk deleted cases");
        Ok(deleted)
    }

    /// Adds `tag` to each listed case that lacks it; returns how many changed.
    pub fn add_tag_to_cases(&self, case_ids: &[CaseId], tag: &str) -> Result<usize> {
        let tag = tag.trim();
        if tag.is_empty() {
            bail!("tag must not be empty -- enter a tag and retry");
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk tag")?;
        let now = now_rfc3339()?;
        let mut changed = 0usize;
        for case_id in case_ids {
            let raw: Option<String> = tx
                .query_row(
                    "SELECT tags FROM medical_cases WHERE id = ?",
                    params![case_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("load tags for case {case_id}"))?;
            let Some(raw) = raw else {
                continue;
            };
            let mut tags: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("decode tags for case {case_id}"))?;
            if tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
                continue;
            }
            tags.push(tag.to_owned());
            tx.execute(
                "UPDATE medical_cases SET tags = ?, updated_at = ? WHERE id = ?",
                params![to_json_text(&tags)?, now, case_id.get()],
            )
            .with_context(|| format!("update tags for case {case_id}"))?;
            changed += 1;
        }
        tx.commit().context("commit bulk tag")?;
        info!(tag, requested = case_ids.len(), changed, "bulk tagged cases");
        Ok(changed)
    }

    /// Pretty JSON array of the listed cases in id order.
    pub fn export_cases_json(&self, case_ids: &[CaseId]) -> Result<String> {
        let wanted: BTreeSet<CaseId> = case_ids.iter().copied().collect();
        let mut cases: Vec<MedicalCase> = self
            .list_cases()?
            .into_iter()
            .filter(|case| wanted.contains(&case.id))
            .collect();
        cases.sort_by_key(|case| case.id);
        serde_json::to_string_pretty(&cases).context("encode exported cases")
    }

    pub fn create_event(&self, event: &NewEvent) -> Result<EventId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO events (
                  name, description, starts_at, ends_at, prize_pool,
                  prize_distribution, case_filters, banner_url,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    event.name,
                    event.description,
                    format_datetime(event.starts_at)?,
                    format_datetime(event.ends_at)?,
                    event.prize_pool,
                    to_json_text(&event.prize_distribution)?,
                    to_json_text(&event.case_filters)?,
                    event.banner_url,
                    now,
                    now,
                ],
            )
            .context("insert event")?;
        Ok(EventId::new(self.conn.last_insert_rowid()))
    }

    pub fn update_event(&self, event_id: EventId, event: &NewEvent) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE events
                SET
                  name = ?,
                  description = ?,
                  starts_at = ?,
                  ends_at = ?,
                  prize_pool = ?,
                  prize_distribution = ?,
                  case_filters = ?,
                  banner_url = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    event.name,
                    event.description,
                    format_datetime(event.starts_at)?,
                    format_datetime(event.ends_at)?,
                    event.prize_pool,
                    to_json_text(&event.prize_distribution)?,
                    to_json_text(&event.case_filters)?,
                    event.banner_url,
                    now,
                    event_id.get(),
                ],
            )
            .context("update event")?;
        if rows_affected == 0 {
            bail!("event {event_id} not found -- choose an existing event and retry");
        }
        Ok(())
    }

    pub fn get_event(&self, event_id: EventId) -> Result<Event> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
                params![event_id.get()],
                event_from_row,
            )
            .optional()
            .with_context(|| format!("load event {event_id}"))?
            .ok_or_else(|| anyhow!("event {event_id} not found"))
    }

    pub fn list_events(&self) -> Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at ASC, id ASC"
            ))
            .context("prepare events query")?;
        let rows = stmt.query_map([], event_from_row).context("query events")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect events")
    }

    pub fn delete_event(&self, event_id: EventId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM events WHERE id = ?", params![event_id.get()])
            .with_context(|| format!("delete event {event_id}"))?;
        if rows_affected == 0 {
            bail!("event {event_id} not found");
        }
        Ok(())
    }

    /// Catalog cases matching the event's case filters.
    pub fn eligible_cases(&self, event_id: EventId) -> Result<Vec<MedicalCase>> {
        let event = self.get_event(event_id)?;
        let cases = self.list_cases()?;
        let spec = event.case_filters.to_filter_spec();
        Ok(apply(&cases, &spec, None).into_iter().cloned().collect())
    }

    /// Pays the prize for `rank` in `event` into the user's balance.
    pub fn award_event_prize(&self, event_id: EventId, user_id: ProfileId, rank: u32) -> Result<i64> {
        let event = self.get_event(event_id)?;
        let Some(prize) = event.prize_for_rank(rank) else {
            bail!("event {event_id} has no prize for rank {rank}");
        };
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin prize payout")?;
        let now = now_rfc3339()?;
        let balance_after = apply_balance_delta(&tx, user_id, prize, &now)?;
        append_transaction(
            &tx,
            user_id,
            TxType::EventPrize,
            prize,
            balance_after,
            &json!({ "event_id": event_id, "rank": rank }),
            &now,
        )?;
        tx.commit().context("commit prize payout")?;
        info!(event = %event_id, user = %user_id, rank, prize, "event prize paid");
        Ok(balance_after)
    }

    pub fn create_product(&self, product: &NewProduct) -> Result<ProductId> {
        if product.name.trim().is_empty() {
            bail!("product name is required -- enter a name and retry");
        }
        if product.price < 0 {
            bail!("product price cannot be negative");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO radcoin_products (
                  name, description, category, price, benefits, is_active,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    product.name.trim(),
                    product.description,
                    product.category,
                    product.price,
                    to_json_text(&product.benefits)?,
                    product.is_active,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert product {}", product.name))?;
        Ok(ProductId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_product(&self, product_id: ProductId) -> Result<Option<RadCoinProduct>> {
        self.conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM radcoin_products WHERE id = ?"),
                params![product_id.get()],
                product_from_row,
            )
            .optional()
            .with_context(|| format!("load product {product_id}"))
    }

    pub fn list_products(&self, include_inactive: bool) -> Result<Vec<RadCoinProduct>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM radcoin_products\n");
        if !include_inactive {
            sql.push_str("WHERE is_active = 1\n");
        }
        sql.push_str("ORDER BY price ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql).context("prepare products query")?;
        let rows = stmt
            .query_map([], product_from_row)
            .context("query products")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect products")
    }

    pub fn set_product_active(&self, product_id: ProductId, is_active: bool) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE radcoin_products SET is_active = ?, updated_at = ? WHERE id = ?",
                params![is_active, now_rfc3339()?, product_id.get()],
            )
            .with_context(|| format!("update product {product_id}"))?;
        if rows_affected == 0 {
            bail!("product {product_id} not found");
        }
        Ok(())
    }

    pub fn create_offer(&self, offer: &NewOffer) -> Result<OfferId> {
        if !(0..=100).contains(&offer.discount_percent) {
            bail!(
                "discount must be between 0 and 100 percent, got {}",
                offer.discount_percent
            );
        }
        if offer.ends_at <= offer.starts_at {
            bail!("offer end must be after its start");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO special_offers (
                  product_id, title, discount_percent, starts_at, ends_at,
                  is_active, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    offer.product_id.get(),
                    offer.title,
                    offer.discount_percent,
                    format_datetime(offer.starts_at)?,
                    format_datetime(offer.ends_at)?,
                    offer.is_active,
                    now,
                    now,
                ],
            )
            .context("insert offer")?;
        Ok(OfferId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_offer(&self, offer_id: OfferId) -> Result<Option<SpecialOffer>> {
        self.conn
            .query_row(
                &format!("SELECT {OFFER_COLUMNS} FROM special_offers WHERE id = ?"),
                params![offer_id.get()],
                offer_from_row,
            )
            .optional()
            .with_context(|| format!("load offer {offer_id}"))
    }

    pub fn list_offers(&self) -> Result<Vec<SpecialOffer>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {OFFER_COLUMNS} FROM special_offers ORDER BY starts_at ASC, id ASC"
            ))
            .context("prepare offers query")?;
        let rows = stmt.query_map([], offer_from_row).context("query offers")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect offers")
    }

    pub fn list_transactions(&self, user_id: ProfileId) -> Result<Vec<TransactionLogRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, user_id, tx_type, amount, balance_after, metadata, created_at
                FROM radcoin_transactions
                WHERE user_id = ?
                ORDER BY id DESC
                ",
            )
            .context("prepare transactions query")?;
        let rows = stmt
            .query_map(params![user_id.get()], |row| {
                let tx_type_raw: String = row.get(2)?;
                let tx_type = TxType::parse(&tx_type_raw).ok_or_else(|| {
                    invalid_column(2, format!("unknown transaction type {tx_type_raw}"))
                })?;
                Ok(TransactionLogRow {
                    id: TransactionId::new(row.get(0)?),
                    user_id: ProfileId::new(row.get(1)?),
                    tx_type,
                    amount: row.get(3)?,
                    balance_after: row.get(4)?,
                    metadata: json_column(row, 5)?,
                    created_at: datetime_column(row, 6)?,
                })
            })
            .context("query transactions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect transactions")
    }

    pub fn user_benefits(&self, user_id: ProfileId) -> Result<UserBenefits> {
        let benefits = self
            .conn
            .query_row(
                "
                SELECT elimination_aids, skip_aids, ai_tutor_credits
                FROM user_benefits
                WHERE user_id = ?
                ",
                params![user_id.get()],
                |row| {
                    Ok(Benefits {
                        elimination_aids: row.get(0)?,
                        skip_aids: row.get(1)?,
                        ai_tutor_credits: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load benefits for profile {user_id}"))?
            .unwrap_or_default();
        Ok(UserBenefits { user_id, benefits })
    }

    /// Records an attempt. Only the first correct answer to a case earns
    /// points and RadCoins.
    pub fn submit_answer(
        &self,
        user_id: ProfileId,
        case_id: CaseId,
        choice: usize,
    ) -> Result<AnswerOutcome> {
        let case = self.get_case(case_id)?;
        if choice >= case.answer_options.len() {
            bail!(
                "choice {} is out of range for {} answer options",
                choice + 1,
                case.answer_options.len()
            );
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin answer submission")?;
        let now = now_rfc3339()?;
        let already_rewarded: bool = tx
            .query_row(
                "
                SELECT EXISTS(
                  SELECT 1 FROM case_attempts
                  WHERE user_id = ? AND case_id = ? AND correct = 1
                )
                ",
                params![user_id.get(), case_id.get()],
                |row| row.get(0),
            )
            .context("check earlier attempts")?;

        let correct = case.is_correct(choice);
        let rewarded = correct && !already_rewarded;
        let points_awarded = if rewarded { case.points } else { 0 };
        let radcoins_awarded = if rewarded {
            case_radcoin_reward(case.difficulty_level)
        } else {
            0
        };

        tx.execute(
            "
            INSERT INTO case_attempts (
              user_id, case_id, choice, correct, points_awarded, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                user_id.get(),
                case_id.get(),
                index_to_sql(choice)?,
                correct,
                points_awarded,
                now,
            ],
        )
        .context("record attempt")?;

        if rewarded {
            tx.execute(
                "
                UPDATE profiles
                SET total_points = total_points + ?,
                    radcoin_balance = radcoin_balance + ?,
                    updated_at = ?
                WHERE id = ?
                ",
                params![points_awarded, radcoins_awarded, now, user_id.get()],
            )
            .context("credit case reward")?;
        }

        let (total_points, balance_after): (i64, i64) = tx
            .query_row(
                "SELECT total_points, radcoin_balance FROM profiles WHERE id = ?",
                params![user_id.get()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("load profile totals")?
            .ok_or_else(|| anyhow!("profile {user_id} not found"))?;

        if rewarded {
            append_transaction(
                &tx,
                user_id,
                TxType::CaseReward,
                radcoins_awarded,
                balance_after,
                &json!({ "case_id": case_id, "points": points_awarded }),
                &now,
            )?;
        }
        tx.commit().context("commit answer submission")?;
        debug!(user = %user_id, case = %case_id, correct, points_awarded, "answer recorded");

        Ok(AnswerOutcome {
            correct,
            points_awarded,
            radcoins_awarded,
            total_points,
            balance_after,
        })
    }

    pub fn onboarding_state(&self, user_id: ProfileId) -> Result<OnboardingState> {
        let stored = self
            .conn
            .query_row(
                "
                SELECT onboarding_completed, last_seen_level
                FROM onboarding_states
                WHERE user_id = ?
                ",
                params![user_id.get()],
                |row| Ok((row.get::<_, bool>(0)?, row.get::<_, u32>(1)?)),
            )
            .optional()
            .with_context(|| format!("load onboarding state for profile {user_id}"))?;
        let (onboarding_completed, last_seen_level) = stored.unwrap_or((false, 1));
        Ok(OnboardingState {
            user_id,
            onboarding_completed,
            last_seen_level,
        })
    }

    pub fn complete_onboarding(&self, user_id: ProfileId) -> Result<()> {
        self.conn
            .execute(
                "
                INSERT INTO onboarding_states (user_id, onboarding_completed, last_seen_level, updated_at)
                VALUES (?, 1, 1, ?)
                ON CONFLICT (user_id) DO UPDATE SET
                  onboarding_completed = 1,
                  updated_at = excluded.updated_at
                ",
                params![user_id.get(), now_rfc3339()?],
            )
            .with_context(|| format!("complete onboarding for profile {user_id}"))?;
        Ok(())
    }

    /// Marks `level` as seen. The stored level never moves backwards.
    pub fn acknowledge_level(&self, user_id: ProfileId, level: u32) -> Result<()> {
        self.conn
            .execute(
                "
                INSERT INTO onboarding_states (user_id, onboarding_completed, last_seen_level, updated_at)
                VALUES (?, 0, ?, ?)
                ON CONFLICT (user_id) DO UPDATE SET
                  last_seen_level = MAX(last_seen_level, excluded.last_seen_level),
                  updated_at = excluded.updated_at
                ",
                params![user_id.get(), level, now_rfc3339()?],
            )
            .with_context(|| format!("acknowledge level {level} for profile {user_id}"))?;
        Ok(())
    }

    pub fn level_progress(&self, user_id: ProfileId) -> Result<LevelProgress> {
        let profile = self.get_profile(user_id)?;
        Ok(LevelProgress::from_points(profile.total_points))
    }

    pub fn pending_level_up(&self, user_id: ProfileId) -> Result<Option<u32>> {
        let profile = self.get_profile(user_id)?;
        let state = self.onboarding_state(user_id)?;
        Ok(pending_level_up(&state, profile.total_points))
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("RADVENTURE_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set RADVENTURE_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("radventure.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// Applies `delta` to a balance inside an open transaction, refusing to go
/// below zero.
fn apply_balance_delta(
    conn: &Connection,
    user_id: ProfileId,
    delta: i64,
    now: &str,
) -> Result<i64> {
    let rows_affected = conn
        .execute(
            "
            UPDATE profiles
            SET radcoin_balance = radcoin_balance + ?1, updated_at = ?2
            WHERE id = ?3 AND radcoin_balance + ?1 >= 0
            ",
            params![delta, now, user_id.get()],
        )
        .with_context(|| format!("update balance for profile {user_id}"))?;
    if rows_affected == 0 {
        let balance = current_balance(conn, user_id)?;
        match balance {
            None => bail!("profile {user_id} not found"),
            Some(balance) => bail!(
                "adjustment of {delta} would overdraw balance {balance} -- use a smaller amount"
            ),
        }
    }
    current_balance(conn, user_id)?.ok_or_else(|| anyhow!("profile {user_id} not found"))
}

fn current_balance(conn: &Connection, user_id: ProfileId) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT radcoin_balance FROM profiles WHERE id = ?",
        params![user_id.get()],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("load balance for profile {user_id}"))
}

fn append_transaction(
    conn: &Connection,
    user_id: ProfileId,
    tx_type: TxType,
    amount: i64,
    balance_after: i64,
    metadata: &serde_json::Value,
    now: &str,
) -> Result<TransactionId> {
    conn.execute(
        "
        INSERT INTO radcoin_transactions (
          user_id, tx_type, amount, balance_after, metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ",
        params![
            user_id.get(),
            tx_type.as_str(),
            amount,
            balance_after,
            metadata.to_string(),
            now,
        ],
    )
    .with_context(|| format!("log {} transaction", tx_type.as_str()))?;
    Ok(TransactionId::new(conn.last_insert_rowid()))
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: ProfileId::new(row.get(0)?),
        full_name: row.get(1)?,
        email: row.get(2)?,
        radcoin_balance: row.get(3)?,
        total_points: row.get(4)?,
        institution: row.get(5)?,
        academic_stage: row.get(6)?,
        specialty_interest: row.get(7)?,
        created_at: datetime_column(row, 8)?,
        updated_at: datetime_column(row, 9)?,
    })
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalCase> {
    let modality_raw: String = row.get(3)?;
    let modality = Modality::parse(&modality_raw)
        .ok_or_else(|| invalid_column(3, format!("unknown modality {modality_raw}")))?;
    let correct_raw: i64 = row.get(7)?;
    let correct_answer_index = usize::try_from(correct_raw)
        .map_err(|_| invalid_column(7, format!("negative answer index {correct_raw}")))?;

    Ok(MedicalCase {
        id: CaseId::new(row.get(0)?),
        title: row.get(1)?,
        specialty: row.get(2)?,
        modality,
        difficulty_level: row.get(4)?,
        description: row.get(5)?,
        answer_options: json_column(row, 6)?,
        correct_answer_index,
        explanation: row.get(8)?,
        tags: json_column(row, 9)?,
        points: row.get(10)?,
        created_at: datetime_column(row, 11)?,
        updated_at: datetime_column(row, 12)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: EventId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        starts_at: datetime_column(row, 3)?,
        ends_at: datetime_column(row, 4)?,
        prize_pool: row.get(5)?,
        prize_distribution: json_column(row, 6)?,
        case_filters: json_column(row, 7)?,
        banner_url: row.get(8)?,
        created_at: datetime_column(row, 9)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<RadCoinProduct> {
    Ok(RadCoinProduct {
        id: ProductId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        benefits: json_column(row, 5)?,
        is_active: row.get(6)?,
    })
}

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<SpecialOffer> {
    Ok(SpecialOffer {
        id: OfferId::new(row.get(0)?),
        product_id: ProductId::new(row.get(1)?),
        title: row.get(2)?,
        discount_percent: row.get(3)?,
        starts_at: datetime_column(row, 4)?,
        ends_at: datetime_column(row, 5)?,
        is_active: row.get(6)?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw)
        .map_err(|error| invalid_column(index, format!("decode json column: {error}")))
}

fn datetime_column(row: &Row<'_>, index: usize) -> rusqlite::Result<OffsetDateTime> {
    let raw: String = row.get(index)?;
    parse_datetime(&raw).map_err(|error| invalid_column(index, error.to_string()))
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    )
}

fn to_json_text<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("encode json column")
}

fn index_to_sql(index: usize) -> Result<i64> {
    i64::try_from(index).with_context(|| format!("index {index} does not fit in sqlite"))
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a radventure database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    format_datetime(OffsetDateTime::now_utc())
}

fn format_datetime(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}
