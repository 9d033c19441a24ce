// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use radventure_app::{
    CaseFormInput, CaseId, EventFormInput, EventId, Wizard, WizardCommand, WizardEvent,
    WizardSink, WizardStatus, case_wizard, event_wizard,
};
use radventure_db::{NewCase, NewEvent, NewOffer, NewProfile, Store};
use radventure_testkit::CaseFaker;
use time::{Duration, OffsetDateTime};
use tracing::info;

const DEMO_SEED: u64 = 20_260_219;
const DEMO_LEARNERS: usize = 6;
const DEMO_CASES: usize = 30;
const DEMO_EVENTS: usize = 3;

/// Saves finished wizards into the store.
pub struct DbRuntime<'a> {
    store: &'a Store,
    created_cases: Vec<CaseId>,
    created_events: Vec<EventId>,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            created_cases: Vec::new(),
            created_events: Vec::new(),
        }
    }

    pub fn created_cases(&self) -> &[CaseId] {
        &self.created_cases
    }

    pub fn created_events(&self) -> &[EventId] {
        &self.created_events
    }
}

impl WizardSink<CaseFormInput> for DbRuntime<'_> {
    fn persist(&mut self, data: &CaseFormInput) -> Result<()> {
        let case_id = self.store.create_case(&NewCase::from_form(data)?)?;
        self.created_cases.push(case_id);
        Ok(())
    }
}

impl WizardSink<EventFormInput> for DbRuntime<'_> {
    fn persist(&mut self, data: &EventFormInput) -> Result<()> {
        let event_id = self.store.create_event(&NewEvent::from_form(data)?)?;
        self.created_events.push(event_id);
        Ok(())
    }
}

/// Writes an edited case back over the stored row.
pub struct CaseEditSink<'a> {
    store: &'a Store,
    case_id: CaseId,
}

impl<'a> CaseEditSink<'a> {
    pub fn new(store: &'a Store, case_id: CaseId) -> Self {
        Self { store, case_id }
    }
}

impl WizardSink<CaseFormInput> for CaseEditSink<'_> {
    fn persist(&mut self, data: &CaseFormInput) -> Result<()> {
        self.store
            .update_case(self.case_id, &NewCase::from_form(data)?)
    }
}

pub struct EventEditSink<'a> {
    store: &'a Store,
    event_id: EventId,
}

impl<'a> EventEditSink<'a> {
    pub fn new(store: &'a Store, event_id: EventId) -> Self {
        Self { store, event_id }
    }
}

impl WizardSink<EventFormInput> for EventEditSink<'_> {
    fn persist(&mut self, data: &EventFormInput) -> Result<()> {
        self.store
            .update_event(self.event_id, &NewEvent::from_form(data)?)
    }
}

/// A review-mode case wizard prefilled from the stored case.
pub fn edit_case_wizard(store: &Store, case_id: CaseId) -> Result<Wizard<CaseFormInput>> {
    let case = store.get_case(case_id)?;
    Ok(case_wizard(CaseFormInput::from_case(&case))?.with_review_mode())
}

pub fn edit_event_wizard(store: &Store, event_id: EventId) -> Result<Wizard<EventFormInput>> {
    let event = store.get_event(event_id)?;
    Ok(event_wizard(EventFormInput::from_event(&event))?.with_review_mode())
}

/// Jumps to the final step and submits. Only review-mode wizards can jump
/// past steps they have not walked.
pub fn submit_review<D>(wizard: &mut Wizard<D>, sink: &mut dyn WizardSink<D>) -> Result<()> {
    let last = wizard.len().checked_sub(1).context("wizard has no steps")?;
    if let Some(WizardEvent::JumpRejected(step)) =
        wizard.dispatch(WizardCommand::JumpTo(last)).first()
    {
        bail!("wizard cannot jump to step {} outside review mode", step + 1);
    }
    wizard.submit(sink);
    match wizard.status() {
        WizardStatus::Completed => Ok(()),
        WizardStatus::Failed(message) => bail!("{message}"),
        WizardStatus::Editing => bail!(
            "wizard step {:?} is incomplete",
            wizard.current_step_name()
        ),
    }
}

/// Walks every step forward, then submits into `sink`.
pub fn complete_wizard<D>(wizard: &mut Wizard<D>, sink: &mut dyn WizardSink<D>) -> Result<()> {
    while !wizard.is_last_step() {
        let events = wizard.dispatch(WizardCommand::Next);
        if let Some(WizardEvent::StepRejected(step)) = events.first() {
            bail!(
                "wizard step {:?} ({}) is incomplete",
                wizard.step_names()[*step],
                step + 1
            );
        }
    }
    wizard.submit(sink);
    match wizard.status() {
        WizardStatus::Completed => Ok(()),
        WizardStatus::Failed(message) => bail!("{message}"),
        WizardStatus::Editing => bail!(
            "wizard step {:?} is incomplete",
            wizard.current_step_name()
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSummary {
    pub learners: usize,
    pub cases: usize,
    pub events: usize,
    pub answers: usize,
}

/// Fills an empty store with learners, cases, events and a shop offer.
pub fn seed_demo(store: &Store) -> Result<DemoSummary> {
    let mut faker = CaseFaker::new(DEMO_SEED);
    let mut runtime = DbRuntime::new(store);

    let mut learners = Vec::with_capacity(DEMO_LEARNERS);
    for _ in 0..DEMO_LEARNERS {
        let learner = faker.learner();
        learners.push(store.create_profile(&NewProfile {
            full_name: learner.full_name,
            email: learner.email,
            institution: learner.institution,
            academic_stage: learner.academic_stage,
            specialty_interest: learner.specialty_interest,
            radcoin_balance: learner.radcoin_balance,
        })?);
    }

    for _ in 0..DEMO_CASES {
        let mut wizard = case_wizard(faker.case_form())?;
        complete_wizard(&mut wizard, &mut runtime)?;
    }
    for _ in 0..DEMO_EVENTS {
        let mut wizard = event_wizard(faker.event_form())?;
        complete_wizard(&mut wizard, &mut runtime)?;
    }

    let mut answers = 0;
    for (position, user_id) in learners.iter().enumerate() {
        for case_id in runtime.created_cases().iter().skip(position).step_by(4) {
            let case = store.get_case(*case_id)?;
            let choice = faker.int_n(case.answer_options.len());
            store.submit_answer(*user_id, *case_id, choice)?;
            answers += 1;
        }
    }

    if let Some(product) = store.list_products(false)?.first() {
        let now = OffsetDateTime::now_utc();
        store.create_offer(&NewOffer {
            product_id: product.id,
            title: format!("{} launch week", product.name),
            discount_percent: 20,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(6),
            is_active: true,
        })?;
    }

    let summary = DemoSummary {
        learners: learners.len(),
        cases: runtime.created_cases().len(),
        events: runtime.created_events().len(),
        answers,
    };
    info!(
        learners = summary.learners,
        cases = summary.cases,
        events = summary.events,
        answers = summary.answers,
        "seeded demo data"
    );
    Ok(summary)
}
