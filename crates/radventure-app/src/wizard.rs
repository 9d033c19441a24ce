// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Multi-step form wizard.
//!
//! Moving forward requires the current step to validate. Jumping is limited
//! to steps already completed or the current one, unless the wizard was
//! opened in review mode.

use anyhow::{Result, bail};
use std::collections::BTreeSet;
use tracing::warn;

pub struct WizardStep<D> {
    pub name: &'static str,
    pub validate: fn(&D) -> bool,
}

impl<D> Clone for WizardStep<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for WizardStep<D> {}

impl<D> std::fmt::Debug for WizardStep<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStatus {
    Editing,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardCommand {
    Next,
    Previous,
    JumpTo(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    StepChanged(usize),
    StepCompleted(usize),
    StepRejected(usize),
    JumpRejected(usize),
    SubmitRejected,
    Submitted,
    SubmitFailed(String),
}

/// Persists the data of a finished wizard.
pub trait WizardSink<D> {
    fn persist(&mut self, data: &D) -> Result<()>;
}

impl<D, F> WizardSink<D> for F
where
    F: FnMut(&D) -> Result<()>,
{
    fn persist(&mut self, data: &D) -> Result<()> {
        self(data)
    }
}

#[derive(Debug, Clone)]
pub struct Wizard<D> {
    steps: Vec<WizardStep<D>>,
    data: D,
    current: usize,
    completed: BTreeSet<usize>,
    review_mode: bool,
    status: WizardStatus,
}

impl<D> Wizard<D> {
    pub fn new(steps: Vec<WizardStep<D>>, data: D) -> Result<Self> {
        if steps.is_empty() {
            bail!("wizard needs at least one step");
        }
        Ok(Self {
            steps,
            data,
            current: 0,
            completed: BTreeSet::new(),
            review_mode: false,
            status: WizardStatus::Editing,
        })
    }

    /// Allows jumping to any step, for reviewing an existing record.
    pub fn with_review_mode(mut self) -> Self {
        self.review_mode = true;
        self
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_step_name(&self) -> &'static str {
        self.steps[self.current].name
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn status(&self) -> &WizardStatus {
        &self.status
    }

    pub fn is_last_step(&self) -> bool {
        self.current + 1 == self.steps.len()
    }

    pub fn is_step_valid(&self, index: usize) -> bool {
        self.steps
            .get(index)
            .is_some_and(|step| (step.validate)(&self.data))
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Fraction of steps whose validator currently passes.
    pub fn progress(&self) -> f64 {
        let valid = (0..self.steps.len())
            .filter(|index| self.is_step_valid(*index))
            .count();
        valid as f64 / self.steps.len() as f64
    }

    pub fn progress_percent(&self) -> u8 {
        (self.progress() * 100.0).round() as u8
    }

    pub fn can_submit(&self) -> bool {
        self.status != WizardStatus::Completed
            && self.is_last_step()
            && self.is_step_valid(self.current)
    }

    pub fn dispatch(&mut self, command: WizardCommand) -> Vec<WizardEvent> {
        if self.status == WizardStatus::Completed {
            return Vec::new();
        }
        match command {
            WizardCommand::Next => self.next(),
            WizardCommand::Previous => self.previous(),
            WizardCommand::JumpTo(index) => self.jump_to(index),
        }
    }

    pub fn submit(&mut self, sink: &mut dyn WizardSink<D>) -> Vec<WizardEvent> {
        if !self.can_submit() {
            return vec![WizardEvent::SubmitRejected];
        }
        match sink.persist(&self.data) {
            Ok(()) => {
                self.completed.insert(self.current);
                self.status = WizardStatus::Completed;
                vec![WizardEvent::Submitted]
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(step = self.current_step_name(), error = %message, "wizard submit failed");
                self.status = WizardStatus::Failed(message.clone());
                vec![WizardEvent::SubmitFailed(message)]
            }
        }
    }

    fn next(&mut self) -> Vec<WizardEvent> {
        if !self.is_step_valid(self.current) {
            return vec![WizardEvent::StepRejected(self.current)];
        }
        let finished = self.current;
        self.completed.insert(finished);
        if self.is_last_step() {
            return vec![WizardEvent::StepCompleted(finished)];
        }
        self.current += 1;
        vec![
            WizardEvent::StepCompleted(finished),
            WizardEvent::StepChanged(self.current),
        ]
    }

    fn previous(&mut self) -> Vec<WizardEvent> {
        if self.current == 0 {
            return Vec::new();
        }
        self.current -= 1;
        vec![WizardEvent::StepChanged(self.current)]
    }

    fn jump_to(&mut self, index: usize) -> Vec<WizardEvent> {
        let allowed = index < self.steps.len()
            && (self.review_mode || index == self.current || self.completed.contains(&index));
        if !allowed {
            return vec![WizardEvent::JumpRejected(index)];
        }
        if index == self.current {
            return Vec::new();
        }
        self.current = index;
        vec![WizardEvent::StepChanged(index)]
    }
}

#[cfg(test)]
mod tests {
    use super::{Wizard, WizardCommand, WizardEvent, WizardStatus, WizardStep};
    use anyhow::{Result, anyhow};

    #[derive(Debug, Clone, Default)]
    struct Draft {
        title: String,
        body: String,
        tags: String,
    }

    fn steps() -> Vec<WizardStep<Draft>> {
        vec![
            WizardStep {
                name: "title",
                validate: |draft| !draft.title.is_empty(),
            },
            WizardStep {
                name: "body",
                validate: |draft| !draft.body.is_empty(),
            },
            WizardStep {
                name: "tags",
                validate: |draft| !draft.tags.is_empty(),
            },
        ]
    }

    fn wizard() -> Wizard<Draft> {
        Wizard::new(steps(), Draft::default()).expect("three steps")
    }

    #[test]
    fn next_is_a_no_op_when_step_invalid() {
        let mut wizard = wizard();
        let events = wizard.dispatch(WizardCommand::Next);
        assert_eq!(events, vec![WizardEvent::StepRejected(0)]);
        assert_eq!(wizard.current(), 0);
        assert!(!wizard.is_completed(0));
    }

    #[test]
    fn next_advances_when_valid() {
        let mut wizard = wizard();
        wizard.data_mut().title = "Case".to_owned();
        let events = wizard.dispatch(WizardCommand::Next);
        assert_eq!(
            events,
            vec![WizardEvent::StepCompleted(0), WizardEvent::StepChanged(1)]
        );
        assert_eq!(wizard.current_step_name(), "body");
    }

    #[test]
    fn previous_stops_at_first_step() {
        let mut wizard = wizard();
        assert!(wizard.dispatch(WizardCommand::Previous).is_empty());
        wizard.data_mut().title = "Case".to_owned();
        wizard.dispatch(WizardCommand::Next);
        assert_eq!(
            wizard.dispatch(WizardCommand::Previous),
            vec![WizardEvent::StepChanged(0)]
        );
    }

    #[test]
    fn jump_is_limited_to_completed_or_current_steps() {
        let mut wizard = wizard();
        assert_eq!(
            wizard.dispatch(WizardCommand::JumpTo(2)),
            vec![WizardEvent::JumpRejected(2)]
        );
        assert_eq!(wizard.current(), 0);

        wizard.data_mut().title = "Case".to_owned();
        wizard.dispatch(WizardCommand::Next);
        wizard.data_mut().body = "Body".to_owned();
        wizard.dispatch(WizardCommand::Next);
        assert_eq!(wizard.current(), 2);

        assert_eq!(
            wizard.dispatch(WizardCommand::JumpTo(0)),
            vec![WizardEvent::StepChanged(0)]
        );
        assert_eq!(
            wizard.dispatch(WizardCommand::JumpTo(1)),
            vec![WizardEvent::StepChanged(1)]
        );
        assert_eq!(
            wizard.dispatch(WizardCommand::JumpTo(7)),
            vec![WizardEvent::JumpRejected(7)]
        );
    }

    #[test]
    fn review_mode_allows_free_jumps() {
        let mut wizard = wizard().with_review_mode();
        assert_eq!(
            wizard.dispatch(WizardCommand::JumpTo(2)),
            vec![WizardEvent::StepChanged(2)]
        );
    }

    #[test]
    fn progress_is_monotonic_when_completing_in_order() {
        let mut wizard = wizard();
        let mut last = wizard.progress();
        assert_eq!(wizard.progress_percent(), 0);

        wizard.data_mut().title = "Case".to_owned();
        for field in ["body", "tags"] {
            assert!(wizard.progress() >= last);
            last = wizard.progress();
            match field {
                "body" => wizard.data_mut().body = "Body".to_owned(),
                _ => wizard.data_mut().tags = "neuro".to_owned(),
            }
        }
        assert!(wizard.progress() >= last);
        assert_eq!(wizard.progress_percent(), 100);
    }

    #[test]
    fn submit_requires_valid_final_step() {
        let mut wizard = wizard().with_review_mode();
        let mut calls = 0;
        let mut sink = |_: &Draft| -> Result<()> {
            calls += 1;
            Ok(())
        };

        assert_eq!(wizard.submit(&mut sink), vec![WizardEvent::SubmitRejected]);
        wizard.dispatch(WizardCommand::JumpTo(2));
        assert_eq!(wizard.submit(&mut sink), vec![WizardEvent::SubmitRejected]);

        wizard.data_mut().tags = "chest".to_owned();
        assert_eq!(wizard.submit(&mut sink), vec![WizardEvent::Submitted]);
        assert_eq!(wizard.status(), &WizardStatus::Completed);
        assert!(wizard.dispatch(WizardCommand::Previous).is_empty());
        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_submit_stays_on_terminal_step() {
        let mut wizard = wizard().with_review_mode();
        wizard.dispatch(WizardCommand::JumpTo(2));
        wizard.data_mut().tags = "chest".to_owned();

        let mut failing = |_: &Draft| -> Result<()> { Err(anyhow!("insert case: disk full")) };
        let events = wizard.submit(&mut failing);
        assert_eq!(
            events,
            vec![WizardEvent::SubmitFailed("insert case: disk full".to_owned())]
        );
        assert_eq!(wizard.current(), 2);
        assert!(matches!(wizard.status(), WizardStatus::Failed(_)));

        let mut working = |_: &Draft| -> Result<()> { Ok(()) };
        assert_eq!(wizard.submit(&mut working), vec![WizardEvent::Submitted]);
    }

    #[test]
    fn wizard_without_steps_is_rejected() {
        assert!(Wizard::<Draft>::new(Vec::new(), Draft::default()).is_err());
    }
}
