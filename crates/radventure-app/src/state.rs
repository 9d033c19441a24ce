// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::collection::{CollectionState, SelectionState};
use crate::filter::{FilterSpec, NumericRange};
use crate::{CaseId, MedicalCase, Modality};

/// Case catalog browsing: filters, sort, paging and bulk selection.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub cases: CollectionState<MedicalCase>,
    pub selection: SelectionState<CaseId>,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCommand {
    SetSearch(String),
    ToggleSpecialty(String),
    ToggleModality(Modality),
    SetDifficulty { min: Option<i32>, max: Option<i32> },
    SortBy(String),
    ClearFilters,
    NextPage,
    PrevPage,
    ToggleSelect(CaseId),
    SelectAllVisible,
    ClearSelection,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    ViewChanged { visible: usize, page_count: usize },
    PageChanged(usize),
    SelectionChanged(usize),
    StatusUpdated(String),
    StatusCleared,
}

impl CatalogState {
    pub fn load(&mut self, cases: Vec<MedicalCase>) -> Vec<CatalogEvent> {
        self.cases.set_records(cases);
        self.selection.retain(&self.cases.all_ids());
        vec![self.view_changed()]
    }

    pub fn dispatch(&mut self, command: CatalogCommand) -> Vec<CatalogEvent> {
        match command {
            CatalogCommand::SetSearch(search) => {
                self.cases.update_filter(|filter| filter.search = search);
                vec![self.view_changed()]
            }
            CatalogCommand::ToggleSpecialty(specialty) => {
                self.cases
                    .update_filter(|filter| filter.toggle_set_value("specialty", &specialty));
                vec![self.view_changed()]
            }
            CatalogCommand::ToggleModality(modality) => {
                self.cases
                    .update_filter(|filter| filter.toggle_set_value("modality", modality.as_str()));
                vec![self.view_changed()]
            }
            CatalogCommand::SetDifficulty { min, max } => {
                self.cases.update_filter(|filter| {
                    filter
                        .ranges
                        .retain(|range| range.field != "difficulty_level");
                    if min.is_some() || max.is_some() {
                        filter.ranges.push(NumericRange {
                            field: "difficulty_level".to_owned(),
                            min: min.map(f64::from),
                            max: max.map(f64::from),
                        });
                    }
                });
                let mut events = vec![self.view_changed()];
                if self.cases.filter().is_unsatisfiable() {
                    events.push(self.set_status("difficulty range is empty"));
                }
                events
            }
            CatalogCommand::SortBy(field) => {
                self.cases.toggle_sort(&field);
                let label = match self.cases.sort() {
                    Some(sort) => format!("sorted by {} {}", sort.field, sort.direction.as_str()),
                    None => "unsorted".to_owned(),
                };
                vec![self.view_changed(), self.set_status(&label)]
            }
            CatalogCommand::ClearFilters => {
                self.cases.set_filter(FilterSpec::default());
                vec![self.view_changed(), self.set_status("filters cleared")]
            }
            CatalogCommand::NextPage => {
                if self.cases.next_page() {
                    vec![CatalogEvent::PageChanged(self.cases.page())]
                } else {
                    Vec::new()
                }
            }
            CatalogCommand::PrevPage => {
                if self.cases.prev_page() {
                    vec![CatalogEvent::PageChanged(self.cases.page())]
                } else {
                    Vec::new()
                }
            }
            CatalogCommand::ToggleSelect(id) => {
                if self.cases.get(id).is_none() {
                    return Vec::new();
                }
                self.selection.toggle(id);
                vec![CatalogEvent::SelectionChanged(self.selection.len())]
            }
            CatalogCommand::SelectAllVisible => {
                self.selection.select_all(self.cases.visible_ids());
                vec![CatalogEvent::SelectionChanged(self.selection.len())]
            }
            CatalogCommand::ClearSelection => {
                self.selection.clear();
                vec![CatalogEvent::SelectionChanged(0)]
            }
            CatalogCommand::ClearStatus => {
                self.status_line = None;
                vec![CatalogEvent::StatusCleared]
            }
        }
    }

    fn view_changed(&self) -> CatalogEvent {
        CatalogEvent::ViewChanged {
            visible: self.cases.visible_len(),
            page_count: self.cases.page_count(),
        }
    }

    fn set_status(&mut self, message: &str) -> CatalogEvent {
        self.status_line = Some(message.to_owned());
        CatalogEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogCommand, CatalogEvent, CatalogState};
    use crate::{CaseId, MedicalCase, Modality};
    use time::OffsetDateTime;

    fn case(id: i64, specialty: &str, modality: Modality, difficulty: i32) -> MedicalCase {
        MedicalCase {
            id: CaseId::new(id),
            title: format!("Case {id}"),
            specialty: specialty.to_owned(),
            modality,
            difficulty_level: difficulty,
            description: String::new(),
            answer_options: vec!["A".to_owned(), "B".to_owned()],
            correct_answer_index: 0,
            explanation: String::new(),
            tags: Vec::new(),
            points: i64::from(difficulty) * 10,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn loaded() -> CatalogState {
        let mut state = CatalogState::default();
        state.load(vec![
            case(1, "Neuroradiology", Modality::Ct, 2),
            case(2, "Chest", Modality::XRay, 1),
            case(3, "Neuroradiology", Modality::Mri, 4),
        ]);
        state
    }

    #[test]
    fn specialty_toggle_narrows_and_restores_view() {
        let mut state = loaded();
        let events = state.dispatch(CatalogCommand::ToggleSpecialty("Neuroradiology".to_owned()));
        assert_eq!(
            events,
            vec![CatalogEvent::ViewChanged {
                visible: 2,
                page_count: 1
            }]
        );
        state.dispatch(CatalogCommand::ToggleModality(Modality::Mri));
        assert_eq!(state.cases.visible_ids(), vec![CaseId::new(3)]);

        state.dispatch(CatalogCommand::ClearFilters);
        assert_eq!(state.cases.visible_len(), 3);
        assert_eq!(state.status_line.as_deref(), Some("filters cleared"));
    }

    #[test]
    fn inverted_difficulty_range_reports_empty() {
        let mut state = loaded();
        let events = state.dispatch(CatalogCommand::SetDifficulty {
            min: Some(4),
            max: Some(2),
        });
        assert_eq!(state.cases.visible_len(), 0);
        assert_eq!(
            events.last(),
            Some(&CatalogEvent::StatusUpdated(
                "difficulty range is empty".to_owned()
            ))
        );

        state.dispatch(CatalogCommand::SetDifficulty {
            min: Some(2),
            max: None,
        });
        assert_eq!(
            state.cases.visible_ids(),
            vec![CaseId::new(1), CaseId::new(3)]
        );
    }

    #[test]
    fn sort_toggles_direction() {
        let mut state = loaded();
        state.dispatch(CatalogCommand::SortBy("difficulty_level".to_owned()));
        assert_eq!(
            state.cases.visible_ids(),
            vec![CaseId::new(2), CaseId::new(1), CaseId::new(3)]
        );
        let events = state.dispatch(CatalogCommand::SortBy("difficulty_level".to_owned()));
        assert_eq!(
            events.last(),
            Some(&CatalogEvent::StatusUpdated(
                "sorted by difficulty_level desc".to_owned()
            ))
        );
        assert_eq!(state.cases.visible_ids()[0], CaseId::new(3));
    }

    #[test]
    fn select_all_covers_only_visible_and_reload_prunes() {
        let mut state = loaded();
        state.dispatch(CatalogCommand::SetSearch("case 2".to_owned()));
        state.dispatch(CatalogCommand::SelectAllVisible);
        state.dispatch(CatalogCommand::ToggleSelect(CaseId::new(3)));
        assert_eq!(
            state.selection.selected(),
            vec![CaseId::new(2), CaseId::new(3)]
        );
        assert!(
            state
                .dispatch(CatalogCommand::ToggleSelect(CaseId::new(99)))
                .is_empty()
        );

        state.load(vec![case(3, "Neuroradiology", Modality::Mri, 4)]);
        assert_eq!(state.selection.selected(), vec![CaseId::new(3)]);
    }

    #[test]
    fn paging_emits_page_events_within_bounds() {
        let mut state = CatalogState::default();
        state.cases = crate::collection::CollectionState::new(2);
        state.load(vec![
            case(1, "Chest", Modality::Ct, 1),
            case(2, "Chest", Modality::Ct, 1),
            case(3, "Chest", Modality::Ct, 1),
        ]);
        assert!(state.dispatch(CatalogCommand::PrevPage).is_empty());
        assert_eq!(
            state.dispatch(CatalogCommand::NextPage),
            vec![CatalogEvent::PageChanged(1)]
        );
        assert!(state.dispatch(CatalogCommand::NextPage).is_empty());
    }
}
