// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::filter::{FilterSpec, Record, SortSpec, apply_indices};
use crate::{CaseId, Event, EventId, MedicalCase, ProductId, Profile, ProfileId, RadCoinProduct};

pub const DEFAULT_PAGE_SIZE: usize = 20;

pub trait Identified {
    type Id: Copy + Ord;

    fn id(&self) -> Self::Id;
}

impl Identified for MedicalCase {
    type Id = CaseId;

    fn id(&self) -> CaseId {
        self.id
    }
}

impl Identified for Event {
    type Id = EventId;

    fn id(&self) -> EventId {
        self.id
    }
}

impl Identified for Profile {
    type Id = ProfileId;

    fn id(&self) -> ProfileId {
        self.id
    }
}

impl Identified for RadCoinProduct {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

/// The full fetched set plus the derived filtered, sorted view over it.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    records: Vec<T>,
    filter: FilterSpec,
    sort: Option<SortSpec>,
    view: Vec<usize>,
    page_size: usize,
    page: usize,
}

impl<T: Record> Default for CollectionState<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T: Record> CollectionState<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: Vec::new(),
            filter: FilterSpec::default(),
            sort: None,
            view: Vec::new(),
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub fn set_records(&mut self, records: Vec<T>) {
        self.records = records;
        self.recompute();
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterSpec) {
        self.filter = filter;
        self.page = 0;
        self.recompute();
    }

    pub fn update_filter(&mut self, update: impl FnOnce(&mut FilterSpec)) {
        update(&mut self.filter);
        self.page = 0;
        self.recompute();
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.recompute();
    }

    /// Sort by `field`, flipping direction when it is already the sort key.
    pub fn toggle_sort(&mut self, field: &str) {
        let next = match &self.sort {
            Some(current) if current.field == field => current.reversed(),
            _ => SortSpec::asc(field),
        };
        self.set_sort(Some(next));
    }

    pub fn visible(&self) -> Vec<&T> {
        self.view.iter().map(|index| &self.records[*index]).collect()
    }

    pub fn visible_len(&self) -> usize {
        self.view.len()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.view.len().div_ceil(self.page_size).max(1)
    }

    pub fn page_items(&self) -> Vec<&T> {
        self.view
            .iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .map(|index| &self.records[*index])
            .collect()
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count() - 1);
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 >= self.page_count() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.page -= 1;
        true
    }

    fn recompute(&mut self) {
        self.view = apply_indices(&self.records, &self.filter, self.sort.as_ref());
        self.page = self.page.min(self.page_count() - 1);
    }
}

impl<T: Record + Identified> CollectionState<T> {
    pub fn visible_ids(&self) -> Vec<T::Id> {
        self.view
            .iter()
            .map(|index| self.records[*index].id())
            .collect()
    }

    pub fn all_ids(&self) -> BTreeSet<T::Id> {
        self.records.iter().map(Identified::id).collect()
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.records.iter().find(|record| record.id() == id)
    }
}

/// Ids picked for a bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState<Id> {
    selected: BTreeSet<Id>,
}

impl<Id> Default for SelectionState<Id> {
    fn default() -> Self {
        Self {
            selected: BTreeSet::new(),
        }
    }
}

impl<Id: Copy + Ord> SelectionState<Id> {
    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: Id) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn select(&mut self, id: Id) {
        self.selected.insert(id);
    }

    pub fn deselect(&mut self, id: Id) {
        self.selected.remove(&id);
    }

    pub fn select_all(&mut self, ids: impl IntoIterator<Item = Id>) {
        self.selected.extend(ids);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drops ids that no longer exist after a reload.
    pub fn retain(&mut self, existing: &BTreeSet<Id>) {
        self.selected.retain(|id| existing.contains(id));
    }

    pub fn is_selected(&self, id: Id) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> Vec<Id> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
