//! In-memory adapter: Implementation of Storage backed by a `Vec`.
//!
//! State is owned by the instance; share it through an `Arc` like any other
//! storage. Useful for tests and throwaway demo runs.

use std::sync::RwLock;

use super::StorageError;
use crate::domain::{Assessment, AssessmentRecord};
use crate::ports::{AssessmentPage, Storage};

#[derive(Default)]
struct State {
    next_id: i64,
    records: Vec<AssessmentRecord>,
}

/// Volatile storage adapter.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    type Error = StorageError;

    fn insert_assessment(&self, assessment: &Assessment) -> Result<AssessmentRecord, Self::Error> {
        let mut state = self.state.write().map_err(|_| StorageError::Poisoned)?;
        state.next_id += 1;
        let record = AssessmentRecord {
            id: state.next_id,
            assessment: assessment.clone(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    fn load_assessments(&self) -> Result<Vec<AssessmentRecord>, Self::Error> {
        let state = self.state.read().map_err(|_| StorageError::Poisoned)?;
        Ok(state.records.clone())
    }

    fn get_assessment(&self, id: i64) -> Result<Option<AssessmentRecord>, Self::Error> {
        let state = self.state.read().map_err(|_| StorageError::Poisoned)?;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    fn load_assessments_paginated(&self, offset: usize, limit: usize) -> Result<AssessmentPage, Self::Error> {
        let state = self.state.read().map_err(|_| StorageError::Poisoned)?;
        let items = state
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(AssessmentPage::new(items, state.records.len(), offset, limit))
    }

    fn count_assessments(&self) -> Result<usize, Self::Error> {
        let state = self.state.read().map_err(|_| StorageError::Poisoned)?;
        Ok(state.records.len())
    }

    fn delete_assessment(&self, id: i64) -> Result<(), Self::Error> {
        let mut state = self.state.write().map_err(|_| StorageError::Poisoned)?;
        state.records.retain(|r| r.id != id);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), Self::Error> {
        let mut state = self.state.write().map_err(|_| StorageError::Poisoned)?;
        state.records.clear();
        Ok(())
    }
}
