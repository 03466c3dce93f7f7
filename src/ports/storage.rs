//! Storage port: Trait for persistent storage operations.
//!
//! This trait abstracts the storage backend (SQLite or in-memory) from the
//! application logic.

use crate::domain::{Assessment, AssessmentRecord};

/// A page of assessments with pagination metadata.
#[derive(Debug, Clone)]
pub struct AssessmentPage {
    /// Assessments in this page
    pub items: Vec<AssessmentRecord>,
    /// Total count of all assessments
    pub total_count: usize,
    /// Current page offset
    pub offset: usize,
    /// Page size limit
    pub limit: usize,
    /// Whether there are more pages
    pub has_more: bool,
}

impl AssessmentPage {
    /// Create a new assessment page.
    #[must_use]
    pub fn new(items: Vec<AssessmentRecord>, total_count: usize, offset: usize, limit: usize) -> Self {
        let has_more = offset.saturating_add(items.len()) < total_count;
        Self {
            items,
            total_count,
            offset,
            limit,
            has_more,
        }
    }

    /// Get the next page offset.
    #[must_use]
    pub fn next_offset(&self) -> Option<usize> {
        if self.has_more {
            Some(self.offset.saturating_add(self.limit))
        } else {
            None
        }
    }
}

/// Repository of assessments.
///
/// Identifiers are assigned by the store on insert, increase monotonically
/// and are never reused.
pub trait Storage: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist an assessment and return it with its new identifier.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn insert_assessment(&self, assessment: &Assessment) -> Result<AssessmentRecord, Self::Error>;

    /// Load all assessments, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_assessments(&self) -> Result<Vec<AssessmentRecord>, Self::Error>;

    /// Load one assessment by identifier.
    ///
    /// # Returns
    /// `None` if no assessment has that identifier.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_assessment(&self, id: i64) -> Result<Option<AssessmentRecord>, Self::Error>;

    /// Load assessments with pagination, oldest first.
    ///
    /// # Arguments
    /// * `offset` - Starting position (0-indexed)
    /// * `limit` - Maximum number of items to return
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_assessments_paginated(&self, offset: usize, limit: usize) -> Result<AssessmentPage, Self::Error>;

    /// Get the total count of assessments.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count_assessments(&self) -> Result<usize, Self::Error>;

    /// Delete an assessment by identifier. Deleting a missing id is not an error.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_assessment(&self, id: i64) -> Result<(), Self::Error>;

    /// Remove every assessment.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn clear_all(&self) -> Result<(), Self::Error>;
}
