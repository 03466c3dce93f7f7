//! Assessment service: the single entry point every front-end uses.
//!
//! Validates input, runs the classifier, persists the result and serves
//! listings, summaries and exports.

use std::io::Write;
use std::sync::Arc;

use super::summary::NutritionSummary;
use crate::adapters::csv_export;
use crate::domain::{Assessment, AssessmentRecord, PatientInput};
use crate::ports::{AssessmentPage, Storage};
use crate::NutricareError;

/// Service for recording and querying assessments.
pub struct AssessmentService<S>
where
    S: Storage,
{
    storage: Arc<S>,
}

impl<S> AssessmentService<S>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create a new assessment service.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Validate, classify and persist one patient's measurements.
    ///
    /// # Errors
    /// Returns [`NutricareError::Validation`] with every input problem, or a
    /// storage error if persisting fails.
    pub fn record(&self, input: PatientInput) -> Result<AssessmentRecord, NutricareError> {
        let assessment = Assessment::from_input(input).map_err(NutricareError::Validation)?;

        let record = self
            .storage
            .insert_assessment(&assessment)
            .map_err(|e| NutricareError::Storage(e.into()))?;

        tracing::info!(
            id = record.id,
            bmi = record.assessment.bmi(),
            build = %record.assessment.build(),
            status = %record.assessment.nutrition_status(),
            "Recorded assessment"
        );
        Ok(record)
    }

    /// All assessments, oldest first.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<AssessmentRecord>, NutricareError> {
        self.storage
            .load_assessments()
            .map_err(|e| NutricareError::Storage(e.into()))
    }

    /// One assessment by id.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn get(&self, id: i64) -> Result<Option<AssessmentRecord>, NutricareError> {
        self.storage
            .get_assessment(id)
            .map_err(|e| NutricareError::Storage(e.into()))
    }

    /// A page of assessments.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn page(&self, offset: usize, limit: usize) -> Result<AssessmentPage, NutricareError> {
        self.storage
            .load_assessments_paginated(offset, limit)
            .map_err(|e| NutricareError::Storage(e.into()))
    }

    /// Status counts over every stored assessment.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn summary(&self) -> Result<NutritionSummary, NutricareError> {
        let records = self.list()?;
        Ok(NutritionSummary::from_records(&records))
    }

    /// Write every assessment as CSV. Returns the number of rows written.
    ///
    /// # Errors
    /// Returns error if storage or the writer fails.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize, NutricareError> {
        let records = self.list()?;
        csv_export::write_assessments(&records, writer)?;
        tracing::info!(rows = records.len(), "Exported assessments as CSV");
        Ok(records.len())
    }
}
