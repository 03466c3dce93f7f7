//! Aggregate counts shown on the dashboard.

use serde::Serialize;

use crate::domain::AssessmentRecord;

/// Counts of assessments per nutrition status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NutritionSummary {
    pub total: usize,
    pub sam: usize,
    pub mam: usize,
    pub normal: usize,
}

impl NutritionSummary {
    /// Tally records by status label.
    ///
    /// Labels are matched by substring, the same way the recommendation
    /// lookup matches them.
    #[must_use]
    pub fn from_records(records: &[AssessmentRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            let label = record.assessment.nutrition_status().label();
            acc.total += 1;
            if label.contains("SAM") {
                acc.sam += 1;
            }
            if label.contains("MAM") {
                acc.mam += 1;
            }
            if label.contains("Normal") {
                acc.normal += 1;
            }
            acc
        })
    }

    /// Share of records in a count, as a percentage (0 when empty).
    #[must_use]
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }
}
