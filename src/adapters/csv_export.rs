//! CSV export of assessments.

use std::io::Write;

use crate::domain::nutrition::format_decimal;
use crate::domain::AssessmentRecord;

/// Column order of the export.
pub const CSV_HEADER: [&str; 10] = [
    "id",
    "name",
    "age",
    "weight_kg",
    "height_cm",
    "muac_mm",
    "bmi",
    "build",
    "nutrition_status",
    "recommendation",
];

/// Suggested download name.
pub const CSV_FILENAME: &str = "patients.csv";

/// Error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write a header row followed by one row per record.
///
/// # Errors
/// Returns error if the underlying writer fails.
pub fn write_assessments<W: Write>(records: &[AssessmentRecord], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for record in records {
        let a = &record.assessment;
        let input = a.input();
        csv_writer.write_record([
            record.id.to_string(),
            input.name.clone(),
            input.age_years.to_string(),
            format_decimal(input.weight_kg),
            format_decimal(input.height_cm),
            format_decimal(input.muac_mm),
            format_decimal(a.bmi()),
            a.build().label().to_string(),
            a.nutrition_status().label().to_string(),
            a.recommendation().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
