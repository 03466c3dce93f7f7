//! Patient measurement input and the assessment derived from it.

use serde::{Deserialize, Serialize};

use super::nutrition::{self, Build, Classification, NutritionStatus};

/// Measured fields collected from a front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Age,
    Weight,
    Height,
    Muac,
}

impl Field {
    /// Lowercase name used in prompts and error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Weight => "weight",
            Self::Height => "height",
            Self::Muac => "MUAC",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single problem with patient input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("{field} is missing")]
    MissingField { field: Field },

    #[error("{field} must be a number, got {value:?}")]
    NotANumber { field: Field, value: String },

    #[error("{field} must be a positive number, got {value}")]
    NotPositive { field: Field, value: f64 },
}

/// Join a list of input errors into one line.
#[must_use]
pub fn describe_errors(errors: &[InputError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raw patient measurements.
///
/// Age is in whole years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub name: String,

    #[serde(rename = "age")]
    pub age_years: u32,

    pub weight_kg: f64,

    pub height_cm: f64,

    /// Mid-upper arm circumference in millimetres
    pub muac_mm: f64,
}

impl PatientInput {
    /// Check every field, collecting all problems.
    ///
    /// # Errors
    /// Returns every validation failure found.
    pub fn validate(&self) -> Result<(), Vec<InputError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(InputError::EmptyName);
        }
        for (field, value) in [
            (Field::Weight, self.weight_kg),
            (Field::Height, self.height_cm),
            (Field::Muac, self.muac_mm),
        ] {
            if !is_positive(value) {
                errors.push(InputError::NotPositive { field, value });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub(crate) fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// A complete, immutable assessment: inputs plus everything derived from them.
///
/// The only way to build one from fresh input is [`Assessment::from_input`],
/// so derived fields always match the measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    #[serde(flatten)]
    input: PatientInput,

    #[serde(flatten)]
    classification: Classification,

    recorded_at: chrono::DateTime<chrono::Utc>,
}

impl Assessment {
    /// Validate and classify a patient's measurements.
    ///
    /// # Errors
    /// Returns every validation failure; nothing is classified in that case.
    pub fn from_input(input: PatientInput) -> Result<Self, Vec<InputError>> {
        input.validate()?;
        let mut input = input;
        input.name = input.name.trim().to_string();
        let classification = nutrition::classify(&input);

        Ok(Self {
            input,
            classification,
            recorded_at: chrono::Utc::now(),
        })
    }

    /// Rebuild an assessment exactly as it was persisted.
    pub(crate) fn from_stored(
        input: PatientInput,
        classification: Classification,
        recorded_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            input,
            classification,
            recorded_at,
        }
    }

    #[must_use]
    pub fn input(&self) -> &PatientInput {
        &self.input
    }

    #[must_use]
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.input.name
    }

    #[must_use]
    pub fn age_years(&self) -> u32 {
        self.input.age_years
    }

    #[must_use]
    pub fn bmi(&self) -> f64 {
        self.classification.bmi
    }

    #[must_use]
    pub fn build(&self) -> Build {
        self.classification.build
    }

    #[must_use]
    pub fn nutrition_status(&self) -> NutritionStatus {
        self.classification.nutrition_status
    }

    #[must_use]
    pub fn recommendation(&self) -> &str {
        &self.classification.recommendation
    }

    #[must_use]
    pub fn recorded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.recorded_at
    }
}

/// A persisted assessment with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentRecord {
    pub id: i64,

    #[serde(flatten)]
    pub assessment: Assessment,
}
