//! Nutrition classification.
//!
//! BMI drives the "build" category; MUAC (mid-upper arm circumference)
//! drives the acute-malnutrition status using WHO cutoffs in millimetres.
//! Everything here is a pure function of its inputs.

use serde::{Deserialize, Serialize};

use super::patient::PatientInput;

/// MUAC below this is Severe Acute Malnutrition (mm).
pub const MUAC_SAM_CUTOFF_MM: f64 = 115.0;

/// MUAC below this (and at least [`MUAC_SAM_CUTOFF_MM`]) is Moderate Acute Malnutrition (mm).
pub const MUAC_MAM_CUTOFF_MM: f64 = 125.0;

const SAM_RECOMMENDATION: &str = "Severe Acute Malnutrition - Immediate referral to therapeutic feeding program, medical evaluation, and supplementary feeding.";
const MAM_RECOMMENDATION: &str = "Moderate Acute Malnutrition - Provide supplementary feeding, monitor closely, and educate on balanced diet.";
const NORMAL_RECOMMENDATION: &str = "Normal - Maintain healthy diet and regular check-ups.";

/// BMI-based body build category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Build {
    #[serde(rename = "Severely underweight")]
    SeverelyUnderweight,
    #[serde(rename = "Underweight")]
    Underweight,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Overweight")]
    Overweight,
    #[serde(rename = "Obese")]
    Obese,
}

impl Build {
    /// All categories, lightest first.
    pub const ALL: [Build; 5] = [
        Self::SeverelyUnderweight,
        Self::Underweight,
        Self::Normal,
        Self::Overweight,
        Self::Obese,
    ];

    /// Label used for display and persistence.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SeverelyUnderweight => "Severely underweight",
            Self::Underweight => "Underweight",
            Self::Normal => "Normal",
            Self::Overweight => "Overweight",
            Self::Obese => "Obese",
        }
    }

    /// Parse a stored label (case-insensitive).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// MUAC-based acute malnutrition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NutritionStatus {
    /// Severe Acute Malnutrition
    #[serde(rename = "SAM")]
    Sam,
    /// Moderate Acute Malnutrition
    #[serde(rename = "MAM")]
    Mam,
    #[serde(rename = "Normal")]
    Normal,
}

impl NutritionStatus {
    /// Short label ("SAM", "MAM", "Normal").
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sam => "SAM",
            Self::Mam => "MAM",
            Self::Normal => "Normal",
        }
    }

    /// Long human-readable form.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Sam => "SAM (Severe Acute Malnutrition)",
            Self::Mam => "MAM (Moderate Acute Malnutrition)",
            Self::Normal => "Normal",
        }
    }

    /// Parse any status label, short or long.
    ///
    /// Labels are matched by substring with SAM checked before MAM, so
    /// `"SAM (Severe Acute Malnutrition)"` and `"SAM"` agree. Anything
    /// matching neither is `Normal`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.contains("SAM") {
            Self::Sam
        } else if label.contains("MAM") {
            Self::Mam
        } else {
            Self::Normal
        }
    }

    /// Recommendation text for this status.
    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        recommendation_for(self.label())
    }

    /// RGB colour used by the dashboard.
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Sam => (244, 63, 94),     // Rose (#F43F5E)
            Self::Mam => (251, 191, 36),    // Amber (#FBBF24)
            Self::Normal => (16, 185, 129), // Emerald (#10B981)
        }
    }
}

impl std::fmt::Display for NutritionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything derived from a patient's measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Body mass index, rounded to 2 decimal places
    pub bmi: f64,
    pub build: Build,
    pub nutrition_status: NutritionStatus,
    pub recommendation: String,
}

/// Body mass index from weight (kg) and height (cm), rounded to 2 decimals.
///
/// `height_cm` must be positive; validate before calling.
#[must_use]
pub fn compute_bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    round2(weight_kg / (height_m * height_m))
}

/// Classify a BMI value into a build category.
///
/// Bands are closed on the left: 16.0 is `Underweight`, 18.5 is `Normal`.
#[must_use]
pub fn classify_build(bmi: f64) -> Build {
    if bmi < 16.0 {
        Build::SeverelyUnderweight
    } else if bmi < 18.5 {
        Build::Underweight
    } else if bmi < 25.0 {
        Build::Normal
    } else if bmi < 30.0 {
        Build::Overweight
    } else {
        Build::Obese
    }
}

/// Classify a MUAC measurement (mm). Cutoffs do not depend on age.
#[must_use]
pub fn classify_muac(muac_mm: f64) -> NutritionStatus {
    if muac_mm < MUAC_SAM_CUTOFF_MM {
        NutritionStatus::Sam
    } else if muac_mm < MUAC_MAM_CUTOFF_MM {
        NutritionStatus::Mam
    } else {
        NutritionStatus::Normal
    }
}

/// Recommendation for a status label.
///
/// Labels vary in formatting between callers, so matching is by substring:
/// SAM first, then MAM, otherwise the routine-care message.
#[must_use]
pub fn recommendation_for(status: &str) -> &'static str {
    if status.contains("SAM") {
        SAM_RECOMMENDATION
    } else if status.contains("MAM") {
        MAM_RECOMMENDATION
    } else {
        NORMAL_RECOMMENDATION
    }
}

/// Run the full pipeline over validated input.
#[must_use]
pub fn classify(input: &PatientInput) -> Classification {
    let bmi = compute_bmi(input.weight_kg, input.height_cm);
    let nutrition_status = classify_muac(input.muac_mm);

    Classification {
        bmi,
        build: classify_build(bmi),
        nutrition_status,
        recommendation: nutrition_status.recommendation().to_string(),
    }
}

/// Format a measurement the way it is shown to users and in exports:
/// shortest exact form, always with a decimal point (`15.0`, `13.85`).
#[must_use]
pub fn format_decimal(value: f64) -> String {
    format!("{value:?}")
}

/// Round to 2 decimals on the exact binary value, ties to even.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}
