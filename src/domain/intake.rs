//! Free-text intake parsing.
//!
//! Turns chat answers and labeled message blocks into a validated
//! [`PatientInput`], or a list of structured errors.

use super::patient::{is_positive, Field, InputError, PatientInput};

/// Parse an age answer in whole years.
///
/// # Errors
/// Returns [`InputError::NotANumber`] unless the text is a non-negative integer.
pub fn parse_age(text: &str) -> Result<u32, InputError> {
    let trimmed = strip_unit(text);
    trimmed.parse::<u32>().map_err(|_| InputError::NotANumber {
        field: Field::Age,
        value: text.trim().to_string(),
    })
}

/// Parse a positive measurement (weight, height or MUAC).
///
/// A trailing unit such as `kg`, `cm` or `mm` is ignored.
///
/// # Errors
/// Returns [`InputError::NotANumber`] for unparseable text and
/// [`InputError::NotPositive`] for zero, negative or non-finite values.
pub fn parse_measurement(field: Field, text: &str) -> Result<f64, InputError> {
    let value = strip_unit(text)
        .parse::<f64>()
        .map_err(|_| InputError::NotANumber {
            field,
            value: text.trim().to_string(),
        })?;

    if is_positive(value) {
        Ok(value)
    } else {
        Err(InputError::NotPositive { field, value })
    }
}

/// Whether a message looks like a labeled intake block (has a `Name:` line).
#[must_use]
pub fn looks_labeled(text: &str) -> bool {
    text.lines()
        .filter_map(split_label)
        .any(|(field, _)| field == Field::Name)
}

/// Parse a labeled block such as:
///
/// ```text
/// Name: Amina
/// Age: 3
/// Weight (kg): 12.5
/// Height: 95
/// MUAC mm = 118
/// ```
///
/// Unknown labels and lines without a separator are ignored. Later lines
/// override earlier ones.
///
/// # Errors
/// Returns every missing, unparseable or invalid field.
pub fn parse_labeled(text: &str) -> Result<PatientInput, Vec<InputError>> {
    let mut name = None;
    let mut age = None;
    let mut weight = None;
    let mut height = None;
    let mut muac = None;

    for (field, value) in text.lines().filter_map(split_label) {
        match field {
            Field::Name => name = Some(Ok(value.to_string())),
            Field::Age => age = Some(parse_age(value)),
            Field::Weight => weight = Some(parse_measurement(field, value)),
            Field::Height => height = Some(parse_measurement(field, value)),
            Field::Muac => muac = Some(parse_measurement(field, value)),
        }
    }

    let mut errors = Vec::new();
    let name = take(Field::Name, name, &mut errors);
    let age_years = take(Field::Age, age, &mut errors);
    let weight_kg = take(Field::Weight, weight, &mut errors);
    let height_cm = take(Field::Height, height, &mut errors);
    let muac_mm = take(Field::Muac, muac, &mut errors);

    match (name, age_years, weight_kg, height_cm, muac_mm) {
        (Some(name), Some(age_years), Some(weight_kg), Some(height_cm), Some(muac_mm))
            if errors.is_empty() =>
        {
            let input = PatientInput {
                name,
                age_years,
                weight_kg,
                height_cm,
                muac_mm,
            };
            input.validate()?;
            Ok(input)
        }
        _ => Err(errors),
    }
}

fn take<T>(
    field: Field,
    slot: Option<Result<T, InputError>>,
    errors: &mut Vec<InputError>,
) -> Option<T> {
    match slot {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => {
            errors.push(InputError::MissingField { field });
            None
        }
    }
}

/// Split `label: value` / `label = value` and map the label to a field.
fn split_label(line: &str) -> Option<(Field, &str)> {
    let sep = line.find([':', '='])?;
    let (label, rest) = line.split_at(sep);
    let value = rest[1..].trim();

    // First alphabetic word of the label: "Weight (kg)" -> "weight".
    let key = label
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|s| !s.is_empty())?
        .to_ascii_lowercase();

    let field = match key.as_str() {
        "name" => Field::Name,
        "age" => Field::Age,
        "weight" => Field::Weight,
        "height" | "length" => Field::Height,
        "muac" => Field::Muac,
        _ => return None,
    };
    Some((field, value))
}

/// Drop a trailing unit word; purely alphabetic text ("NaN", "four") is kept.
fn strip_unit(text: &str) -> &str {
    let trimmed = text.trim();
    let stripped = trimmed
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim_end();
    if stripped.is_empty() {
        trimmed
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age(" 4 ").expect("Should parse"), 4);
        assert_eq!(parse_age("4 years").expect("Should parse"), 4);
        assert!(matches!(
            parse_age("four"),
            Err(InputError::NotANumber { field: Field::Age, .. })
        ));
        assert!(parse_age("-1").is_err());
        assert!(parse_age("3.5").is_err());
    }

    #[test]
    fn test_parse_measurement() {
        let w = parse_measurement(Field::Weight, "12.5kg").expect("Should parse");
        assert!((w - 12.5).abs() < f64::EPSILON);
        let h = parse_measurement(Field::Height, "95 cm").expect("Should parse");
        assert!((h - 95.0).abs() < f64::EPSILON);

        assert!(matches!(
            parse_measurement(Field::Height, "0"),
            Err(InputError::NotPositive { field: Field::Height, .. })
        ));
        assert!(matches!(
            parse_measurement(Field::Muac, "NaN"),
            Err(InputError::NotPositive { field: Field::Muac, .. })
        ));
        assert!(matches!(
            parse_measurement(Field::Weight, "heavy"),
            Err(InputError::NotANumber { field: Field::Weight, .. })
        ));
    }

    #[test]
    fn test_parse_labeled_block() {
        let text = "Name: Amina\nAge: 3\nWeight (kg): 12.5\nheight = 95\nMUAC mm: 118\nNotes: none";
        let input = parse_labeled(text).expect("Should parse");
        assert_eq!(input.name, "Amina");
        assert_eq!(input.age_years, 3);
        assert!((input.weight_kg - 12.5).abs() < f64::EPSILON);
        assert!((input.height_cm - 95.0).abs() < f64::EPSILON);
        assert!((input.muac_mm - 118.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_labeled_collects_errors() {
        let errors = parse_labeled("Name: Amina\nAge: old\nHeight: 0").expect_err("Should fail");
        assert!(errors.contains(&InputError::NotANumber {
            field: Field::Age,
            value: "old".to_string()
        }));
        assert!(errors.contains(&InputError::MissingField { field: Field::Weight }));
        assert!(errors.contains(&InputError::MissingField { field: Field::Muac }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, InputError::NotPositive { field: Field::Height, .. })));
    }

    #[test]
    fn test_parse_labeled_rejects_blank_name() {
        let errors = parse_labeled("Name:   \nAge: 2\nWeight: 10\nHeight: 80\nMUAC: 120")
            .expect_err("Should fail");
        assert_eq!(errors, vec![InputError::EmptyName]);
    }

    #[test]
    fn test_looks_labeled() {
        assert!(looks_labeled("name: Amina\nage: 3"));
        assert!(!looks_labeled("hello there"));
        assert!(!looks_labeled("Age: 3"));
    }
}
