//! Lead validation
//!
//! Structural rules (presence, length bounds) and semantic rules (country
//! allow-list, phone digit count) over the raw inbound payload. Expected
//! validation failures come back as a field-error list, never a panic;
//! malformed JSON is rejected earlier, at the HTTP boundary.

use murshid_types::country::is_allowed_country;
use murshid_types::lead::{
    MAX_ANSWER_LEN, MAX_CATEGORY_LEN, MAX_EMAIL_LEN, MAX_FULL_NAME_LEN, MAX_LEAD_ID_LEN,
    MAX_PACKAGE_LEN, MAX_PHONE_LEN, MIN_PHONE_DIGITS,
};
use murshid_types::{generate_lead_id, FieldError, LeadSubmission, RawLead};

/// Validate a raw lead payload into an immutable [`LeadSubmission`].
///
/// Returns every violated rule, one [`FieldError`] per field path.
pub fn validate(raw: RawLead) -> Result<LeadSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    let full_name = required(&mut errors, "fullName", raw.full_name, MAX_FULL_NAME_LEN);
    let phone = required(&mut errors, "phone", raw.phone, MAX_PHONE_LEN);
    let category = required(&mut errors, "category", raw.category, MAX_CATEGORY_LEN);
    let country = required(&mut errors, "country", raw.country, MAX_ANSWER_LEN);
    let gender = required(&mut errors, "gender", raw.gender, MAX_ANSWER_LEN);
    let age_group = required(&mut errors, "ageGroup", raw.age_group, MAX_ANSWER_LEN);
    let specialization = required(&mut errors, "specialization", raw.specialization, MAX_ANSWER_LEN);
    let social_familiarity = required(
        &mut errors,
        "socialFamiliarity",
        raw.social_familiarity,
        MAX_ANSWER_LEN,
    );
    let previous_training = required(
        &mut errors,
        "previousTraining",
        raw.previous_training,
        MAX_ANSWER_LEN,
    );
    let awareness_level = required(&mut errors, "awarenessLevel", raw.awareness_level, MAX_ANSWER_LEN);
    let best_contact_time = required(
        &mut errors,
        "bestContactTime",
        raw.best_contact_time,
        MAX_ANSWER_LEN,
    );

    if !phone.is_empty() {
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if digits < MIN_PHONE_DIGITS {
            errors.push(FieldError::new(
                "phone",
                format!("must contain at least {MIN_PHONE_DIGITS} digits"),
            ));
        }
    }

    if !country.is_empty() && !is_allowed_country(&country) {
        errors.push(FieldError::new("country", "is not a recognized country"));
    }

    let email = match raw.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(email) if email.chars().count() > MAX_EMAIL_LEN => {
            errors.push(FieldError::new(
                "email",
                format!("must be at most {MAX_EMAIL_LEN} characters"),
            ));
            None
        }
        Some(email) if !email.contains('@') => {
            errors.push(FieldError::new("email", "must be a valid email address"));
            None
        }
        other => other,
    };

    let package = match raw.package.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
        Some(package) if package.chars().count() > MAX_PACKAGE_LEN => {
            errors.push(FieldError::new(
                "package",
                format!("must be at most {MAX_PACKAGE_LEN} characters"),
            ));
            None
        }
        other => other,
    };

    // A blank client-supplied id is replaced, an over-long one rejected.
    let lead_id = match raw.lead_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()) {
        Some(id) if id.chars().count() > MAX_LEAD_ID_LEN => {
            errors.push(FieldError::new(
                "leadId",
                format!("must be at most {MAX_LEAD_ID_LEN} characters"),
            ));
            String::new()
        }
        Some(id) => id,
        None => generate_lead_id(),
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(LeadSubmission {
        lead_id,
        full_name,
        phone,
        email,
        category,
        country,
        package,
        gender,
        age_group,
        specialization,
        social_familiarity,
        previous_training,
        awareness_level,
        best_contact_time,
    })
}

/// Require a non-empty, bounded string; records violations and returns the
/// trimmed value (empty on failure) so validation can continue collecting
/// errors for the remaining fields.
fn required(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.push(FieldError::new(field, "is required"));
    // Bounds count characters, not bytes; Arabic input is two bytes per
    // letter and must get the same budget as Latin input.
    } else if value.chars().count() > max_len {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    value
}
