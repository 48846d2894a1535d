//! Registration form rules.
//!
//! The vault itself never validates; these checks run at the edge (the HTTP
//! layer) before an application is handed to the store.

use crate::constants::{GPA_SCALE, HIGH_DEMAND_MIN_GPA};
use crate::error::{ValidationError, ValidationIssue};
use crate::types::ApplicationForm;

const MIN_NAME_CHARS: usize = 10;

pub fn validate_full_name(value: &str) -> Result<(), ValidationIssue> {
    let value = value.trim();
    if value.chars().count() < MIN_NAME_CHARS {
        return Err(ValidationIssue::new(
            "fullName",
            "full name must be at least 10 characters",
        ));
    }
    if !value.chars().all(|c| is_arabic(c) || c.is_whitespace()) {
        return Err(ValidationIssue::new(
            "fullName",
            "full name must be written in Arabic letters",
        ));
    }
    Ok(())
}

pub fn validate_national_id(value: &str) -> Result<(), ValidationIssue> {
    if value.len() != 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationIssue::new(
            "nationalId",
            "national ID must be exactly 10 digits",
        ));
    }
    let first = value.as_bytes()[0];
    if value.bytes().all(|b| b == first) {
        return Err(ValidationIssue::new("nationalId", "national ID is not valid"));
    }
    Ok(())
}

pub fn validate_phone(value: &str) -> Result<(), ValidationIssue> {
    let ok = value.len() == 10
        && value.starts_with("05")
        && value.bytes().all(|b| b.is_ascii_digit());
    if !ok {
        return Err(ValidationIssue::new(
            "phone",
            "phone must start with 05 and contain 10 digits",
        ));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ValidationIssue> {
    let invalid = || ValidationIssue::new("email", "email address is not valid");

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    // some dot with at least one character on each side
    let has_dotted_domain = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    if !has_dotted_domain {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_gpa(value: f64) -> Result<(), ValidationIssue> {
    if !value.is_finite() || !(0.0..=GPA_SCALE).contains(&value) {
        return Err(ValidationIssue::new("gpa", "GPA must be between 0 and 5"));
    }
    let hundredths = value * 100.0;
    if (hundredths - hundredths.round()).abs() > 1e-6 {
        return Err(ValidationIssue::new(
            "gpa",
            "GPA must have at most two decimal places",
        ));
    }
    Ok(())
}

fn validate_required(field: &'static str, value: &str) -> Result<(), ValidationIssue> {
    if value.trim().is_empty() {
        return Err(ValidationIssue::new(field, "this field is required"));
    }
    Ok(())
}

/// Run every rule and collect all failures.
pub fn validate_form(form: &ApplicationForm) -> Result<(), ValidationError> {
    let checks = [
        validate_full_name(&form.full_name),
        validate_national_id(&form.national_id),
        validate_phone(&form.phone),
        validate_email(&form.email),
        validate_gpa(form.gpa),
        validate_required("province", form.province.name()),
        validate_required("specialization", form.specialization.name()),
    ];

    let mut issues: Vec<ValidationIssue> = checks.into_iter().filter_map(Result::err).collect();

    if form.specialization.is_high_demand() && form.gpa < HIGH_DEMAND_MIN_GPA {
        issues.push(ValidationIssue::new(
            "gpa",
            format!(
                "{} requires a GPA of at least 4.00",
                form.specialization.name()
            ),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}
