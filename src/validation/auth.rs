use garde::Validate;

use crate::error::{AppError, Result};

/// Runs the payload's `garde` rules, reporting the first violation with the
/// name of the offending field.
///
/// # Arguments
///
/// * `payload` - The deserialized request body.
///
/// # Returns
///
/// A `Result<()>` indicating whether the payload is valid.
pub fn validate_payload<T>(payload: &T) -> Result<()>
where
    T: Validate,
    T::Context: Default,
{
    payload.validate().map_err(|report| {
        match report.iter().next() {
            Some((path, error)) => AppError::validation(path.to_string(), error.message()),
            None => AppError::validation("body", "Invalid request body"),
        }
    })
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims a free-text field, rejecting values that are blank once trimmed.
///
/// # Arguments
///
/// * `field` - The name reported on failure.
/// * `value` - The raw value.
///
/// # Returns
///
/// A `Result` containing the trimmed value.
pub fn non_blank(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(field, format!("Please add a {}", field)));
    }
    Ok(trimmed.to_string())
}
