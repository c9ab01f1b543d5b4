use crate::server::response::ApiError;
use crate::types::ClassLevel;

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;
const MAX_USERNAME_LEN: usize = 64;
const MAX_NOTES_LEN: usize = 10_000;
/// A single logged block cannot exceed one day.
const MAX_SESSION_MINUTES: i64 = 24 * 60;

fn validate_text(value: &str, field: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if value.chars().count() > max_len {
        return Err(format!("{field} cannot exceed {max_len} characters"));
    }
    Ok(())
}

/// Names of subjects, units, topics, backlog items and mock tests.
pub fn validate_name(value: &str, field: &str) -> Result<(), ApiError> {
    validate_text(value, field, MAX_NAME_LEN).map_err(ApiError::bad_request)
}

pub fn validate_notes(notes: Option<&str>) -> Result<(), ApiError> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(ApiError::bad_request(format!(
            "Notes cannot exceed {MAX_NOTES_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    validate_text(email, "Email", MAX_EMAIL_LEN).map_err(ApiError::bad_request)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    validate_text(username, "Username", MAX_USERNAME_LEN).map_err(ApiError::bad_request)?;
    if username.contains(char::is_whitespace) {
        return Err(ApiError::bad_request("Username cannot contain whitespace"));
    }
    Ok(())
}

pub fn validate_duration(minutes: i64) -> Result<(), ApiError> {
    if minutes <= 0 {
        return Err(ApiError::bad_request("Duration must be greater than zero"));
    }
    if minutes > MAX_SESSION_MINUTES {
        return Err(ApiError::bad_request(format!(
            "Duration cannot exceed {MAX_SESSION_MINUTES} minutes"
        )));
    }
    Ok(())
}

/// Display colors are `#rrggbb`.
pub fn validate_color(color: &str) -> Result<(), ApiError> {
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ApiError::bad_request("Color must be in #rrggbb format"));
    }
    Ok(())
}

/// A topic must apply to at least one class.
pub fn validate_topic_levels(class11: bool, class12: bool) -> Result<(), ApiError> {
    if !class11 && !class12 {
        return Err(ApiError::bad_request(
            "Topic must apply to class 11, class 12, or both",
        ));
    }
    Ok(())
}

pub fn parse_current_level(grade: i64) -> Result<ClassLevel, ApiError> {
    ClassLevel::from_grade(grade)
        .ok_or_else(|| ApiError::bad_request("Current level must be 11 or 12"))
}
