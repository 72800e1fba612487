//! Input validators for operation arguments.
//!
//! Pure functions, run before any credential acquisition or backend call.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GTasksError, GTasksResult};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").unwrap());

/// Longest title the backend accepts, in characters.
pub const MAX_TITLE_CHARS: usize = 1024;

/// Validate a `YYYY-MM-DD` literal that also names a real calendar day.
pub fn validate_date(date: &str) -> GTasksResult<NaiveDate> {
    if !DATE_RE.is_match(date) {
        return Err(GTasksError::validation(
            format!("Invalid date format: '{date}'. Expected YYYY-MM-DD."),
            date,
        ));
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        GTasksError::validation(format!("Invalid date: '{date}'. {e}"), date)
    })
}

/// Validate an `http://` or `https://` URL with no embedded whitespace.
pub fn validate_url(url: &str) -> GTasksResult<()> {
    if URL_RE.is_match(url) {
        Ok(())
    } else {
        Err(GTasksError::validation(
            format!("Invalid URL format: '{url}'. URL must start with http:// or https://."),
            url,
        ))
    }
}

/// Validate a task title, returning it trimmed.
///
/// The length limit applies to the title as given, before trimming.
pub fn validate_title(title: &str) -> GTasksResult<&str> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(GTasksError::validation(
            "Task title must not be empty.",
            title,
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(GTasksError::validation(
            format!("Task title must be {MAX_TITLE_CHARS} characters or fewer."),
            title,
        ));
    }
    Ok(trimmed)
}

/// Validate that a list or task identifier is present. The identifier is
/// returned exactly as given; only blank input is rejected.
pub fn validate_id<'a>(field: &str, id: &'a str) -> GTasksResult<&'a str> {
    if id.trim().is_empty() {
        Err(GTasksError::validation(
            format!("{field} must not be empty."),
            id,
        ))
    } else {
        Ok(id)
    }
}
