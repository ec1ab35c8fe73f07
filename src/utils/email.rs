use regex::Regex;
use std::sync::LazyLock;
use crate::error::{AppError, AppResult};

pub const EMAIL_ERROR: &str = "Please enter a valid email address.";

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn validate_email(email: &str) -> AppResult<()> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(AppError::ValidationError(EMAIL_ERROR.to_string()));
    }
    Ok(())
}
