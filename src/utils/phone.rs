use regex::Regex;
use std::sync::LazyLock;
use crate::error::{AppError, AppResult};

pub const PHONE_ERROR: &str = "Phone number must be 10 digits.";

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{10}$").unwrap());

/// Validates a local 10-digit mobile number (no country code, no separators).
pub fn validate_phone_number(phone: &str) -> AppResult<()> {
    if !PHONE_REGEX.is_match(phone) {
        return Err(AppError::ValidationError(PHONE_ERROR.to_string()));
    }

    Ok(())
}

/// Prefixes the country calling code, e.g. `+91` + `9876543210`.
pub fn with_country_code(country_code: &str, phone: &str) -> String {
    let code = country_code.trim();
    if code.starts_with('+') {
        format!("{}{}", code, phone)
    } else {
        format!("+{}{}", code, phone)
    }
}
