//! Input validation for account and phrasebook forms.

use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_USERNAME_LEN: usize = 6;
pub const MIN_PASSWORD_LEN: usize = 6;

// Two-letter code with an optional regional variant: EN, PT-BR, ZH-HANS
static LANG_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

fn lang_code_regex() -> &'static Regex {
    LANG_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2}(-[A-Za-z]{2,4})?$").expect("Invalid language code regex")
    })
}

pub fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn validate_phrasebook_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Phrasebook name must not be empty"));
    }
    Ok(name.to_string())
}

/// Validate a provider language code and return its canonical upper-case form
pub fn normalize_lang_code(code: &str) -> AppResult<String> {
    let code = code.trim();
    if !lang_code_regex().is_match(code) {
        return Err(AppError::validation(format!(
            "Invalid language code: '{}'",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

pub fn validate_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation("No text submitted"));
    }
    Ok(())
}

/// Blank notes are stored as NULL
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
