//! Field-level checks for deal payloads, applied before the store is touched.

use crate::errors::CrmError;

pub fn title(title: &str) -> Result<String, CrmError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CrmError::InvalidInput("title must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

pub fn amount(amount: f64) -> Result<f64, CrmError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(CrmError::InvalidInput(format!(
            "amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(amount)
}

/// Currency codes are three ASCII letters, stored upper-case.
pub fn currency(code: &str) -> Result<String, CrmError> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CrmError::InvalidInput(format!(
            "currency must be a 3-letter code, got '{}'",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

pub fn reference(field: &str, id: i64) -> Result<i64, CrmError> {
    if id <= 0 {
        return Err(CrmError::InvalidInput(format!(
            "{} must be a positive id, got {}",
            field, id
        )));
    }
    Ok(id)
}

/// Empty or whitespace-only text is stored as absent.
pub fn optional_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
