//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API. They centralize the
//! trimming and case folding rules so every operation compares names and
//! emails the same way.

use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Trim a required display name and collapse inner whitespace.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(collapsed)
}

/// Trim optional free text; blank becomes `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Lowercased, trimmed email; blank becomes `None`.
pub(crate) fn normalize_email(value: Option<&str>) -> ResultEngine<Option<String>> {
    let Some(email) = normalize_optional_text(value) else {
        return Ok(None);
    };
    if !email.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(EngineError::InvalidName(format!("invalid email: {email}")));
    }
    Ok(Some(email.to_lowercase()))
}

/// Comparison key for member names: NFKC, case folded, whitespace collapsed.
pub(crate) fn name_key(name: &str) -> String {
    name.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_ignores_case_and_spacing() {
        assert_eq!(name_key("  Sam  Smith "), name_key("sam smith"));
        assert_ne!(name_key("Sam"), name_key("Sami"));
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(
            normalize_email(Some(" Sam@Example.com ")).unwrap(),
            Some("sam@example.com".to_string())
        );
        assert_eq!(normalize_email(Some("   ")).unwrap(), None);
        assert!(normalize_email(Some("not-an-email")).is_err());
    }

    #[test]
    fn required_name_rejects_blank() {
        assert!(normalize_required_name("   ", "member").is_err());
        assert_eq!(normalize_required_name(" Trip  2026 ", "group").unwrap(), "Trip 2026");
    }
}
