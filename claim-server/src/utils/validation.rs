//! Input validation helpers
//!
//! Normalizers for what claimants type. Each returns `None` when the input
//! cannot be accepted; callers re-prompt without touching stored data.

use shared::error::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Promo codes
pub const MAX_CODE_LEN: usize = 64;

/// Claimant names, as registered with the gateway
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Bank names typed by claimants
pub const MAX_BANK_NAME_LEN: usize = 100;

/// Review text merged onto the claim per reply
pub const MAX_REVIEW_TEXT_LEN: usize = 2000;

/// Gateway identifiers (bank member ids, payment ids)
pub const MAX_GATEWAY_ID_LEN: usize = 64;

const PHONE_DIGITS_AFTER_PREFIX: usize = 10;
const CARD_DIGITS: usize = 16;

// ── Normalizers (conversation input) ────────────────────────────────

/// Trimmed code, `None` if empty or too long
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() || code.chars().count() > MAX_CODE_LEN {
        return None;
    }
    Some(code.to_string())
}

/// Russian mobile number as `+7XXXXXXXXXX`
///
/// Accepts `+7` or `8` followed by exactly ten digits. Spaces, dashes and
/// parentheses are ignored; anything else is rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let rest = compact
        .strip_prefix("+7")
        .or_else(|| compact.strip_prefix('8'))?;

    if rest.len() != PHONE_DIGITS_AFTER_PREFIX || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("+7{rest}"))
}

/// Exactly sixteen digits once spaces are removed
pub fn normalize_card(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != CARD_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

/// Trimmed bank name, non-empty and bounded
pub fn normalize_bank_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_BANK_NAME_LEN {
        return None;
    }
    Some(name.to_string())
}

/// Claimant name, trimmed; blank or overlong names count as absent
pub fn normalize_display_name(raw: Option<&str>) -> Option<String> {
    let name = raw?.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return None;
    }
    Some(name.to_string())
}

/// Review text, trimmed; empty text counts as absent
pub fn normalize_review_text(raw: Option<String>) -> Option<String> {
    let text = raw?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_REVIEW_TEXT_LEN).collect())
}

// ── Validation helpers (admin handlers) ─────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")).with_detail("field", field));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_formats() {
        assert_eq!(normalize_phone("+79001234567").as_deref(), Some("+79001234567"));
        assert_eq!(normalize_phone("89001234567").as_deref(), Some("+79001234567"));
        assert_eq!(normalize_phone("+7 (900) 123-45-67").as_deref(), Some("+79001234567"));
        assert_eq!(normalize_phone(" 8 900 123 45 67 ").as_deref(), Some("+79001234567"));
    }

    #[test]
    fn test_phone_rejects() {
        assert!(normalize_phone("").is_none());
        assert!(normalize_phone("9001234567").is_none());
        assert!(normalize_phone("+7900123456").is_none());
        assert!(normalize_phone("+790012345678").is_none());
        assert!(normalize_phone("+1 900 123 45 67").is_none());
        assert!(normalize_phone("+7900123456a").is_none());
        assert!(normalize_phone("+7.900.123.45.67").is_none());
    }

    #[test]
    fn test_card() {
        assert_eq!(
            normalize_card("1234 5678 1234 5678").as_deref(),
            Some("1234567812345678")
        );
        assert!(normalize_card("1234 5678").is_none());
        assert!(normalize_card("1234-5678-1234-5678").is_none());
        assert!(normalize_card("12345678123456789").is_none());
    }

    #[test]
    fn test_bank_name_and_code() {
        assert_eq!(normalize_bank_name("  Sber ").as_deref(), Some("Sber"));
        assert!(normalize_bank_name("   ").is_none());
        assert!(normalize_bank_name(&"x".repeat(MAX_BANK_NAME_LEN + 1)).is_none());

        assert_eq!(normalize_code(" ABC123\n").as_deref(), Some("ABC123"));
        assert!(normalize_code("  ").is_none());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(normalize_display_name(Some(" Ivan Petrov ")).as_deref(), Some("Ivan Petrov"));
        assert!(normalize_display_name(Some("  ")).is_none());
        assert!(normalize_display_name(None).is_none());
        assert!(normalize_display_name(Some(&"x".repeat(MAX_DISPLAY_NAME_LEN + 1))).is_none());
    }

    #[test]
    fn test_review_text() {
        assert_eq!(normalize_review_text(Some("  nice ".into())).as_deref(), Some("nice"));
        assert!(normalize_review_text(Some(" ".into())).is_none());
        assert!(normalize_review_text(None).is_none());
    }

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("100000000011", "bank_member_id", MAX_GATEWAY_ID_LEN).is_ok());
        let err = validate_required_text(" ", "bank_member_id", MAX_GATEWAY_ID_LEN).unwrap_err();
        assert_eq!(err.message, "bank_member_id must not be empty");
    }
}
