/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Width of the zero-padded claim number ("000001")
pub const CLAIM_ID_WIDTH: usize = 6;

/// Render a claim sequence number as a claim id.
///
/// Numbers wider than [`CLAIM_ID_WIDTH`] are rendered in full, so the
/// lexical order of ids only holds below one million claims; callers that
/// need ordering should compare [`parse_claim_id`] results.
pub fn format_claim_id(seq: u64) -> String {
    format!("{seq:0width$}", width = CLAIM_ID_WIDTH)
}

/// Parse a claim id back into its sequence number
pub fn parse_claim_id(claim_id: &str) -> Option<u64> {
    if claim_id.is_empty() || !claim_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    claim_id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_claim_id() {
        assert_eq!(format_claim_id(1), "000001");
        assert_eq!(format_claim_id(42), "000042");
        assert_eq!(format_claim_id(999_999), "999999");
        assert_eq!(format_claim_id(1_000_000), "1000000");
    }

    #[test]
    fn test_parse_claim_id() {
        assert_eq!(parse_claim_id("000001"), Some(1));
        assert_eq!(parse_claim_id("1000000"), Some(1_000_000));
        assert_eq!(parse_claim_id(""), None);
        assert_eq!(parse_claim_id("00a001"), None);
        assert_eq!(parse_claim_id("-1"), None);
    }
}
