use chrono::DateTime;

/// Renders a wire timestamp for display.
///
/// The record store assigns timestamps server-side and their exact format is
/// vendor-defined, so anything unparseable is returned unchanged rather than
/// treated as an error.
pub fn display_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_timestamp_is_reformatted() {
        assert_eq!(
            display_timestamp("2026-08-07T09:30:00+00:00"),
            "2026-08-07 09:30"
        );
        assert_eq!(
            display_timestamp("2026-08-07T09:30:00.123456+10:00"),
            "2026-08-07 09:30"
        );
    }

    #[test]
    fn unparseable_timestamp_is_returned_unchanged() {
        for raw in ["", "yesterday", "2026-13-40", "not a date at all"] {
            assert_eq!(display_timestamp(raw), raw);
        }
    }
}
