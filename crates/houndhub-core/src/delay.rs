//! Delay-string parser.
//!
//! Workflow steps and schedules describe delays as free-form strings
//! ("3 days", "2 hours", "45"). Everything resolves to whole minutes.
//! Malformed input parses to zero rather than erroring — a bad delay string
//! means "immediately", never a stuck enrollment.

/// Parse a delay string into minutes.
///
/// Grammar: `<integer> <unit>` with unit one of minute(s), hour(s), day(s),
/// week(s), case-insensitive. A bare integer is minutes. Empty or
/// unparsable input is 0. Negative amounts clamp to 0.
pub fn parse_delay(raw: &str) -> i64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }

    let mut parts = s.split_whitespace();
    let amount = match parts.next().and_then(|p| p.parse::<i64>().ok()) {
        Some(n) => n,
        None => return 0,
    };

    let per_unit = match parts.next() {
        None => 1, // bare integer = minutes
        Some(unit) => match unit.to_ascii_lowercase().trim_end_matches('s') {
            "minute" | "min" => 1,
            "hour" | "hr" => 60,
            "day" => 1440,
            "week" => 10080,
            _ => return 0,
        },
    };

    (amount * per_unit).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_delay("3 days"), 4320);
        assert_eq!(parse_delay("2 hours"), 120);
        assert_eq!(parse_delay("1 week"), 10080);
        assert_eq!(parse_delay("30 minutes"), 30);
        assert_eq!(parse_delay("1 day"), 1440);
    }

    #[test]
    fn test_bare_integer_is_minutes() {
        assert_eq!(parse_delay("45"), 45);
        assert_eq!(parse_delay("0"), 0);
    }

    #[test]
    fn test_malformed_is_zero() {
        assert_eq!(parse_delay(""), 0);
        assert_eq!(parse_delay("   "), 0);
        assert_eq!(parse_delay("bogus"), 0);
        assert_eq!(parse_delay("three days"), 0);
        assert_eq!(parse_delay("5 fortnights"), 0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(parse_delay("2 Hours"), 120);
        assert_eq!(parse_delay("1 DAY"), 1440);
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        assert_eq!(parse_delay("-5 minutes"), 0);
        assert_eq!(parse_delay("-1"), 0);
    }
}
