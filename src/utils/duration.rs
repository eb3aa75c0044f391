//! Human duration grammar.
//!
//! Commands accept durations like `4m` = 4 minutes, `3h` = 3 hours,
//! `6d` = 6 days, `5w` = 5 weeks.

use std::time::Duration;

/// Parse a duration string (e.g., "1h", "30m", "1d").
///
/// Supported units:
/// - m: minutes
/// - h: hours
/// - d: days
/// - w: weeks
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.len() < 2 {
        return None;
    }

    let (digits, unit) = input.split_at(input.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let seconds = match unit {
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(3600)?,
        "d" => amount.checked_mul(86400)?,
        "w" => amount.checked_mul(604800)?,
        _ => return None,
    };

    Some(Duration::from_secs(seconds))
}

/// Format a duration in seconds for display.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{} seconds", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} hour(s) {} minute(s)", hours, mins)
        } else {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
    } else {
        let days = secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("4m"), Some(Duration::from_secs(240)));
        assert_eq!(parse_duration("3h"), Some(Duration::from_secs(10800)));
        assert_eq!(parse_duration("6d"), Some(Duration::from_secs(518400)));
        assert_eq!(parse_duration("5w"), Some(Duration::from_secs(3024000)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(300), "5 minutes");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(5400), "1 hour(s) 30 minute(s)");
        assert_eq!(format_duration(86400), "1 day");
        assert_eq!(format_duration(172800), "2 days");
    }
}
