use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Elapsed time recorded against a day.
///
/// Check-out stores the human readable form (`"8 hours and 30 minutes"`);
/// callers of the calculation endpoint may also send plain hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkedDuration {
    Hours(f64),
    Text(String),
}

impl WorkedDuration {
    /// Hours represented by this duration. Unreadable text and negative or
    /// non-finite numbers count as zero.
    pub fn hours(&self) -> f64 {
        let hours = match self {
            WorkedDuration::Hours(h) => *h,
            WorkedDuration::Text(text) => parse_duration_hours(text).unwrap_or(0.0),
        };
        if hours.is_finite() && hours > 0.0 {
            hours
        } else {
            0.0
        }
    }
}

impl From<f64> for WorkedDuration {
    fn from(hours: f64) -> Self {
        WorkedDuration::Hours(hours)
    }
}

impl From<&str> for WorkedDuration {
    fn from(text: &str) -> Self {
        WorkedDuration::Text(text.to_string())
    }
}

/// Formats an elapsed time the way check-out records it.
pub fn format_duration(delta: TimeDelta) -> String {
    let minutes = delta.num_minutes().max(0);
    format!("{} hours and {} minutes", minutes / 60, minutes % 60)
}

pub fn format_hours_minutes(hours: u32, minutes: u32) -> String {
    let total = u64::from(hours) * 60 + u64::from(minutes);
    format!("{} hours and {} minutes", total / 60, total % 60)
}

/// Reads `"<H> hour(s) and <M> minute(s)"` anywhere in `text`.
pub fn parse_duration_hours(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let mut rest = lower.as_str();

    while !rest.is_empty() {
        let start = rest.find(|c: char| c.is_ascii_digit())?;
        rest = &rest[start..];
        if let Some(hours) = match_duration(rest) {
            return Some(hours);
        }
        // skip this run of digits and keep scanning
        let skip = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest = &rest[skip..];
    }
    None
}

fn match_duration(input: &str) -> Option<f64> {
    let (hours, rest) = take_number(input)?;
    let rest = rest.trim_start().strip_prefix("hour")?;
    let rest = rest.strip_prefix('s').unwrap_or(rest);
    let rest = rest.trim_start().strip_prefix("and")?;
    let (minutes, rest) = take_number(rest.trim_start())?;
    rest.trim_start().strip_prefix("minute")?;
    Some(hours as f64 + minutes as f64 / 60.0)
}

fn take_number(input: &str) -> Option<(u64, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let value = input[..end].parse().ok()?;
    Some((value, &input[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_out_format() {
        assert_eq!(parse_duration_hours("8 hours and 30 minutes"), Some(8.5));
        assert_eq!(parse_duration_hours("1 hour and 0 minutes"), Some(1.0));
        assert_eq!(parse_duration_hours("0 hours and 45 minute"), Some(0.75));
        assert_eq!(parse_duration_hours("9hours and15minutes"), Some(9.25));
    }

    #[test]
    fn finds_duration_inside_other_text() {
        assert_eq!(
            parse_duration_hours("worked 2 days, 7 Hours and 6 Minutes"),
            Some(7.1)
        );
    }

    #[test]
    fn malformed_text_is_zero_hours() {
        assert_eq!(parse_duration_hours("N/A"), None);
        assert_eq!(parse_duration_hours("8h 30m 0s"), None);
        assert_eq!(parse_duration_hours("8 hours"), None);
        assert_eq!(WorkedDuration::Text("garbage".into()).hours(), 0.0);
        assert_eq!(WorkedDuration::Hours(-3.0).hours(), 0.0);
        assert_eq!(WorkedDuration::Hours(f64::NAN).hours(), 0.0);
    }

    #[test]
    fn formats_elapsed_time() {
        let delta = TimeDelta::minutes(8 * 60 + 7) + TimeDelta::seconds(59);
        assert_eq!(format_duration(delta), "8 hours and 7 minutes");
        assert_eq!(format_duration(TimeDelta::minutes(-5)), "0 hours and 0 minutes");
        assert_eq!(format_hours_minutes(7, 90), "8 hours and 30 minutes");
        assert_eq!(
            format_hours_minutes(u32::MAX, 59),
            format!("{} hours and 59 minutes", u32::MAX)
        );
    }

    #[test]
    fn deserializes_numbers_and_text() {
        let hours: WorkedDuration = serde_json::from_str("14").unwrap();
        assert_eq!(hours, WorkedDuration::Hours(14.0));
        let text: WorkedDuration = serde_json::from_str("\"2 hours and 0 minutes\"").unwrap();
        assert_eq!(text.hours(), 2.0);
    }
}
