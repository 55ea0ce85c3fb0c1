use jiff::civil::{DateTime, Time};
use once_cell::sync::Lazy;
use regex::Regex;

// Compiled regexes for time parsing
static TAB_TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").unwrap());
static DATETIME_LOCAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2})(?::(\d{2})(?:\.\d{1,3})?)?$").unwrap()
});

/// Time parsing error types for better error handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    EmptyInput,
    InvalidFormat(String),
    OutOfRange(String),
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeParseError::EmptyInput => write!(f, "Time cannot be empty"),
            TimeParseError::InvalidFormat(hint) => write!(f, "Invalid time format. {}", hint),
            TimeParseError::OutOfRange(value) => write!(f, "Time out of range: {}", value),
        }
    }
}

impl std::error::Error for TimeParseError {}

fn field(captures: &regex::Captures<'_>, idx: usize) -> i8 {
    // The patterns only admit at most two digits here.
    captures
        .get(idx)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse a tab time such as `14:00` or `14:00:30`.
pub fn parse_tab_time(input: &str) -> Result<Time, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::EmptyInput);
    }
    let captures = TAB_TIME_REGEX
        .captures(trimmed)
        .ok_or_else(|| TimeParseError::InvalidFormat("Use HH:MM or HH:MM:SS".to_string()))?;
    Time::new(field(&captures, 1), field(&captures, 2), field(&captures, 3), 0)
        .map_err(|_| TimeParseError::OutOfRange(trimmed.to_string()))
}

/// Parse the value of an `<input type="datetime-local">`.
///
/// Seconds are optional and fractions of a second are dropped.
pub fn parse_datetime_local(input: &str) -> Result<DateTime, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::EmptyInput);
    }
    let captures = DATETIME_LOCAL_REGEX.captures(trimmed).ok_or_else(|| {
        TimeParseError::InvalidFormat("Use YYYY-MM-DDTHH:MM".to_string())
    })?;
    let year: i16 = captures[1]
        .parse()
        .map_err(|_| TimeParseError::OutOfRange(trimmed.to_string()))?;
    DateTime::new(
        year,
        field(&captures, 2),
        field(&captures, 3),
        field(&captures, 4),
        field(&captures, 5),
        field(&captures, 6),
        0,
    )
    .map_err(|_| TimeParseError::OutOfRange(trimmed.to_string()))
}

/// Render a wall-clock value for an `<input type="datetime-local">`.
pub fn format_datetime_local(dt: DateTime) -> String {
    dt.strftime("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse an optional numeric input; empty text means "not set".
pub fn parse_optional_number(input: &str, field_name: &str) -> Result<Option<f64>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("{} must be a valid number", field_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::{date, time};

    #[test]
    fn tab_times_accept_optional_seconds() {
        assert_eq!(parse_tab_time("14:00"), Ok(time(14, 0, 0, 0)));
        assert_eq!(parse_tab_time(" 9:05:30 "), Ok(time(9, 5, 30, 0)));
        assert_eq!(parse_tab_time(""), Err(TimeParseError::EmptyInput));
        assert!(matches!(
            parse_tab_time("25:00"),
            Err(TimeParseError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_tab_time("2pm"),
            Err(TimeParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn datetime_local_round_trips_through_the_input_format() {
        let parsed = parse_datetime_local("2024-06-01T14:05").unwrap();
        assert_eq!(parsed, date(2024, 6, 1).at(14, 5, 0, 0));
        assert_eq!(format_datetime_local(parsed), "2024-06-01T14:05:00");
        assert_eq!(
            parse_datetime_local("2024-06-01T14:05:09.250").unwrap(),
            date(2024, 6, 1).at(14, 5, 9, 0)
        );
        assert!(parse_datetime_local("2024-02-30T10:00").is_err());
    }

    #[test]
    fn optional_numbers_treat_blank_as_unset() {
        assert_eq!(parse_optional_number("  ", "Stake"), Ok(None));
        assert_eq!(parse_optional_number("1,5", "Odds"), Ok(Some(1.5)));
        assert_eq!(
            parse_optional_number("abc", "Stake"),
            Err("Stake must be a valid number".to_string())
        );
    }
}
