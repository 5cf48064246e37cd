use chrono::{Datelike, NaiveDate};

/// Null marker used by the tab-separated reference dumps.
pub const NULL_SENTINEL: &str = "\\N";

/// True when a raw field carries no value (empty, whitespace or the dump sentinel).
pub fn is_null_field(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == NULL_SENTINEL
}

/// Parse a scraped duration such as "2 h 15 m", "1h 5m" or "48 m" into minutes.
pub fn parse_runtime_minutes(raw: &str) -> Option<u32> {
    if is_null_field(raw) {
        return None;
    }
    let lowered = raw.trim().to_ascii_lowercase();
    let (hours_part, rest) = match lowered.split_once('h') {
        Some((h, rest)) => (Some(h), rest),
        None => (None, lowered.as_str()),
    };
    let minutes_part = rest.split('m').next().map(str::trim).filter(|m| !m.is_empty());

    let hours = match hours_part {
        Some(h) => Some(h.trim().parse::<u32>().ok()?),
        None => None,
    };
    let minutes = match minutes_part {
        Some(m) => Some(m.parse::<u32>().ok()?),
        None => None,
    };
    match (hours, minutes) {
        (None, None) => None,
        (h, m) => Some(h.unwrap_or(0) * 60 + m.unwrap_or(0)),
    }
}

/// Release dates arrive in several shapes ("Nov 12, 2019", "2019"); the year is always last.
pub fn year_from_release_date(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    let tail_start = trimmed
        .char_indices()
        .rev()
        .nth(3)
        .map(|(idx, _)| idx)?;
    let tail = &trimmed[tail_start..];
    if !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Calendar parts of a review post date. Any part may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateParts {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// Split an ISO-like review date ("2019-11-12", "2019-11-12T08:00:00Z") into its parts.
pub fn parse_review_date(raw: &str) -> DateParts {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DateParts::default();
    }
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    if let Ok(date) = NaiveDate::parse_from_str(day_part, "%Y-%m-%d") {
        return DateParts {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
        };
    }

    let mut parts = trimmed.splitn(3, '-');
    let year = parts.next().and_then(|p| p.trim().parse().ok());
    let month = parts.next().and_then(|p| p.trim().parse().ok());
    let day = parts.next().and_then(|p| {
        let digits: String = p.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    });
    DateParts { year, month, day }
}
