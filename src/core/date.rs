//! Validation of purchase dates read from scanned documents.
//!
//! Extraction models regularly hallucinate or mangle dates. Anything that
//! cannot be parsed, or that lies implausibly far in the past, is replaced by
//! the processing date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, warn};

/// Dates older than this many days are treated as extraction errors.
pub const MAX_AGE_DAYS: i64 = 365;

/// Tried in order, the first successful parse wins.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%y"];

/// A calendar date that parsed cleanly and is recent enough to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDate(NaiveDate);

impl NormalizedDate {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl Display for NormalizedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Parses `raw` against the supported formats without any plausibility check.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt)
            .ok()
            // chrono accepts short years for %Y; a two digit year must fall
            // through to the %y pattern instead.
            .filter(|date| !fmt.contains("%Y") || (1000..=9999).contains(&date.year()))
    })
}

/// Normalizes a possibly absent date string relative to `today`.
///
/// Never fails: unparseable, absent or stale input yields `today`.
pub fn normalize_date(raw: Option<&str>, today: NaiveDate) -> NormalizedDate {
    let Some(raw) = raw else {
        debug!("No purchase date extracted, using {}", today);
        return NormalizedDate(today);
    };

    match parse_date(raw) {
        Some(parsed) if (today - parsed).num_days() > MAX_AGE_DAYS => {
            warn!(
                extracted = %parsed,
                "Extracted date is too old and was discarded, using the current date"
            );
            NormalizedDate(today)
        }
        Some(parsed) => NormalizedDate(parsed),
        None => {
            warn!(
                raw = %raw,
                "Extracted date could not be parsed, using the current date"
            );
            NormalizedDate(today)
        }
    }
}
