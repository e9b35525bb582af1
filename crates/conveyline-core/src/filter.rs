//! Transfer selection rule

use chrono::{DateTime, Datelike, FixedOffset};
use serde_json::Value;

/// Grantor fields that must all be present for a transfer to be considered
const REQUIRED_GRANTOR_FIELDS: [&str; 4] =
    ["Date", "Price", "InstrumentType", "BureauOfConveyancesLink"];

/// Decides whether a raw transfer qualifies for ingestion.
///
/// A transfer qualifies when its grantor `Date` falls in `year` (in the
/// offset the timestamp was written with), `Price >= min_price`,
/// `InstrumentType == instrument` and the document link is non-empty.
/// Anything unparsable is excluded, never reported as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPredicate {
    pub year: i32,
    pub min_price: f64,
    pub instrument: String,
}

impl Default for SelectionPredicate {
    fn default() -> Self {
        Self {
            year: 2024,
            min_price: 200_000.0,
            instrument: "DEED".to_string(),
        }
    }
}

impl SelectionPredicate {
    /// Check a `Grantor` sub-record
    pub fn qualifies(&self, grantor: &Value) -> bool {
        if !REQUIRED_GRANTOR_FIELDS
            .iter()
            .all(|k| grantor.get(k).is_some())
        {
            return false;
        }

        let Some(date) = grantor["Date"].as_str().and_then(parse_grantor_date) else {
            return false;
        };
        let Some(price) = grantor["Price"].as_f64() else {
            return false;
        };

        date.year() == self.year
            && price >= self.min_price
            && grantor["InstrumentType"].as_str() == Some(self.instrument.as_str())
            && grantor["BureauOfConveyancesLink"]
                .as_str()
                .is_some_and(|link| !link.is_empty())
    }

    /// Check a whole transfer object (looks at its `Grantor`)
    pub fn qualifies_transfer(&self, transfer: &Value) -> bool {
        transfer
            .get("Grantor")
            .is_some_and(|grantor| self.qualifies(grantor))
    }
}

/// Parse an ISO-8601 timestamp that carries a UTC offset.
///
/// Accepts RFC 3339 (`2024-06-15T00:00:00-10:00`, `...Z`) and the compact
/// offset form (`2024-06-15T00:00:00-1000`). Naive timestamps are rejected.
pub fn parse_grantor_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}
