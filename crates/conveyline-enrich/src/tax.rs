//! Conveyance tax lookup seam

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Stored when a transfer has no document link to look at
pub const MISSING_LINK: &str = "ERROR";
/// Stored when the document was read but carries no tax amount
pub const NOT_FOUND: &str = "Not found";

/// Result of looking up the conveyance tax of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxOutcome {
    /// Amount text as printed on the document, e.g. `1,234.50`
    Amount(String),
    NotFound,
    /// Download, conversion or recognition failed
    Failed(String),
}

impl TaxOutcome {
    /// Text written to the `ConveyanceTax` field
    pub fn into_stored(self) -> String {
        match self {
            Self::Amount(amount) => amount,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TaxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(amount) => write!(f, "{amount}"),
            Self::NotFound => write!(f, "{NOT_FOUND}"),
            Self::Failed(msg) => write!(f, "Error accessing PDF: {msg}"),
        }
    }
}

/// Anything that can turn a document link into a tax outcome.
///
/// Failures are part of the outcome, never an `Err`: one bad document must
/// not stop the run.
pub trait TaxExtractor {
    fn extract(&self, document_url: &str) -> TaxOutcome;
}

impl<F> TaxExtractor for F
where
    F: Fn(&str) -> TaxOutcome,
{
    fn extract(&self, document_url: &str) -> TaxOutcome {
        self(document_url)
    }
}

static TAX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Conveyance Tax:\s*\$?\s*([\d,]+\.?\d*)").expect("valid tax pattern")
});

/// First conveyance tax amount in recognized document text
pub fn find_tax_amount(text: &str) -> Option<&str> {
    TAX_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Map recognized text to an outcome
pub fn outcome_from_text(text: &str) -> TaxOutcome {
    match find_tax_amount(text) {
        Some(amount) => TaxOutcome::Amount(amount.to_string()),
        None => TaxOutcome::NotFound,
    }
}
