//! Composite identity of a persisted transfer

use serde_json::Value;

/// `(ParcelNumber, Date, Price, DocumentLink)` in canonical form.
///
/// Each part is the JSON text of the source value, `None` when missing or
/// null. Strings keep their quotes, so `"250000"` and `250000` differ;
/// integral floats collapse to integers, so `250000.0` and `250000` match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    parcel_number: Option<String>,
    date: Option<String>,
    price: Option<String>,
    document_link: Option<String>,
}

impl RecordKey {
    pub fn new(parcel_number: &Value, date: &Value, price: &Value, document_link: &Value) -> Self {
        Self {
            parcel_number: canonical(parcel_number),
            date: canonical(date),
            price: canonical(price),
            document_link: canonical(document_link),
        }
    }

    /// Key of a raw transfer, given its parcel number and `Grantor` record
    pub fn from_grantor(parcel_number: &Value, grantor: &Value) -> Self {
        Self::new(
            parcel_number,
            field(grantor, "Date"),
            field(grantor, "Price"),
            field(grantor, "BureauOfConveyancesLink"),
        )
    }

    /// Key of a record already in the output file
    pub fn from_persisted(record: &Value) -> Self {
        Self::new(
            field(record, "ParcelNumber"),
            field(record, "Date"),
            field(record, "Price"),
            field(record, "BureauOfConveyancesLink"),
        )
    }
}

fn field<'a>(object: &'a Value, name: &str) -> &'a Value {
    object.get(name).unwrap_or(&Value::Null)
}

/// Largest integer an f64 represents exactly
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

fn canonical(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_F64 => {
                Some(format!("{}", f as i64))
            }
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}
