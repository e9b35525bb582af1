//! Record shapes for the fetch output and the enriched transfer output.
//!
//! Field names follow the upstream API (`PascalCase`). Scalar fields are kept
//! as raw JSON values: the upstream contract is not validated, and whatever
//! the API returned is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::SelectionPredicate;

/// Parcel-level projection of a search hit's `TaxMapKey` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParcelRecord {
    #[serde(default)]
    pub parcel_number: Value,
    #[serde(default)]
    pub last_sale_date: Value,
    #[serde(default)]
    pub last_sale_price: Value,
    #[serde(default)]
    pub last_sale_instrument: Value,
    /// Absent when the source object had no `Transfers` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<Value>>,
}

impl ParcelRecord {
    /// Project a raw `TaxMapKey` object, keeping only qualifying transfers.
    pub fn project(tax_map_key: &Value, predicate: &SelectionPredicate) -> Self {
        let field = |name: &str| tax_map_key.get(name).cloned().unwrap_or(Value::Null);
        let transfers = tax_map_key
            .get("Transfers")
            .map(|raw| match raw.as_array() {
                Some(list) => list
                    .iter()
                    .filter(|t| predicate.qualifies_transfer(t))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            });

        Self {
            parcel_number: field("ParcelNumber"),
            last_sale_date: field("LastSaleDate"),
            last_sale_price: field("LastSalePrice"),
            last_sale_instrument: field("LastSaleInstrument"),
            transfers,
        }
    }

    /// Parcel number as text, when the API sent a string
    pub fn parcel_number_str(&self) -> Option<&str> {
        self.parcel_number.as_str()
    }

    pub fn transfers(&self) -> &[Value] {
        self.transfers.as_deref().unwrap_or_default()
    }
}

/// One enriched transfer as persisted by the process step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTransfer {
    #[serde(rename = "ParcelNumber", default)]
    pub parcel_number: Value,
    #[serde(rename = "TMK", default)]
    pub tmk: Value,
    #[serde(rename = "Date", default)]
    pub date: Value,
    #[serde(rename = "Price", default)]
    pub price: Value,
    #[serde(rename = "BureauOfConveyancesLink", default)]
    pub document_link: Value,
    /// Extractor output stored verbatim: an amount, `Not found`, `ERROR`
    /// or an error description
    #[serde(rename = "ConveyanceTax", default)]
    pub conveyance_tax: Value,
}
