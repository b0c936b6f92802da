//! Payload shapes stored in the request cache

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The cached result of a single outbound request
///
/// On disk a payload is one of `{"html": "..."}`, `{"csv": [row, ...]}` or the
/// raw structured response. Variants are tried in that order when the cache
/// file is read back, so a structured response that happens to look exactly
/// like one of the wrapped shapes is read as that shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Raw text of a plain request
    Html(HtmlPayload),
    /// Rows of a delimited response, keyed by header
    Csv(CsvPayload),
    /// Structured API response, stored as returned
    Api(Value),
}

/// Wrapper for a cached text response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlPayload {
    pub html: String,
}

/// Wrapper for a cached CSV response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvPayload {
    pub csv: Vec<CsvRow>,
}

impl Payload {
    /// Creates a text payload
    pub fn html(text: impl Into<String>) -> Self {
        Payload::Html(HtmlPayload { html: text.into() })
    }

    /// Creates a CSV payload
    pub fn csv(rows: Vec<CsvRow>) -> Self {
        Payload::Csv(CsvPayload { csv: rows })
    }

    /// Converts the payload into the JSON value it is stored as
    pub fn into_value(self) -> Value {
        match self {
            Payload::Api(value) => value,
            // Both wrappers only hold strings and string maps
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        }
    }
}

/// One row of a CSV response
///
/// Maps header names to cell values while preserving column order, so the
/// last column of a wide time series is still the last entry after the row
/// has been through the cache file. Cells missing from a short row are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsvRow(Map<String, Value>);

impl CsvRow {
    /// Creates an empty row
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a row from `(header, value)` pairs in column order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (header, value) in pairs {
            row.insert(header, Some(value.into()));
        }
        row
    }

    /// Sets a cell; `None` marks a cell absent from the source row
    pub fn insert(&mut self, header: impl Into<String>, value: Option<String>) {
        let value = value.map(Value::String).unwrap_or(Value::Null);
        self.0.insert(header.into(), value);
    }

    /// Returns the text of a cell, if present
    pub fn get(&self, header: &str) -> Option<&str> {
        self.0.get(header).and_then(Value::as_str)
    }

    /// Returns the text of the last column, if present
    pub fn last_value(&self) -> Option<&str> {
        self.0.values().next_back().and_then(Value::as_str)
    }

    /// Iterates over header names in column order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_payload_uses_html_key() {
        let value = serde_json::to_value(Payload::html("<p>hi</p>")).unwrap();
        assert_eq!(value, json!({"html": "<p>hi</p>"}));
    }

    #[test]
    fn test_csv_payload_uses_csv_key() {
        let rows = vec![CsvRow::from_pairs([("a", "1"), ("b", "2")])];
        let value = serde_json::to_value(Payload::csv(rows)).unwrap();
        assert_eq!(value, json!({"csv": [{"a": "1", "b": "2"}]}));
    }

    #[test]
    fn test_structured_response_is_read_as_api() {
        let value = json!({"results": [], "status": "ZERO_RESULTS"});
        let payload: Payload = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(payload, Payload::Api(value));
    }

    #[test]
    fn test_object_with_html_and_extra_keys_is_read_as_api() {
        let value = json!({"html": "x", "status": "OK"});
        let payload: Payload = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(payload, Payload::Api(value));
    }

    #[test]
    fn test_into_value_unwraps_api_and_keeps_wrappers() {
        let api = json!([1, 2, 3]);
        assert_eq!(Payload::Api(api.clone()).into_value(), api);
        assert_eq!(Payload::html("t").into_value(), json!({"html": "t"}));
    }

    #[test]
    fn test_last_value_follows_column_order_through_json() {
        let row = CsvRow::from_pairs([
            ("Province/State", ""),
            ("Country/Region", "Chad"),
            ("1/22/20", "0"),
            ("1/23/20", "3"),
            ("1/24/20", "7"),
        ]);

        let json = serde_json::to_string(&row).unwrap();
        let back: CsvRow = serde_json::from_str(&json).unwrap();

        assert_eq!(back.last_value(), Some("7"));
        assert_eq!(
            back.headers().collect::<Vec<_>>(),
            vec!["Province/State", "Country/Region", "1/22/20", "1/23/20", "1/24/20"]
        );
    }

    #[test]
    fn test_missing_cell_reads_as_none() {
        let mut row = CsvRow::new();
        row.insert("Lat", None);
        assert_eq!(row.get("Lat"), None);
        assert_eq!(row.last_value(), None);
        assert_eq!(row.len(), 1);
    }
}
