//! Normalizes raw response bodies into cache payloads

use serde_json::Value;

use super::{FetchError, FetchMode};
use crate::cache::{CsvRow, Payload};

/// Turns a response body into the payload shape for `mode`
pub fn decode(body: Vec<u8>, mode: FetchMode) -> Result<Payload, FetchError> {
    match mode {
        FetchMode::Api => {
            let value: Value = serde_json::from_slice(&body)?;
            Ok(Payload::Api(value))
        }
        FetchMode::Csv => {
            let text = String::from_utf8(body)?;
            Ok(Payload::csv(parse_csv(&text)?))
        }
        FetchMode::Html => Ok(Payload::html(String::from_utf8(body)?)),
    }
}

/// Parses comma-delimited text into rows keyed by the header line
///
/// Rows shorter than the header get `null` for the missing cells; cells past
/// the last header are dropped.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = CsvRow::new();
        for (index, header) in headers.iter().enumerate() {
            row.insert(header, record.get(index).map(str::to_string));
        }
        rows.push(row);
    }

    Ok(rows)
}
