//! Data models and ingest pipelines
//!
//! This module holds the relational store and the three ingestors that reshape
//! external datasets into its tables: geocoded country locations, per-country
//! vaccination series and per-region confirmed case counts. Every ingestor
//! replaces the whole contents of its table.

pub mod cases;
pub mod locations;
pub mod store;
pub mod vaccinations;

pub use cases::CaseIngestor;
pub use locations::LocationIngestor;
pub use store::{GeoStore, StoreError};
pub use vaccinations::{CountryIndex, VaccinationIngestor};

use chrono::NaiveDate;
use thiserror::Error;

use crate::fetch::FetchError;

/// Rectangular bounding box of a place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub sw_lat: f64,
    pub sw_lng: f64,
}

/// A geocoded country
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Country name as queried, unique and case-sensitive
    pub country: String,
    /// Latitude of the centre point
    pub lat: f64,
    /// Longitude of the centre point
    pub lng: f64,
    /// Recommended viewport for the country
    pub viewport: Viewport,
}

/// One day of vaccination figures for a country
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationRecord {
    /// Row id of the country in the `Locations` table
    pub location_id: i64,
    /// Reporting date
    pub date: Option<NaiveDate>,
    /// Cumulative doses administered
    pub total: Option<f64>,
    /// Cumulative doses per hundred people
    pub per_hundred: Option<f64>,
}

/// Latest confirmed case count for a country or sub-region
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    /// Province or state, when the source splits the country
    pub state: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    /// Value of the most recent date column
    pub confirmed_cases: Option<f64>,
}

/// Errors that abort an ingest run
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetching a source dataset failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Reading or writing the relational store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The geocoder returned no result for a country
    #[error("No geocoding result for '{country}' (status: {status})")]
    NoGeocodeResult { country: String, status: String },

    /// The geocoder response lacks the expected geometry
    #[error("Malformed geocoding response for '{country}': {source}")]
    MalformedGeocode {
        country: String,
        #[source]
        source: serde_json::Error,
    },

    /// The vaccination dataset does not have the expected structure
    #[error("Malformed vaccination dataset: {0}")]
    MalformedVaccinations(#[source] serde_json::Error),

    /// A vaccination observation carries an unreadable date
    #[error("Invalid date '{value}' for '{country}'")]
    InvalidDate { country: String, value: String },
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Store(StoreError::Database(err))
    }
}

/// Parses a numeric cell, treating blank or non-numeric text as absent
pub(crate) fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|text| !text.is_empty())
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_integers_and_decimals() {
        assert_eq!(parse_number(Some("42")), Some(42.0));
        assert_eq!(parse_number(Some(" -12.5 ")), Some(-12.5));
    }

    #[test]
    fn test_parse_number_rejects_blank_and_text() {
        assert_eq!(parse_number(None), None);
        assert_eq!(parse_number(Some("")), None);
        assert_eq!(parse_number(Some("n/a")), None);
        assert_eq!(parse_number(Some("NaN")), None);
    }
}
