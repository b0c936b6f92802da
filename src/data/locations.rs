//! Country geocoding ingest
//!
//! Looks up every country name with a geocoding API and stores the centre
//! point and recommended viewport of the first result in the `Locations`
//! table.

use std::collections::HashSet;

use rusqlite::params;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{GeoStore, IngestError, Location, Viewport};
use crate::cache::CsvRow;
use crate::fetch::Fetcher;

/// Google geocoding endpoint
pub const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Country list published alongside the vaccination dataset
pub const LOCATIONS_CSV_URL: &str =
    "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/locations.csv";

/// Column of the locations CSV holding the country name
const LOCATION_COLUMN: &str = "location";

pub(crate) const LOCATIONS_TABLE: &str = "Locations";

const LOCATIONS_SCHEMA: &str = r#"
    CREATE TABLE "Locations" (
        "id"          INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        "country"     TEXT NOT NULL UNIQUE,
        "lat"         REAL NOT NULL,
        "lng"         REAL NOT NULL,
        "view_ne_lat" REAL NOT NULL,
        "view_ne_lng" REAL NOT NULL,
        "view_sw_lat" REAL NOT NULL,
        "view_sw_lng" REAL NOT NULL
    );
"#;

/// Geocoding API response, reduced to the fields we read
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    viewport: ViewportBox,
}

#[derive(Debug, Deserialize)]
struct ViewportBox {
    northeast: LatLng,
    southwest: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Builds the `Locations` table from a list of country names
#[derive(Debug, Clone)]
pub struct LocationIngestor {
    /// Geocoding API credential
    api_key: String,
    /// Geocoding endpoint (allows override for testing)
    endpoint: String,
}

impl LocationIngestor {
    /// Creates an ingestor that geocodes with `api_key`
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: GEOCODE_URL.to_string(),
        }
    }

    /// Uses a different geocoding endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Geocodes `countries` in order and replaces the `Locations` table
    ///
    /// A name that appears more than once is geocoded and stored once. Any
    /// failed request or unusable response aborts the run before the table is
    /// touched.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of locations stored
    /// * `Err(IngestError)` - If a request, response or database write fails
    pub async fn ingest(
        &self,
        fetcher: &mut Fetcher,
        store: &mut GeoStore,
        countries: &[String],
    ) -> Result<usize, IngestError> {
        let mut seen = HashSet::new();
        let mut locations = Vec::with_capacity(countries.len());

        for country in countries {
            if !seen.insert(country.as_str()) {
                debug!(country = %country, "duplicate country skipped");
                continue;
            }

            let params = [("address", country.as_str()), ("key", self.api_key.as_str())];
            let response = fetcher
                .fetch_api_if(&self.endpoint, &params, is_settled_geocode)
                .await?;
            locations.push(parse_geocode(country, response)?);
        }

        let stored = replace_locations(store, &locations)?;
        info!(stored, "locations ingested");
        Ok(stored)
    }
}

/// Whether a geocoding response is final and safe to cache
///
/// The geocoder reports quota and server trouble in the body of a successful
/// HTTP response. Only `OK` and `ZERO_RESULTS` answers are kept.
fn is_settled_geocode(response: &Value) -> bool {
    matches!(
        response.get("status").and_then(Value::as_str),
        None | Some("OK") | Some("ZERO_RESULTS")
    )
}

/// Extracts the first result's geometry from a geocoding response
fn parse_geocode(country: &str, response: Value) -> Result<Location, IngestError> {
    let malformed = |source| IngestError::MalformedGeocode {
        country: country.to_string(),
        source,
    };

    let response: GeocodeResponse = serde_json::from_value(response).map_err(malformed)?;
    let status = response.status.unwrap_or_default();
    let first = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| IngestError::NoGeocodeResult {
            country: country.to_string(),
            status,
        })?;
    let result: GeocodeResult = serde_json::from_value(first).map_err(malformed)?;
    let geometry = result.geometry;

    Ok(Location {
        country: country.to_string(),
        lat: geometry.location.lat,
        lng: geometry.location.lng,
        viewport: Viewport {
            ne_lat: geometry.viewport.northeast.lat,
            ne_lng: geometry.viewport.northeast.lng,
            sw_lat: geometry.viewport.southwest.lat,
            sw_lng: geometry.viewport.southwest.lng,
        },
    })
}

/// Replaces the `Locations` table with `locations`
pub fn replace_locations(store: &mut GeoStore, locations: &[Location]) -> Result<usize, IngestError> {
    let rows = store.replace_table(LOCATIONS_TABLE, LOCATIONS_SCHEMA, |tx| {
        let mut stmt = tx.prepare(
            "INSERT INTO Locations (country, lat, lng, view_ne_lat, view_ne_lng, view_sw_lat, view_sw_lng)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for location in locations {
            let viewport = &location.viewport;
            stmt.execute(params![
                location.country,
                location.lat,
                location.lng,
                viewport.ne_lat,
                viewport.ne_lng,
                viewport.sw_lat,
                viewport.sw_lng,
            ])?;
        }
        Ok(locations.len())
    })?;
    Ok(rows)
}

/// Country names from the rows of the locations CSV, in file order
pub fn country_names(rows: &[CsvRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get(LOCATION_COLUMN))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
