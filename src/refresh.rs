//! Data refresh pipeline
//!
//! Rebuilds the three tables of the relational store in dependency order:
//! locations first (vaccinations link to them by id), then vaccinations, then
//! cases. Every network call is awaited in turn and goes through the cache.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::data::cases::CASES_CSV_URL;
use crate::data::locations::{country_names, GEOCODE_URL, LOCATIONS_CSV_URL};
use crate::data::vaccinations::{load_dataset, parse_dataset, VACCINATIONS_JSON_URL};
use crate::data::{
    CaseIngestor, CountryIndex, GeoStore, IngestError, LocationIngestor, VaccinationIngestor,
};
use crate::fetch::Fetcher;

/// Error from one stage of the refresh
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Location ingest failed: {0}")]
    Locations(#[source] IngestError),

    #[error("Vaccination ingest failed: {0}")]
    Vaccinations(#[source] IngestError),

    #[error("Case ingest failed: {0}")]
    Cases(#[source] IngestError),
}

/// Where the vaccination dataset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaccinationSource {
    /// Fetched through the cache in API mode
    Remote(String),
    /// Read from a local JSON file
    File(PathBuf),
}

/// Endpoints and credentials for a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub api_key: String,
    pub geocode_endpoint: String,
    pub locations_url: String,
    pub cases_url: String,
    pub vaccinations: VaccinationSource,
}

impl RefreshConfig {
    /// Configuration using the public data sources
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            geocode_endpoint: GEOCODE_URL.to_string(),
            locations_url: LOCATIONS_CSV_URL.to_string(),
            cases_url: CASES_CSV_URL.to_string(),
            vaccinations: VaccinationSource::Remote(VACCINATIONS_JSON_URL.to_string()),
        }
    }

    /// Reads vaccinations from `path` instead of fetching them
    pub fn with_vaccination_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.vaccinations = VaccinationSource::File(path.into());
        self
    }
}

/// Stage the refresh is about to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    Locations,
    Vaccinations,
    Cases,
}

impl fmt::Display for RefreshStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStage::Locations => write!(f, "Geocoding countries"),
            RefreshStage::Vaccinations => write!(f, "Loading vaccinations"),
            RefreshStage::Cases => write!(f, "Loading confirmed cases"),
        }
    }
}

/// Rows stored per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub locations: usize,
    pub vaccinations: usize,
    pub cases: usize,
}

/// Rebuilds every table, reporting each stage to `on_stage` before it runs
///
/// The first failing stage aborts the refresh. Tables written by earlier
/// stages keep their new contents; the failing table keeps its old ones.
pub async fn run(
    fetcher: &mut Fetcher,
    store: &mut GeoStore,
    config: &RefreshConfig,
    mut on_stage: impl FnMut(RefreshStage),
) -> Result<RefreshSummary, RefreshError> {
    on_stage(RefreshStage::Locations);
    let locations = refresh_locations(fetcher, store, config)
        .await
        .map_err(RefreshError::Locations)?;

    on_stage(RefreshStage::Vaccinations);
    let vaccinations = refresh_vaccinations(fetcher, store, config)
        .await
        .map_err(RefreshError::Vaccinations)?;

    on_stage(RefreshStage::Cases);
    let cases = refresh_cases(fetcher, store, config)
        .await
        .map_err(RefreshError::Cases)?;

    let summary = RefreshSummary {
        locations,
        vaccinations,
        cases,
    };
    info!(?summary, "refresh complete");
    Ok(summary)
}

async fn refresh_locations(
    fetcher: &mut Fetcher,
    store: &mut GeoStore,
    config: &RefreshConfig,
) -> Result<usize, IngestError> {
    let rows = fetcher.fetch_csv(&config.locations_url, &[]).await?;
    let countries = country_names(&rows);
    info!(countries = countries.len(), "country list loaded");

    LocationIngestor::new(config.api_key.as_str())
        .with_endpoint(config.geocode_endpoint.as_str())
        .ingest(fetcher, store, &countries)
        .await
}

async fn refresh_vaccinations(
    fetcher: &mut Fetcher,
    store: &mut GeoStore,
    config: &RefreshConfig,
) -> Result<usize, IngestError> {
    let index = CountryIndex::from_store(store)?;
    let dataset = match &config.vaccinations {
        VaccinationSource::Remote(url) => parse_dataset(fetcher.fetch_api(url, &[]).await?)?,
        VaccinationSource::File(path) => load_dataset(path),
    };

    VaccinationIngestor.ingest(store, &dataset, &index)
}

async fn refresh_cases(
    fetcher: &mut Fetcher,
    store: &mut GeoStore,
    config: &RefreshConfig,
) -> Result<usize, IngestError> {
    let rows = fetcher.fetch_csv(&config.cases_url, &[]).await?;
    CaseIngestor.ingest(store, &rows)
}
