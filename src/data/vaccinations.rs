//! Vaccination time-series ingest
//!
//! Reads the per-country vaccination dataset and stores one row per reported
//! day. Rows are linked to `Locations` by country name, resolved to the
//! location's row id when the ingest runs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::params;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{GeoStore, IngestError, StoreError, VaccinationRecord};

/// Published vaccination dataset
pub const VACCINATIONS_JSON_URL: &str =
    "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/vaccinations.json";

pub(crate) const VACCINATIONS_TABLE: &str = "Vaccinations";

const VACCINATIONS_SCHEMA: &str = r#"
    CREATE TABLE "Vaccinations" (
        "id"              INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        "location_id"     INTEGER NOT NULL,
        "vac_date"        TEXT,
        "vac_num"         REAL,
        "vac_per_hundred" REAL,
        FOREIGN KEY("location_id") REFERENCES "Locations"("id")
    );
"#;

/// Date format used by the dataset
const DATE_FORMAT: &str = "%Y-%m-%d";

/// All observations for one country
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CountryVaccinations {
    pub country: String,
    #[serde(default)]
    pub data: Vec<DailyVaccinations>,
}

/// One reported day; every figure may be missing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailyVaccinations {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub total_vaccinations: Option<f64>,
    #[serde(default)]
    pub total_vaccinations_per_hundred: Option<f64>,
}

/// Parses the dataset from its JSON form
pub fn parse_dataset(value: Value) -> Result<Vec<CountryVaccinations>, IngestError> {
    serde_json::from_value(value).map_err(IngestError::MalformedVaccinations)
}

/// Reads the dataset from a local JSON file
///
/// A missing or unreadable file yields an empty dataset.
pub fn load_dataset(path: &Path) -> Vec<CountryVaccinations> {
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(dataset) => dataset,
        Err(error) => {
            warn!(path = %path.display(), %error, "vaccination file unusable, using empty dataset");
            Vec::new()
        }
    }
}

/// Country name to `Locations` row id
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    ids: HashMap<String, i64>,
}

impl CountryIndex {
    /// Builds the index from the current `Locations` table
    pub fn from_store(store: &GeoStore) -> Result<Self, StoreError> {
        Ok(Self {
            ids: store.location_ids()?,
        })
    }

    /// Row id for `country`, matched case-sensitively
    pub fn get(&self, country: &str) -> Option<i64> {
        self.ids.get(country).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<(String, i64)> for CountryIndex {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Builds the `Vaccinations` table from the vaccination dataset
#[derive(Debug, Clone, Copy, Default)]
pub struct VaccinationIngestor;

impl VaccinationIngestor {
    /// Replaces the `Vaccinations` table with every observation of every
    /// country present in `index`
    ///
    /// Countries missing from the index are skipped silently.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of rows stored
    /// * `Err(IngestError)` - If a date cannot be read or the write fails
    pub fn ingest(
        &self,
        store: &mut GeoStore,
        dataset: &[CountryVaccinations],
        index: &CountryIndex,
    ) -> Result<usize, IngestError> {
        let records = build_records(dataset, index)?;
        let stored = replace_vaccinations(store, &records)?;
        info!(stored, countries = index.len(), "vaccinations ingested");
        Ok(stored)
    }
}

/// Resolves every observation of a known country into a record
pub fn build_records(
    dataset: &[CountryVaccinations],
    index: &CountryIndex,
) -> Result<Vec<VaccinationRecord>, IngestError> {
    let mut records = Vec::new();

    for region in dataset {
        let Some(location_id) = index.get(&region.country) else {
            debug!(country = %region.country, "no location for country, skipped");
            continue;
        };

        for day in &region.data {
            let date = day
                .date
                .as_deref()
                .map(|value| {
                    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
                        IngestError::InvalidDate {
                            country: region.country.clone(),
                            value: value.to_string(),
                        }
                    })
                })
                .transpose()?;

            records.push(VaccinationRecord {
                location_id,
                date,
                total: day.total_vaccinations,
                per_hundred: day.total_vaccinations_per_hundred,
            });
        }
    }

    Ok(records)
}

/// Replaces the `Vaccinations` table with `records`
pub fn replace_vaccinations(
    store: &mut GeoStore,
    records: &[VaccinationRecord],
) -> Result<usize, IngestError> {
    let rows = store.replace_table(VACCINATIONS_TABLE, VACCINATIONS_SCHEMA, |tx| {
        let mut stmt = tx.prepare(
            "INSERT INTO Vaccinations (location_id, vac_date, vac_num, vac_per_hundred)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for record in records {
            stmt.execute(params![
                record.location_id,
                record.date,
                record.total,
                record.per_hundred,
            ])?;
        }
        Ok(records.len())
    })?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn dataset() -> Vec<CountryVaccinations> {
        parse_dataset(json!([
            {
                "country": "Chad",
                "iso_code": "TCD",
                "data": [
                    {"date": "2021-06-04", "total_vaccinations": 0, "total_vaccinations_per_hundred": 0.0},
                    {"date": "2021-06-05", "total_vaccinations": 1500, "total_vaccinations_per_hundred": 0.01}
                ]
            },
            {
                "country": "Narnia",
                "data": [{"date": "2021-01-01", "total_vaccinations": 10}]
            },
            {
                "country": "Peru",
                "data": [{"date": "2021-02-09", "people_vaccinated": 300}]
            }
        ]))
        .unwrap()
    }

    fn index() -> CountryIndex {
        [("Chad".to_string(), 1), ("Peru".to_string(), 2)].into_iter().collect()
    }

    #[test]
    fn test_unknown_country_is_skipped() {
        let records = build_records(&dataset(), &index()).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.location_id == 1 || r.location_id == 2));
    }

    #[test]
    fn test_missing_figures_are_none() {
        let records = build_records(&dataset(), &index()).unwrap();
        let peru = records.iter().find(|r| r.location_id == 2).unwrap();

        assert_eq!(peru.date, NaiveDate::from_ymd_opt(2021, 2, 9));
        assert_eq!(peru.total, None);
        assert_eq!(peru.per_hundred, None);
    }

    #[test]
    fn test_invalid_date_aborts() {
        let dataset = parse_dataset(json!([
            {"country": "Chad", "data": [{"date": "04/06/2021"}]}
        ]))
        .unwrap();

        let err = build_records(&dataset, &index()).unwrap_err();

        assert!(matches!(err, IngestError::InvalidDate { ref value, .. } if value == "04/06/2021"));
    }

    #[test]
    fn test_country_match_is_case_sensitive() {
        assert_eq!(index().get("Chad"), Some(1));
        assert_eq!(index().get("chad"), None);
    }

    #[test]
    fn test_ingest_replaces_table() {
        let mut store = GeoStore::open_in_memory().unwrap();
        let ingestor = VaccinationIngestor;

        ingestor.ingest(&mut store, &dataset(), &index()).unwrap();
        let stored = ingestor.ingest(&mut store, &dataset(), &index()).unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.row_count(VACCINATIONS_TABLE).unwrap(), 3);
    }

    #[test]
    fn test_ingest_with_empty_index_stores_nothing() {
        let mut store = GeoStore::open_in_memory().unwrap();

        let stored = VaccinationIngestor
            .ingest(&mut store, &dataset(), &CountryIndex::default())
            .unwrap();

        assert_eq!(stored, 0);
        assert!(store.has_table(VACCINATIONS_TABLE).unwrap());
    }

    #[test]
    fn test_parse_dataset_rejects_wrong_shape() {
        let result = parse_dataset(json!({"country": "Chad"}));
        assert!(matches!(result, Err(IngestError::MalformedVaccinations(_))));
    }

    #[test]
    fn test_load_dataset_missing_file_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(load_dataset(&temp_dir.path().join("vaccinations.json")).is_empty());
    }

    #[test]
    fn test_load_dataset_reads_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("vaccinations.json");
        fs::write(&path, r#"[{"country": "Chad", "data": []}]"#).unwrap();

        let dataset = load_dataset(&path);

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset[0].country, "Chad");
    }
}
