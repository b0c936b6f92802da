//! Confirmed-case ingest
//!
//! The case source is a wide CSV: a few identifying columns followed by one
//! cumulative count column per day. Only the last (most recent) column is
//! kept.

use rusqlite::params;
use tracing::info;

use super::{parse_number, CaseRecord, GeoStore, IngestError};
use crate::cache::CsvRow;

/// Global confirmed-case time series
pub const CASES_CSV_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";

pub(crate) const CASES_TABLE: &str = "covid_cases";

const CASES_SCHEMA: &str = r#"
    CREATE TABLE "covid_cases" (
        "id"              INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        "State"           TEXT,
        "Country"         TEXT,
        "Lat"             REAL,
        "Long"            REAL,
        "confirmed_cases" REAL
    );
"#;

const STATE_COLUMN: &str = "Province/State";
const COUNTRY_COLUMN: &str = "Country/Region";
const LAT_COLUMN: &str = "Lat";
const LONG_COLUMN: &str = "Long";

/// Builds the `covid_cases` table from the case time series
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseIngestor;

impl CaseIngestor {
    /// Replaces the `covid_cases` table with one row per source row
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of rows stored
    /// * `Err(IngestError)` - If the database write fails
    pub fn ingest(&self, store: &mut GeoStore, rows: &[CsvRow]) -> Result<usize, IngestError> {
        let records: Vec<CaseRecord> = rows.iter().map(case_record).collect();
        let stored = replace_cases(store, &records)?;
        info!(stored, "cases ingested");
        Ok(stored)
    }
}

/// Reduces one time-series row to its latest count
pub fn case_record(row: &CsvRow) -> CaseRecord {
    let text = |column: &str| {
        row.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    CaseRecord {
        state: text(STATE_COLUMN),
        country: text(COUNTRY_COLUMN),
        lat: parse_number(row.get(LAT_COLUMN)),
        long: parse_number(row.get(LONG_COLUMN)),
        confirmed_cases: parse_number(row.last_value()),
    }
}

/// Replaces the `covid_cases` table with `records`
pub fn replace_cases(store: &mut GeoStore, records: &[CaseRecord]) -> Result<usize, IngestError> {
    let rows = store.replace_table(CASES_TABLE, CASES_SCHEMA, |tx| {
        let mut stmt = tx.prepare(
            "INSERT INTO covid_cases (State, Country, Lat, Long, confirmed_cases)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for record in records {
            stmt.execute(params![
                record.state,
                record.country,
                record.lat,
                record.long,
                record.confirmed_cases,
            ])?;
        }
        Ok(records.len())
    })?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::parse_csv;

    const SERIES: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Chad,15.454166,18.732207,0,2,5
Ontario,Canada,51.2538,-85.3232,10,20,30
,Antarctica,,,0,0,11
";

    #[test]
    fn test_last_column_is_confirmed_cases() {
        let rows = parse_csv(SERIES).unwrap();

        let chad = case_record(&rows[0]);

        assert_eq!(chad.confirmed_cases, Some(5.0));
        assert_eq!(chad.country.as_deref(), Some("Chad"));
        assert_eq!(chad.state, None);
    }

    #[test]
    fn test_last_column_does_not_depend_on_column_count() {
        let short = CsvRow::from_pairs([
            ("Province/State", ""),
            ("Country/Region", "Peru"),
            ("Lat", "-9.19"),
            ("Long", "-75.0152"),
            ("d1", "1"),
        ]);
        let long = CsvRow::from_pairs([
            ("Province/State", ""),
            ("Country/Region", "Peru"),
            ("Lat", "-9.19"),
            ("Long", "-75.0152"),
            ("d1", "1"),
            ("d2", "4"),
            ("d3", "9"),
        ]);

        assert_eq!(case_record(&short).confirmed_cases, Some(1.0));
        assert_eq!(case_record(&long).confirmed_cases, Some(9.0));
    }

    #[test]
    fn test_sub_region_and_coordinates() {
        let rows = parse_csv(SERIES).unwrap();

        let ontario = case_record(&rows[1]);

        assert_eq!(ontario.state.as_deref(), Some("Ontario"));
        assert_eq!(ontario.lat, Some(51.2538));
        assert_eq!(ontario.long, Some(-85.3232));
    }

    #[test]
    fn test_blank_coordinates_are_none() {
        let rows = parse_csv(SERIES).unwrap();

        let antarctica = case_record(&rows[2]);

        assert_eq!(antarctica.lat, None);
        assert_eq!(antarctica.long, None);
        assert_eq!(antarctica.confirmed_cases, Some(11.0));
    }

    #[test]
    fn test_ingest_stores_every_row() {
        let mut store = GeoStore::open_in_memory().unwrap();
        let rows = parse_csv(SERIES).unwrap();

        let stored = CaseIngestor.ingest(&mut store, &rows).unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.row_count(CASES_TABLE).unwrap(), 3);
    }
}
