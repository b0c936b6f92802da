//! Command-line interface parsing for covidmap
//!
//! Arguments are parsed with clap and resolved into a [`StartupConfig`] that
//! names every file the run touches and, unless ingest is skipped, the
//! endpoints and credential the refresh needs.

use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;
use thiserror::Error;

use crate::logging::LOG_FILE_NAME;
use crate::refresh::RefreshConfig;

/// Default cache file name inside the data directory
pub const CACHE_FILE_NAME: &str = "covid_cache.json";

/// Default database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "geodata.sqlite";

/// Error types for CLI argument resolution
#[derive(Debug, Error)]
pub enum CliError {
    /// Ingest needs a geocoding key and none was given
    #[error("A geocoding API key is required: pass --api-key or set GEOCODE_API_KEY (or use --skip-ingest)")]
    MissingApiKey,

    /// No home directory to derive the default data directory from
    #[error("Could not determine a data directory; pass --data-dir")]
    NoDataDir,
}

/// covidmap - COVID-19 cases and vaccinations on a terminal world map
#[derive(Parser, Debug)]
#[command(name = "covidmap")]
#[command(about = "Plot COVID-19 cases and vaccinations on a world map, zoomable by country")]
#[command(version)]
pub struct Cli {
    /// Google geocoding API key used to locate each country
    #[arg(long, env = "GEOCODE_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Directory holding the cache, database and log file
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Response cache file (default: <DIR>/covid_cache.json)
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// SQLite database file (default: <DIR>/geodata.sqlite)
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Read the vaccination dataset from a local JSON file instead of fetching it
    #[arg(long, value_name = "FILE")]
    pub vaccinations: Option<PathBuf>,

    /// Reuse the existing database without fetching anything
    #[arg(long)]
    pub skip_ingest: bool,

    /// Start zoomed to a country
    ///
    /// Examples:
    ///   covidmap --country Germany
    ///   covidmap --country "South Korea"
    #[arg(long, value_name = "NAME")]
    pub country: Option<String>,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub data_dir: PathBuf,
    pub cache_file: PathBuf,
    pub database: PathBuf,
    pub log_file: PathBuf,
    /// `None` when ingest is skipped
    pub refresh: Option<RefreshConfig>,
    /// Country to show instead of the world view
    pub initial_country: Option<String>,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with every path resolved
    /// * `Err(CliError::MissingApiKey)` if ingest would run without a key
    /// * `Err(CliError::NoDataDir)` if no data directory can be determined
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let refresh = if cli.skip_ingest {
            None
        } else {
            let api_key = cli
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .ok_or(CliError::MissingApiKey)?;
            let config = RefreshConfig::new(api_key);
            Some(match &cli.vaccinations {
                Some(path) => config.with_vaccination_file(path),
                None => config,
            })
        };

        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir().ok_or(CliError::NoDataDir)?,
        };

        let initial_country = cli
            .country
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(StartupConfig {
            cache_file: cli
                .cache_file
                .clone()
                .unwrap_or_else(|| data_dir.join(CACHE_FILE_NAME)),
            database: cli
                .database
                .clone()
                .unwrap_or_else(|| data_dir.join(DATABASE_FILE_NAME)),
            log_file: data_dir.join(LOG_FILE_NAME),
            data_dir,
            refresh,
            initial_country,
        })
    }
}

/// Platform data directory for covidmap
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "covidmap").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::VaccinationSource;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("covidmap").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_parse_all_flags() {
        let cli = parse(&[
            "--api-key",
            "abc",
            "--data-dir",
            "/data",
            "--cache-file",
            "/c.json",
            "--database",
            "/g.sqlite",
            "--vaccinations",
            "/v.json",
            "--skip-ingest",
            "--country",
            "Chad",
        ]);

        assert_eq!(cli.api_key.as_deref(), Some("abc"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(cli.cache_file, Some(PathBuf::from("/c.json")));
        assert_eq!(cli.database, Some(PathBuf::from("/g.sqlite")));
        assert_eq!(cli.vaccinations, Some(PathBuf::from("/v.json")));
        assert!(cli.skip_ingest);
        assert_eq!(cli.country.as_deref(), Some("Chad"));
    }

    #[test]
    fn test_files_default_to_data_dir() {
        let cli = parse(&["--api-key", "abc", "--data-dir", "/data"]);

        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.cache_file, PathBuf::from("/data/covid_cache.json"));
        assert_eq!(config.database, PathBuf::from("/data/geodata.sqlite"));
        assert_eq!(config.log_file, PathBuf::from("/data/covidmap.log"));
        assert!(config.initial_country.is_none());
    }

    #[test]
    fn test_explicit_files_override_defaults() {
        let cli = parse(&[
            "--api-key",
            "abc",
            "--data-dir",
            "/data",
            "--cache-file",
            "/elsewhere/cache.json",
            "--database",
            "/elsewhere/db.sqlite",
        ]);

        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.cache_file, PathBuf::from("/elsewhere/cache.json"));
        assert_eq!(config.database, PathBuf::from("/elsewhere/db.sqlite"));
        assert_eq!(config.log_file, PathBuf::from("/data/covidmap.log"));
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let cli = Cli {
            api_key: None,
            data_dir: Some(PathBuf::from("/data")),
            cache_file: None,
            database: None,
            vaccinations: None,
            skip_ingest: false,
            country: None,
        };

        let err = StartupConfig::from_cli(&cli).unwrap_err();

        assert!(matches!(err, CliError::MissingApiKey));
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let cli = parse(&["--api-key", "  ", "--data-dir", "/data"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::MissingApiKey)
        ));
    }

    #[test]
    fn test_skip_ingest_needs_no_key() {
        let mut cli = parse(&["--skip-ingest", "--data-dir", "/data"]);
        cli.api_key = None;

        let config = StartupConfig::from_cli(&cli).unwrap();

        assert!(config.refresh.is_none());
    }

    #[test]
    fn test_refresh_config_carries_key_and_vaccination_file() {
        let cli = parse(&[
            "--api-key",
            "abc",
            "--data-dir",
            "/data",
            "--vaccinations",
            "/v.json",
        ]);

        let refresh = StartupConfig::from_cli(&cli).unwrap().refresh.unwrap();

        assert_eq!(refresh.api_key, "abc");
        assert_eq!(
            refresh.vaccinations,
            VaccinationSource::File(PathBuf::from("/v.json"))
        );
    }

    #[test]
    fn test_initial_country_is_trimmed() {
        let cli = parse(&["--skip-ingest", "--data-dir", "/data", "--country", " Chad "]);

        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.initial_country.as_deref(), Some("Chad"));
    }
}
