//! Dataset catalog.
//!
//! Maps resource paths to table sources. Loaded from a TOML file:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [[dataset]]
//! path = "tabular/geo"
//! type = "csv"
//! uri = "geo.csv"
//! delimiter = ";"
//! ```
//!
//! Relative `uri`s are resolved against the directory holding the catalog.
//! Dataset types are `csv`, `xls` (alias `xlsx`), `sqlite` and `parquet`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use super::csv::CsvSource;
use super::parquet::ParquetSource;
use super::source::TableSource;
use super::spreadsheet::SpreadsheetSource;
use super::sqlite::SqliteSource;
use crate::spectql::ast::ResourcePath;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One `[[dataset]]` entry, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetConfig {
    Csv(CsvDataset),
    #[serde(alias = "xlsx")]
    Xls(XlsDataset),
    Sqlite(SqliteDataset),
    Parquet(ParquetDataset),
}

impl DatasetConfig {
    pub fn path(&self) -> &str {
        match self {
            DatasetConfig::Csv(d) => &d.path,
            DatasetConfig::Xls(d) => &d.path,
            DatasetConfig::Sqlite(d) => &d.path,
            DatasetConfig::Parquet(d) => &d.path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvDataset {
    pub path: String,
    pub uri: PathBuf,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_has_header_row")]
    pub has_header_row: bool,

    #[serde(default = "default_start_row")]
    pub start_row: usize,

    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_has_header_row() -> bool {
    true
}

fn default_start_row() -> usize {
    1
}

/// A workbook sheet. `sheet` defaults to the first one.
#[derive(Debug, Clone, Deserialize)]
pub struct XlsDataset {
    pub path: String,
    pub uri: PathBuf,

    #[serde(default)]
    pub sheet: Option<String>,

    #[serde(default = "default_has_header_row")]
    pub has_header_row: bool,

    #[serde(default = "default_start_row")]
    pub start_row: usize,

    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqliteDataset {
    pub path: String,
    pub uri: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParquetDataset {
    pub path: String,
    pub uri: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse catalog {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid dataset '{dataset}': {message}")]
    InvalidDataset { dataset: String, message: String },

    #[error("Duplicate dataset path '{0}'")]
    Duplicate(String),
}

/// Registered sources keyed by resource path (`tabular/geo`).
#[derive(Default)]
pub struct Catalog {
    sources: HashMap<String, Arc<dyn TableSource>>,
    logging: LoggingConfig,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: CatalogConfig = toml::from_str(&content).map_err(|e| CatalogError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let catalog = Self::from_config(config, base_dir)?;
        tracing::info!(
            "Loaded {} dataset(s) from {}",
            catalog.sources.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_config(config: CatalogConfig, base_dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Catalog {
            sources: HashMap::new(),
            logging: config.logging,
        };

        for dataset in config.datasets {
            let path = ResourcePath::from_path(dataset.path());
            if path.segments.len() < 2 {
                return Err(CatalogError::InvalidDataset {
                    dataset: dataset.path().to_string(),
                    message: "a resource path needs at least two segments".to_string(),
                });
            }
            let source = build_source(&dataset, base_dir)?;
            catalog.register(&path, source)?;
        }

        Ok(catalog)
    }

    /// Adds a source under `path`. A path can be registered once.
    pub fn register(
        &mut self,
        path: &ResourcePath,
        source: Arc<dyn TableSource>,
    ) -> Result<(), CatalogError> {
        let key = path.key();
        if self.sources.contains_key(&key) {
            return Err(CatalogError::Duplicate(key));
        }
        tracing::debug!("Registered {} -> {}", key, source.describe());
        self.sources.insert(key, source);
        Ok(())
    }

    pub fn lookup(&self, path: &ResourcePath) -> Option<Arc<dyn TableSource>> {
        self.sources.get(&path.key()).cloned()
    }

    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("paths", &self.paths())
            .field("logging", &self.logging)
            .finish()
    }
}

fn build_source(
    dataset: &DatasetConfig,
    base_dir: &Path,
) -> Result<Arc<dyn TableSource>, CatalogError> {
    let source: Arc<dyn TableSource> = match dataset {
        DatasetConfig::Csv(csv) => {
            let mut chars = csv.delimiter.chars();
            let delimiter = match (chars.next(), chars.next()) {
                (Some(c), None) if c != '"' => c,
                _ => {
                    return Err(CatalogError::InvalidDataset {
                        dataset: csv.path.clone(),
                        message: format!(
                            "delimiter must be a single character, got {:?}",
                            csv.delimiter
                        ),
                    })
                }
            };
            check_start_row(&csv.path, csv.start_row)?;

            Arc::new(
                CsvSource::new(base_dir.join(&csv.uri))
                    .with_delimiter(delimiter)
                    .with_header(csv.has_header_row)
                    .with_start_row(csv.start_row)
                    .with_aliases(csv.aliases.clone()),
            )
        }
        DatasetConfig::Xls(xls) => {
            check_start_row(&xls.path, xls.start_row)?;

            let mut source = SpreadsheetSource::new(base_dir.join(&xls.uri))
                .with_header(xls.has_header_row)
                .with_start_row(xls.start_row)
                .with_aliases(xls.aliases.clone());
            if let Some(sheet) = &xls.sheet {
                source = source.with_sheet(sheet.clone());
            }
            Arc::new(source)
        }
        DatasetConfig::Sqlite(sqlite) => {
            Arc::new(SqliteSource::new(base_dir.join(&sqlite.uri), sqlite.table.clone()))
        }
        DatasetConfig::Parquet(parquet) => Arc::new(ParquetSource::new(base_dir.join(&parquet.uri))),
    };

    Ok(source)
}

fn check_start_row(dataset: &str, start_row: usize) -> Result<(), CatalogError> {
    if start_row == 0 {
        return Err(CatalogError::InvalidDataset {
            dataset: dataset.to_string(),
            message: "start_row is 1-based".to_string(),
        });
    }
    Ok(())
}
