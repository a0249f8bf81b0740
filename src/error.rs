//! Error types for input loading, projection and persistence
//!
//! Every projection failure is scoped to a single region. The runner catches these,
//! records them in the run report and moves on to the next region.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which external dataset a missing value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Population,
    Survival,
    BaseMembership,
    Composition,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::Population => "population",
            Dataset::Survival => "survival",
            Dataset::BaseMembership => "base membership",
            Dataset::Composition => "membership composition",
        };
        f.write_str(name)
    }
}

/// Failure to read one of the input datasets
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}, row {row}: {message}", .path.display())]
    InvalidField {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure inside an output store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("stored set {} is malformed: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Region-scoped projection failure
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{dataset} data unavailable for region {region}{}", year_suffix(.year))]
    DataUnavailable {
        region: String,
        dataset: Dataset,
        year: Option<u32>,
    },

    #[error("cannot step from {from} to {to}: cohort steps advance exactly 5 years")]
    InvalidStep { from: u32, to: u32 },

    #[error("failed to persist region {region} year {year}: {source}")]
    Persistence {
        region: String,
        year: u32,
        #[source]
        source: StoreError,
    },
}

fn year_suffix(year: &Option<u32>) -> String {
    match year {
        Some(y) => format!(" in {}", y),
        None => String::new(),
    }
}

impl ProjectionError {
    pub fn unavailable(region: &str, dataset: Dataset, year: Option<u32>) -> Self {
        ProjectionError::DataUnavailable {
            region: region.to_string(),
            dataset,
            year,
        }
    }

    /// Missing population or base membership means the region cannot be projected at all
    pub fn is_unsupported_region(&self) -> bool {
        matches!(self, ProjectionError::DataUnavailable { .. })
    }
}
