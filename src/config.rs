//! Run configuration: base year, projected checkpoints and execution options

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cohort::BUCKET_WIDTH;
use crate::error::InputError;

/// Base year of the membership snapshot
pub const DEFAULT_BASE_YEAR: u32 = 2025;

/// Checkpoints projected after the base year
pub const DEFAULT_TARGET_YEARS: [u32; 5] = [2030, 2035, 2040, 2045, 2050];

/// Configuration for a projection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Year of the membership snapshot the chain starts from
    pub base_year: u32,

    /// Ascending checkpoints, each 5 years after the previous one
    pub target_years: Vec<u32>,

    /// Project regions on the rayon pool (years within a region are always sequential)
    pub parallel: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            base_year: DEFAULT_BASE_YEAR,
            target_years: DEFAULT_TARGET_YEARS.to_vec(),
            parallel: true,
        }
    }
}

impl ProjectionConfig {
    /// Load from a JSON file; omitted fields take their defaults
    pub fn from_json_path(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_reader(file).map_err(|source| InputError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Every checkpoint must sit exactly one step after the previous one
    pub fn validate(&self) -> Result<(), InputError> {
        let mut previous = self.base_year;
        for &year in &self.target_years {
            if year != previous + BUCKET_WIDTH as u32 {
                return Err(InputError::InvalidConfig(format!(
                    "target year {} does not follow {} by {} years",
                    year, previous, BUCKET_WIDTH
                )));
            }
            previous = year;
        }
        Ok(())
    }

    /// Base year followed by every target year
    pub fn all_years(&self) -> Vec<u32> {
        std::iter::once(self.base_year)
            .chain(self.target_years.iter().copied())
            .collect()
    }

    /// Last year of the chain
    pub fn final_year(&self) -> u32 {
        self.target_years.last().copied().unwrap_or(self.base_year)
    }
}
