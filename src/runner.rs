//! Projection runner: drives every region through the full checkpoint sequence
//!
//! Inputs are loaded once and shared read-only. Regions are independent and run on
//! the rayon pool; within a region the checkpoints are computed and persisted strictly
//! in order. A failing region is recorded in the report and never stops the run.
//!
//! # Example
//! ```ignore
//! let runner = ProjectionRunner::from_dir(Path::new("data"), ProjectionConfig::default())?;
//! let store = CsvDirStore::create(Path::new("output"))?;
//! let report = runner.run(&store);
//! for outcome in report.unsupported() {
//!     println!("{} skipped: {:?}", outcome.region_code, outcome.status);
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::cohort::{AgeBucket, CohortSet, BUCKET_COUNT};
use crate::config::ProjectionConfig;
use crate::error::{Dataset, InputError, ProjectionError, StoreError};
use crate::inputs::InputData;
use crate::projection::{CohortChain, RegionInputs, ShareCalculator};
use crate::store::CohortStore;

/// Region code used for aggregated national sets
pub const NATIONAL_REGION_CODE: &str = "national";

/// How a region's projection ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionStatus {
    /// Every configured year was written
    Completed,
    /// Required input data was missing; nothing was projected
    Unsupported { reason: String },
    /// Projection stopped part way; `years_written` lists what was persisted
    Failed { error: String },
}

/// Per-region entry of the run report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionOutcome {
    pub region_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(flatten)]
    pub status: RegionStatus,
    pub years_written: Vec<u32>,
    /// Aged-in buckets projected with a change rate of 0 because the dataset had a gap
    pub defaulted_change_rates: usize,
    /// Member counts that came out negative or non-finite and were stored as 0
    pub clamped_counts: usize,
}

impl RegionOutcome {
    fn new(region_code: &str, region_name: Option<&str>) -> Self {
        Self {
            region_code: region_code.to_string(),
            region_name: region_name.map(str::to_string),
            status: RegionStatus::Completed,
            years_written: Vec::new(),
            defaulted_change_rates: 0,
            clamped_counts: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RegionStatus::Completed
    }
}

/// Result of a full run across all regions
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub membership_version: String,
    pub generated_at: DateTime<Utc>,
    pub base_year: u32,
    pub target_years: Vec<u32>,
    /// One entry per region, ordered by region code
    pub regions: Vec<RegionOutcome>,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.regions.iter().filter(|r| r.is_completed())
    }

    pub fn unsupported(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.regions
            .iter()
            .filter(|r| matches!(r.status, RegionStatus::Unsupported { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.regions
            .iter()
            .filter(|r| matches!(r.status, RegionStatus::Failed { .. }))
    }

    pub fn region(&self, region_code: &str) -> Option<&RegionOutcome> {
        self.regions.iter().find(|r| r.region_code == region_code)
    }

    /// Sum, per year, every region set that was written for that year.
    ///
    /// Regions that failed part way contribute only the years they wrote.
    pub fn national_totals<S: CohortStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<CohortSet>, StoreError> {
        let years = std::iter::once(self.base_year).chain(self.target_years.iter().copied());
        let mut totals = Vec::new();

        for year in years {
            let mut sets = Vec::new();
            for outcome in self.regions.iter().filter(|r| r.years_written.contains(&year)) {
                if let Some(set) = store.read(&outcome.region_code, year)? {
                    sets.push(set);
                }
            }
            if !sets.is_empty() {
                totals.push(aggregate_sets(&sets, NATIONAL_REGION_CODE, year));
            }
        }

        Ok(totals)
    }
}

/// Bucket-wise sum of several sets, labelled with the given region code and year
pub fn aggregate_sets(sets: &[CohortSet], region_code: &str, year: u32) -> CohortSet {
    let mut sums = [0.0; BUCKET_COUNT];
    for set in sets {
        for bucket in AgeBucket::ALL {
            sums[bucket.index()] += set.get(bucket);
        }
    }
    CohortSet::from_counts(region_code, year, sums)
}

/// Runs the projection for every region known to the inputs
#[derive(Debug, Clone)]
pub struct ProjectionRunner {
    data: InputData,
    config: ProjectionConfig,
}

impl ProjectionRunner {
    /// Create a runner from pre-loaded inputs
    pub fn new(data: InputData, config: ProjectionConfig) -> Result<Self, InputError> {
        config.validate()?;
        if data.regions().contains(NATIONAL_REGION_CODE) {
            return Err(InputError::InvalidConfig(format!(
                "region code {:?} is reserved for national totals",
                NATIONAL_REGION_CODE
            )));
        }
        Ok(Self { data, config })
    }

    /// Create a runner by loading every dataset from a directory
    pub fn from_dir(dir: &Path, config: ProjectionConfig) -> Result<Self, InputError> {
        Self::new(InputData::from_dir(dir)?, config)
    }

    pub fn data(&self) -> &InputData {
        &self.data
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Project every region and persist each set as it is produced
    pub fn run<S: CohortStore + ?Sized>(&self, store: &S) -> RunReport {
        let regions: Vec<String> = self.data.regions().into_iter().collect();
        info!(
            "Projecting {} regions from {} to {} (membership reference {})",
            regions.len(),
            self.config.base_year,
            self.config.final_year(),
            self.data.membership.version
        );

        let outcomes: Vec<RegionOutcome> = if self.config.parallel {
            regions
                .par_iter()
                .map(|region| self.run_region(region, store))
                .collect()
        } else {
            regions
                .iter()
                .map(|region| self.run_region(region, store))
                .collect()
        };

        let report = RunReport {
            membership_version: self.data.membership.version.clone(),
            generated_at: Utc::now(),
            base_year: self.config.base_year,
            target_years: self.config.target_years.clone(),
            regions: outcomes,
        };

        info!(
            "Run finished: {} completed, {} unsupported, {} failed",
            report.completed().count(),
            report.unsupported().count(),
            report.failed().count()
        );

        report
    }

    /// Project a single region; all failures are captured in the outcome
    pub fn run_region<S: CohortStore + ?Sized>(&self, region_code: &str, store: &S) -> RegionOutcome {
        let mut outcome =
            RegionOutcome::new(region_code, self.data.membership.region_name(region_code));

        match self.project_region(region_code, store, &mut outcome) {
            Ok(()) => {
                info!(
                    "Region {}: wrote {} years",
                    region_code,
                    outcome.years_written.len()
                );
            }
            Err(e) if e.is_unsupported_region() => {
                warn!("Region {} not supported: {}", region_code, e);
                outcome.status = RegionStatus::Unsupported {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                error!("Region {} failed: {}", region_code, e);
                outcome.status = RegionStatus::Failed {
                    error: e.to_string(),
                };
            }
        }

        outcome
    }

    fn project_region<S: CohortStore + ?Sized>(
        &self,
        region_code: &str,
        store: &S,
        outcome: &mut RegionOutcome,
    ) -> Result<(), ProjectionError> {
        // Sets from an earlier run must not survive next to this run's chain
        self.clear_region(region_code, store)?;

        let inputs = RegionInputs::gather(&self.data, region_code, &self.config)?;
        let base = inputs.base_shares(&ShareCalculator::new(&self.data.membership));
        if !base.is_supported() {
            let dataset = if self.data.membership.total_membership(region_code).is_some() {
                Dataset::Composition
            } else {
                Dataset::BaseMembership
            };
            return Err(ProjectionError::unavailable(region_code, dataset, None));
        }

        persist(store, &base.base_set, outcome)?;

        for result in CohortChain::new(&inputs, &base.shares, base.base_set.clone()) {
            let result = result?;
            outcome.defaulted_change_rates += result.diagnostics.defaulted_change_rates.len();
            outcome.clamped_counts += result.diagnostics.clamped.len();
            // The next step only runs once this year is safely stored
            persist(store, &result.set, outcome)?;
        }

        Ok(())
    }

    /// Remove every configured year of a region from the store
    fn clear_region<S: CohortStore + ?Sized>(
        &self,
        region_code: &str,
        store: &S,
    ) -> Result<(), ProjectionError> {
        for year in self.config.all_years() {
            store
                .remove(region_code, year)
                .map_err(|source| ProjectionError::Persistence {
                    region: region_code.to_string(),
                    year,
                    source,
                })?;
        }
        Ok(())
    }
}

fn persist<S: CohortStore + ?Sized>(
    store: &S,
    set: &CohortSet,
    outcome: &mut RegionOutcome,
) -> Result<(), ProjectionError> {
    store
        .write(set)
        .map_err(|source| ProjectionError::Persistence {
            region: set.region_code.clone(),
            year: set.year,
            source,
        })?;
    outcome.years_written.push(set.year);
    Ok(())
}
