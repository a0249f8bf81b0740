//! Multi-step driving of the cohort stepper for one region
//!
//! `RegionInputs` gathers everything a region needs up front, so no dataset lookups
//! happen once stepping has started. `CohortChain` then yields one `StepResult` per
//! checkpoint, each computed from the previous one.

use log::warn;

use crate::cohort::{CohortSet, BUCKET_COUNT};
use crate::config::ProjectionConfig;
use crate::error::{Dataset, ProjectionError};
use crate::inputs::{InputData, SurvivalFactors};

use super::shares::{BaseYearShares, ShareCalculator, ShareRates};
use super::stepper::{step, StepInputs, StepResult};

/// Inputs for one checkpoint of the chain
#[derive(Debug, Clone)]
pub struct StepData {
    pub year: u32,
    pub population: [f64; BUCKET_COUNT],
    pub change_rates: [Option<f64>; BUCKET_COUNT],
}

/// All inputs needed to project one region through every configured checkpoint
#[derive(Debug, Clone)]
pub struct RegionInputs {
    pub region_code: String,
    pub base_year: u32,
    pub base_population: [f64; BUCKET_COUNT],
    pub steps: Vec<StepData>,
    pub survival: SurvivalFactors,
}

impl RegionInputs {
    /// Collect a region's slice of every dataset.
    ///
    /// Fails with `DataUnavailable` if a population snapshot or a survival rate is
    /// missing. Change-rate gaps are kept and handled per step.
    pub fn gather(
        data: &InputData,
        region_code: &str,
        config: &ProjectionConfig,
    ) -> Result<Self, ProjectionError> {
        let population_for = |year: u32| {
            data.population
                .snapshot(region_code, year)
                .copied()
                .ok_or_else(|| ProjectionError::unavailable(region_code, Dataset::Population, Some(year)))
        };

        let base_population = population_for(config.base_year)?;

        let mut steps = Vec::with_capacity(config.target_years.len());
        let mut previous = config.base_year;
        for &year in &config.target_years {
            if let Some(recorded) = data.change_rates.base_year(region_code, year) {
                if recorded != previous {
                    warn!(
                        "Region {}: change rates for {} are relative to {}, expected {}",
                        region_code, year, recorded, previous
                    );
                }
            }
            steps.push(StepData {
                year,
                population: population_for(year)?,
                change_rates: data.change_rates.for_step(region_code, year),
            });
            previous = year;
        }

        let survival = data.survival.factors_for(region_code).map_err(|bucket| {
            warn!("Region {}: no survival rate for {}", region_code, bucket);
            ProjectionError::unavailable(region_code, Dataset::Survival, None)
        })?;

        Ok(Self {
            region_code: region_code.to_string(),
            base_year: config.base_year,
            base_population,
            steps,
            survival,
        })
    }

    /// Base-year shares for this region
    pub fn base_shares(&self, calculator: &ShareCalculator<'_>) -> BaseYearShares {
        calculator.calculate(&self.region_code, self.base_year, &self.base_population)
    }
}

/// Lazily steps a region's membership through its checkpoints
#[derive(Debug)]
pub struct CohortChain<'a> {
    inputs: &'a RegionInputs,
    shares: &'a ShareRates,
    current: CohortSet,
    next: usize,
}

impl<'a> CohortChain<'a> {
    /// Start a chain from the base-year set
    pub fn new(inputs: &'a RegionInputs, shares: &'a ShareRates, base_set: CohortSet) -> Self {
        Self {
            inputs,
            shares,
            current: base_set,
            next: 0,
        }
    }

    /// The most recent set produced (the base set before the first step)
    pub fn current(&self) -> &CohortSet {
        &self.current
    }
}

impl Iterator for CohortChain<'_> {
    type Item = Result<StepResult, ProjectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.inputs.steps.get(self.next)?;
        self.next += 1;

        let inputs = StepInputs {
            shares: self.shares,
            target_population: &data.population,
            change_rates: &data.change_rates,
            survival: &self.inputs.survival,
        };

        match step(&self.current, data.year, &inputs) {
            Ok(result) => {
                self.current = result.set.clone();
                Some(Ok(result))
            }
            Err(e) => {
                // A broken link ends the chain
                self.next = self.inputs.steps.len();
                Some(Err(e))
            }
        }
    }
}

/// Project one region in memory from the base year up to and including `target_year`.
///
/// Returns the base set followed by one set per checkpoint. An unsupported region
/// (no base membership) yields an empty vector.
pub fn project_to(
    data: &InputData,
    region_code: &str,
    config: &ProjectionConfig,
    target_year: u32,
) -> Result<Vec<CohortSet>, ProjectionError> {
    let inputs = RegionInputs::gather(data, region_code, config)?;
    let base = inputs.base_shares(&ShareCalculator::new(&data.membership));
    if !base.is_supported() {
        return Ok(Vec::new());
    }

    let mut sets = vec![base.base_set.clone()];
    for result in CohortChain::new(&inputs, &base.shares, base.base_set) {
        let result = result?;
        if result.set.year > target_year {
            break;
        }
        sets.push(result.set);
    }
    Ok(sets)
}
