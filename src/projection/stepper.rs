//! Cohort stepping: advance one region's membership by exactly one 5-year checkpoint
//!
//! For a target year `Y + 5` and bucket `b`:
//!
//! - under 20: 0
//! - entry cohorts (20-24, 25-29, 30-34): `population(Y + 5, b) * share(b)`
//! - 35 and over: `members(Y, pred(b)) * max(0, 1 + change(Y + 5, b)) * survival(b)`
//!
//! `survival(b)` is the region's survival rate from age 70, and 1.0 below. A missing
//! change rate is taken as 0. Every result is rounded to one decimal.
//!
//! `step` is a pure function of its arguments. Longer horizons are reached by feeding
//! each output back in as the next source, never by compounding rates in one call.

use log::{debug, warn};

use crate::cohort::{round_one_decimal, sanitize_count, AgeBucket, CohortSet, BUCKET_COUNT, BUCKET_WIDTH};
use crate::error::ProjectionError;
use crate::inputs::SurvivalFactors;

use super::shares::ShareRates;

/// Everything one step needs besides the source set
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub shares: &'a ShareRates,
    /// Both-gender population in the target year
    pub target_population: &'a [f64; BUCKET_COUNT],
    /// Total change rates for the target year; None where the dataset has a gap
    pub change_rates: &'a [Option<f64>; BUCKET_COUNT],
    pub survival: &'a SurvivalFactors,
}

/// What the step had to paper over
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDiagnostics {
    /// Aged-in buckets whose change rate was missing and taken as 0
    pub defaulted_change_rates: Vec<AgeBucket>,
    /// Buckets whose raw result was negative or non-finite and stored as 0
    pub clamped: Vec<AgeBucket>,
}

/// Output of a single step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub set: CohortSet,
    pub diagnostics: StepDiagnostics,
}

/// Growth multiplier for an aged-in bucket; never negative
pub fn growth_factor(change_rate: f64) -> f64 {
    (1.0 + change_rate).max(0.0)
}

/// Advance `source` to `target_year`, which must be exactly one step later
pub fn step(
    source: &CohortSet,
    target_year: u32,
    inputs: &StepInputs<'_>,
) -> Result<StepResult, ProjectionError> {
    if target_year != source.year + BUCKET_WIDTH as u32 {
        return Err(ProjectionError::InvalidStep {
            from: source.year,
            to: target_year,
        });
    }

    let region = source.region_code.as_str();
    let mut raw = [0.0; BUCKET_COUNT];
    let mut diagnostics = StepDiagnostics::default();

    for bucket in AgeBucket::ALL {
        let value = if bucket.is_below_membership_age() {
            0.0
        } else if bucket.is_entry_cohort() {
            inputs.target_population[bucket.index()] * inputs.shares.get(bucket)
        } else {
            let change_rate = match inputs.change_rates[bucket.index()] {
                Some(rate) => rate,
                None => {
                    diagnostics.defaulted_change_rates.push(bucket);
                    0.0
                }
            };
            aged_in(source, bucket, change_rate, inputs.survival.get(bucket))
        };

        let (value, clamped) = sanitize_count(value);
        if clamped {
            diagnostics.clamped.push(bucket);
        }
        raw[bucket.index()] = round_one_decimal(value);
    }

    if !diagnostics.defaulted_change_rates.is_empty() {
        debug!(
            "Region {} {}: no change rate for {} bucket(s), using 0",
            region,
            target_year,
            diagnostics.defaulted_change_rates.len()
        );
    }
    if !diagnostics.clamped.is_empty() {
        warn!(
            "Region {} {}: clamped invalid member counts to 0 in {:?}",
            region,
            target_year,
            diagnostics.clamped.iter().map(|b| b.label()).collect::<Vec<_>>()
        );
    }

    Ok(StepResult {
        set: CohortSet::from_counts(region, target_year, raw),
        diagnostics,
    })
}

/// Members carried into `bucket` from the next-younger bucket of the source set
fn aged_in(source: &CohortSet, bucket: AgeBucket, change_rate: f64, survival: f64) -> f64 {
    let Some(previous) = bucket.predecessor() else {
        return 0.0;
    };
    let carried = source.get(previous);
    if carried == 0.0 {
        return 0.0;
    }
    carried * growth_factor(change_rate) * survival
}
