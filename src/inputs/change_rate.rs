//! Population change rates between consecutive 5-year checkpoints

use std::collections::BTreeMap;

use crate::cohort::{AgeBucket, BUCKET_COUNT};

/// One row of the change-rate dataset.
///
/// `total` is the signed fractional change of the bucket's population relative to
/// `base_year`, the checkpoint immediately before `target_year`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRateRecord {
    pub target_year: u32,
    pub region_code: String,
    pub age_bucket: AgeBucket,
    pub total: f64,
    pub male: Option<f64>,
    pub female: Option<f64>,
    pub base_year: u32,
}

/// Total change rates keyed by (region, target year); gaps are kept as `None`
#[derive(Debug, Clone, Default)]
pub struct ChangeRateTable {
    rates: BTreeMap<(String, u32), [Option<f64>; BUCKET_COUNT]>,
    base_years: BTreeMap<(String, u32), u32>,
}

impl ChangeRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[ChangeRateRecord]) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(
                &record.region_code,
                record.target_year,
                record.age_bucket,
                record.total,
            );
            table
                .base_years
                .insert((record.region_code.clone(), record.target_year), record.base_year);
        }
        table
    }

    pub fn insert(&mut self, region_code: &str, target_year: u32, bucket: AgeBucket, total: f64) {
        let entry = self
            .rates
            .entry((region_code.to_string(), target_year))
            .or_insert([None; BUCKET_COUNT]);
        entry[bucket.index()] = Some(total);
    }

    /// Change rate for one bucket, or None when the dataset has no record for it
    pub fn get(&self, region_code: &str, target_year: u32, bucket: AgeBucket) -> Option<f64> {
        self.rates
            .get(&(region_code.to_string(), target_year))
            .and_then(|r| r[bucket.index()])
    }

    /// All rates for one region/target year (missing buckets are None)
    pub fn for_step(&self, region_code: &str, target_year: u32) -> [Option<f64>; BUCKET_COUNT] {
        self.rates
            .get(&(region_code.to_string(), target_year))
            .copied()
            .unwrap_or([None; BUCKET_COUNT])
    }

    /// Reference year recorded with the rates for a step, if any were loaded
    pub fn base_year(&self, region_code: &str, target_year: u32) -> Option<u32> {
        self.base_years
            .get(&(region_code.to_string(), target_year))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
