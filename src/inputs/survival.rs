//! Region-specific survival rates for members aged 70 and over
//!
//! Survival is the probability that a member in a bucket is still a member five years
//! later. Below 70 mortality over one step is treated as negligible, so the factor
//! is 1.0 there and the dataset carries no rows for those buckets.

use std::collections::BTreeMap;

use crate::cohort::{AgeBucket, BUCKET_COUNT};

/// Survival rates by region and bucket
#[derive(Debug, Clone, Default)]
pub struct SurvivalTable {
    rates: BTreeMap<String, [Option<f64>; BUCKET_COUNT]>,
}

impl SurvivalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a survival rate. Callers validate the bucket and range first
    pub fn insert(&mut self, region_code: &str, bucket: AgeBucket, rate: f64) {
        let entry = self
            .rates
            .entry(region_code.to_string())
            .or_insert([None; BUCKET_COUNT]);
        entry[bucket.index()] = Some(rate);
    }

    /// Raw dataset value; None below 70 or when missing
    pub fn rate(&self, region_code: &str, bucket: AgeBucket) -> Option<f64> {
        self.rates.get(region_code).and_then(|r| r[bucket.index()])
    }

    /// Factors for one region, with 1.0 filled in below 70.
    ///
    /// Returns the first 70+ bucket lacking a rate as the error.
    pub fn factors_for(&self, region_code: &str) -> Result<SurvivalFactors, AgeBucket> {
        let mut factors = [1.0; BUCKET_COUNT];
        for bucket in AgeBucket::survival_buckets() {
            factors[bucket.index()] = self.rate(region_code, bucket).ok_or(bucket)?;
        }
        Ok(SurvivalFactors(factors))
    }
}

/// Complete survival factors for one region, one per bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurvivalFactors([f64; BUCKET_COUNT]);

impl SurvivalFactors {
    /// Factors with no mortality at any age
    pub fn none() -> Self {
        SurvivalFactors([1.0; BUCKET_COUNT])
    }

    pub fn get(&self, bucket: AgeBucket) -> f64 {
        self.0[bucket.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_table(region: &str, rate: f64) -> SurvivalTable {
        let mut table = SurvivalTable::new();
        for bucket in AgeBucket::survival_buckets() {
            table.insert(region, bucket, rate);
        }
        table
    }

    #[test]
    fn test_factor_is_one_below_seventy() {
        let table = full_table("11", 0.88);
        let factors = table.factors_for("11").unwrap();

        assert_eq!(factors.get("65-69".parse().unwrap()), 1.0);
        assert_eq!(factors.get("70-74".parse().unwrap()), 0.88);
        assert_eq!(factors.get("95-99".parse().unwrap()), 0.88);
    }

    #[test]
    fn test_missing_rate_reports_bucket() {
        let mut table = full_table("11", 0.9);
        table.rates.get_mut("11").unwrap()[17] = None;

        let missing = table.factors_for("11").unwrap_err();
        assert_eq!(missing.label(), "85-89");
        assert_eq!(table.factors_for("26").unwrap_err().label(), "70-74");
    }
}
