//! Projected population by region, year and age bucket
//!
//! The source data is split by gender; the engine only ever consumes the sum of both
//! genders per bucket, so the table stores that sum.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cohort::{AgeBucket, BUCKET_COUNT};

/// Gender split used by the population dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Parse "male"/"female" (any case) or "M"/"F"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// One row of the population dataset (population in thousands)
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub year: u32,
    pub region_code: String,
    pub age_bucket: AgeBucket,
    pub gender: Gender,
    pub population: f64,
}

/// Both-gender population totals keyed by (region, year)
#[derive(Debug, Clone, Default)]
pub struct PopulationTable {
    totals: BTreeMap<(String, u32), [f64; BUCKET_COUNT]>,
}

impl PopulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from dataset rows, summing genders
    pub fn from_records(records: &[PopulationRecord]) -> Self {
        let mut table = Self::new();
        for record in records {
            table.add(&record.region_code, record.year, record.age_bucket, record.population);
        }
        table
    }

    /// Add population to a bucket (accumulates across genders)
    pub fn add(&mut self, region_code: &str, year: u32, bucket: AgeBucket, population: f64) {
        let entry = self
            .totals
            .entry((region_code.to_string(), year))
            .or_insert([0.0; BUCKET_COUNT]);
        entry[bucket.index()] += population;
    }

    /// Per-bucket totals for a region and year, if that snapshot exists
    pub fn snapshot(&self, region_code: &str, year: u32) -> Option<&[f64; BUCKET_COUNT]> {
        self.totals.get(&(region_code.to_string(), year))
    }

    /// Total population of one bucket, 0 if the snapshot or bucket is absent
    pub fn get(&self, region_code: &str, year: u32, bucket: AgeBucket) -> f64 {
        self.snapshot(region_code, year)
            .map(|s| s[bucket.index()])
            .unwrap_or(0.0)
    }

    pub fn has_snapshot(&self, region_code: &str, year: u32) -> bool {
        self.totals.contains_key(&(region_code.to_string(), year))
    }

    /// Every region code present in the dataset, sorted
    pub fn regions(&self) -> BTreeSet<String> {
        self.totals.keys().map(|(region, _)| region.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
