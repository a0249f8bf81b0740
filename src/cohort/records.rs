//! Member cohort output records
//!
//! A `CohortSet` is the unit of output: one region, one year, one record per bucket.

use serde::{Deserialize, Serialize};

use super::bucket::{AgeBucket, BUCKET_COUNT};

/// Round to one decimal place, half away from zero
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamp a computed count into a storable value.
///
/// Negative and non-finite values become 0. Returns the value and whether it was clamped.
pub fn sanitize_count(value: f64) -> (f64, bool) {
    if value.is_finite() && value >= 0.0 {
        (value, false)
    } else {
        (0.0, true)
    }
}

/// Projected members in one bucket of one region in one year (thousands)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberCohortRecord {
    pub year: u32,
    pub region_code: String,
    pub age_bucket: AgeBucket,
    pub member_count: f64,
}

/// The 20 member counts of one region in one year
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSet {
    pub year: u32,
    pub region_code: String,
    /// Member counts indexed by `AgeBucket::index`
    counts: [f64; BUCKET_COUNT],
}

impl CohortSet {
    /// All-zero set
    pub fn empty(region_code: &str, year: u32) -> Self {
        Self {
            year,
            region_code: region_code.to_string(),
            counts: [0.0; BUCKET_COUNT],
        }
    }

    /// Build a set from raw per-bucket counts.
    ///
    /// Counts are clamped, rounded to one decimal, and forced to 0 below age 20, so the
    /// result always satisfies the output invariants.
    pub fn from_counts(region_code: &str, year: u32, raw: [f64; BUCKET_COUNT]) -> Self {
        let mut set = Self::empty(region_code, year);
        for bucket in AgeBucket::ALL {
            set.set(bucket, raw[bucket.index()]);
        }
        set
    }

    /// Store a count for a bucket, applying the output invariants
    pub fn set(&mut self, bucket: AgeBucket, value: f64) {
        let value = if bucket.is_below_membership_age() {
            0.0
        } else {
            round_one_decimal(sanitize_count(value).0)
        };
        self.counts[bucket.index()] = value;
    }

    pub fn get(&self, bucket: AgeBucket) -> f64 {
        self.counts[bucket.index()]
    }

    pub fn counts(&self) -> &[f64; BUCKET_COUNT] {
        &self.counts
    }

    /// Total members across all buckets
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// True when every bucket is zero
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0.0)
    }

    /// Records in ascending bucket order
    pub fn records(&self) -> Vec<MemberCohortRecord> {
        AgeBucket::ALL
            .iter()
            .map(|&bucket| MemberCohortRecord {
                year: self.year,
                region_code: self.region_code.clone(),
                age_bucket: bucket,
                member_count: self.get(bucket),
            })
            .collect()
    }

    /// Rebuild a set from records, which must all belong to one region and year and
    /// cover each bucket exactly once
    pub fn from_records(records: &[MemberCohortRecord]) -> Result<Self, String> {
        let first = records.first().ok_or_else(|| "no records".to_string())?;
        let mut set = Self::empty(&first.region_code, first.year);
        let mut seen = [false; BUCKET_COUNT];

        for record in records {
            if record.year != set.year || record.region_code != set.region_code {
                return Err(format!(
                    "mixed sets: {}/{} and {}/{}",
                    set.region_code, set.year, record.region_code, record.year
                ));
            }
            let idx = record.age_bucket.index();
            if seen[idx] {
                return Err(format!("duplicate bucket {}", record.age_bucket));
            }
            seen[idx] = true;
            set.counts[idx] = record.member_count;
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(format!("missing bucket {}", AgeBucket::ALL[missing]));
        }

        Ok(set)
    }
}
