//! Base-year share calculation
//!
//! The share rate of a bucket is its base-year membership divided by its base-year
//! population. Base-year membership itself is reconstructed from the region's total
//! membership and the national age composition:
//!
//! ```text
//! base_members[b] = total_membership * pct[b] / 100 / unit_divisor
//! share_rate[b]   = base_members[b] / base_population[b]   (0 if population is 0)
//! ```

use std::collections::BTreeMap;

use log::warn;

use crate::cohort::{sanitize_count, AgeBucket, CohortSet, BUCKET_COUNT};
use crate::inputs::MembershipReference;

/// Share rates for one region, fixed for the whole projection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShareRates {
    rates: BTreeMap<AgeBucket, f64>,
}

impl ShareRates {
    pub fn new(rates: BTreeMap<AgeBucket, f64>) -> Self {
        Self { rates }
    }

    /// Share rate for a bucket; buckets not covered by the composition table are 0
    pub fn get(&self, bucket: AgeBucket) -> f64 {
        self.rates.get(&bucket).copied().unwrap_or(0.0)
    }

    /// An empty map means the region has no base membership and cannot be projected
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgeBucket, f64)> + '_ {
        self.rates.iter().map(|(b, r)| (*b, *r))
    }
}

/// Result of the base-year calculation: the shares and the first link of the chain
#[derive(Debug, Clone)]
pub struct BaseYearShares {
    pub shares: ShareRates,
    /// Base-year members per bucket before rounding
    pub base_members: [f64; BUCKET_COUNT],
    pub base_set: CohortSet,
}

impl BaseYearShares {
    fn unsupported(region_code: &str, base_year: u32) -> Self {
        Self {
            shares: ShareRates::default(),
            base_members: [0.0; BUCKET_COUNT],
            base_set: CohortSet::empty(region_code, base_year),
        }
    }

    pub fn is_supported(&self) -> bool {
        !self.shares.is_empty()
    }
}

/// Derives share rates from the membership reference
#[derive(Debug, Clone)]
pub struct ShareCalculator<'a> {
    reference: &'a MembershipReference,
}

impl<'a> ShareCalculator<'a> {
    pub fn new(reference: &'a MembershipReference) -> Self {
        Self { reference }
    }

    /// Compute shares for one region from its base-year population (both genders).
    ///
    /// A region without a total membership figure yields an empty share map and an
    /// all-zero base set.
    pub fn calculate(
        &self,
        region_code: &str,
        base_year: u32,
        base_population: &[f64; BUCKET_COUNT],
    ) -> BaseYearShares {
        let Some(total) = self.reference.total_membership(region_code) else {
            return BaseYearShares::unsupported(region_code, base_year);
        };

        let mut rates = BTreeMap::new();
        let mut base_members = [0.0; BUCKET_COUNT];

        for bucket in AgeBucket::ALL {
            let Some(pct) = self.reference.composition.percentage(bucket) else {
                continue;
            };

            let members = total * pct / 100.0 / self.reference.unit_divisor;
            let population = base_population[bucket.index()];
            let raw_share = if population > 0.0 { members / population } else { 0.0 };

            let (share, share_clamped) = sanitize_count(raw_share);
            let (members, members_clamped) = sanitize_count(members);
            if share_clamped || members_clamped {
                warn!(
                    "Region {} bucket {}: share {} / members {} clamped to 0",
                    region_code, bucket, raw_share, members
                );
            }

            base_members[bucket.index()] = members;
            rates.insert(bucket, share);
        }

        BaseYearShares {
            shares: ShareRates::new(rates),
            base_members,
            base_set: CohortSet::from_counts(region_code, base_year, base_members),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bucket(label: &str) -> AgeBucket {
        label.parse().unwrap()
    }

    #[test]
    fn test_share_rate_for_40_44() {
        let reference = MembershipReference::new("test").with_region("R", 2_000_000.0);
        let mut population = [0.0; BUCKET_COUNT];
        population[bucket("40-44").index()] = 10_000.0;

        let result = ShareCalculator::new(&reference).calculate("R", 2025, &population);

        assert_relative_eq!(result.base_members[bucket("40-44").index()], 146.2, epsilon = 1e-9);
        assert_relative_eq!(result.shares.get(bucket("40-44")), 0.01462, epsilon = 1e-12);
        assert_eq!(result.base_set.get(bucket("40-44")), 146.2);
        assert_eq!(result.base_set.year, 2025);
    }

    #[test]
    fn test_zero_population_gives_zero_share() {
        let reference = MembershipReference::new("test").with_region("R", 2_000_000.0);
        let population = [0.0; BUCKET_COUNT];

        let result = ShareCalculator::new(&reference).calculate("R", 2025, &population);

        assert!(result.is_supported());
        assert_eq!(result.shares.get(bucket("40-44")), 0.0);
        // Base members still follow the composition even where population is missing
        assert_eq!(result.base_set.get(bucket("40-44")), 146.2);
    }

    #[test]
    fn test_uncovered_buckets_are_zero() {
        let mut composition = BTreeMap::new();
        composition.insert(bucket("20-24"), 50.0);
        composition.insert(bucket("45-49"), 50.0);
        let mut reference = MembershipReference::new("narrow").with_region("R", 100_000.0);
        reference.composition = crate::inputs::CompositionTable::new(composition);

        let population = [1_000.0; BUCKET_COUNT];
        let result = ShareCalculator::new(&reference).calculate("R", 2025, &population);

        assert_eq!(result.shares.iter().count(), 2);
        assert_eq!(result.shares.get(bucket("40-44")), 0.0);
        assert_eq!(result.base_set.get(bucket("40-44")), 0.0);
        assert_eq!(result.base_set.get(bucket("45-49")), 50.0);
        assert_eq!(result.base_set.get(bucket("15-19")), 0.0);
    }

    #[test]
    fn test_missing_total_is_unsupported() {
        let reference = MembershipReference::new("test").with_region("R", 2_000_000.0);
        let population = [1_000.0; BUCKET_COUNT];

        let result = ShareCalculator::new(&reference).calculate("X", 2025, &population);

        assert!(!result.is_supported());
        assert!(result.shares.is_empty());
        assert!(result.base_set.is_empty());
    }
}
