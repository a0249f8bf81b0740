//! Base-year membership reference data
//!
//! One versioned structure holds every constant the share calculation needs: the total
//! membership of each region in the base year and the national age composition of the
//! membership. Different calibrations are expressed as different versions of this file,
//! never as different code paths.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cohort::AgeBucket;

/// Persons per population unit (population figures are in thousands)
pub const DEFAULT_UNIT_DIVISOR: f64 = 1000.0;

/// Tolerance, in percentage points, before a composition table is reported as not
/// summing to 100
const COMPOSITION_SUM_TOLERANCE: f64 = 0.5;

/// Share of national membership per age bucket, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositionTable(BTreeMap<AgeBucket, f64>);

impl CompositionTable {
    pub fn new(percentages: BTreeMap<AgeBucket, f64>) -> Self {
        Self(percentages)
    }

    /// National membership composition by age used when a reference file does not
    /// supply its own table
    pub fn national_default() -> Self {
        let percentages = [
            ("20-24", 1.52),
            ("25-29", 3.04),
            ("30-34", 4.87),
            ("35-39", 6.12),
            ("40-44", 7.31),
            ("45-49", 8.96),
            ("50-54", 9.84),
            ("55-59", 10.21),
            ("60-64", 10.63),
            ("65-69", 10.92),
            ("70-74", 10.15),
            ("75-79", 7.48),
            ("80-84", 4.91),
            ("85-89", 2.66),
            ("90-94", 1.08),
            ("95-99", 0.30),
        ];

        Self(
            percentages
                .iter()
                .filter_map(|(label, pct)| label.parse().ok().map(|b| (b, *pct)))
                .collect(),
        )
    }

    /// Percentage for a bucket; None if the table does not cover it
    pub fn percentage(&self, bucket: AgeBucket) -> Option<f64> {
        if bucket.is_below_membership_age() {
            return None;
        }
        self.0.get(&bucket).copied()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn buckets(&self) -> impl Iterator<Item = AgeBucket> + '_ {
        self.0.keys().copied()
    }

    /// True if at least one bucket aged 20 or over has a percentage
    pub fn covers_member_ages(&self) -> bool {
        self.buckets().any(|b| !b.is_below_membership_age())
    }
}

impl Default for CompositionTable {
    fn default() -> Self {
        Self::national_default()
    }
}

/// Reference figures for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMembership {
    #[serde(default)]
    pub name: Option<String>,
    /// Total members in the base year (persons). None when the figure is not known
    #[serde(default)]
    pub total_membership: Option<f64>,
}

/// Versioned membership reference shared by every region in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipReference {
    pub version: String,
    #[serde(default = "default_unit_divisor")]
    pub unit_divisor: f64,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionMembership>,
    #[serde(default)]
    pub composition: CompositionTable,
}

fn default_unit_divisor() -> f64 {
    DEFAULT_UNIT_DIVISOR
}

impl MembershipReference {
    /// Empty reference using the national default composition
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            unit_divisor: DEFAULT_UNIT_DIVISOR,
            regions: BTreeMap::new(),
            composition: CompositionTable::national_default(),
        }
    }

    /// Builder-style helper for registering a region's total
    pub fn with_region(mut self, region_code: &str, total_membership: f64) -> Self {
        self.regions.insert(
            region_code.to_string(),
            RegionMembership {
                name: None,
                total_membership: Some(total_membership),
            },
        );
        self
    }

    /// Base-year total for a region; None if the region is unknown or has no figure
    pub fn total_membership(&self, region_code: &str) -> Option<f64> {
        self.regions
            .get(region_code)
            .and_then(|r| r.total_membership)
            .filter(|t| t.is_finite() && *t >= 0.0)
    }

    pub fn region_name(&self, region_code: &str) -> Option<&str> {
        self.regions.get(region_code).and_then(|r| r.name.as_deref())
    }

    /// Log plausibility problems without rejecting the data
    pub fn check(&self) {
        let sum = self.composition.sum();
        if (sum - 100.0).abs() > COMPOSITION_SUM_TOLERANCE {
            warn!(
                "Membership reference {}: composition sums to {:.2}%, expected 100%",
                self.version, sum
            );
        }
        if !self.composition.covers_member_ages() {
            warn!(
                "Membership reference {}: composition covers no bucket aged 20 or over, no region can be projected",
                self.version
            );
        }
        for bucket in self.composition.buckets().filter(|b| b.is_below_membership_age()) {
            warn!(
                "Membership reference {}: composition lists {} which is below membership age and is ignored",
                self.version, bucket
            );
        }
        for (code, region) in &self.regions {
            if region.total_membership.is_none() {
                warn!(
                    "Membership reference {}: region {} has no total membership",
                    self.version, code
                );
            }
        }
    }
}
