//! Fixed 5-year age buckets shared by population and membership data
//!
//! There are exactly 20 buckets, "0-4" through "95-99". Buckets below "20-24" never
//! hold members. The three youngest member buckets are entry cohorts: their
//! membership is re-acquired each period from population rather than aged in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of age buckets in every population or membership set
pub const BUCKET_COUNT: usize = 20;

/// Width of a bucket in years, which is also the projection step
pub const BUCKET_WIDTH: u8 = 5;

/// Youngest age at which anyone is counted as a member
pub const MEMBERSHIP_MIN_AGE: u8 = 20;

/// Start age of the entry cohorts ("20-24", "25-29", "30-34")
const ENTRY_COHORT_START_AGES: [u8; 3] = [20, 25, 30];

/// Buckets at or above this age use a region-specific survival rate; below it the
/// survival factor is 1.0 (so "65-69" -> "70-74" is the last step without mortality)
pub const SURVIVAL_MIN_AGE: u8 = 70;

/// A 5-year age bucket, identified by its position 0..20
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgeBucket(u8);

impl AgeBucket {
    /// All buckets in ascending age order
    pub const ALL: [AgeBucket; BUCKET_COUNT] = {
        let mut all = [AgeBucket(0); BUCKET_COUNT];
        let mut i = 0;
        while i < BUCKET_COUNT {
            all[i] = AgeBucket(i as u8);
            i += 1;
        }
        all
    };

    /// Bucket by position (0 = "0-4")
    pub fn from_index(index: usize) -> Option<Self> {
        (index < BUCKET_COUNT).then(|| AgeBucket(index as u8))
    }

    /// Bucket containing the given age
    pub fn containing(age: u8) -> Option<Self> {
        Self::from_index((age / BUCKET_WIDTH) as usize)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn start_age(self) -> u8 {
        self.0 * BUCKET_WIDTH
    }

    pub fn end_age(self) -> u8 {
        self.start_age() + BUCKET_WIDTH - 1
    }

    /// Label such as "40-44"
    pub fn label(self) -> String {
        format!("{}-{}", self.start_age(), self.end_age())
    }

    /// The next-younger bucket, which ages into this one over one step
    pub fn predecessor(self) -> Option<Self> {
        self.0.checked_sub(1).map(AgeBucket)
    }

    /// The next-older bucket; None for "95-99"
    pub fn successor(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Buckets under 20 are terminal sinks with zero membership
    pub fn is_below_membership_age(self) -> bool {
        self.start_age() < MEMBERSHIP_MIN_AGE
    }

    pub fn is_entry_cohort(self) -> bool {
        ENTRY_COHORT_START_AGES.contains(&self.start_age())
    }

    /// Whether this bucket draws a survival rate from the mortality dataset
    pub fn has_survival_rate(self) -> bool {
        self.start_age() >= SURVIVAL_MIN_AGE
    }

    /// Buckets that the mortality dataset must cover for every region
    pub fn survival_buckets() -> impl Iterator<Item = AgeBucket> {
        Self::ALL.into_iter().filter(|b| b.has_survival_rate())
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_age(), self.end_age())
    }
}

/// Error returned when a label does not name one of the 20 buckets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown age bucket: {0:?}")]
pub struct UnknownBucket(pub String);

impl FromStr for AgeBucket {
    type Err = UnknownBucket;

    /// Accepts "40-44" and the common "40~44" / "40 - 44" spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (start, end) = normalized
            .split_once(['-', '~'])
            .ok_or_else(|| UnknownBucket(s.to_string()))?;

        let start: u8 = start.parse().map_err(|_| UnknownBucket(s.to_string()))?;
        let end: u8 = end.parse().map_err(|_| UnknownBucket(s.to_string()))?;

        match AgeBucket::containing(start) {
            Some(bucket) if bucket.start_age() == start && bucket.end_age() == end => Ok(bucket),
            _ => Err(UnknownBucket(s.to_string())),
        }
    }
}

impl TryFrom<String> for AgeBucket {
    type Error = UnknownBucket;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgeBucket> for String {
    fn from(bucket: AgeBucket) -> Self {
        bucket.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_ordered_buckets() {
        assert_eq!(AgeBucket::ALL.len(), 20);
        assert_eq!(AgeBucket::ALL[0].label(), "0-4");
        assert_eq!(AgeBucket::ALL[19].label(), "95-99");
        assert!(AgeBucket::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_neighbours() {
        let b: AgeBucket = "40-44".parse().unwrap();
        assert_eq!(b.predecessor().unwrap().label(), "35-39");
        assert_eq!(b.successor().unwrap().label(), "45-49");

        assert_eq!(AgeBucket::ALL[0].predecessor(), None);
        assert_eq!(AgeBucket::ALL[19].successor(), None);
    }

    #[test]
    fn test_classification() {
        let members: Vec<_> = AgeBucket::ALL
            .iter()
            .filter(|b| b.is_below_membership_age())
            .map(|b| b.label())
            .collect();
        assert_eq!(members, vec!["0-4", "5-9", "10-14", "15-19"]);

        let entry: Vec<_> = AgeBucket::ALL
            .iter()
            .filter(|b| b.is_entry_cohort())
            .map(|b| b.label())
            .collect();
        assert_eq!(entry, vec!["20-24", "25-29", "30-34"]);

        // 65-69 has no survival rate; 70-74 is the first that does
        assert!(!"65-69".parse::<AgeBucket>().unwrap().has_survival_rate());
        assert!("70-74".parse::<AgeBucket>().unwrap().has_survival_rate());
        assert_eq!(AgeBucket::survival_buckets().count(), 6);
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("20~24".parse::<AgeBucket>().unwrap().label(), "20-24");
        assert_eq!(" 95 - 99 ".parse::<AgeBucket>().unwrap().label(), "95-99");
        assert!("40-45".parse::<AgeBucket>().is_err());
        assert!("100-104".parse::<AgeBucket>().is_err());
        assert!("total".parse::<AgeBucket>().is_err());
    }

    #[test]
    fn test_serde_as_label() {
        let b: AgeBucket = "75-79".parse().unwrap();
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"75-79\"");
        let back: AgeBucket = serde_json::from_str("\"75-79\"").unwrap();
        assert_eq!(back, b);
    }
}
