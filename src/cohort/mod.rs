//! Age buckets and member cohort records

mod bucket;
mod records;

pub use bucket::{
    AgeBucket, UnknownBucket, BUCKET_COUNT, BUCKET_WIDTH, MEMBERSHIP_MIN_AGE, SURVIVAL_MIN_AGE,
};
pub use records::{round_one_decimal, sanitize_count, CohortSet, MemberCohortRecord};
