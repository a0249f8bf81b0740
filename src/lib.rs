//! Membership Projection - cohort-component projection of organization membership
//!
//! This library provides:
//! - The fixed 5-year age bucket model and member cohort records
//! - Loaders for population, change-rate, survival and base membership data
//! - Base-year share calculation and 5-year cohort stepping
//! - A runner that projects every region in parallel and persists each year's set

pub mod cohort;
pub mod config;
pub mod error;
pub mod inputs;
pub mod projection;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use cohort::{AgeBucket, CohortSet, MemberCohortRecord};
pub use config::ProjectionConfig;
pub use error::{InputError, ProjectionError, StoreError};
pub use inputs::{InputData, MembershipReference};
pub use projection::{step, ShareCalculator, ShareRates, StepInputs};
pub use runner::{ProjectionRunner, RegionOutcome, RegionStatus, RunReport, NATIONAL_REGION_CODE};
pub use store::{CohortStore, CsvDirStore, MemoryStore};
