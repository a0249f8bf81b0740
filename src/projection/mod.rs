//! Cohort-component projection engine

mod shares;
mod stepper;
mod chain;

pub use shares::{BaseYearShares, ShareCalculator, ShareRates};
pub use stepper::{growth_factor, step, StepDiagnostics, StepInputs, StepResult};
pub use chain::{project_to, CohortChain, RegionInputs, StepData};
