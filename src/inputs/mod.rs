//! External datasets consumed by the projection: population, change rates, survival
//! rates and the base membership reference

mod population;
mod change_rate;
mod survival;
mod membership;
pub mod loader;

pub use population::{Gender, PopulationRecord, PopulationTable};
pub use change_rate::{ChangeRateRecord, ChangeRateTable};
pub use survival::{SurvivalFactors, SurvivalTable};
pub use membership::{CompositionTable, MembershipReference, RegionMembership, DEFAULT_UNIT_DIVISOR};

use std::collections::BTreeSet;
use std::path::Path;

use log::info;

use crate::error::InputError;

/// Container for all projection inputs, loaded once per run and shared read-only
#[derive(Debug, Clone)]
pub struct InputData {
    pub population: PopulationTable,
    pub change_rates: ChangeRateTable,
    pub survival: SurvivalTable,
    pub membership: MembershipReference,
}

impl InputData {
    /// Load every dataset from a specific directory
    pub fn from_dir(dir: &Path) -> Result<Self, InputError> {
        let population = loader::load_population(dir)?;
        let change_rates = loader::load_change_rates(dir)?;
        let survival = loader::load_survival(dir)?;
        let membership = loader::load_membership(dir)?;

        info!(
            "Loaded {} population rows, {} change-rate rows from {}; membership reference {}",
            population.len(),
            change_rates.len(),
            dir.display(),
            membership.version
        );
        membership.check();

        Ok(Self {
            population: PopulationTable::from_records(&population),
            change_rates: ChangeRateTable::from_records(&change_rates),
            survival,
            membership,
        })
    }

    /// Every region the run should attempt: those with a membership figure plus those
    /// with population data, so unsupported regions show up in the report
    pub fn regions(&self) -> BTreeSet<String> {
        let mut regions = self.population.regions();
        regions.extend(self.membership.regions.keys().cloned());
        regions
    }
}
