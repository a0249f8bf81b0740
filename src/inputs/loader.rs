//! CSV and JSON input loaders
//!
//! Loads the four external datasets from a data directory (default `data/`):
//! population.csv, change_rates.csv, survival_rates.csv and membership.json.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::change_rate::ChangeRateRecord;
use super::membership::MembershipReference;
use super::population::{Gender, PopulationRecord};
use super::survival::SurvivalTable;
use crate::cohort::AgeBucket;
use crate::error::InputError;

/// Default path to the input data directory
pub const DEFAULT_DATA_PATH: &str = "data";

pub const POPULATION_FILE: &str = "population.csv";
pub const CHANGE_RATE_FILE: &str = "change_rates.csv";
pub const SURVIVAL_FILE: &str = "survival_rates.csv";
pub const MEMBERSHIP_FILE: &str = "membership.json";

/// Raw row of population.csv
#[derive(Debug, Deserialize)]
struct PopulationRow {
    year: u32,
    region_code: String,
    age_bucket: String,
    gender: String,
    population: f64,
}

/// Raw row of change_rates.csv
#[derive(Debug, Deserialize)]
struct ChangeRateRow {
    target_year: u32,
    region_code: String,
    age_bucket: String,
    total: f64,
    #[serde(default)]
    male: Option<f64>,
    #[serde(default)]
    female: Option<f64>,
    base_year: u32,
}

/// Raw row of survival_rates.csv
#[derive(Debug, Deserialize)]
struct SurvivalRow {
    region_code: String,
    age_bucket: String,
    survival_rate: f64,
}

fn open(path: &Path) -> Result<File, InputError> {
    File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> InputError + '_ {
    move |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn invalid(path: &Path, row: usize, message: String) -> InputError {
    InputError::InvalidField {
        path: path.to_path_buf(),
        row,
        message,
    }
}

fn parse_bucket(path: &Path, row: usize, label: &str) -> Result<AgeBucket, InputError> {
    label
        .parse()
        .map_err(|e: crate::cohort::UnknownBucket| invalid(path, row, e.to_string()))
}

/// Load population rows from any reader. `path` is used only for error messages
pub fn load_population_from_reader<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<PopulationRecord>, InputError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let row_no = idx + 1;
        let row: PopulationRow = result.map_err(csv_error(path))?;

        let gender = Gender::parse(&row.gender)
            .ok_or_else(|| invalid(path, row_no, format!("unknown gender: {}", row.gender)))?;
        if !row.population.is_finite() || row.population < 0.0 {
            return Err(invalid(
                path,
                row_no,
                format!("population must be a non-negative number, got {}", row.population),
            ));
        }

        records.push(PopulationRecord {
            year: row.year,
            region_code: row.region_code.trim().to_string(),
            age_bucket: parse_bucket(path, row_no, &row.age_bucket)?,
            gender,
            population: row.population,
        });
    }

    Ok(records)
}

/// Load population.csv from a data directory
pub fn load_population(dir: &Path) -> Result<Vec<PopulationRecord>, InputError> {
    let path = dir.join(POPULATION_FILE);
    load_population_from_reader(open(&path)?, &path)
}

/// Load change-rate rows from any reader
pub fn load_change_rates_from_reader<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<ChangeRateRecord>, InputError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let row_no = idx + 1;
        let row: ChangeRateRow = result.map_err(csv_error(path))?;

        if !row.total.is_finite() {
            return Err(invalid(path, row_no, format!("non-finite change rate {}", row.total)));
        }

        records.push(ChangeRateRecord {
            target_year: row.target_year,
            region_code: row.region_code.trim().to_string(),
            age_bucket: parse_bucket(path, row_no, &row.age_bucket)?,
            total: row.total,
            male: row.male,
            female: row.female,
            base_year: row.base_year,
        });
    }

    Ok(records)
}

/// Load change_rates.csv from a data directory
pub fn load_change_rates(dir: &Path) -> Result<Vec<ChangeRateRecord>, InputError> {
    let path = dir.join(CHANGE_RATE_FILE);
    load_change_rates_from_reader(open(&path)?, &path)
}

/// Load survival rates from any reader.
///
/// Rows for buckets under 70 or with rates outside [0, 1] are rejected.
pub fn load_survival_from_reader<R: Read>(
    reader: R,
    path: &Path,
) -> Result<SurvivalTable, InputError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table = SurvivalTable::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let row_no = idx + 1;
        let row: SurvivalRow = result.map_err(csv_error(path))?;
        let bucket = parse_bucket(path, row_no, &row.age_bucket)?;

        if !bucket.has_survival_rate() {
            return Err(invalid(
                path,
                row_no,
                format!("survival rates are only defined from age 70, got {}", bucket),
            ));
        }
        if !(0.0..=1.0).contains(&row.survival_rate) {
            return Err(invalid(
                path,
                row_no,
                format!("survival rate {} is outside [0, 1]", row.survival_rate),
            ));
        }

        table.insert(row.region_code.trim(), bucket, row.survival_rate);
    }

    Ok(table)
}

/// Load survival_rates.csv from a data directory
pub fn load_survival(dir: &Path) -> Result<SurvivalTable, InputError> {
    let path = dir.join(SURVIVAL_FILE);
    load_survival_from_reader(open(&path)?, &path)
}

/// Load a membership reference JSON file
pub fn load_membership_reference(path: &Path) -> Result<MembershipReference, InputError> {
    let file = open(path)?;
    let reference: MembershipReference =
        serde_json::from_reader(file).map_err(|source| InputError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    if !(reference.unit_divisor.is_finite() && reference.unit_divisor > 0.0) {
        return Err(InputError::InvalidConfig(format!(
            "unit_divisor must be positive, got {}",
            reference.unit_divisor
        )));
    }

    Ok(reference)
}

/// Load membership.json from a data directory
pub fn load_membership(dir: &Path) -> Result<MembershipReference, InputError> {
    load_membership_reference(&dir.join(MEMBERSHIP_FILE))
}
