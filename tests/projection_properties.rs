//! End-to-end properties of the projection over the sample dataset in data/

use std::fs;
use std::path::{Path, PathBuf};

use membership_projection::cohort::{round_one_decimal, AgeBucket, CohortSet, BUCKET_COUNT};
use membership_projection::inputs::{
    ChangeRateTable, InputData, MembershipReference, PopulationTable, SurvivalFactors, SurvivalTable,
};
use membership_projection::projection::{growth_factor, step, ShareCalculator, StepInputs};
use membership_projection::{
    CohortStore, CsvDirStore, MemoryStore, ProjectionConfig, ProjectionRunner, RegionStatus,
    NATIONAL_REGION_CODE,
};
use proptest::prelude::*;

fn bucket(label: &str) -> AgeBucket {
    label.parse().unwrap()
}

fn sample_runner() -> ProjectionRunner {
    let config = ProjectionConfig::from_json_path(Path::new("data/projection_config.json"))
        .expect("Failed to load config");
    ProjectionRunner::from_dir(Path::new("data"), config).expect("Failed to load sample data")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "membership_projection_it_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    dir
}

/// Every set the sample run wrote, with the inputs needed to check it
fn sample_run() -> (ProjectionRunner, MemoryStore) {
    let runner = sample_runner();
    let store = MemoryStore::new();
    let report = runner.run(&store);
    assert_eq!(report.completed().count(), 2, "report: {:?}", report.regions);
    (runner, store)
}

#[test]
fn test_sample_run_outcomes() {
    let runner = sample_runner();
    let store = MemoryStore::new();
    let report = runner.run(&store);

    assert_eq!(report.regions.len(), 3);
    for code in ["11", "26"] {
        let outcome = report.region(code).unwrap();
        assert_eq!(outcome.status, RegionStatus::Completed);
        assert_eq!(outcome.years_written, vec![2025, 2030, 2035, 2040, 2045, 2050]);
    }

    // Jeju has population but no total membership
    let jeju = report.region("50").unwrap();
    assert!(matches!(jeju.status, RegionStatus::Unsupported { .. }));
    assert!(jeju.years_written.is_empty());
    assert_eq!(jeju.region_name.as_deref(), Some("Jeju"));

    // Busan is missing one change rate (2045, 60-64)
    assert_eq!(report.region("26").unwrap().defaulted_change_rates, 1);
    assert_eq!(report.region("11").unwrap().defaulted_change_rates, 0);
}

#[test]
fn test_zero_below_20_and_non_negative() {
    let (_, store) = sample_run();
    let sets = store.sets();
    assert_eq!(sets.len(), 12);

    for set in &sets {
        for b in AgeBucket::ALL {
            let count = set.get(b);
            assert!(count >= 0.0, "{} {} {}: {}", set.region_code, set.year, b, count);
            if b.is_below_membership_age() {
                assert_eq!(count, 0.0);
            }
        }
        assert_eq!(set.records().len(), BUCKET_COUNT);
    }
}

#[test]
fn test_entry_cohort_share_consistency() {
    let (runner, store) = sample_run();
    let data = runner.data();
    let calculator = ShareCalculator::new(&data.membership);

    for region in ["11", "26"] {
        let base_population = data.population.snapshot(region, 2025).unwrap();
        let shares = calculator.calculate(region, 2025, base_population).shares;

        for &year in &runner.config().target_years {
            let set = store.read(region, year).unwrap().unwrap();
            for label in ["20-24", "25-29", "30-34"] {
                let b = bucket(label);
                let expected = round_one_decimal(data.population.get(region, year, b) * shares.get(b));
                assert_eq!(set.get(b), expected, "{} {} {}", region, year, label);
            }
        }
    }
}

#[test]
fn test_cohort_chain_exactness() {
    let (runner, store) = sample_run();
    let data = runner.data();

    for region in ["11", "26"] {
        let survival = data.survival.factors_for(region).unwrap();
        let years = runner.config().all_years();

        for pair in years.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let source = store.read(region, from).unwrap().unwrap();
            let target = store.read(region, to).unwrap().unwrap();

            for b in AgeBucket::ALL.iter().filter(|b| b.start_age() >= 35) {
                let previous = b.predecessor().unwrap();
                let rate = data.change_rates.get(region, to, *b).unwrap_or(0.0);
                let expected =
                    round_one_decimal(source.get(previous) * growth_factor(rate) * survival.get(*b));
                assert_eq!(target.get(*b), expected, "{} {}->{} {}", region, from, to, b);
            }
        }
    }
}

#[test]
fn test_missing_change_rate_degrades_to_zero() {
    let (runner, store) = sample_run();
    let data = runner.data();
    let b = bucket("60-64");

    assert_eq!(data.change_rates.get("26", 2045, b), None);

    let source = store.read("26", 2040).unwrap().unwrap();
    let target = store.read("26", 2045).unwrap().unwrap();
    assert_eq!(target.get(b), source.get(bucket("55-59")));
}

#[test]
fn test_repeat_runs_are_byte_identical() {
    let first_dir = temp_dir("first");
    let second_dir = temp_dir("second");

    let runner = sample_runner();
    runner.run(&CsvDirStore::create(&first_dir).unwrap());
    runner.run(&CsvDirStore::create(&second_dir).unwrap());

    let mut names: Vec<_> = fs::read_dir(&first_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert_eq!(names.len(), 12);

    for name in names {
        let a = fs::read(first_dir.join(&name)).unwrap();
        let b = fs::read(second_dir.join(&name)).unwrap();
        assert_eq!(a, b, "{:?} differs between runs", name);
    }

    let _ = fs::remove_dir_all(&first_dir);
    let _ = fs::remove_dir_all(&second_dir);
}

#[test]
fn test_stored_sets_read_back_unchanged() {
    let dir = temp_dir("read_back");
    let store = CsvDirStore::create(&dir).unwrap();
    let runner = sample_runner();
    runner.run(&store);

    let memory = MemoryStore::new();
    runner.run(&memory);
    for set in memory.sets() {
        let from_disk = store.read(&set.region_code, set.year).unwrap().unwrap();
        assert_eq!(from_disk, set);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_national_sets_go_through_store() {
    let dir = temp_dir("national");
    let store = CsvDirStore::create(&dir).unwrap();
    let runner = sample_runner();
    let report = runner.run(&store);

    for set in report.national_totals(&store).unwrap() {
        store.write(&set).unwrap();
    }

    for year in runner.config().all_years() {
        let national = store.read(NATIONAL_REGION_CODE, year).unwrap().unwrap();
        let seoul = store.read("11", year).unwrap().unwrap();
        let busan = store.read("26", year).unwrap().unwrap();
        for b in AgeBucket::ALL {
            assert_eq!(national.get(b), round_one_decimal(seoul.get(b) + busan.get(b)));
        }
        assert!(!store
            .path_for(NATIONAL_REGION_CODE, year)
            .with_extension("csv.tmp")
            .exists());
    }

    let _ = fs::remove_dir_all(&dir);
}

/// Single-region inputs with a flat population
fn synthetic_data(region: &str, total_membership: Option<f64>) -> InputData {
    let mut population = PopulationTable::new();
    for year in [2025, 2030] {
        for b in AgeBucket::ALL {
            population.add(region, year, b, 10_000.0);
        }
    }
    let mut survival = SurvivalTable::new();
    for b in AgeBucket::survival_buckets() {
        survival.insert(region, b, 0.88);
    }
    let mut membership = MembershipReference::new("synthetic");
    if let Some(total) = total_membership {
        membership = membership.with_region(region, total);
    }
    InputData {
        population,
        change_rates: ChangeRateTable::new(),
        survival,
        membership,
    }
}

#[test]
fn test_base_share_for_40_44() {
    let data = synthetic_data("R", Some(2_000_000.0));
    let population = data.population.snapshot("R", 2025).unwrap();
    let result = ShareCalculator::new(&data.membership).calculate("R", 2025, population);

    assert_eq!(result.base_set.get(bucket("40-44")), 146.2);
    assert!((result.shares.get(bucket("40-44")) - 0.01462).abs() < 1e-12);
}

#[test]
fn test_survival_step_for_75_79() {
    let mut source = CohortSet::empty("R", 2025);
    source.set(bucket("70-74"), 500.0);

    let mut change_rates = [None; BUCKET_COUNT];
    change_rates[bucket("75-79").index()] = Some(-0.02);
    let data = synthetic_data("R", Some(1.0));
    let survival = data.survival.factors_for("R").unwrap();
    let shares = ShareCalculator::new(&data.membership)
        .calculate("R", 2025, data.population.snapshot("R", 2025).unwrap())
        .shares;

    let inputs = StepInputs {
        shares: &shares,
        target_population: data.population.snapshot("R", 2030).unwrap(),
        change_rates: &change_rates,
        survival: &survival,
    };
    let result = step(&source, 2030, &inputs).unwrap();

    assert_eq!(result.set.get(bucket("75-79")), 431.2);
}

#[test]
fn test_region_without_membership_is_reported_unsupported() {
    let mut data = synthetic_data("OK", Some(500_000.0));
    let other = synthetic_data("NONE", None);
    for b in AgeBucket::ALL {
        for year in [2025, 2030] {
            data.population.add("NONE", year, b, other.population.get("NONE", year, b));
        }
    }
    for b in AgeBucket::survival_buckets() {
        data.survival.insert("NONE", b, 0.88);
    }

    let config = ProjectionConfig {
        base_year: 2025,
        target_years: vec![2030],
        parallel: true,
    };
    let runner = ProjectionRunner::new(data, config).unwrap();
    let store = MemoryStore::new();
    let report = runner.run(&store);

    let none = report.region("NONE").unwrap();
    assert!(matches!(none.status, RegionStatus::Unsupported { .. }));
    assert_eq!(store.read("NONE", 2025).unwrap(), None);

    let ok = report.region("OK").unwrap();
    assert_eq!(ok.status, RegionStatus::Completed);
    assert_eq!(ok.years_written, vec![2025, 2030]);
}

proptest! {
    #[test]
    fn prop_step_keeps_output_invariants(
        counts in prop::collection::vec(prop_oneof![Just(0.0f64), 0.0f64..5_000.0], BUCKET_COUNT),
        population in prop::collection::vec(0.0f64..20_000.0, BUCKET_COUNT),
        rates in prop::collection::vec(prop::option::of(-2.0f64..2.0), BUCKET_COUNT),
        survival_rate in 0.0f64..=1.0,
        share in 0.0f64..1.0,
    ) {
        let mut raw = [0.0; BUCKET_COUNT];
        raw.copy_from_slice(&counts);
        let source = CohortSet::from_counts("P", 2030, raw);

        let mut target_population = [0.0; BUCKET_COUNT];
        target_population.copy_from_slice(&population);
        let mut change_rates = [None; BUCKET_COUNT];
        change_rates.copy_from_slice(&rates);

        let mut table = SurvivalTable::new();
        for b in AgeBucket::survival_buckets() {
            table.insert("P", b, survival_rate);
        }
        let survival: SurvivalFactors = table.factors_for("P").unwrap();

        let shares = membership_projection::ShareRates::new(
            AgeBucket::ALL.iter().map(|b| (*b, share)).collect(),
        );
        let inputs = StepInputs {
            shares: &shares,
            target_population: &target_population,
            change_rates: &change_rates,
            survival: &survival,
        };
        let result = step(&source, 2035, &inputs).unwrap();

        for b in AgeBucket::ALL {
            let value = result.set.get(b);
            prop_assert!(value >= 0.0);
            prop_assert!(value.is_finite());
            if b.is_below_membership_age() {
                prop_assert_eq!(value, 0.0);
            }
            prop_assert_eq!(round_one_decimal(value), value);

            // An empty source cohort stays empty whatever the rate and survival
            if b.start_age() >= 35 && source.get(b.predecessor().unwrap()) == 0.0 {
                prop_assert_eq!(value, 0.0);
            }
        }
    }
}
