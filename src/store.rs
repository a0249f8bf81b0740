//! Durable storage of projected cohort sets
//!
//! Each (region, year) set lives under its own key `<region_code>_<year>`. Downstream
//! consumers (pyramid overlays, exports) only ever read through `CohortStore::read`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::cohort::{CohortSet, MemberCohortRecord};
use crate::error::StoreError;

const HEADER: [&str; 4] = ["year", "region_code", "age_bucket", "member_count"];

/// Stable storage key for a region/year set
pub fn set_key(region_code: &str, year: u32) -> String {
    format!("{}_{}", region_code, year)
}

/// Storage for cohort sets. Implementations must be safe to share across the region
/// workers; each worker only writes its own region's keys.
pub trait CohortStore: Send + Sync {
    /// Persist a set, replacing any previous set for the same region and year
    fn write(&self, set: &CohortSet) -> Result<(), StoreError>;

    /// Read a set back; Ok(None) if nothing was stored for that key
    fn read(&self, region_code: &str, year: u32) -> Result<Option<CohortSet>, StoreError>;

    /// Drop the set stored for a region and year; a missing set is not an error
    fn remove(&self, region_code: &str, year: u32) -> Result<(), StoreError>;
}

/// Render a set as CSV with member counts to one decimal
pub fn write_csv<W: Write>(writer: W, set: &CohortSet) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for record in set.records() {
        csv_writer.write_record([
            record.year.to_string(),
            record.region_code.clone(),
            record.age_bucket.label(),
            format!("{:.1}", record.member_count),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Store writing one CSV file per set into a directory
#[derive(Debug, Clone)]
pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    /// Create the store, creating the directory if needed
    pub fn create(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Open an existing output directory without creating anything
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "output directory does not exist",
                ),
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, region_code: &str, year: u32) -> PathBuf {
        self.dir.join(format!("{}.csv", set_key(region_code, year)))
    }
}

impl CohortStore for CsvDirStore {
    /// Writes to a temporary sibling and renames it into place, so a failed write
    /// never leaves a partial file under the final name
    fn write(&self, set: &CohortSet) -> Result<(), StoreError> {
        let path = self.path_for(&set.region_code, set.year);
        let tmp = path.with_extension("csv.tmp");

        let io_err = |p: &Path| {
            let p = p.to_path_buf();
            move |source| StoreError::Io { path: p, source }
        };

        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        if let Err(source) = write_csv(file, set) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Csv { path: tmp, source });
        }
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    fn read(&self, region_code: &str, year: u32) -> Result<Option<CohortSet>, StoreError> {
        let path = self.path_for(region_code, year);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|source| StoreError::Csv {
            path: path.clone(),
            source,
        })?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<MemberCohortRecord>, _>>()
            .map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;

        CohortSet::from_records(&records)
            .map(Some)
            .map_err(|message| StoreError::Malformed { path, message })
    }

    fn remove(&self, region_code: &str, year: u32) -> Result<(), StoreError> {
        let path = self.path_for(region_code, year);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// In-memory store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<BTreeMap<(String, u32), CohortSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored set in (region, year) order
    pub fn sets(&self) -> Vec<CohortSet> {
        match self.sets.lock() {
            Ok(sets) => sets.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CohortStore for MemoryStore {
    fn write(&self, set: &CohortSet) -> Result<(), StoreError> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".to_string()))?;
        sets.insert((set.region_code.clone(), set.year), set.clone());
        Ok(())
    }

    fn read(&self, region_code: &str, year: u32) -> Result<Option<CohortSet>, StoreError> {
        let sets = self
            .sets
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".to_string()))?;
        Ok(sets.get(&(region_code.to_string(), year)).cloned())
    }

    fn remove(&self, region_code: &str, year: u32) -> Result<(), StoreError> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".to_string()))?;
        sets.remove(&(region_code.to_string(), year));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::AgeBucket;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "membership_projection_store_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_set() -> CohortSet {
        let mut set = CohortSet::empty("11", 2030);
        set.set("40-44".parse().unwrap(), 146.2);
        set.set("75-79".parse().unwrap(), 431.2);
        set
    }

    #[test]
    fn test_csv_format() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample_set()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], "year,region_code,age_bucket,member_count");
        assert_eq!(lines[1], "2030,11,0-4,0.0");
        assert_eq!(lines[9], "2030,11,40-44,146.2");
        assert_eq!(lines[16], "2030,11,75-79,431.2");
    }

    #[test]
    fn test_dir_store_round_trip() {
        let dir = temp_dir("round_trip");
        let store = CsvDirStore::create(&dir).unwrap();
        let set = sample_set();

        store.write(&set).unwrap();
        assert!(store.path_for("11", 2030).ends_with("11_2030.csv"));
        assert!(!store.path_for("11", 2030).with_extension("csv.tmp").exists());

        let back = store.read("11", 2030).unwrap().unwrap();
        assert_eq!(back, set);
        assert_eq!(back.get(AgeBucket::ALL[0]), 0.0);
        assert!(store.read("11", 2035).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dir_store_remove() {
        let dir = temp_dir("remove");
        let store = CsvDirStore::create(&dir).unwrap();
        store.write(&sample_set()).unwrap();

        store.remove("11", 2030).unwrap();
        assert!(!store.path_for("11", 2030).exists());
        assert!(store.read("11", 2030).unwrap().is_none());
        // Removing again is fine
        store.remove("11", 2030).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_open_does_not_create() {
        let dir = temp_dir("open_missing");
        assert!(CsvDirStore::open(&dir).is_err());
        assert!(!dir.exists());

        CsvDirStore::create(&dir).unwrap();
        let store = CsvDirStore::open(&dir).unwrap();
        assert!(store.read("11", 2030).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.write(&sample_set()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read("11", 2030).unwrap(), Some(sample_set()));
        assert_eq!(store.read("26", 2030).unwrap(), None);

        store.remove("11", 2030).unwrap();
        assert!(store.is_empty());
    }
}
