pub mod encode;
pub mod lock;

use crate::timepoint::{partition_name, Timepoint, TimepointFields};
use chrono::NaiveDate;
use lock::{LockAttempt, PartitionLock};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// All samples of one calendar day keyed by `MM-DD-YYYY_HH-MM-SS`.
pub type Partition = BTreeMap<String, TimepointFields>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("не удалось прочитать {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("не удалось разобрать JSON в {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("не удалось записать {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("не удалось сериализовать раздел {date}: {source}")]
    Encode {
        date: String,
        source: serde_json::Error,
    },
    #[error("поле battery снимка {id} не является конечным числом")]
    NonFinite { id: String },
    #[error("раздел {path} заблокирован другим процессом ({age} назад)")]
    Locked { path: String, age: String },
    #[error("не удалось заблокировать {path}: {source}")]
    Lock { path: String, source: io::Error },
}

/// Day-partitioned JSON store: one `<MM-DD-YYYY>.json` per day under `dir`.
#[derive(Debug, Clone)]
pub struct DayStore {
    dir: PathBuf,
}

impl DayStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", partition_name(date)))
    }

    pub fn has_partition(&self, date: NaiveDate) -> bool {
        self.partition_path(date).is_file()
    }

    /// Takes the partition's lock file, creating the data directory if needed.
    pub fn lock(
        &self,
        date: NaiveDate,
        stale_after: Duration,
    ) -> Result<PartitionLock, StoreError> {
        let path = self.dir.join(format!("{}.json.lock", partition_name(date)));
        let lock_err = |source| StoreError::Lock {
            path: path.display().to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(lock_err)?;
        match PartitionLock::acquire(&path, stale_after).map_err(lock_err)? {
            LockAttempt::Acquired(lock) => {
                debug!(path = %lock.path().display(), "раздел заблокирован");
                Ok(lock)
            }
            LockAttempt::Held { age } => Err(StoreError::Locked {
                path: path.display().to_string(),
                age: humantime::format_duration(Duration::from_secs(age.as_secs())).to_string(),
            }),
        }
    }

    /// Loads the day's partition, or an empty one when no file exists yet.
    pub fn load(&self, date: NaiveDate) -> Result<Partition, StoreError> {
        let path = self.partition_path(date);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Partition::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Merges `tp` into `partition` under its id and rewrites the whole file.
    /// The file is replaced through a rename, so readers never see a partial write.
    pub fn save(
        &self,
        date: NaiveDate,
        tp: Timepoint,
        partition: &mut Partition,
    ) -> Result<PathBuf, StoreError> {
        if tp.fields.battery.is_some_and(|b| !b.is_finite()) {
            return Err(StoreError::NonFinite {
                id: tp.id.to_string(),
            });
        }
        partition.insert(tp.id.to_string(), tp.fields);

        let bytes = encode::to_pretty_json(partition).map_err(|source| StoreError::Encode {
            date: partition_name(date),
            source,
        })?;

        let path = self.partition_path(date);
        let tmp = self.dir.join(format!(".{}.json.tmp", partition_name(date)));
        let write_err = |source| StoreError::Write {
            path: path.display().to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        fs::write(&tmp, &bytes).map_err(write_err)?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(err));
        }
        debug!(
            path = %path.display(),
            entries = partition.len(),
            bytes = bytes.len(),
            "раздел записан"
        );
        Ok(path)
    }
}
