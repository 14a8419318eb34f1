use crate::collectors::SensorSource;
use crate::metrics::{Metrics, MetricsError};
use crate::snapshot::{assemble, SnapshotOptions};
use crate::store::{DayStore, StoreError};
use crate::timepoint::{partition_name, SampleTime, Timepoint};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Saved { id: String, entries: usize },
    /// The snapshot was discarded; the partition was not touched.
    Skipped,
}

pub struct Collector<S> {
    source: S,
    store: DayStore,
    opts: SnapshotOptions,
    lock_stale_after: Duration,
    metrics_textfile: Option<PathBuf>,
}

impl<S: SensorSource> Collector<S> {
    pub fn new(
        source: S,
        store: DayStore,
        opts: SnapshotOptions,
        lock_stale_after: Duration,
    ) -> Self {
        Self {
            source,
            store,
            opts,
            lock_stale_after,
            metrics_textfile: None,
        }
    }

    pub fn with_metrics_textfile(mut self, path: Option<PathBuf>) -> Self {
        self.metrics_textfile = path;
        self
    }

    /// One collection: lock, load, assemble, merge, save.
    pub fn run_once(&mut self, now: SampleTime) -> Result<RunOutcome, RunError> {
        let date = now.date();
        let _lock = self.store.lock(date, self.lock_stale_after)?;

        let mut partition = if self.store.has_partition(date) {
            let partition = self.store.load(date)?;
            info!(
                date = %partition_name(date),
                entries = partition.len(),
                "JSON-данные за день загружены"
            );
            partition
        } else {
            warn!(
                date = %partition_name(date),
                "исторические данные не найдены, начинается новый день"
            );
            self.store.load(date)?
        };

        let Some(tp) = assemble(&mut self.source, &self.opts, now) else {
            warn!("сбой при опросе датчиков, снимок не сохранён; см. логи");
            self.export_metrics(now, None, partition.len());
            return Ok(RunOutcome::Skipped);
        };

        let stored = tp.clone();
        let path = self.store.save(date, tp, &mut partition)?;
        info!(
            id = %now,
            path = %path.display(),
            entries = partition.len(),
            "все датчики успешно опрошены"
        );
        self.export_metrics(now, Some(&stored), partition.len());

        Ok(RunOutcome::Saved {
            id: now.to_string(),
            entries: partition.len(),
        })
    }

    /// A failed export is logged; the run outcome stands.
    fn export_metrics(&self, now: SampleTime, stored: Option<&Timepoint>, entries: usize) {
        let Some(path) = &self.metrics_textfile else {
            return;
        };
        if let Err(err) = write_metrics(path, now, stored, entries) {
            warn!(path = %path.display(), error = %err, "не удалось записать файл метрик");
        }
    }
}

fn write_metrics(
    path: &Path,
    now: SampleTime,
    stored: Option<&Timepoint>,
    entries: usize,
) -> Result<(), MetricsError> {
    let metrics = Metrics::new()?;
    let unix = now
        .0
        .and_local_timezone(Local)
        .earliest()
        .map_or_else(|| now.0.and_utc().timestamp(), |t| t.timestamp());
    metrics.record_run(unix, stored, entries);
    metrics.write_textfile(path)
}

/// Logs how long the enclosing scope took when dropped, on every exit path.
pub struct RunTimer {
    name: &'static str,
    started: Instant,
}

impl RunTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        info!("{} ran in {}", self.name, format_elapsed(self.started.elapsed()));
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let took = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
    if took <= 60.0 {
        format!("{took:.3}s")
    } else if took <= 3600.0 {
        format!("{:.3}m", took / 60.0)
    } else {
        format!("{:.3}h", took / 3600.0)
    }
}
