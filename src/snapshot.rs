use crate::collectors::cpu::{read_core_count, read_cpu_load, read_cpu_temp, read_cpu_utilization};
use crate::collectors::gpu::read_gpu_info;
use crate::collectors::memory::{read_ram, read_swap};
use crate::collectors::{Reading, ReaderError, SensorSource};
use crate::config::SensorsConfig;
use crate::timepoint::{GpuInfo, SampleTime, Timepoint, TimepointFields};
use tracing::{debug, warn};

const BYTES_PER_GB: f64 = 1_000_000_000.0;

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub temperature_group: String,
    pub core_label_marker: String,
}

impl From<&SensorsConfig> for SnapshotOptions {
    fn from(cfg: &SensorsConfig) -> Self {
        Self {
            temperature_group: cfg.temperature_group.clone(),
            core_label_marker: cfg.core_label_marker.clone(),
        }
    }
}

/// Queries every reader once. Any reader failure discards the whole snapshot.
pub fn assemble(
    source: &mut dyn SensorSource,
    opts: &SnapshotOptions,
    id: SampleTime,
) -> Option<Timepoint> {
    match try_assemble(source, opts, id) {
        Ok(tp) => {
            debug!(id = %tp.id, "снимок датчиков собран");
            Some(tp)
        }
        Err(err) => {
            warn!(id = %id, error = %err, "не удалось собрать снимок датчиков");
            None
        }
    }
}

pub fn try_assemble(
    source: &mut dyn SensorSource,
    opts: &SnapshotOptions,
    id: SampleTime,
) -> Result<Timepoint, ReaderError> {
    // Every reader runs once before any failure is reported.
    let cores = read_core_count(source);
    let load = read_cpu_load(source, cores.as_ref().copied().unwrap_or(0));
    let cpu_temp = read_cpu_temp(source, &opts.temperature_group, &opts.core_label_marker);
    let cpu_util = read_cpu_utilization(source);
    let ram = read_ram(source);
    let swap = read_swap(source);
    debug!(
        swap_free = swap.free_bytes,
        swap_total = swap.total_bytes,
        "прочитан swap"
    );
    let gpu = read_gpu_info(source);

    let cores = cores?;
    let ram = ram?;
    let gpu = gpu?;

    let cpu_temp = match cpu_temp {
        Reading::Available(celsius) => format!("{celsius:.2}"),
        Reading::Unavailable(reason) => reason,
    };
    let gpu_info = match gpu {
        Reading::Available(devices) => GpuInfo::Devices(devices),
        Reading::Unavailable(reason) => GpuInfo::Unavailable(reason),
    };

    Ok(Timepoint {
        id,
        fields: TimepointFields {
            battery: None,
            core_count: cores.to_string(),
            cpu_temp,
            cpu_util: format!("{cpu_util:.2}"),
            cpu_1_min: format!("{:.2}", load.one),
            cpu_5_min: format!("{:.2}", load.five),
            cpu_15_min: format!("{:.2}", load.fifteen),
            swap_util: format!("{:.2}", swap.percent),
            ram_free: format!("{:.2}", ram.free_bytes as f64 / BYTES_PER_GB),
            ram_util: format!("{:.2}", ram.percent),
            ram_total: format!("{:.2}", ram.total_bytes as f64 / BYTES_PER_GB),
            gpu_info,
        },
    })
}
