use crate::timepoint::{parse_number, GpuInfo, Timepoint};
use prometheus::{opts, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("ошибка prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("не удалось записать файл метрик {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Gauges describing the last collection run, for the node_exporter textfile collector.
pub struct Metrics {
    registry: Registry,
    collect_success: Gauge,
    last_collect_timestamp_seconds: Gauge,
    partition_entries: Gauge,
    sample_value: GaugeVec,
    gpu_value: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let collect_success = Gauge::with_opts(opts!(
            "hwsnap_collect_success",
            "1 if the last run stored a sample, 0 if the snapshot was discarded"
        ))?;
        let last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "hwsnap_last_collect_timestamp_seconds",
            "Unix time of the last collection run"
        ))?;
        let partition_entries = Gauge::with_opts(opts!(
            "hwsnap_partition_entries",
            "Samples stored in the current day partition"
        ))?;
        let sample_value = GaugeVec::new(
            opts!("hwsnap_sample_value", "Numeric fields of the last stored sample"),
            &["field"],
        )?;
        let gpu_value = GaugeVec::new(
            opts!("hwsnap_gpu_value", "Per-GPU values of the last stored sample"),
            &["gpu", "field"],
        )?;

        registry.register(Box::new(collect_success.clone()))?;
        registry.register(Box::new(last_collect_timestamp_seconds.clone()))?;
        registry.register(Box::new(partition_entries.clone()))?;
        registry.register(Box::new(sample_value.clone()))?;
        registry.register(Box::new(gpu_value.clone()))?;

        Ok(Self {
            registry,
            collect_success,
            last_collect_timestamp_seconds,
            partition_entries,
            sample_value,
            gpu_value,
        })
    }

    pub fn record_run(&self, unix_seconds: i64, stored: Option<&Timepoint>, entries: usize) {
        self.last_collect_timestamp_seconds.set(unix_seconds as f64);
        self.partition_entries.set(entries as f64);
        let Some(tp) = stored else {
            self.collect_success.set(0.0);
            return;
        };
        self.collect_success.set(1.0);

        for (field, value) in tp.fields.numeric_fields() {
            self.sample_value.with_label_values(&[field]).set(value);
        }

        if let GpuInfo::Devices(devices) = &tp.fields.gpu_info {
            for (idx, gpu) in devices {
                let values = [
                    ("temp_celsius", &gpu.gpu_temp),
                    ("utilization_percent", &gpu.gpu_utilization),
                    ("fan_speed", &gpu.gpu_fan_speed),
                    ("memory_used", &gpu.gpu_mem_used),
                    ("memory_total", &gpu.gpu_mem_total),
                    ("power_draw_watts", &gpu.gpu_draw),
                    ("power_limit_watts", &gpu.gpu_power),
                ];
                for (field, raw) in values {
                    if let Some(v) = parse_number(raw) {
                        self.gpu_value.with_label_values(&[idx.as_str(), field]).set(v);
                    }
                }
            }
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }

    /// Writes the exposition text next to `path` and renames it into place,
    /// so the textfile collector never reads a half-written file.
    pub fn write_textfile(&self, path: &Path) -> Result<(), MetricsError> {
        let text = self.render()?;
        let write_err = |source| MetricsError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = path.with_extension("prom.tmp");
        fs::write(&tmp, text).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::gpu::{GpuDevices, GpuRecord};
    use crate::timepoint::TimepointFields;
    use tempfile::tempdir;

    fn sample(gpu_info: GpuInfo) -> Timepoint {
        Timepoint {
            id: "06-01-2025_12-00-00".parse().unwrap(),
            fields: TimepointFields {
                battery: None,
                core_count: "4".to_string(),
                cpu_temp: "No CPU temperature found".to_string(),
                cpu_util: "55.50".to_string(),
                cpu_1_min: "100.00".to_string(),
                cpu_5_min: "50.00".to_string(),
                cpu_15_min: "25.00".to_string(),
                swap_util: "10.00".to_string(),
                ram_free: "8.00".to_string(),
                ram_util: "60.00".to_string(),
                ram_total: "16.00".to_string(),
                gpu_info,
            },
        }
    }

    #[test]
    fn renders_sample_fields_and_skips_sentinels() {
        let metrics = Metrics::new().unwrap();
        metrics.record_run(1_748_779_200, Some(&sample(GpuInfo::Unavailable("x".into()))), 3);
        let text = metrics.render().unwrap();

        assert!(text.contains("hwsnap_collect_success 1"));
        assert!(text.contains("hwsnap_partition_entries 3"));
        assert!(text.contains("hwsnap_sample_value{field=\"cpu_util\"} 55.5"));
        assert!(text.contains("hwsnap_sample_value{field=\"core_count\"} 4"));
        assert!(!text.contains("field=\"cpu_temp\""));
        assert!(!text.contains("hwsnap_gpu_value{"));
    }

    #[test]
    fn renders_numeric_gpu_values_only() {
        let mut devices = GpuDevices::new();
        devices.insert(
            "0".to_string(),
            GpuRecord {
                gpu_temp: "41".into(),
                gpu_utilization: "3".into(),
                gpu_fan_speed: "[N/A]".into(),
                gpu_mem_used: "512".into(),
                gpu_mem_total: "11264".into(),
                gpu_draw: "35.12".into(),
                gpu_power: "250.00".into(),
            },
        );
        let metrics = Metrics::new().unwrap();
        metrics.record_run(0, Some(&sample(GpuInfo::Devices(devices))), 1);
        let text = metrics.render().unwrap();

        assert!(text.contains("hwsnap_gpu_value{field=\"power_draw_watts\",gpu=\"0\"} 35.12"));
        assert!(!text.contains("field=\"fan_speed\""));
    }

    #[test]
    fn failed_run_reports_zero_success() {
        let metrics = Metrics::new().unwrap();
        metrics.record_run(0, None, 0);
        assert!(metrics.render().unwrap().contains("hwsnap_collect_success 0"));
    }

    #[test]
    fn textfile_is_written_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("textfile").join("hwsnap.prom");
        let metrics = Metrics::new().unwrap();
        metrics.record_run(0, None, 0);
        metrics.write_textfile(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("# TYPE hwsnap_collect_success gauge"));
        assert!(!path.with_extension("prom.tmp").exists());
    }
}
