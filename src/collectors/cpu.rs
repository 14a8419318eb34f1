use super::{LoadAverage, Reading, ReaderError, SensorSource, TempReading};

pub const CPU_TEMP_NOT_FOUND: &str = "No CPU temperature found";

pub fn read_core_count(source: &mut dyn SensorSource) -> Result<usize, ReaderError> {
    match source.logical_cpus() {
        0 => Err(ReaderError::NoCpus),
        n => Ok(n),
    }
}

/// Load averages as a percentage of total capacity when there is more than one core.
pub fn read_cpu_load(source: &mut dyn SensorSource, cores: usize) -> LoadAverage {
    normalize_load(source.load_average(), cores)
}

pub fn normalize_load(raw: LoadAverage, cores: usize) -> LoadAverage {
    if cores <= 1 {
        return raw;
    }
    let n = cores as f64;
    LoadAverage {
        one: raw.one / n * 100.0,
        five: raw.five / n * 100.0,
        fifteen: raw.fifteen / n * 100.0,
    }
}

pub fn read_cpu_utilization(source: &mut dyn SensorSource) -> f64 {
    source.cpu_usage_percent()
}

pub fn read_cpu_temp(
    source: &mut dyn SensorSource,
    group: &str,
    core_marker: &str,
) -> Reading<f64> {
    average_core_temp(&source.temperatures(), group, core_marker)
}

/// Averages the per-core entries of `group`, skipping package and other aggregate entries.
pub fn average_core_temp(
    readings: &[TempReading],
    group: &str,
    core_marker: &str,
) -> Reading<f64> {
    if readings.is_empty() {
        return Reading::Unavailable(CPU_TEMP_NOT_FOUND.to_string());
    }
    if !readings.iter().any(|r| r.group == group) {
        return Reading::Unavailable(format!(
            "CPU temperature sensor group '{group}' not recognized"
        ));
    }

    let cores: Vec<f64> = readings
        .iter()
        .filter(|r| r.group == group && r.label.contains(core_marker))
        .map(|r| r.celsius)
        .filter(|v| v.is_finite())
        .collect();
    if cores.is_empty() {
        return Reading::Unavailable(format!("No core temperatures reported by '{group}'"));
    }

    Reading::Available(cores.iter().sum::<f64>() / cores.len() as f64)
}
