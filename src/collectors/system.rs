use crate::collectors::{
    LoadAverage, MemoryCounters, SensorSource, SwapCounters, TempReading, ToolOutput,
};
use std::io;
use std::process::Command;
use std::time::Duration;
use sysinfo::{ComponentExt, CpuExt, System, SystemExt};
use tracing::debug;

/// Host sensors backed by sysinfo and the external GPU query tool.
pub struct SystemSensors {
    system: System,
    gpu_tool: String,
    cpu_sample: Duration,
}

impl SystemSensors {
    pub fn new(gpu_tool: impl Into<String>, cpu_sample: Duration) -> Self {
        Self {
            system: System::new(),
            gpu_tool: gpu_tool.into(),
            cpu_sample: cpu_sample.max(System::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }
}

impl SensorSource for SystemSensors {
    fn logical_cpus(&mut self) -> usize {
        self.system.refresh_cpu();
        self.system.cpus().len()
    }

    fn load_average(&mut self) -> LoadAverage {
        let load = self.system.load_average();
        LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        }
    }

    fn cpu_usage_percent(&mut self) -> f64 {
        // Usage is a delta between two refreshes.
        self.system.refresh_cpu();
        std::thread::sleep(self.cpu_sample);
        self.system.refresh_cpu();
        self.system.global_cpu_info().cpu_usage() as f64
    }

    fn temperatures(&mut self) -> Vec<TempReading> {
        self.system.refresh_components_list();
        self.system.refresh_components();
        let temps: Vec<TempReading> = self
            .system
            .components()
            .iter()
            .map(|c| split_component_label(c.label(), c.temperature() as f64))
            .collect();
        debug!(sensors = temps.len(), "прочитаны датчики температуры");
        temps
    }

    fn memory(&mut self) -> MemoryCounters {
        self.system.refresh_memory();
        MemoryCounters {
            total_bytes: self.system.total_memory(),
            free_bytes: self.system.free_memory(),
            available_bytes: self.system.available_memory(),
        }
    }

    fn swap(&mut self) -> SwapCounters {
        self.system.refresh_memory();
        SwapCounters {
            total_bytes: self.system.total_swap(),
            used_bytes: self.system.used_swap(),
            free_bytes: self.system.free_swap(),
        }
    }

    fn gpu_tool(&self) -> &str {
        &self.gpu_tool
    }

    fn run_gpu_query(&mut self, args: &[&str]) -> io::Result<ToolOutput> {
        run_tool(&self.gpu_tool, args)
    }
}

/// sysinfo labels components as `"<chip> <sensor label>"`, e.g. `"coretemp Core 0"`.
fn split_component_label(label: &str, celsius: f64) -> TempReading {
    let (group, rest) = label.split_once(' ').unwrap_or((label, ""));
    TempReading {
        group: group.to_string(),
        label: rest.trim().to_string(),
        celsius,
    }
}

pub fn run_tool(tool: &str, args: &[&str]) -> io::Result<ToolOutput> {
    let output = Command::new(tool).args(args).output()?;
    Ok(ToolOutput {
        code: output.status.code(),
        stdout: decode_cmd_stdout(&output.stdout),
        stderr: decode_cmd_stdout(&output.stderr),
    })
}

fn decode_cmd_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
