use super::{
    LoadAverage, MemoryCounters, SensorSource, SwapCounters, TempReading, ToolOutput,
};
use std::io;

#[derive(Debug, Clone)]
pub enum FakeGpu {
    Missing,
    SpawnError(io::ErrorKind),
    Output(ToolOutput),
}

/// In-memory sensor source; counts GPU tool invocations.
#[derive(Debug, Clone)]
pub struct FakeSensors {
    pub cpus: usize,
    pub load: LoadAverage,
    pub usage: f64,
    pub temps: Vec<TempReading>,
    pub memory: MemoryCounters,
    pub swap: SwapCounters,
    pub gpu: FakeGpu,
    pub gpu_calls: usize,
}

impl Default for FakeSensors {
    fn default() -> Self {
        Self {
            cpus: 4,
            load: LoadAverage {
                one: 4.0,
                five: 2.0,
                fifteen: 1.0,
            },
            usage: 55.5,
            temps: vec![TempReading {
                group: "coretemp".to_string(),
                label: "Core 0".to_string(),
                celsius: 45.0,
            }],
            memory: MemoryCounters {
                total_bytes: 16_000_000_000,
                free_bytes: 8_000_000_000,
                available_bytes: 6_400_000_000,
            },
            swap: SwapCounters {
                total_bytes: 2_000_000_000,
                used_bytes: 200_000_000,
                free_bytes: 1_800_000_000,
            },
            gpu: FakeGpu::Missing,
            gpu_calls: 0,
        }
    }
}

impl SensorSource for FakeSensors {
    fn logical_cpus(&mut self) -> usize {
        self.cpus
    }

    fn load_average(&mut self) -> LoadAverage {
        self.load
    }

    fn cpu_usage_percent(&mut self) -> f64 {
        self.usage
    }

    fn temperatures(&mut self) -> Vec<TempReading> {
        self.temps.clone()
    }

    fn memory(&mut self) -> MemoryCounters {
        self.memory
    }

    fn swap(&mut self) -> SwapCounters {
        self.swap
    }

    fn gpu_tool(&self) -> &str {
        "nvidia-smi"
    }

    fn run_gpu_query(&mut self, _args: &[&str]) -> io::Result<ToolOutput> {
        self.gpu_calls += 1;
        match &self.gpu {
            FakeGpu::Missing => Err(io::Error::new(io::ErrorKind::NotFound, "No such file")),
            FakeGpu::SpawnError(kind) => Err(io::Error::new(*kind, "spawn failed")),
            FakeGpu::Output(out) => Ok(out.clone()),
        }
    }
}
