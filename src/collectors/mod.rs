pub mod cpu;
pub mod gpu;
pub mod memory;
pub mod system;
#[cfg(test)]
pub mod testing;

use thiserror::Error;

/// Outcome of a reader that completed without an unexpected failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Available(T),
    /// Expected absence (no sensor, tool not installed); carries the reason.
    Unavailable(String),
}

pub type ReadResult<T> = Result<Reading<T>, ReaderError>;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("система не сообщила ни одного процессора")]
    NoCpus,
    #[error("общий объём RAM равен нулю")]
    NoMemory,
    #[error("не удалось запустить {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} завершился с кодом {code:?}: {stderr}")]
    GpuQuery {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("некорректная строка ответа GPU ({fields} полей): '{line}'")]
    GpuParse { line: String, fields: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempReading {
    /// Sensor group (hwmon chip name), e.g. `coretemp`.
    pub group: String,
    pub label: String,
    pub celsius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryCounters {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapCounters {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub percent: f64,
    pub free_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapStats {
    pub percent: f64,
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// Raw output of the external GPU query tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Platform capability the readers query. `SystemSensors` is the real one.
pub trait SensorSource {
    fn logical_cpus(&mut self) -> usize;
    fn load_average(&mut self) -> LoadAverage;
    fn cpu_usage_percent(&mut self) -> f64;
    fn temperatures(&mut self) -> Vec<TempReading>;
    fn memory(&mut self) -> MemoryCounters;
    fn swap(&mut self) -> SwapCounters;
    /// Name of the GPU query tool, used in messages.
    fn gpu_tool(&self) -> &str;
    /// Runs the GPU query tool with the given arguments.
    fn run_gpu_query(&mut self, args: &[&str]) -> std::io::Result<ToolOutput>;
}
