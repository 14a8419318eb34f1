use super::{ReadResult, Reading, ReaderError, SensorSource, ToolOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use tracing::debug;

pub const GPU_INFO_NOT_FOUND: &str = "GPU info not found";

pub const GPU_QUERY_ARGS: [&str; 2] = [
    "--query-gpu=power.draw,power.limit,temperature.gpu,utilization.gpu,memory.used,memory.total,fan.speed,index",
    "--format=csv,noheader,nounits",
];

const GPU_QUERY_FIELDS: usize = 8;

/// Per-GPU values exactly as the query tool printed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuRecord {
    pub gpu_temp: String,
    pub gpu_utilization: String,
    pub gpu_fan_speed: String,
    pub gpu_mem_used: String,
    pub gpu_mem_total: String,
    pub gpu_draw: String,
    pub gpu_power: String,
}

pub type GpuDevices = BTreeMap<String, GpuRecord>;

pub fn tool_not_found_message(tool: &str) -> String {
    format!("{tool} command not found. Is the NVIDIA driver installed?")
}

pub fn read_gpu_info(source: &mut dyn SensorSource) -> ReadResult<GpuDevices> {
    let tool = source.gpu_tool().to_string();
    let output = match source.run_gpu_query(&GPU_QUERY_ARGS) {
        Ok(output) => output,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(tool = %tool, "утилита опроса GPU не найдена");
            return Ok(Reading::Unavailable(tool_not_found_message(&tool)));
        }
        Err(source) => return Err(ReaderError::Spawn { tool, source }),
    };
    interpret_gpu_output(&tool, output)
}

fn interpret_gpu_output(tool: &str, output: ToolOutput) -> ReadResult<GpuDevices> {
    if !output.success() {
        return Err(ReaderError::GpuQuery {
            tool: tool.to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    let devices = parse_gpu_lines(&output.stdout)?;
    if devices.is_empty() {
        return Ok(Reading::Unavailable(GPU_INFO_NOT_FOUND.to_string()));
    }
    Ok(Reading::Available(devices))
}

pub fn parse_gpu_lines(text: &str) -> Result<GpuDevices, ReaderError> {
    let mut devices = GpuDevices::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split(',').map(|v| v.trim()).collect();
        if parts.len() < GPU_QUERY_FIELDS {
            return Err(ReaderError::GpuParse {
                line: line.to_string(),
                fields: parts.len(),
            });
        }
        devices.insert(
            parts[7].to_string(),
            GpuRecord {
                gpu_temp: parts[2].to_string(),
                gpu_utilization: parts[3].to_string(),
                gpu_fan_speed: parts[6].to_string(),
                gpu_mem_used: parts[4].to_string(),
                gpu_mem_total: parts[5].to_string(),
                gpu_draw: parts[0].to_string(),
                gpu_power: parts[1].to_string(),
            },
        );
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{FakeGpu, FakeSensors};

    fn sensors_with(gpu: FakeGpu) -> FakeSensors {
        FakeSensors {
            gpu,
            ..FakeSensors::default()
        }
    }

    #[test]
    fn missing_tool_is_string_sentinel() {
        let mut sensors = sensors_with(FakeGpu::Missing);
        let reading = read_gpu_info(&mut sensors).unwrap();
        assert_eq!(
            reading,
            Reading::Unavailable(
                "nvidia-smi command not found. Is the NVIDIA driver installed?".to_string()
            )
        );
    }

    #[test]
    fn tool_without_gpu_lines_is_not_found_sentinel() {
        let mut sensors = sensors_with(FakeGpu::Output(ToolOutput {
            code: Some(0),
            stdout: "\n".to_string(),
            stderr: String::new(),
        }));
        assert_eq!(
            read_gpu_info(&mut sensors).unwrap(),
            Reading::Unavailable(GPU_INFO_NOT_FOUND.to_string())
        );
    }

    #[test]
    fn non_zero_exit_is_error() {
        let mut sensors = sensors_with(FakeGpu::Output(ToolOutput {
            code: Some(9),
            stdout: String::new(),
            stderr: "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.\n"
                .to_string(),
        }));
        match read_gpu_info(&mut sensors) {
            Err(ReaderError::GpuQuery { code, stderr, .. }) => {
                assert_eq!(code, Some(9));
                assert!(stderr.starts_with("NVIDIA-SMI has failed"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn other_spawn_failure_is_error() {
        let mut sensors = sensors_with(FakeGpu::SpawnError(ErrorKind::PermissionDenied));
        assert!(matches!(
            read_gpu_info(&mut sensors),
            Err(ReaderError::Spawn { .. })
        ));
    }

    #[test]
    fn parses_one_record_per_index() {
        let stdout = "35.12, 250.00, 41, 3, 512, 11264, 22, 0\n\
                      180.40, 320.00, 67, 98, 9800, 16376, 61, 1\n";
        let mut sensors = sensors_with(FakeGpu::Output(ToolOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
        let Reading::Available(devices) = read_gpu_info(&mut sensors).unwrap() else {
            panic!("expected devices");
        };
        assert_eq!(devices.len(), 2);
        assert_eq!(
            devices["1"],
            GpuRecord {
                gpu_temp: "67".to_string(),
                gpu_utilization: "98".to_string(),
                gpu_fan_speed: "61".to_string(),
                gpu_mem_used: "9800".to_string(),
                gpu_mem_total: "16376".to_string(),
                gpu_draw: "180.40".to_string(),
                gpu_power: "320.00".to_string(),
            }
        );
        assert_eq!(devices["0"].gpu_fan_speed, "22");
    }

    #[test]
    fn values_are_kept_verbatim() {
        let devices = parse_gpu_lines("[N/A], [N/A], 38, 0, 1, 4096, [N/A], 0").unwrap();
        assert_eq!(devices["0"].gpu_draw, "[N/A]");
        assert_eq!(devices["0"].gpu_fan_speed, "[N/A]");
    }

    #[test]
    fn short_line_is_parse_error() {
        let err = parse_gpu_lines("35.12, 250.00, 41").unwrap_err();
        assert!(matches!(err, ReaderError::GpuParse { fields: 3, .. }));
    }
}
