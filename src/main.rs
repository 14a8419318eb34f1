mod collectors;
mod config;
mod logging;
mod metrics;
mod run;
mod snapshot;
mod store;
mod timepoint;

use clap::Parser;
use collectors::system::SystemSensors;
use config::{Config, ConfigError};
use logging::LogContext;
use run::{Collector, RunOutcome, RunTimer};
use snapshot::SnapshotOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use store::DayStore;
use timepoint::{partition_name, SampleTime};
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Parser, Debug)]
#[command(name = "hwsnap")]
#[command(version, about = "Снимает показания датчиков хоста и дописывает их в дневной JSON")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return ExitCode::SUCCESS;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            LogContext::console().in_scope(|| {
                error!(error = %err, "не удалось загрузить конфигурацию");
            });
            return ExitCode::FAILURE;
        }
    };

    let now = SampleTime::now();
    let log_stem = partition_name(now.date());
    let logs = match LogContext::new(&cfg.log_dir, &log_stem, &cfg.log_filter) {
        Ok(logs) => logs,
        Err(err) => {
            LogContext::console().in_scope(|| {
                error!(error = %err, "не удалось настроить логирование");
            });
            return ExitCode::FAILURE;
        }
    };

    logs.in_scope(|| run(&cfg, now))
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load_from_file(DEFAULT_CONFIG_PATH)?
        }
        None => Config::default(),
    };
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.log_dir {
        cfg.log_dir = dir.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(cfg: &Config, now: SampleTime) -> ExitCode {
    let _timer = RunTimer::start("hwsnap");
    info!(
        id = %now,
        data_dir = %cfg.data_dir.display(),
        gpu_tool = %cfg.sensors.gpu_tool,
        "запуск hwsnap"
    );

    let durations = (cfg.sensors.cpu_sample(), cfg.lock_stale_after());
    let (cpu_sample, lock_stale_after) = match durations {
        (Ok(sample), Ok(stale)) => (sample, stale),
        (Err(err), _) | (_, Err(err)) => {
            error!(error = %err, "некорректная конфигурация");
            return ExitCode::FAILURE;
        }
    };

    let sensors = SystemSensors::new(cfg.sensors.gpu_tool.clone(), cpu_sample);
    let mut collector = Collector::new(
        sensors,
        DayStore::new(&cfg.data_dir),
        SnapshotOptions::from(&cfg.sensors),
        lock_stale_after,
    )
    .with_metrics_textfile(cfg.metrics_textfile.clone());

    match collector.run_once(now) {
        Ok(RunOutcome::Saved { id, entries }) => {
            info!(id = %id, entries, "снимок сохранён");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Skipped) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "запуск завершился ошибкой");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_directories() {
        let cli = Cli::parse_from([
            "hwsnap",
            "--config",
            "/nonexistent/hwsnap.yaml",
            "--data-dir",
            "/tmp/hwsnap/json",
        ]);
        assert!(matches!(load_config(&cli), Err(ConfigError::Read { .. })));

        let cli = Cli::parse_from([
            "hwsnap",
            "--data-dir",
            "/tmp/hwsnap/json",
            "--log-dir",
            "/tmp/hwsnap/logs",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/hwsnap/json")));
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/hwsnap/logs")));
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
