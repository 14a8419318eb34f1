use crate::collectors::gpu::GpuDevices;
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const SAMPLE_TIME_FORMAT: &str = "%m-%d-%Y_%H-%M-%S";
pub const PARTITION_DATE_FORMAT: &str = "%m-%d-%Y";

/// Local wall-clock instant of a sample, rendered as `MM-DD-YYYY_HH-MM-SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleTime(pub NaiveDateTime);

impl SampleTime {
    /// Current local time, truncated to whole seconds.
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        SampleTime(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Display for SampleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SAMPLE_TIME_FORMAT))
    }
}

impl FromStr for SampleTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, SAMPLE_TIME_FORMAT).map(SampleTime)
    }
}

impl Serialize for SampleTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SampleTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn partition_name(date: NaiveDate) -> String {
    date.format(PARTITION_DATE_FORMAT).to_string()
}

/// GPU section of a sample: per-index records, or the reason there are none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpuInfo {
    Devices(GpuDevices),
    Unavailable(String),
}

/// One collection run's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Timepoint {
    pub id: SampleTime,
    pub fields: TimepointFields,
}

/// Everything stored under a sample's key. Numbers are kept as display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimepointFields {
    #[serde(default)]
    pub battery: Option<f64>,
    pub core_count: String,
    pub cpu_temp: String,
    pub cpu_util: String,
    pub cpu_1_min: String,
    pub cpu_5_min: String,
    pub cpu_15_min: String,
    pub swap_util: String,
    pub ram_free: String,
    pub ram_util: String,
    pub ram_total: String,
    pub gpu_info: GpuInfo,
}

impl TimepointFields {
    /// Re-parses the display strings; entries that are not numbers (sentinels) are skipped.
    pub fn numeric_fields(&self) -> BTreeMap<&'static str, f64> {
        let pairs: [(&'static str, &str); 10] = [
            ("core_count", self.core_count.as_str()),
            ("cpu_temp", self.cpu_temp.as_str()),
            ("cpu_util", self.cpu_util.as_str()),
            ("cpu_1_min", self.cpu_1_min.as_str()),
            ("cpu_5_min", self.cpu_5_min.as_str()),
            ("cpu_15_min", self.cpu_15_min.as_str()),
            ("swap_util", self.swap_util.as_str()),
            ("ram_free", self.ram_free.as_str()),
            ("ram_util", self.ram_util.as_str()),
            ("ram_total", self.ram_total.as_str()),
        ];
        let mut out: BTreeMap<&'static str, f64> = pairs
            .into_iter()
            .filter_map(|(name, raw)| parse_number(raw).map(|v| (name, v)))
            .collect();
        if let Some(battery) = self.battery {
            out.insert("battery", battery);
        }
        out
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v as f64);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
