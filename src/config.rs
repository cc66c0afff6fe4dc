use crate::stillness::{ReferenceUpdate, StillnessMetric};
use serde::Deserialize;
use std::time::Duration;

/// Which comparator the stillness detector runs. The threshold for
/// `AbsDiffSum` is an absolute pixel-difference sum (e.g. 1_000_000);
/// for `Ssim` it is a similarity score in (0, 1) (e.g. 0.9). Both are
/// read from the single `stillness_threshold` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    AbsDiffSum,
    Ssim,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub poll_interval_ms: u64,
    pub result_poll_interval_ms: u64,
    pub stillness_metric: MetricKind,
    pub stillness_threshold: f64,
    pub reference_update: ReferenceUpdate,
    pub stage_timeout_ms: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            result_poll_interval_ms: 50,
            stillness_metric: MetricKind::AbsDiffSum,
            stillness_threshold: 1_000_000.0,
            reference_update: ReferenceUpdate::OnMotionOnly,
            stage_timeout_ms: 30_000,
        }
    }
}

impl Configuration {
    /// Layers an optional `pinwatch` config file and `PINWATCH_*`
    /// environment variables over the defaults.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name("pinwatch").required(false))
            .add_source(::config::Environment::with_prefix("PINWATCH").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_interval_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn metric(&self) -> StillnessMetric {
        match self.stillness_metric {
            MetricKind::AbsDiffSum => StillnessMetric::AbsDiffSum {
                threshold: self.stillness_threshold as u64,
            },
            MetricKind::Ssim => StillnessMetric::Ssim {
                threshold: self.stillness_threshold,
            },
        }
    }
}
