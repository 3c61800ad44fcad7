//! In-process metrics for archive reading and worker scheduling.
//!
//! Recording is a no-op unless the `telemetry` feature is enabled. Every
//! distinct label set of a metric is kept as its own series, rendered as
//! `name{key=value,...}` with labels sorted by key; a metric recorded without
//! labels is stored under its bare name.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub mod tags;
pub mod worker;

pub use worker::{DefaultWorkerTelemetry, WorkerTelemetry};

pub type Labels<'a> = &'a [(&'a str, &'a str)];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl HistogramSnapshot {
    fn combine(self, other: Self) -> Self {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let count = self.count.saturating_add(other.count);
        let total = self.total.saturating_add(other.total);
        Self {
            count,
            total,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            mean: total as f64 / count as f64,
        }
    }
}

/// Point-in-time copy of every recorded series, keyed by rendered series name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

impl TelemetrySnapshot {
    /// Sum of a counter over all of its label sets.
    pub fn counter(&self, name: &str) -> Option<u64> {
        series_of(&self.counters, name).fold(None, |sum, value| {
            Some(sum.unwrap_or(0u64).saturating_add(*value))
        })
    }

    /// Value of one labeled counter series.
    pub fn counter_with(&self, name: &str, labels: Labels<'_>) -> Option<u64> {
        self.counters.get(&series_key(name, labels)).copied()
    }

    /// Sum of a gauge over all of its label sets.
    pub fn gauge(&self, name: &str) -> Option<u64> {
        series_of(&self.gauges, name).fold(None, |sum, value| {
            Some(sum.unwrap_or(0u64).saturating_add(*value))
        })
    }

    /// Histogram merged over all of its label sets.
    pub fn histogram(&self, name: &str) -> Option<HistogramSnapshot> {
        series_of(&self.histograms, name).fold(None, |merged, value| {
            Some(merged.unwrap_or_default().combine(*value))
        })
    }

    pub fn histogram_with(&self, name: &str, labels: Labels<'_>) -> Option<HistogramSnapshot> {
        self.histograms.get(&series_key(name, labels)).copied()
    }
}

fn series_of<'m, V>(map: &'m BTreeMap<String, V>, name: &'m str) -> impl Iterator<Item = &'m V> {
    map.range(name.to_owned()..)
        .take_while(move |(key, _)| key.starts_with(name))
        .filter(move |(key, _)| key.len() == name.len() || key[name.len()..].starts_with('{'))
        .map(|(_, value)| value)
}

/// Renders the registry key of a metric series.
pub fn series_key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_owned();
    }

    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    let rendered: Vec<String> = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}

#[inline]
pub fn elapsed_us(started_at: Instant) -> u64 {
    duration_us(started_at.elapsed())
}

#[inline]
pub fn duration_us(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}

#[inline]
pub fn increment_counter(name: &str, value: u64, labels: Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update(Series::Counter, name, labels, |metric| {
        metric.value = metric.value.saturating_add(value)
    });

    let _ = (name, value, labels);
}

#[inline]
pub fn record_histogram(name: &str, value: u64, labels: Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update(Series::Histogram, name, labels, |metric| metric.record(value));

    let _ = (name, value, labels);
}

#[inline]
pub fn set_gauge(name: &str, value: u64, labels: Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update(Series::Gauge, name, labels, |metric| metric.value = value);

    let _ = (name, value, labels);
}

/// Moves a gauge up by `delta`, or down with a floor at zero when `delta`
/// is negative.
#[inline]
pub fn adjust_gauge(name: &str, delta: i64, labels: Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update(Series::Gauge, name, labels, |metric| {
        metric.value = metric.value.saturating_add_signed(delta)
    });

    let _ = (name, delta, labels);
}

pub fn snapshot() -> TelemetrySnapshot {
    #[cfg(feature = "telemetry")]
    {
        registry::snapshot()
    }

    #[cfg(not(feature = "telemetry"))]
    {
        TelemetrySnapshot::default()
    }
}

pub fn reset() {
    #[cfg(feature = "telemetry")]
    registry::reset();
}

#[cfg(feature = "telemetry")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Series {
    Counter,
    Gauge,
    Histogram,
}

#[cfg(feature = "telemetry")]
mod registry {
    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard};

    use super::{HistogramSnapshot, Labels, Series, TelemetrySnapshot, series_key};

    /// One series: a plain value for counters and gauges, sample statistics
    /// for histograms.
    #[derive(Debug, Default)]
    pub(super) struct Metric {
        pub(super) value: u64,
        samples: u64,
        sum: u64,
        min: u64,
        max: u64,
    }

    impl Metric {
        pub(super) fn record(&mut self, sample: u64) {
            self.min = if self.samples == 0 { sample } else { self.min.min(sample) };
            self.max = self.max.max(sample);
            self.samples = self.samples.saturating_add(1);
            self.sum = self.sum.saturating_add(sample);
        }

        fn histogram(&self) -> HistogramSnapshot {
            HistogramSnapshot {
                count: self.samples,
                total: self.sum,
                min: self.min,
                max: self.max,
                mean: if self.samples == 0 {
                    0.0
                } else {
                    self.sum as f64 / self.samples as f64
                },
            }
        }
    }

    static METRICS: Mutex<BTreeMap<(Series, String), Metric>> = Mutex::new(BTreeMap::new());

    fn metrics() -> MutexGuard<'static, BTreeMap<(Series, String), Metric>> {
        METRICS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn update(series: Series, name: &str, labels: Labels<'_>, apply: impl FnOnce(&mut Metric)) {
        apply(metrics().entry((series, series_key(name, labels))).or_default());
    }

    pub(super) fn snapshot() -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        for ((series, key), metric) in metrics().iter() {
            match series {
                Series::Counter => {
                    snapshot.counters.insert(key.clone(), metric.value);
                }
                Series::Gauge => {
                    snapshot.gauges.insert(key.clone(), metric.value);
                }
                Series::Histogram => {
                    snapshot.histograms.insert(key.clone(), metric.histogram());
                }
            }
        }
        snapshot
    }

    pub(super) fn reset() {
        metrics().clear();
    }
}
