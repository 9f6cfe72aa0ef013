//! Metric - latest logged point of a run metric

use serde::{Deserialize, Serialize};

/// A single metric point as MLflow reports it on a run.
///
/// `Run.data.metrics` holds the latest point per key. The timestamp and step
/// travel with the value so an import can log the point exactly as it was
/// recorded at the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    key: String,
    value: f64,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    step: i64,
}

impl Metric {
    /// Create a metric point at step 0 with timestamp 0.
    ///
    /// # Arguments
    ///
    /// * `key` - Metric name (e.g., "loss", "rmse")
    /// * `value` - Metric value
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: 0,
            step: 0,
        }
    }

    /// Create a builder for a metric point with explicit timestamp/step.
    #[must_use]
    pub fn builder(key: impl Into<String>, value: f64) -> MetricBuilder {
        MetricBuilder::new(key, value)
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the wall-clock timestamp in milliseconds.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Get the step number.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }
}

/// Builder for `Metric`.
#[derive(Debug)]
pub struct MetricBuilder {
    key: String,
    value: f64,
    timestamp: i64,
    step: i64,
}

impl MetricBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: 0,
            step: 0,
        }
    }

    /// Set the timestamp in milliseconds.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the step.
    #[must_use]
    pub const fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// Build the `Metric`.
    #[must_use]
    pub fn build(self) -> Metric {
        Metric {
            key: self.key,
            value: self.value,
            timestamp: self.timestamp,
            step: self.step,
        }
    }
}
