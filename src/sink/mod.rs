//! Metric sinks.
//!
//! A sink is fire-and-forget: calls return nothing and never fail. Transport
//! problems are the sink's to log and drop.

mod log;
mod memory;
mod statsd;

pub use log::LogSink;
pub use memory::{Emission, MemorySink};
pub use statsd::{StatsdClient, TagFormat};

use std::sync::Arc;

pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, value: i64, tags: &[String]);

    fn histogram(&self, name: &str, value: u64, sample_rate: f64, tags: &[String]);
}

pub type SharedSink = Arc<dyn MetricsSink>;

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn increment(&self, name: &str, value: i64, tags: &[String]) {
        (**self).increment(name, value, tags)
    }

    fn histogram(&self, name: &str, value: u64, sample_rate: f64, tags: &[String]) {
        (**self).histogram(name, value, sample_rate, tags)
    }
}
