use super::MetricsSink;
use tracing::info;

/// Sink that writes each metric as a log event instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn increment(&self, name: &str, value: i64, tags: &[String]) {
        info!(metric = name, kind = "counter", value, tags = ?tags, "metric");
    }

    fn histogram(&self, name: &str, value: u64, sample_rate: f64, tags: &[String]) {
        info!(
            metric = name,
            kind = "histogram",
            value,
            sample_rate,
            tags = ?tags,
            "metric"
        );
    }
}
