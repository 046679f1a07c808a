use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BuildInfoLabels {
    pub version: String,
    pub git_sha: String,
}

/// Self-telemetry of the interceptor and its StatsD client, scraped from
/// `/metrics`. Independent of what is emitted to StatsD.
pub struct Telemetry {
    registry: Registry,

    // Interceptor
    pub requests_observed_total: Counter,
    pub interceptor_errors_total: Family<ErrorLabels, Counter>,

    // StatsD client
    pub statsd_packets_sent_total: Counter,
    pub statsd_bytes_sent_total: Counter,
    pub statsd_send_errors_total: Counter,
    pub statsd_sampled_out_total: Counter,

    // Build info
    #[allow(dead_code)]
    pub build_info: Family<BuildInfoLabels, Gauge>,
}

impl Telemetry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_observed_total = Counter::default();
        registry.register(
            "statsd_interceptor_requests",
            "Requests for which metrics were emitted",
            requests_observed_total.clone(),
        );

        let interceptor_errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "statsd_interceptor_errors",
            "Requests whose metrics could not be emitted",
            interceptor_errors_total.clone(),
        );

        let statsd_packets_sent_total = Counter::default();
        registry.register(
            "statsd_packets_sent",
            "StatsD datagrams handed to the socket",
            statsd_packets_sent_total.clone(),
        );

        let statsd_bytes_sent_total = Counter::default();
        registry.register(
            "statsd_bytes_sent",
            "Bytes of StatsD datagrams handed to the socket",
            statsd_bytes_sent_total.clone(),
        );

        let statsd_send_errors_total = Counter::default();
        registry.register(
            "statsd_send_errors",
            "StatsD datagrams the socket refused",
            statsd_send_errors_total.clone(),
        );

        let statsd_sampled_out_total = Counter::default();
        registry.register(
            "statsd_sampled_out",
            "StatsD datagrams skipped by client-side sampling",
            statsd_sampled_out_total.clone(),
        );

        // Build info
        let build_info = Family::<BuildInfoLabels, Gauge>::default();
        registry.register("build_info", "Build information", build_info.clone());

        let version = env!("CARGO_PKG_VERSION").to_string();
        let git_sha = option_env!("GIT_SHA").unwrap_or("unknown").to_string();
        build_info
            .get_or_create(&BuildInfoLabels { version, git_sha })
            .set(1);

        Self {
            registry,
            requests_observed_total,
            interceptor_errors_total,
            statsd_packets_sent_total,
            statsd_bytes_sent_total,
            statsd_send_errors_total,
            statsd_sampled_out_total,
            build_info,
        }
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Writing into a String cannot fail
        let _ = encode(&mut buffer, &self.registry);
        buffer
    }

    pub fn record_error(&self, kind: &str) {
        self.interceptor_errors_total
            .get_or_create(&ErrorLabels {
                kind: kind.to_string(),
            })
            .inc();
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedTelemetry = Arc<Telemetry>;
