//! Request timing interceptor.
//!
//! For every completed request the interceptor emits
//!
//! - `<stat>.response_time` histogram, in whole milliseconds, always;
//! - `<stat>.response_code.<status>` and `<stat>.response_code.all` counters,
//!   when response codes are enabled.
//!
//! All three carry the same tag set: the static tags followed by `route`,
//! `method`, `protocol`, `path` and `response_code`, each only when enabled.

use crate::adapter::{
    AdapterFactory, AdapterView, AxumAdapter, Framework, HttpAdapterHost, HyperAdapter, RequestHead,
    RequestResponseAdapter, ResponseHead,
};
use crate::config::{DEFAULT_DELIM, DEFAULT_STAT, InterceptorConfig, StatsdConfig};
use crate::errors::InterceptorError;
use crate::metrics::SharedTelemetry;
use crate::sink::{SharedSink, StatsdClient};
use crate::timing::{MonotonicClock, RequestTimer, SharedClock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Construction options. Every field is optional; unset fields fall back to
/// the same defaults as an empty environment.
#[derive(Clone, Default)]
pub struct InterceptorOptions {
    /// Where metrics go. Defaults to a [`StatsdClient`] on `127.0.0.1:8125`.
    pub sink: Option<SharedSink>,
    /// Base metric name. Empty means `node.express.router`.
    pub stat: Option<String>,
    pub tags: Vec<String>,
    pub path: bool,
    /// Prefix the router mount path onto the route tag.
    pub base_url: bool,
    pub method: bool,
    pub protocol: bool,
    pub response_code: bool,
    /// Replacement for `|` in route tags. Empty means `-`.
    pub delim: Option<String>,
    /// Overrides framework detection entirely.
    pub adapter: Option<AdapterFactory>,
    pub http_adapter_host: Option<Arc<dyn HttpAdapterHost>>,
    pub clock: Option<SharedClock>,
    pub telemetry: Option<SharedTelemetry>,
}

impl InterceptorOptions {
    pub fn from_config(config: &InterceptorConfig) -> Self {
        Self {
            stat: Some(config.stat.clone()),
            tags: config.tags.clone(),
            path: config.path,
            base_url: config.base_url,
            method: config.method,
            protocol: config.protocol,
            response_code: config.response_code,
            delim: Some(config.delim.clone()),
            http_adapter_host: config
                .http_adapter
                .clone()
                .map(|name| Arc::new(name) as Arc<dyn HttpAdapterHost>),
            ..Self::default()
        }
    }

    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn framework(mut self, framework: Framework) -> Self {
        self.http_adapter_host = Some(Arc::new(framework));
        self
    }

    pub fn adapter<F>(mut self, factory: F) -> Self
    where
        F: Fn(&RequestHead, &ResponseHead) -> AdapterView + Send + Sync + 'static,
    {
        self.adapter = Some(Arc::new(factory));
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

pub struct StatsdInterceptor {
    sink: SharedSink,
    stat: String,
    tags: Vec<String>,
    path: bool,
    base_url: bool,
    method: bool,
    protocol: bool,
    response_code: bool,
    delim: String,
    adapter: Option<AdapterFactory>,
    http_adapter_host: Option<Arc<dyn HttpAdapterHost>>,
    clock: SharedClock,
    telemetry: Option<SharedTelemetry>,
}

impl StatsdInterceptor {
    /// Resolve options. Fails only when the default StatsD client cannot be
    /// created; the framework is not checked until the first response.
    pub fn new(options: InterceptorOptions) -> Result<Self, InterceptorError> {
        let sink = match options.sink {
            Some(sink) => sink,
            None => {
                let mut client = StatsdClient::new(&StatsdConfig::default())?;
                if let Some(telemetry) = &options.telemetry {
                    client = client.with_telemetry(telemetry.clone());
                }
                Arc::new(client)
            }
        };

        Ok(Self {
            sink,
            stat: non_empty(options.stat).unwrap_or_else(|| DEFAULT_STAT.to_string()),
            tags: options.tags,
            path: options.path,
            base_url: options.base_url,
            method: options.method,
            protocol: options.protocol,
            response_code: options.response_code,
            delim: non_empty(options.delim).unwrap_or_else(|| DEFAULT_DELIM.to_string()),
            adapter: options.adapter,
            http_adapter_host: options.http_adapter_host,
            clock: options
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            telemetry: options.telemetry,
        })
    }

    pub fn stat(&self) -> &str {
        &self.stat
    }

    /// Take the start reading for a request.
    pub fn start(&self) -> RequestTimer {
        RequestTimer::start(self.clock.as_ref())
    }

    /// Emit metrics for a finished request.
    pub fn on_response(
        &self,
        timer: RequestTimer,
        request: &RequestHead,
        response: &ResponseHead,
    ) -> Result<(), InterceptorError> {
        let elapsed_ms = timer.elapsed_ms(self.clock.as_ref());

        if let Some(factory) = &self.adapter {
            let view = factory(request, response);
            self.emit(&view, elapsed_ms);
            return Ok(());
        }

        match self.framework()? {
            Framework::Axum => self.emit(&AxumAdapter::new(request, response), elapsed_ms),
            Framework::Hyper => self.emit(&HyperAdapter::new(request, response), elapsed_ms),
        }
        Ok(())
    }

    /// [`on_response`](Self::on_response) for wrap points: failures are
    /// logged and counted, never returned.
    pub fn record(&self, timer: RequestTimer, request: &RequestHead, response: &ResponseHead) {
        if let Err(e) = self.on_response(timer, request, response) {
            warn!(
                error = %e,
                method = %request.method,
                path = %request.uri.path(),
                "Failed to emit request metrics"
            );
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_error(e.kind());
            }
        }
    }

    fn framework(&self) -> Result<Framework, InterceptorError> {
        match &self.http_adapter_host {
            Some(host) => host.adapter_type().parse(),
            None => Ok(Framework::default()),
        }
    }

    fn emit(&self, adapter: &dyn RequestResponseAdapter, elapsed_ms: u64) {
        let tags = self.build_tags(adapter);

        if self.response_code {
            let status = adapter.status_code();
            self.sink
                .increment(&format!("{}.response_code.{}", self.stat, status), 1, &tags);
            self.sink
                .increment(&format!("{}.response_code.all", self.stat), 1, &tags);
        }

        self.sink
            .histogram(&format!("{}.response_time", self.stat), elapsed_ms, 1.0, &tags);

        if let Some(telemetry) = &self.telemetry {
            telemetry.requests_observed_total.inc();
        }
        debug!(stat = %self.stat, elapsed_ms, tags = ?tags, "Emitted request metrics");
    }

    /// Tag set for one request, in emission order.
    pub fn build_tags(&self, adapter: &dyn RequestResponseAdapter) -> Vec<String> {
        let mut tags = self.tags.clone();

        let route = self.get_route(adapter);
        if !route.is_empty() {
            tags.push(format!("route:{route}"));
        }

        if self.method {
            tags.push(format!("method:{}", adapter.method().to_lowercase()));
        }

        if self.protocol {
            if let Some(protocol) = adapter.protocol().filter(|p| !p.is_empty()) {
                tags.push(format!("protocol:{protocol}"));
            }
        }

        if self.path {
            tags.push(format!("path:{}", adapter.path()));
        }

        if self.response_code {
            tags.push(format!("response_code:{}", adapter.status_code()));
        }

        tags
    }

    /// Route tag value: optional base URL followed by the route, escaped as one.
    pub fn get_route(&self, adapter: &dyn RequestResponseAdapter) -> String {
        let base_url = if self.base_url {
            adapter.base_url().unwrap_or("")
        } else {
            ""
        };
        self.replace_pipe_char(format!("{base_url}{}", adapter.route()))
    }

    /// Replace every `|` with the delimiter. Regex routes are rendered to
    /// their source text first.
    pub fn replace_pipe_char(&self, route: impl fmt::Display) -> String {
        route.to_string().replace('|', &self.delim)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Route, RoutePattern};
    use crate::metrics::Telemetry;
    use crate::sink::{Emission, MemorySink};
    use crate::timing::test_clock::ManualClock;
    use http::StatusCode;
    use regex::Regex;
    use std::time::Duration;

    fn view() -> AdapterView {
        AdapterView {
            route: RoutePattern::template("/users/:id"),
            path: "/api/users/42".to_string(),
            method: "POST".to_string(),
            protocol: Some("https".to_string()),
            status_code: 201,
            base_url: Some("/api".to_string()),
        }
    }

    fn interceptor(options: InterceptorOptions) -> (StatsdInterceptor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let interceptor = StatsdInterceptor::new(options.sink(sink.clone())).unwrap();
        (interceptor, sink)
    }

    fn all_dimensions() -> InterceptorOptions {
        InterceptorOptions {
            tags: vec!["env:test".to_string()],
            path: true,
            base_url: true,
            method: true,
            protocol: true,
            response_code: true,
            ..InterceptorOptions::default()
        }
    }

    #[test]
    fn test_defaults() {
        let (interceptor, _) = interceptor(InterceptorOptions {
            stat: Some(String::new()),
            delim: Some(String::new()),
            ..InterceptorOptions::default()
        });
        assert_eq!(interceptor.stat(), "node.express.router");
        assert_eq!(interceptor.delim, "-");
    }

    #[test]
    fn test_full_tag_order() {
        let (interceptor, _) = interceptor(all_dimensions());
        assert_eq!(
            interceptor.build_tags(&view()),
            vec![
                "env:test",
                "route:/api/users/:id",
                "method:post",
                "protocol:https",
                "path:/api/users/42",
                "response_code:201",
            ]
        );
    }

    #[test]
    fn test_base_url_disabled_uses_route_alone() {
        let (interceptor, _) = interceptor(InterceptorOptions::default());
        assert_eq!(interceptor.get_route(&view()), "/users/:id");
        assert_eq!(interceptor.build_tags(&view()), vec!["route:/users/:id"]);
    }

    #[test]
    fn test_empty_route_has_no_route_tag() {
        let (interceptor, _) = interceptor(InterceptorOptions {
            base_url: true,
            ..InterceptorOptions::default()
        });
        let unmatched = AdapterView {
            route: RoutePattern::default(),
            base_url: None,
            ..view()
        };
        assert!(interceptor.build_tags(&unmatched).is_empty());
    }

    #[test]
    fn test_empty_protocol_is_skipped() {
        let (interceptor, _) = interceptor(InterceptorOptions {
            protocol: true,
            ..InterceptorOptions::default()
        });
        for protocol in [None, Some(String::new())] {
            let view = AdapterView {
                protocol,
                ..view()
            };
            let tags = interceptor.build_tags(&view);
            assert!(!tags.iter().any(|t| t.starts_with("protocol:")));
        }
    }

    #[test]
    fn test_pipe_replaced_in_route_only() {
        let (interceptor, _) = interceptor(InterceptorOptions {
            path: true,
            delim: Some("_".to_string()),
            ..InterceptorOptions::default()
        });
        let view = AdapterView {
            route: RoutePattern::template("/a|b|c"),
            path: "/a|b".to_string(),
            ..view()
        };
        assert_eq!(interceptor.build_tags(&view), vec!["route:/a_b_c", "path:/a|b"]);
    }

    #[test]
    fn test_pipe_replaced_in_base_url() {
        let (interceptor, _) = interceptor(InterceptorOptions {
            base_url: true,
            ..InterceptorOptions::default()
        });
        let view = AdapterView {
            route: RoutePattern::template("/x|y"),
            base_url: Some("/a|b".to_string()),
            ..view()
        };
        let tags = interceptor.build_tags(&view);
        assert_eq!(tags, vec!["route:/a-b/x-y"]);
        assert!(!tags[0].contains('|'));
    }

    #[test]
    fn test_regex_route_is_stringified() {
        let (interceptor, _) = interceptor(InterceptorOptions::default());
        let regex = Regex::new(r"^/(users|accounts)/\d+$").unwrap();
        assert_eq!(
            interceptor.replace_pipe_char(Route::Regex(&regex)),
            r"^/(users-accounts)/\d+$"
        );
    }

    #[test]
    fn test_emits_counters_and_histogram() {
        let clock = Arc::new(ManualClock::at(Duration::from_micros(10_400)));
        let (interceptor, sink) = interceptor(
            all_dimensions()
                .clock(clock.clone())
                .adapter(|_: &RequestHead, _: &ResponseHead| view()),
        );

        let timer = interceptor.start();
        clock.set(Duration::from_micros(25_600));
        interceptor
            .on_response(timer, &RequestHead::default(), &ResponseHead::default())
            .unwrap();

        let emissions = sink.emissions();
        assert_eq!(emissions.len(), 3);
        assert_eq!(emissions[0].name(), "node.express.router.response_code.201");
        assert_eq!(emissions[1].name(), "node.express.router.response_code.all");
        assert_eq!(emissions[0].tags(), emissions[1].tags());
        assert_eq!(emissions[0].tags(), emissions[2].tags());
        assert!(matches!(emissions[0], Emission::Increment { value: 1, .. }));
        // 26 - 10, not round(15.2)
        assert_eq!(
            emissions[2],
            Emission::Histogram {
                name: "node.express.router.response_time".to_string(),
                value: 16,
                sample_rate: 1.0,
                tags: emissions[2].tags().to_vec(),
            }
        );
    }

    #[test]
    fn test_histogram_only_without_response_code() {
        let (interceptor, sink) = interceptor(InterceptorOptions {
            stat: Some("shop".to_string()),
            ..InterceptorOptions::default()
        });
        let timer = interceptor.start();
        interceptor
            .on_response(timer, &RequestHead::default(), &ResponseHead::default())
            .unwrap();

        let emissions = sink.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].name(), "shop.response_time");
        assert!(emissions[0].tags().is_empty());
    }

    #[test]
    fn test_framework_selection() {
        let mut request = RequestHead::default();
        request.extensions.insert(RoutePattern::template("/hyper/route"));
        let response = ResponseHead::new(StatusCode::OK);

        // Hyper reads the route marker, axum ignores it
        let (hyper_interceptor, sink) =
            interceptor(InterceptorOptions::default().framework(Framework::Hyper));
        hyper_interceptor
            .on_response(hyper_interceptor.start(), &request, &response)
            .unwrap();
        assert_eq!(sink.take()[0].tags(), ["route:/hyper/route".to_string()]);

        let (axum_interceptor, sink) = interceptor(InterceptorOptions::default());
        axum_interceptor
            .on_response(axum_interceptor.start(), &request, &response)
            .unwrap();
        assert!(sink.take()[0].tags().is_empty());
    }

    #[test]
    fn test_adapter_factory_wins_over_framework() {
        let (interceptor, sink) = interceptor(InterceptorOptions {
            http_adapter_host: Some(Arc::new("koa")),
            ..InterceptorOptions::default()
                .adapter(|_: &RequestHead, _: &ResponseHead| view())
        });
        interceptor
            .on_response(interceptor.start(), &RequestHead::default(), &ResponseHead::default())
            .unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_unknown_framework_fails_at_emission() {
        let telemetry = Arc::new(Telemetry::new());
        // Construction succeeds
        let (interceptor, sink) = interceptor(InterceptorOptions {
            http_adapter_host: Some(Arc::new("koa".to_string())),
            ..InterceptorOptions::default().telemetry(telemetry.clone())
        });

        let err = interceptor
            .on_response(interceptor.start(), &RequestHead::default(), &ResponseHead::default())
            .unwrap_err();
        assert!(matches!(err, InterceptorError::UnsupportedFramework(ref t) if t == "koa"));
        assert!(sink.is_empty());

        // The wrap-point variant swallows it
        interceptor.record(interceptor.start(), &RequestHead::default(), &ResponseHead::default());
        assert!(sink.is_empty());
        assert!(telemetry
            .encode()
            .contains(r#"statsd_interceptor_errors_total{kind="unsupported_framework"} 1"#));
    }

    #[test]
    fn test_from_config() {
        let config = InterceptorConfig {
            stat: "svc".to_string(),
            tags: vec!["team:core".to_string()],
            method: true,
            http_adapter: Some("hyper".to_string()),
            ..InterceptorConfig::default()
        };
        let (interceptor, _) = interceptor(InterceptorOptions::from_config(&config));

        assert_eq!(interceptor.stat(), "svc");
        assert_eq!(interceptor.framework().unwrap(), Framework::Hyper);
        assert_eq!(
            interceptor.build_tags(&view()),
            vec!["team:core", "route:/users/:id", "method:post"]
        );
    }
}
