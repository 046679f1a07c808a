//! Request timing and response code metrics for axum and hyper services.
//!
//! Wrap a service with [`StatsdLayer`] (or [`track_metrics`] for
//! `axum::middleware::from_fn_with_state`) and every completed request emits
//! a `<stat>.response_time` histogram, plus `<stat>.response_code.*` counters
//! when enabled, tagged with the route, method, protocol, path and status.
//!
//! ```ignore
//! use statsd_interceptor::{InterceptorOptions, StatsdInterceptor, StatsdLayer};
//! use std::sync::Arc;
//!
//! let interceptor = StatsdInterceptor::new(InterceptorOptions {
//!     method: true,
//!     response_code: true,
//!     ..InterceptorOptions::default()
//! })?;
//!
//! let app = axum::Router::new()
//!     .route("/users/{id}", get(handler))
//!     .layer(StatsdLayer::new(Arc::new(interceptor)));
//! ```

pub mod adapter;
pub mod config;
pub mod errors;
pub mod http;
pub mod interceptor;
pub mod metrics;
pub mod sink;
pub mod timing;

pub use adapter::{
    AdapterFactory, AdapterView, AxumAdapter, Framework, HttpAdapterHost, HyperAdapter,
    RequestHead, RequestResponseAdapter, ResponseHead, Route, RoutePattern,
};
pub use errors::InterceptorError;
pub use crate::http::middleware::{StatsdLayer, StatsdService, track_metrics};
pub use interceptor::{InterceptorOptions, StatsdInterceptor};
pub use sink::{LogSink, MemorySink, MetricsSink, SharedSink, StatsdClient};
