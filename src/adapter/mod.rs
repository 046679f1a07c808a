//! Uniform read-only views over a request/response pair.
//!
//! Each supported framework stores the route, base path and protocol in a
//! different place. An adapter hides that behind [`RequestResponseAdapter`]
//! so the interceptor never looks at framework types directly.

mod axum;
mod hyper;

pub use self::axum::AxumAdapter;
pub use self::hyper::HyperAdapter;

use crate::errors::InterceptorError;
use http::{Extensions, HeaderMap, Method, Request, Response, StatusCode, Uri, Version};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub trait RequestResponseAdapter {
    /// Registered route pattern, or an empty template when nothing matched.
    fn route(&self) -> Route<'_>;
    fn path(&self) -> &str;
    fn method(&self) -> &str;
    fn protocol(&self) -> Option<&str>;
    fn status_code(&self) -> u16;
    fn base_url(&self) -> Option<&str>;
}

/// Borrowed route as reported by an adapter.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    Template(&'a str),
    Regex(&'a Regex),
}

impl Route<'_> {
    pub const EMPTY: Route<'static> = Route::Template("");

    pub fn as_text(&self) -> &str {
        match self {
            Route::Template(template) => template,
            Route::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for Route<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Route marker carried in request or response extensions.
///
/// Plain hyper services have no router to ask, so a handler that knows which
/// pattern it matched inserts one of these into the response it returns.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Template(Cow<'static, str>),
    Regex(Regex),
}

impl RoutePattern {
    pub fn template(template: impl Into<Cow<'static, str>>) -> Self {
        RoutePattern::Template(template.into())
    }

    pub fn as_route(&self) -> Route<'_> {
        match self {
            RoutePattern::Template(template) => Route::Template(template),
            RoutePattern::Regex(regex) => Route::Regex(regex),
        }
    }
}

impl Default for RoutePattern {
    fn default() -> Self {
        RoutePattern::Template(Cow::Borrowed(""))
    }
}

/// Snapshot of the request parts adapters read.
///
/// The downstream service consumes the request, so this is taken on entry.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub extensions: Extensions,
}

impl RequestHead {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
            extensions: request.extensions().clone(),
        }
    }
}

impl Default for RequestHead {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
        }
    }
}

/// Snapshot of the finalized response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub extensions: Extensions,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            extensions: Extensions::new(),
        }
    }

    pub fn from_response<B>(response: &Response<B>) -> Self {
        Self {
            status: response.status(),
            extensions: response.extensions().clone(),
        }
    }
}

/// Owned adapter view, the return type of custom adapter factories.
#[derive(Debug, Clone, Default)]
pub struct AdapterView {
    pub route: RoutePattern,
    pub path: String,
    pub method: String,
    pub protocol: Option<String>,
    pub status_code: u16,
    pub base_url: Option<String>,
}

impl RequestResponseAdapter for AdapterView {
    fn route(&self) -> Route<'_> {
        self.route.as_route()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    fn status_code(&self) -> u16 {
        self.status_code
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

/// Caller-supplied adapter; takes precedence over framework detection.
pub type AdapterFactory = Arc<dyn Fn(&RequestHead, &ResponseHead) -> AdapterView + Send + Sync>;

/// Frameworks with a built-in adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Axum,
    Hyper,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Axum => "axum",
            Framework::Hyper => "hyper",
        }
    }
}

impl FromStr for Framework {
    type Err = InterceptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "axum" => Ok(Framework::Axum),
            "hyper" => Ok(Framework::Hyper),
            _ => Err(InterceptorError::UnsupportedFramework(s.to_string())),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports which HTTP framework is serving requests.
pub trait HttpAdapterHost: Send + Sync {
    fn adapter_type(&self) -> &str;
}

impl HttpAdapterHost for Framework {
    fn adapter_type(&self) -> &str {
        self.as_str()
    }
}

impl HttpAdapterHost for String {
    fn adapter_type(&self) -> &str {
        self
    }
}

impl HttpAdapterHost for &'static str {
    fn adapter_type(&self) -> &str {
        self
    }
}
