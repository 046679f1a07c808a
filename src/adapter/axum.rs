use super::{RequestHead, RequestResponseAdapter, ResponseHead, Route};
use ::axum::extract::{MatchedPath, NestedPath};

/// Adapter for axum routers.
///
/// The route is the `MatchedPath` template. Inside a nested router the mount
/// prefix is reported separately as the base URL and stripped from the route,
/// so `base_url + route` always spells the full template.
pub struct AxumAdapter<'a> {
    request: &'a RequestHead,
    response: &'a ResponseHead,
}

impl<'a> AxumAdapter<'a> {
    pub fn new(request: &'a RequestHead, response: &'a ResponseHead) -> Self {
        Self { request, response }
    }
}

impl RequestResponseAdapter for AxumAdapter<'_> {
    fn route(&self) -> Route<'_> {
        let Some(matched) = self.request.extensions.get::<MatchedPath>() else {
            return Route::EMPTY;
        };
        let matched = matched.as_str();

        match self.base_url() {
            Some(prefix) if !prefix.is_empty() => match matched.strip_prefix(prefix) {
                Some("") => Route::Template("/"),
                Some(rest) => Route::Template(rest),
                None => Route::Template(matched),
            },
            _ => Route::Template(matched),
        }
    }

    fn path(&self) -> &str {
        self.request.uri.path()
    }

    fn method(&self) -> &str {
        self.request.method.as_str()
    }

    fn protocol(&self) -> Option<&str> {
        if let Some(scheme) = self.request.uri.scheme_str() {
            return Some(scheme);
        }

        // Behind a proxy the original scheme only survives in this header
        let forwarded = self
            .request
            .headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        Some(forwarded.unwrap_or("http"))
    }

    fn status_code(&self) -> u16 {
        self.response.status.as_u16()
    }

    fn base_url(&self) -> Option<&str> {
        self.request
            .extensions
            .get::<NestedPath>()
            .map(|nested| nested.as_str())
    }
}
