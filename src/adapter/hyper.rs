use super::{RequestHead, RequestResponseAdapter, ResponseHead, Route, RoutePattern};

/// Adapter for plain hyper services.
///
/// There is no router to consult: the route is whatever [`RoutePattern`] the
/// handler attached to its response (or that an outer layer attached to the
/// request). Protocol and base URL are never known.
pub struct HyperAdapter<'a> {
    request: &'a RequestHead,
    response: &'a ResponseHead,
}

impl<'a> HyperAdapter<'a> {
    pub fn new(request: &'a RequestHead, response: &'a ResponseHead) -> Self {
        Self { request, response }
    }
}

impl RequestResponseAdapter for HyperAdapter<'_> {
    fn route(&self) -> Route<'_> {
        self.response
            .extensions
            .get::<RoutePattern>()
            .or_else(|| self.request.extensions.get::<RoutePattern>())
            .map(RoutePattern::as_route)
            .unwrap_or(Route::EMPTY)
    }

    /// The raw request target, query string included.
    fn path(&self) -> &str {
        self.request
            .uri
            .path_and_query()
            .map(|target| target.as_str())
            .unwrap_or_else(|| self.request.uri.path())
    }

    fn method(&self) -> &str {
        self.request.method.as_str()
    }

    fn protocol(&self) -> Option<&str> {
        None
    }

    fn status_code(&self) -> u16 {
        self.response.status.as_u16()
    }

    fn base_url(&self) -> Option<&str> {
        None
    }
}
