//! Router-less hyper service used when the demo runs with
//! `SERVER_FRAMEWORK=hyper`. Requests are matched against regular
//! expressions and every matched response carries its pattern as a
//! [`RoutePattern`] so the hyper adapter can report it.

use crate::adapter::RoutePattern;
use crate::metrics::SharedTelemetry;
use futures_util::future::{Ready, ready};
use http::{Method, Request, Response, StatusCode, header};
use regex::{Captures, Regex};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

type PlainHandler = Arc<dyn Fn(&Captures<'_>) -> Response<String> + Send + Sync>;

#[derive(Clone)]
struct PlainRoute {
    method: Method,
    regex: Regex,
    handler: PlainHandler,
}

#[derive(Clone, Default)]
pub struct PlainRouter {
    routes: Arc<Vec<PlainRoute>>,
}

impl PlainRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F>(mut self, method: Method, pattern: &str, handler: F) -> Result<Self, regex::Error>
    where
        F: Fn(&Captures<'_>) -> Response<String> + Send + Sync + 'static,
    {
        let route = PlainRoute {
            method,
            regex: Regex::new(pattern)?,
            handler: Arc::new(handler),
        };
        Arc::make_mut(&mut self.routes).push(route);
        Ok(self)
    }

    /// Routes served by the demo binary.
    pub fn demo(telemetry: SharedTelemetry) -> Result<Self, regex::Error> {
        Self::new()
            .route(Method::GET, r"^/healthz$", |_| {
                json_response(StatusCode::OK, json!({ "status": "ok" }))
            })?
            .route(Method::GET, r"^/(users|accounts)/(\d+)$", |caps| {
                json_response(
                    StatusCode::OK,
                    json!({ "kind": &caps[1], "id": &caps[2] }),
                )
            })?
            .route(Method::GET, r"^/metrics$", move |_| {
                let mut response = Response::new(telemetry.encode());
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    header::HeaderValue::from_static(
                        "application/openmetrics-text; version=1.0.0; charset=utf-8",
                    ),
                );
                response
            })
    }

    fn dispatch(&self, method: &Method, path: &str) -> Response<String> {
        let mut path_matched = false;

        for route in self.routes.iter() {
            let Some(caps) = route.regex.captures(path) else {
                continue;
            };
            path_matched = true;
            if route.method != *method {
                continue;
            }

            let mut response = (route.handler)(&caps);
            response
                .extensions_mut()
                .insert(RoutePattern::Regex(route.regex.clone()));
            return response;
        }

        if path_matched {
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "method not allowed" }),
            )
        } else {
            json_response(StatusCode::NOT_FOUND, json!({ "error": "not found" }))
        }
    }
}

impl<B> Service<Request<B>> for PlainRouter {
    type Response = Response<String>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        ready(Ok(self.dispatch(request.method(), request.uri().path())))
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
