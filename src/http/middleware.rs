use crate::adapter::{RequestHead, ResponseHead};
use crate::interceptor::StatsdInterceptor;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures_util::future::BoxFuture;
use http::StatusCode;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// axum middleware, for use with `middleware::from_fn_with_state`.
pub async fn track_metrics(
    State(interceptor): State<Arc<StatsdInterceptor>>,
    request: Request,
    next: Next,
) -> Response {
    let timer = interceptor.start();
    let head = RequestHead::from_request(&request);

    // Process request
    let response = next.run(request).await;

    interceptor.record(timer, &head, &ResponseHead::from_response(&response));

    response
}

/// Tower layer wrapping any HTTP service with the interceptor.
#[derive(Clone)]
pub struct StatsdLayer {
    interceptor: Arc<StatsdInterceptor>,
}

impl StatsdLayer {
    pub fn new(interceptor: Arc<StatsdInterceptor>) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for StatsdLayer {
    type Service = StatsdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatsdService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

#[derive(Clone)]
pub struct StatsdService<S> {
    inner: S,
    interceptor: Arc<StatsdInterceptor>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for StatsdService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let timer = self.interceptor.start();
        let head = RequestHead::from_request(&request);
        let interceptor = self.interceptor.clone();

        // The clone may not be ready; call the instance poll_ready was driven on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(request).await;

            // A failed service still produced a request worth counting
            let response_head = match &result {
                Ok(response) => ResponseHead::from_response(response),
                Err(_) => ResponseHead::new(StatusCode::INTERNAL_SERVER_ERROR),
            };
            interceptor.record(timer, &head, &response_head);

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Framework, RoutePattern};
    use crate::interceptor::InterceptorOptions;
    use crate::sink::{Emission, MemorySink};
    use axum::{Router, body::Body, middleware, routing::get};
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn interceptor(options: InterceptorOptions) -> (Arc<StatsdInterceptor>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let interceptor = StatsdInterceptor::new(options.sink(sink.clone())).unwrap();
        (Arc::new(interceptor), sink)
    }

    #[tokio::test]
    async fn test_from_fn_middleware() {
        let (interceptor, sink) = interceptor(InterceptorOptions {
            method: true,
            response_code: true,
            ..InterceptorOptions::default()
        });

        let app = Router::new()
            .route("/users/{id}", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(interceptor, track_metrics));

        let response = app
            .oneshot(http::Request::builder().uri("/users/5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let emissions = sink.emissions();
        assert_eq!(emissions.len(), 3);
        assert_eq!(emissions[0].name(), "node.express.router.response_code.200");
        assert_eq!(
            emissions[2].tags(),
            ["route:/users/{id}", "method:get", "response_code:200"]
        );
    }

    #[tokio::test]
    async fn test_layer_over_plain_service() {
        let (interceptor, sink) =
            interceptor(InterceptorOptions::default().framework(Framework::Hyper));

        let service = tower::service_fn(|_request: http::Request<String>| async {
            let mut response = http::Response::new(String::from("gone"));
            *response.status_mut() = StatusCode::GONE;
            response
                .extensions_mut()
                .insert(RoutePattern::template("/items/:id"));
            Ok::<_, Infallible>(response)
        });
        let service = StatsdLayer::new(interceptor).layer(service);

        let response = service
            .oneshot(
                http::Request::builder()
                    .uri("/items/9")
                    .body(String::new())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);

        let emissions = sink.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].tags(), ["route:/items/:id"]);
    }

    #[tokio::test]
    async fn test_inner_error_still_emits() {
        let (interceptor, sink) = interceptor(InterceptorOptions {
            response_code: true,
            ..InterceptorOptions::default().framework(Framework::Hyper)
        });

        let service = tower::service_fn(|_request: http::Request<String>| async {
            Err::<http::Response<String>, _>(std::io::Error::other("backend down"))
        });
        let service = StatsdLayer::new(interceptor).layer(service);

        let result = service.oneshot(http::Request::new(String::new())).await;
        assert!(result.is_err());

        let names: Vec<String> = sink
            .emissions()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert!(names.contains(&"node.express.router.response_code.500".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_framework_does_not_break_response() {
        let (interceptor, sink) = interceptor(InterceptorOptions {
            http_adapter_host: Some(Arc::new("koa")),
            ..InterceptorOptions::default()
        });

        let app = Router::new()
            .route("/", get(|| async { "still here" }))
            .layer(StatsdLayer::new(interceptor));

        let response = app
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_histogram_value_is_whole_millis() {
        let (interceptor, sink) = interceptor(InterceptorOptions::default());

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    "done"
                }),
            )
            .layer(StatsdLayer::new(interceptor));

        app.oneshot(http::Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        match &sink.emissions()[0] {
            Emission::Histogram { value, .. } => assert!(*value >= 19),
            other => panic!("unexpected emission {other:?}"),
        }
    }
}
