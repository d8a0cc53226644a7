/// Response hardening for the task API
///
/// Every response gets `nosniff`, frame denial, a strict referrer policy
/// and a CSP that forbids active content. Responses under `/api` also get
/// `Cache-Control: no-store`, since they carry tokens, user records and
/// document locations. `Strict-Transport-Security` is only sent when the
/// service runs in production behind HTTPS.
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use taskboard_api::middleware::security::SecurityHeadersLayer;
///
/// let app: Router = Router::new().layer(SecurityHeadersLayer::new(true));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};

const ALWAYS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
];

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Prefix of the routes whose responses must not be cached
const PRIVATE_PREFIX: &str = "/api/";

fn harden(headers: &mut HeaderMap, private: bool, hsts: bool) {
    for (name, value) in ALWAYS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if private {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    if hsts {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
}

/// Layer installing [`SecurityHeaders`]
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeadersLayer {
    hsts: bool,
}

impl SecurityHeadersLayer {
    /// `hsts` should be true only when served over HTTPS
    pub fn new(hsts: bool) -> Self {
        Self { hsts }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeaders<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeaders {
            inner,
            hsts: self.hsts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityHeaders<S> {
    inner: S,
    hsts: bool,
}

impl<S> Service<Request> for SecurityHeaders<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let private = request.uri().path().starts_with(PRIVATE_PREFIX);
        let hsts = self.hsts;
        let future = self.inner.call(request);

        Box::pin(async move {
            let mut response = future.await?;
            harden(response.headers_mut(), private, hsts);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    async fn headers_for(uri: &str, hsts: bool) -> HeaderMap {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/tasks", get(|| async { "[]" }))
            .layer(SecurityHeadersLayer::new(hsts));

        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().headers().clone()
    }

    #[tokio::test]
    async fn test_base_headers_on_every_response() {
        for uri in ["/health", "/api/tasks", "/missing"] {
            let headers = headers_for(uri, false).await;
            assert_eq!(headers["x-content-type-options"], "nosniff");
            assert_eq!(headers["x-frame-options"], "DENY");
            assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
            assert!(headers.contains_key("content-security-policy"));
        }
    }

    #[tokio::test]
    async fn test_api_responses_are_not_cached() {
        assert_eq!(headers_for("/api/tasks", false).await["cache-control"], "no-store");
        assert!(!headers_for("/health", false).await.contains_key("cache-control"));
    }

    #[tokio::test]
    async fn test_hsts_only_when_enabled() {
        assert_eq!(headers_for("/health", true).await["strict-transport-security"], HSTS);
        assert!(!headers_for("/health", false)
            .await
            .contains_key("strict-transport-security"));
    }
}
