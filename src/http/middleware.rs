//! Axum middleware that applies the throttle to every request it wraps.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::throttle::{ClientKey, Decision, Throttle};

/// Message returned to throttled clients.
pub const REJECTION_MESSAGE: &str = "Too many requests, please try again later.";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared state handed to [`throttle_middleware`].
#[derive(Clone)]
pub struct ThrottleState {
    /// The throttle every request is checked against
    pub throttle: Arc<Throttle>,
    /// Prefer `X-Forwarded-For` over the peer address when keying clients
    pub trust_forwarded_for: bool,
}

impl ThrottleState {
    /// Create middleware state, taking the forwarded-for policy from the throttle config.
    pub fn new(throttle: Arc<Throttle>) -> Self {
        let trust_forwarded_for = throttle.config().trust_forwarded_for;
        Self {
            throttle,
            trust_forwarded_for,
        }
    }
}

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    pub success: bool,
    pub error: &'static str,
    /// Whole seconds until the client's window resets
    pub retry_after: u64,
}

/// Count the request against its client's quota, then either pass it on or
/// answer 429. Both outcomes carry the `X-RateLimit-*` headers.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn throttle_middleware(
    State(state): State<ThrottleState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, state.trust_forwarded_for);
    let now = Utc::now();
    let decision = state.throttle.admit(&key, now);

    let mut response = if decision.admitted {
        next.run(request).await
    } else {
        warn!(
            key = %key,
            reset_at = %decision.reset_at,
            "Throttled request rejected"
        );
        rejection_response(&decision, now)
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

/// Derive the throttle key for a request.
///
/// Order: first `X-Forwarded-For` entry (only when trusted), then the peer
/// address from `ConnectInfo`, then the shared fallback bucket.
pub fn client_key(request: &Request, trust_forwarded_for: bool) -> ClientKey {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(ClientKey::from_forwarded_for);
        if let Some(key) = forwarded {
            return key;
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return ClientKey::from_socket_addr(*addr);
    }

    debug!("No client address on request, using fallback throttle bucket");
    ClientKey::unknown()
}

/// Build the 429 response for a rejected request.
pub fn rejection_response(decision: &Decision, now: DateTime<Utc>) -> Response {
    let body = RejectionBody {
        success: false,
        error: REJECTION_MESSAGE,
        retry_after: decision.retry_after_secs(now),
    };
    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}

/// Write the quota headers for `decision`, replacing any already present.
pub fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    for (name, value) in decision.headers() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = name, value = %value, "Skipping unencodable throttle header"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleConfig;
    use axum::{body::Body, middleware, routing::get, Router};
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(max: u64, trust_forwarded_for: bool) -> ThrottleState {
        let config = ThrottleConfig {
            trust_forwarded_for,
            ..ThrottleConfig::new(900_000, max)
        };
        ThrottleState::new(Arc::new(Throttle::new(config).unwrap()))
    }

    fn test_router(state: ThrottleState) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, throttle_middleware))
    }

    fn request_from(ip: [u8; 4]) -> Request {
        axum::http::Request::builder()
            .uri("/")
            .extension(ConnectInfo(SocketAddr::from((ip, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn header<'a>(response: &'a Response, name: &str) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_admitted_request_carries_headers() {
        let router = test_router(test_state(3, false));

        let response = router.oneshot(request_from([127, 0, 0, 1])).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "X-RateLimit-Limit"), "3");
        assert_eq!(header(&response, "X-RateLimit-Remaining"), "2");
        let reset = header(&response, "X-RateLimit-Reset");
        assert!(DateTime::parse_from_rfc3339(reset).is_ok());
        assert!(reset.ends_with('Z'));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_request_over_limit_is_rejected() {
        let router = test_router(test_state(2, false));

        for expected in ["1", "0"] {
            let response = router.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header(&response, "X-RateLimit-Remaining"), expected);
        }

        let response = router.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, "X-RateLimit-Limit"), "2");
        assert_eq!(header(&response, "X-RateLimit-Remaining"), "0");
        assert!(response.headers().contains_key("X-RateLimit-Reset"));

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], REJECTION_MESSAGE);
        let retry_after = body["retryAfter"].as_u64().unwrap();
        assert!(retry_after > 0 && retry_after <= 900);

        // Another client is unaffected
        let response = router.oneshot(request_from([10, 0, 0, 2])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "X-RateLimit-Remaining"), "1");
    }

    #[tokio::test]
    async fn test_requests_without_address_share_fallback_bucket() {
        let state = test_state(1, false);
        let router = test_router(state.clone());

        let bare = || {
            axum::http::Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap()
        };

        let response = router.clone().oneshot(bare()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = router.oneshot(bare()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        assert!(state.throttle.peek(crate::throttle::FALLBACK_KEY, Utc::now()).is_some());
    }

    #[test]
    fn test_client_key_ignores_forwarded_for_unless_trusted() {
        let request = axum::http::Request::builder()
            .uri("/")
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5000))))
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_key(&request, false).as_str(), "10.0.0.1");
        assert_eq!(client_key(&request, true).as_str(), "203.0.113.9");
    }

    #[test]
    fn test_client_key_trusted_without_header_uses_peer() {
        let request = request_from([192, 168, 0, 5]);
        assert_eq!(client_key(&request, true).as_str(), "192.168.0.5");
    }

    #[tokio::test]
    async fn test_rejection_response_body() {
        let decision = Decision {
            admitted: false,
            limit: 2,
            remaining: 0,
            reset_at: Utc.timestamp_millis_opt(1_000).unwrap(),
        };
        let response = rejection_response(&decision, Utc.timestamp_millis_opt(100).unwrap());
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": "Too many requests, please try again later.",
                "retryAfter": 1
            })
        );
    }

    #[test]
    fn test_apply_headers_replaces_existing() {
        let decision = Decision {
            admitted: true,
            limit: 10,
            remaining: 4,
            reset_at: Utc.timestamp_millis_opt(0).unwrap(),
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("99"));

        apply_headers(&mut headers, &decision);

        assert_eq!(headers.get_all("x-ratelimit-remaining").iter().count(), 1);
        assert_eq!(headers["x-ratelimit-remaining"], "4");
        assert_eq!(headers["x-ratelimit-limit"], "10");
        assert_eq!(headers["x-ratelimit-reset"], "1970-01-01T00:00:00.000Z");
    }
}
