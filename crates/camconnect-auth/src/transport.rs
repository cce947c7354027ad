//! Login request against the camera's HTTP endpoint
//!
//! A single `POST` with `{"pin": "1234"}`. The camera answers 200 with a
//! `Set-Cookie: session=<token>; ...` header on success and 401 for a wrong
//! PIN. The transport never retries and never touches persistent state.

use crate::error::LoginFailure;
use crate::pin::Pin;
use async_trait::async_trait;
use camconnect_core::AuthConfig;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Body of the login request
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    pin: &'a str,
}

/// Something that can exchange a PIN for a session token
#[async_trait]
pub trait LoginTransport: Send + Sync {
    /// Perform one login attempt, returning the session token
    async fn login(&self, pin: &Pin) -> Result<String, LoginFailure>;
}

/// Login over HTTP with `reqwest`
pub struct HttpLoginTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLoginTransport {
    /// Create a transport for `endpoint` with a bounded connect/request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &AuthConfig) -> reqwest::Result<Self> {
        Self::new(config.login_url(), config.login_timeout)
    }
}

#[async_trait]
impl LoginTransport for HttpLoginTransport {
    async fn login(&self, pin: &Pin) -> Result<String, LoginFailure> {
        debug!("Sending login request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&LoginRequest { pin: pin.as_str() })
            .send()
            .await
            .map_err(|e| {
                warn!("Network error during login: {}", e);
                LoginFailure::NetworkError(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => extract_session_token(response.headers()).ok_or_else(|| {
                warn!("Login succeeded but no session token was returned");
                LoginFailure::ServerError("no token in response".to_string())
            }),
            StatusCode::UNAUTHORIZED => Err(LoginFailure::InvalidCredentials),
            status => Err(LoginFailure::ServerError(status.to_string())),
        }
    }
}

/// Find the session token among the `Set-Cookie` headers
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_session_cookie)
        .map(str::to_string)
}

/// Token from a single `Set-Cookie` value (`session=TOKEN; Path=/; ...`).
///
/// Only the leading name/value pair is considered; attributes are ignored.
/// An empty value is not a token.
pub fn parse_session_cookie(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != SESSION_COOKIE {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use axum::response::{AppendHeaders, IntoResponse};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    /// Serve `router` on an ephemeral port, returning the login URL
    async fn spawn_camera(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/login", addr)
    }

    fn camera_with_pin(expected: &'static str) -> Router {
        Router::new().route(
            "/api/login",
            post(move |Json(body): Json<Value>| async move {
                if body["pin"] == expected {
                    (
                        axum::http::StatusCode::OK,
                        AppendHeaders([(header::SET_COOKIE, "session=abc123; Path=/")]),
                    )
                        .into_response()
                } else {
                    axum::http::StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        )
    }

    fn pin(s: &str) -> Pin {
        Pin::parse(s).unwrap()
    }

    #[test]
    fn test_parse_session_cookie() {
        assert_eq!(parse_session_cookie("session=abc123; Path=/"), Some("abc123"));
        assert_eq!(parse_session_cookie("session=abc123"), Some("abc123"));
        assert_eq!(
            parse_session_cookie("session=a.b-c_d; HttpOnly; Max-Age=86400"),
            Some("a.b-c_d")
        );
        assert_eq!(parse_session_cookie("session=; Path=/"), None);
        assert_eq!(parse_session_cookie("sessionid=abc"), None);
        assert_eq!(parse_session_cookie("theme=dark; session=abc"), None);
        assert_eq!(parse_session_cookie("garbage"), None);
    }

    #[test]
    fn test_extract_from_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("session=xyz789; Path=/"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz789"));

        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_login_success_extracts_token() {
        let url = spawn_camera(camera_with_pin("1234")).await;
        let transport = HttpLoginTransport::new(url, Duration::from_secs(5)).unwrap();

        let token = transport.login(&pin("1234")).await.unwrap();
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn test_login_wrong_pin_is_invalid_credentials() {
        let url = spawn_camera(camera_with_pin("1234")).await;
        let transport = HttpLoginTransport::new(url, Duration::from_secs(5)).unwrap();

        let result = transport.login(&pin("0000")).await;
        assert_eq!(result, Err(LoginFailure::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_without_cookie_is_server_error() {
        let router = Router::new().route("/api/login", post(|| async { "ok" }));
        let url = spawn_camera(router).await;
        let transport = HttpLoginTransport::new(url, Duration::from_secs(5)).unwrap();

        let result = transport.login(&pin("1234")).await;
        assert_eq!(
            result,
            Err(LoginFailure::ServerError("no token in response".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_is_server_error() {
        let router = Router::new().route(
            "/api/login",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = spawn_camera(router).await;
        let transport = HttpLoginTransport::new(url, Duration::from_secs(5)).unwrap();

        match transport.login(&pin("1234")).await {
            Err(LoginFailure::ServerError(detail)) => assert!(detail.contains("500")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/api/login", addr);
        let transport = HttpLoginTransport::new(url, Duration::from_secs(2)).unwrap();
        let result = transport.login(&pin("1234")).await;
        assert!(matches!(result, Err(LoginFailure::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_slow_camera_times_out() {
        let router = Router::new().route(
            "/api/login",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let url = spawn_camera(router).await;
        let transport = HttpLoginTransport::new(url, Duration::from_millis(200)).unwrap();

        let result = transport.login(&pin("1234")).await;
        assert!(matches!(result, Err(LoginFailure::NetworkError(_))));
    }

    #[test]
    fn test_from_config_uses_login_url() {
        let config = AuthConfig::new().with_device_host("10.0.0.5:8080");
        let transport = HttpLoginTransport::from_config(&config).unwrap();
        assert_eq!(transport.endpoint, "http://10.0.0.5:8080/api/login");
    }
}
