//! APNs gateway client using certificate authentication.

use std::time::Duration;

use apns_core::{Environment, Notification, Response};
use apns_crypto::Identity;
use tokio::sync::OnceCell;

use crate::Pusher;

/// Failure to complete an exchange with the gateway.
///
/// No [`Response`] exists when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to set up TLS client")]
    Client(#[source] reqwest::Error),
    #[error("failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("failed to read reply from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A value that cannot be sent as an HTTP header.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for header {name}")]
pub struct HeaderError {
    pub name: &'static str,
    #[source]
    source: reqwest::header::InvalidHeaderValue,
}

/// Check that `value` can be sent in header `name`.
///
/// Values carried by every notification of a run are checked up front, so a
/// bad one never reaches the gateway as a failed request.
pub fn check_header(name: &'static str, value: &str) -> Result<(), HeaderError> {
    reqwest::header::HeaderValue::from_str(value)
        .map(drop)
        .map_err(|source| HeaderError { name, source })
}

impl TransportError {
    fn from_send(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_owned();
        if source.is_timeout() {
            Self::Timeout { url }
        } else if source.is_connect() {
            Self::Connect { url, source }
        } else {
            Self::Request { url, source }
        }
    }
}

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on a whole request, connect included.
    pub request_timeout: Duration,
    /// Upper bound on establishing the TLS connection.
    pub connect_timeout: Duration,
    /// Base URL used in [`Environment::Production`].
    pub production_url: String,
    /// Base URL used in [`Environment::Development`].
    pub development_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(20),
            production_url: Environment::Production.base_url().to_string(),
            development_url: Environment::Development.base_url().to_string(),
        }
    }
}

impl ClientConfig {
    fn base_url(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.production_url,
            Environment::Development => &self.development_url,
        }
    }
}

/// APNs client authenticated with a client certificate.
///
/// The HTTP connection is set up on first push and reused afterwards; HTTP/2
/// is negotiated through ALPN.
pub struct ApnsClient {
    identity: Identity,
    environment: Environment,
    config: ClientConfig,
    http: OnceCell<reqwest::Client>,
}

impl ApnsClient {
    /// Create a client targeting production with default settings.
    pub fn new(identity: Identity) -> Self {
        Self::with_config(identity, ClientConfig::default())
    }

    /// Create a client targeting production with custom settings.
    pub fn with_config(identity: Identity, config: ClientConfig) -> Self {
        Self {
            identity,
            environment: Environment::default(),
            config,
            http: OnceCell::new(),
        }
    }

    /// Send subsequent notifications to the production gateway.
    pub fn production(&mut self) {
        self.set_environment(Environment::Production);
    }

    /// Send subsequent notifications to the development gateway.
    pub fn development(&mut self) {
        self.set_environment(Environment::Development);
    }

    /// Select the gateway for subsequent pushes.
    pub fn set_environment(&mut self, environment: Environment) {
        tracing::debug!(%environment, "selected APNs environment");
        self.environment = environment;
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// URL a notification for `device_token` is posted to.
    pub fn endpoint(&self, device_token: &str) -> String {
        let base = self.config.base_url(self.environment).trim_end_matches('/');
        format!("{base}/3/device/{device_token}")
    }

    async fn http(&self) -> Result<&reqwest::Client, TransportError> {
        self.http
            .get_or_try_init(|| async {
                let identity = reqwest::Identity::from_pem(self.identity.pem())
                    .map_err(TransportError::Client)?;

                let client = reqwest::Client::builder()
                    .identity(identity)
                    .timeout(self.config.request_timeout)
                    .connect_timeout(self.config.connect_timeout)
                    .build()
                    .map_err(TransportError::Client)?;

                tracing::debug!(subject = self.identity.subject(), "APNs client ready");
                Ok::<_, TransportError>(client)
            })
            .await
    }
}

impl Pusher for ApnsClient {
    async fn push(&self, notification: &Notification) -> Result<Response, TransportError> {
        let url = self.endpoint(&notification.device_token);
        let http = self.http().await?;

        let options = &notification.options;
        let mut request = http
            .post(&url)
            .header("apns-topic", &notification.topic)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(notification.payload().clone());

        if let Some(apns_id) = &options.apns_id {
            request = request.header("apns-id", apns_id);
        }
        if let Some(collapse_id) = &options.collapse_id {
            request = request.header("apns-collapse-id", collapse_id);
        }
        if let Some(expiration) = options.expiration {
            request = request.header("apns-expiration", expiration.to_string());
        }
        if let Some(priority) = options.priority {
            request = request.header("apns-priority", priority.as_header());
        }
        if let Some(push_type) = options.push_type {
            request = request.header("apns-push-type", push_type.as_header());
        }

        let reply = request
            .send()
            .await
            .map_err(|e| TransportError::from_send(&url, e))?;

        let status = reply.status();
        let apns_id = reply
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = reply.bytes().await.map_err(|source| {
            if source.is_timeout() {
                TransportError::Timeout { url: url.clone() }
            } else {
                TransportError::Body {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let response =
            Response::from_reply(status.as_u16(), apns_id, &body, status.canonical_reason());

        tracing::debug!(
            token = %notification.device_token,
            status = response.status,
            reason = %response.reason,
            "push completed"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use apns_core::{NotificationOptions, Payload, Priority, PushType};
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse as _;
    use axum::routing::post;

    use super::*;

    #[derive(Debug)]
    struct Captured {
        environment: String,
        token: String,
        headers: HeaderMap,
        body: Bytes,
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    async fn gateway(
        State(log): State<Log>,
        Path((environment, token)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> axum::response::Response {
        log.lock().unwrap().push(Captured {
            environment,
            token: token.clone(),
            headers,
            body,
        });

        match token.as_str() {
            "bad" => (
                StatusCode::BAD_REQUEST,
                r#"{"reason":"BadDeviceToken"}"#.to_string(),
            )
                .into_response(),
            "gone" => (
                StatusCode::GONE,
                r#"{"reason":"Unregistered","timestamp":1700000000000}"#.to_string(),
            )
                .into_response(),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK.into_response()
            }
            _ => (
                StatusCode::OK,
                [("apns-id", "6f1c2e0a-0000-4000-8000-000000000001")],
            )
                .into_response(),
        }
    }

    async fn spawn_gateway() -> (String, Log) {
        let log = Log::default();
        let app = axum::Router::new()
            .route("/{environment}/3/device/{token}", post(gateway))
            .with_state(log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}"), log)
    }

    fn identity() -> Identity {
        let rcgen::CertifiedKey { cert, signing_key } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Identity::from_pem(format!("{}{}", cert.pem(), signing_key.serialize_pem()).as_bytes())
            .unwrap()
    }

    fn client_for(base: &str) -> ApnsClient {
        ApnsClient::with_config(
            identity(),
            ClientConfig {
                production_url: format!("{base}/production"),
                development_url: format!("{base}/development/"),
                ..Default::default()
            },
        )
    }

    fn notification(token: &str, payload: &str) -> Notification {
        Notification::new(token, "com.example.app", &Payload::from(payload)).unwrap()
    }

    #[test]
    fn test_default_endpoints() {
        let mut client = ApnsClient::new(identity());
        assert_eq!(client.environment(), Environment::Production);
        assert_eq!(
            client.endpoint("abc"),
            "https://api.push.apple.com/3/device/abc"
        );

        client.development();
        assert_eq!(
            client.endpoint("abc"),
            "https://api.sandbox.push.apple.com/3/device/abc"
        );

        client.production();
        assert_eq!(client.environment(), Environment::Production);
    }

    #[tokio::test]
    async fn test_push_success() {
        let (base, log) = spawn_gateway().await;
        let client = client_for(&base);

        let response = client
            .push(&notification("tok123", r#"{"aps": {"alert": "hi"}}"#))
            .await
            .unwrap();

        assert_eq!(response.to_string(), "200: 'Success'");
        assert_eq!(
            response.apns_id.as_deref(),
            Some("6f1c2e0a-0000-4000-8000-000000000001")
        );

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].environment, "production");
        assert_eq!(log[0].token, "tok123");
        assert_eq!(log[0].headers["apns-topic"], "com.example.app");
        assert_eq!(log[0].headers["content-type"], "application/json");
        // Body goes out byte for byte.
        assert_eq!(log[0].body, &br#"{"aps": {"alert": "hi"}}"#[..]);
        assert!(log[0].headers.get("apns-priority").is_none());
    }

    #[tokio::test]
    async fn test_environment_switch_applies_to_later_pushes() {
        let (base, log) = spawn_gateway().await;
        let mut client = client_for(&base);

        client.push(&notification("first", "{}")).await.unwrap();
        client.development();
        client.push(&notification("second", "{}")).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log[0].environment, "production");
        assert_eq!(log[1].environment, "development");
        assert_eq!(log[1].token, "second");
    }

    #[tokio::test]
    async fn test_rejection_is_a_response() {
        let (base, _log) = spawn_gateway().await;
        let client = client_for(&base);

        let bad = client.push(&notification("bad", "{}")).await.unwrap();
        assert_eq!(bad.to_string(), "400: 'BadDeviceToken'");
        assert!(!bad.is_sent());

        let gone = client.push(&notification("gone", "{}")).await.unwrap();
        assert_eq!(gone.status, 410);
        assert_eq!(gone.reason, "Unregistered");
        assert_eq!(gone.timestamp, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_optional_headers() {
        let (base, log) = spawn_gateway().await;
        let client = client_for(&base);

        let n = notification("tok", "{}").with_options(NotificationOptions {
            apns_id: Some("6f1c2e0a-0000-4000-8000-000000000002".into()),
            collapse_id: Some("score".into()),
            expiration: Some(1_700_000_000),
            priority: Some(Priority::Normal),
            push_type: Some(PushType::Background),
        });
        client.push(&n).await.unwrap();

        let log = log.lock().unwrap();
        let headers = &log[0].headers;
        assert_eq!(headers["apns-id"], "6f1c2e0a-0000-4000-8000-000000000002");
        assert_eq!(headers["apns-collapse-id"], "score");
        assert_eq!(headers["apns-expiration"], "1700000000");
        assert_eq!(headers["apns-priority"], "5");
        assert_eq!(headers["apns-push-type"], "background");
    }

    #[test]
    fn test_check_header() {
        assert!(check_header("apns-topic", "com.example.app").is_ok());

        let err = check_header("apns-collapse-id", "a\nb").unwrap_err();
        assert_eq!(err.name, "apns-collapse-id");
        assert_eq!(err.to_string(), "invalid value for header apns-collapse-id");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}"));
        let err = client.push(&notification("tok", "{}")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_timeout() {
        let (base, _log) = spawn_gateway().await;
        let client = ApnsClient::with_config(
            identity(),
            ClientConfig {
                request_timeout: Duration::from_millis(200),
                production_url: format!("{base}/production"),
                ..Default::default()
            },
        );

        let err = client.push(&notification("slow", "{}")).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }), "{err:?}");
    }
}
