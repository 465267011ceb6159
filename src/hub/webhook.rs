/// Channel lifecycle webhooks
///
/// When `hub.webhook_url` is set, `channel_occupied` and `channel_vacated`
/// are POSTed there as `{"time_ms":..,"events":[{"name":..,"channel":..}]}`.
/// With `hub.webhook_secret` set, the body is signed with HMAC-SHA256 and the
/// hex digest sent in `X-Pusher-Signature`; `X-Pusher-Key` carries the app id.
///
/// Delivery is fire-and-forget on the current tokio runtime. Failures are
/// logged and never reach the publish path.
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

use crate::config::HubConfig;
use crate::logger::{self, LogTag};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Pusher-Signature";
pub const KEY_HEADER: &str = "X-Pusher-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ChannelOccupied,
    ChannelVacated,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ChannelOccupied => "channel_occupied",
            LifecycleEvent::ChannelVacated => "channel_vacated",
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    time_ms: i64,
    events: [WebhookEvent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WebhookEvent<'a> {
    name: &'a str,
    channel: &'a str,
}

/// Serialize one lifecycle event into a webhook body
pub fn build_body(
    event: LifecycleEvent,
    channel: &str,
    time_ms: i64,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&WebhookPayload {
        time_ms,
        events: [WebhookEvent {
            name: event.name(),
            channel,
        }],
    })
}

/// Hex HMAC-SHA256 of `body` keyed by `secret`
pub fn sign(secret: &str, body: &[u8]) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("invalid webhook secret: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct WebhookNotifier {
    url: String,
    secret: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: String, timeout: Duration) -> Self {
        Self {
            url,
            secret,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// None when no webhook URL is configured
    pub fn from_config(config: &HubConfig) -> Option<Self> {
        if config.webhook_url.is_empty() {
            return None;
        }
        logger::info(
            LogTag::Webhook,
            &format!(
                "channel lifecycle webhooks -> {} ({})",
                config.webhook_url,
                if config.webhook_secret.is_empty() {
                    "unsigned"
                } else {
                    "signed"
                }
            ),
        );
        Some(Self::new(
            config.webhook_url.clone(),
            config.webhook_secret.clone(),
            Duration::from_secs(config.webhook_timeout_secs),
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the signed POST for one event
    fn request(&self, app_id: &str, body: Vec<u8>) -> Result<reqwest::RequestBuilder, String> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json");

        if !self.secret.is_empty() {
            let signature = sign(&self.secret, &body)?;
            request = request
                .header(KEY_HEADER, app_id)
                .header(SIGNATURE_HEADER, signature);
        }
        Ok(request.body(body))
    }

    /// Send `event` for `channel` in the background
    ///
    /// Outside a tokio runtime the event is dropped with a debug log.
    pub fn notify(&self, app_id: &str, event: LifecycleEvent, channel: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                logger::debug(
                    LogTag::Webhook,
                    &format!("no runtime, skipping {} for {}/{}", event.name(), app_id, channel),
                );
                return;
            }
        };

        let time_ms = chrono::Utc::now().timestamp_millis();
        let request = build_body(event, channel, time_ms)
            .map_err(|e| e.to_string())
            .and_then(|body| self.request(app_id, body));
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                logger::error(
                    LogTag::Webhook,
                    &format!("failed to build {} webhook: {}", event.name(), e),
                );
                return;
            }
        };

        let label = format!("{} {}/{}", event.name(), app_id, channel);
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    logger::debug(LogTag::Webhook, &format!("sent {}", label));
                }
                Ok(response) => {
                    logger::warning(
                        LogTag::Webhook,
                        &format!("{}: endpoint answered {}", label, response.status()),
                    );
                }
                Err(e) => {
                    logger::error(LogTag::Webhook, &format!("{}: request failed: {}", label, e));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let body = build_body(LifecycleEvent::ChannelVacated, "room1", 1_700_000_000_123).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"time_ms":1700000000123,"events":[{"name":"channel_vacated","channel":"room1"}]}"#
        );
    }

    #[test]
    fn test_signature_is_hex_hmac_sha256() {
        assert_eq!(
            sign("key", b"The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_signed_request_headers() {
        let notifier = WebhookNotifier::new(
            "http://127.0.0.1:9/hook".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
        );
        let body = build_body(LifecycleEvent::ChannelOccupied, "room1", 1).unwrap();
        let request = notifier
            .request("app1", body.clone())
            .unwrap()
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers.get(KEY_HEADER).unwrap(), "app1");
        assert_eq!(
            headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap(),
            sign("secret", &body).unwrap()
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(body.as_slice()));
    }

    #[test]
    fn test_unsigned_request_has_no_signature() {
        let notifier = WebhookNotifier::new(
            "http://127.0.0.1:9/hook".to_string(),
            String::new(),
            Duration::from_secs(5),
        );
        let request = notifier
            .request("app1", b"{}".to_vec())
            .unwrap()
            .build()
            .unwrap();
        assert!(request.headers().get(SIGNATURE_HEADER).is_none());
    }

    #[test]
    fn test_disabled_without_url() {
        assert!(WebhookNotifier::from_config(&HubConfig::default()).is_none());
        let config = HubConfig {
            webhook_url: "http://127.0.0.1:9/hook".to_string(),
            ..HubConfig::default()
        };
        let notifier = WebhookNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.url(), "http://127.0.0.1:9/hook");
    }

    #[cfg(feature = "web")]
    #[tokio::test]
    async fn test_notify_posts_to_endpoint() {
        use axum::{body::Bytes, http::HeaderMap, routing::post, Router};
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::channel::<(HeaderMap, Bytes)>(4);
        let app = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, body: Bytes| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send((headers, body)).await;
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let notifier = WebhookNotifier::new(
            format!("http://{}/hook", addr),
            "secret".to_string(),
            Duration::from_secs(5),
        );
        notifier.notify("app1", LifecycleEvent::ChannelOccupied, "room1");

        let (headers, body) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap(),
            sign("secret", &body).unwrap()
        );

        let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["events"][0]["name"], "channel_occupied");
        assert_eq!(payload["events"][0]["channel"], "room1");
        assert!(payload["time_ms"].as_i64().unwrap() > 0);
    }
}
