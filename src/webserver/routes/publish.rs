/// Publish API
///
/// In-process binding of the engine's boolean entry points. Callers are
/// expected to be authenticated upstream.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::webserver::state::AppState;
use crate::webserver::utils::{error_response, success_response};

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub channel: String,
    pub event: String,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    /// Comma-delimited channel list
    pub channels: String,
    pub event: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub ok: bool,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/apps/:app_id/publish", post(publish))
        .route("/apps/:app_id/broadcast", post(broadcast))
}

/// POST /apps/:app_id/publish
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Response {
    logger::debug(
        LogTag::Webserver,
        &format!("publish {}/{} '{}'", app_id, request.channel, request.event),
    );

    let ok = state
        .engine
        .publish(&app_id, &request.channel, &request.event, &request.data);
    respond(&state, &app_id, ok)
}

/// POST /apps/:app_id/broadcast
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
    Json(request): Json<BroadcastRequest>,
) -> Response {
    logger::debug(
        LogTag::Webserver,
        &format!("broadcast {}/[{}] '{}'", app_id, request.channels, request.event),
    );

    let ok = state.engine.broadcast_multi(
        &app_id,
        &request.channels,
        &request.event,
        &request.data,
    );
    respond(&state, &app_id, ok)
}

fn respond(state: &AppState, app_id: &str, ok: bool) -> Response {
    if !ok && !state.engine.accepts_app(app_id) {
        return error_response(
            StatusCode::NOT_FOUND,
            "UNKNOWN_APPLICATION",
            &format!("Application '{}' is not configured", app_id),
            None,
        );
    }
    success_response(PublishResponse { ok })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HubConfig, WebsocketConfig};
    use crate::hub::FanoutEngine;

    fn state(hub: HubConfig) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(FanoutEngine::new(hub)),
            WebsocketConfig::default(),
        ))
    }

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_publish_delivers_to_subscriber() {
        let state = state(HubConfig::default());
        let (conn, mut rx) = state.engine.open_connection().unwrap();
        state.engine.subscribe("app1", "room1", conn).unwrap();

        let response = publish(
            State(Arc::clone(&state)),
            Path("app1".to_string()),
            Json(PublishRequest {
                channel: "room1".to_string(),
                event: "msg".to_string(),
                data: "hello".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, serde_json::json!({ "ok": true }));
        assert_eq!(
            rx.try_recv().unwrap().as_str(),
            r#"{"event":"msg","data":"hello"}"#
        );
    }

    #[tokio::test]
    async fn test_broadcast_invalid_list_is_not_ok() {
        let state = state(HubConfig::default());

        let response = broadcast(
            State(state),
            Path("app1".to_string()),
            Json(BroadcastRequest {
                channels: "a,,b".to_string(),
                event: "msg".to_string(),
                data: "x".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, serde_json::json!({ "ok": false }));
    }

    #[tokio::test]
    async fn test_unknown_application_is_404() {
        let state = state(HubConfig {
            allowed_apps: vec!["app1".to_string()],
            ..HubConfig::default()
        });

        let response = broadcast(
            State(state),
            Path("other".to_string()),
            Json(BroadcastRequest {
                channels: "room1".to_string(),
                event: "msg".to_string(),
                data: "x".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["error"]["code"], "UNKNOWN_APPLICATION");
    }
}
