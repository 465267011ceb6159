/// WebSocket upgrade endpoint
///
/// `GET /app/:app_id` upgrades to the Pusher-style protocol handled in
/// `webserver::ws`.
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::webserver::{state::AppState, ws};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/app/:app_id", get(ws_upgrade))
}

async fn ws_upgrade(
    upgrade: WebSocketUpgrade,
    Path(app_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    logger::debug(
        LogTag::Webserver,
        &format!("WebSocket upgrade requested for {}", app_id),
    );
    upgrade.on_upgrade(move |socket| ws::handle_connection(socket, app_id, state))
}
