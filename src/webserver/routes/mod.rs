use axum::Router;
use std::sync::Arc;

use crate::webserver::state::AppState;

pub mod publish;
pub mod status;
pub mod ws;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(ws::routes())
        .merge(publish::routes())
        .nest("/api", api_routes())
        .with_state(state)
}

/// Build API routes
fn api_routes() -> Router<Arc<AppState>> {
    Router::new().merge(status::routes())
}
