use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use roster_registration::RegistrationCoordinator;
use roster_registry::Registry;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// `GET /registry/live` reports whether the registry backend answers.
pub(crate) fn registry_router<R>(coordinator: Arc<RegistrationCoordinator<R>>) -> Router
where
    R: Registry,
{
    Router::new()
        .route("/registry/live", get(registry_live_handler::<R>))
        .with_state(coordinator)
}

async fn registry_live_handler<R>(
    State(coordinator): State<Arc<RegistrationCoordinator<R>>>,
) -> Json<Value>
where
    R: Registry,
{
    let live = coordinator
        .registry_is_live(&CancellationToken::new())
        .await;

    Json(json!({ "live": live }))
}
