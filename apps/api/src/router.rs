use axum::{routing::get, Router};

use notification_cell::handlers::NotificationState;
use notification_cell::router::notification_routes;

pub fn create_router(state: NotificationState) -> Router {
    Router::new()
        .route("/", get(|| async { "Medora Clinic API is running!" }))
        .nest("/notifications", notification_routes(state))
}
