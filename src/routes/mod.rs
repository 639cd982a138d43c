//! Rutas de la aplicación
//!
//! Arma el router completo: health check público y la API de reservas
//! detrás del middleware de autenticación.

pub mod reservation_routes;

use axum::{routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::auth::auth_middleware;
use crate::middleware::cors::{cors_middleware, cors_middleware_with_origins};
use crate::state::AppState;

/// Construir la aplicación completa con su estado
pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(state.config.cors_origins.clone())
    };

    Router::new()
        .route("/health", get(health))
        .nest(
            "/api/reservation",
            reservation_routes::create_reservation_router().layer(
                axum::middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check simple
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "vehicle-rental-engine",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
