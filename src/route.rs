//! Route definitions for the API
//!
//! Public routes are open to everyone; protected routes sit behind
//! [`auth_middleware`] and additionally check ownership per operation.

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::handler::{
    add_query, add_recommendation, all_queries, all_recommendations, clear_token,
    delete_query, delete_recommendation, delete_recommendation_by_path, issue_token,
    my_queries, query_comments, query_details, recent_queries, update_query,
    welcome,
};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Creates and configures the application router with all routes
///
/// # Route Definitions
///
/// Public:
/// - `GET /` - welcome text
/// - `POST /jwt`, `GET /clear-jwt` - session cookie management
/// - `GET /all-queries`, `GET /recent-queries`, `GET /query-details`
/// - `GET /query-comments`
///
/// Protected (session cookie + ownership):
/// - `GET /my-queries`, `GET /all-recommendations`
/// - `POST /add-query`, `PATCH /update-query`, `DELETE /delete-query/{id}`
/// - `POST /add-recommendation`, `DELETE /delete-recommendation[/{id}]`
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/my-queries", get(my_queries))
        .route("/all-recommendations", get(all_recommendations))
        .route("/add-query", post(add_query))
        .route("/update-query", patch(update_query))
        .route("/delete-query/{id}", delete(delete_query))
        .route("/add-recommendation", post(add_recommendation))
        .route("/delete-recommendation", delete(delete_recommendation))
        .route(
            "/delete-recommendation/{id}",
            delete(delete_recommendation_by_path),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(welcome))
        .route("/jwt", post(issue_token))
        .route("/clear-jwt", get(clear_token))
        .route("/all-queries", get(all_queries))
        .route("/recent-queries", get(recent_queries))
        .route("/query-details", get(query_details))
        .route("/query-comments", get(query_comments))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

/// Credentialed CORS for the configured origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            // tower-http refuses `*` in a list and alongside credentials
            if origin.trim() == "*" {
                warn!("ignoring wildcard CORS origin");
                return None;
            }
            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring unparsable CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
