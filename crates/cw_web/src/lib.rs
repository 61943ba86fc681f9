use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();
    let limiter = state.limiter.clone();

    let articles = Router::new()
        .route("/", get(handlers::articles::list_articles))
        .route("/scrape", post(handlers::articles::scrape_articles))
        .route("/keywords", get(handlers::articles::keyword_cloud))
        .route("/reset", delete(handlers::articles::reset_articles))
        .route(
            "/:id",
            get(handlers::articles::get_article).delete(handlers::articles::delete_article),
        );

    let analytics = Router::new()
        .route(
            "/disruption-type-totals",
            get(handlers::analytics::disruption_type_totals),
        )
        .route(
            "/weekly-disruption-type-counts",
            get(handlers::analytics::weekly_disruption_type_counts),
        )
        .route(
            "/severity-level-counts",
            get(handlers::analytics::severity_level_counts),
        )
        .route(
            "/total-severity-counts",
            get(handlers::analytics::total_severity_counts),
        );

    let preferences = Router::new()
        .route("/filter-articles", get(handlers::preferences::filter_articles))
        .route(
            "/available-locations",
            get(handlers::preferences::available_locations),
        )
        .route(
            "/available-disruption-types",
            get(handlers::preferences::available_disruption_types),
        )
        .route(
            "/available-severity-levels",
            get(handlers::preferences::available_severity_levels),
        )
        .route("/search", get(handlers::preferences::search_articles));

    Router::new()
        .nest("/api/articles", articles)
        .nest("/api/analytics", analytics)
        .nest("/api/preferences", preferences)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, AppState, RateLimiter};
    pub use cw_core::{Article, Error, Result};
}
