use axum::Router;
use axum::routing::get;
use rankings_service::config::Config;
use rankings_service::metric;
use rankings_service::services::Services;
use rankings_service::types::RankingKind;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};

mod error;
mod generate;
mod metrics;
mod rankings;

pub use error::ResponseError;
use metrics::MetricsLayer;

use generate::handle_generate_request as generate;
use rankings::{top_categories, top_cities, top_revenue};

pub async fn healthcheck() -> &'static str {
    metric!(counter("healthcheck") += 1);
    "ok"
}

pub fn create_app(services: Services, config: &Config) -> Router {
    // The layers here go "top to bottom" according to the reading order here.
    let layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(MetricsLayer);

    // any other path serves the index page
    let index = ServeFile::new(config.web_root.join("index.html"));

    Router::new()
        .route(RankingKind::TopRevenue.path(), get(top_revenue))
        .route(RankingKind::TopCities.path(), get(top_cities))
        .route(RankingKind::TopCategories.path(), get(top_categories))
        .route("/gerar-dados", get(generate).post(generate))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .fallback_service(index)
        .with_state(services)
        .layer(layer)
        // the healthcheck is last, as it will bypass all the middlewares
        .route("/healthcheck", get(healthcheck))
}
