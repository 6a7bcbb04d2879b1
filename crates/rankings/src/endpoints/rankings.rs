use axum::extract;
use axum::http::HeaderMap;
use axum::response::Json;
use rankings_service::services::Services;
use rankings_service::types::{RankingKind, RankingResponse};

use super::ResponseError;

/// Requests carrying this header with the value `true` bypass the ranking cache.
pub const CACHE_REFRESH_HEADER: &str = "X-Cache-Refresh";

fn force_refresh(headers: &HeaderMap) -> bool {
    headers
        .get(CACHE_REFRESH_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true")
}

async fn handle_ranking_request(
    kind: RankingKind,
    services: Services,
    headers: HeaderMap,
) -> Result<Json<RankingResponse>, ResponseError> {
    let response = services
        .rankings
        .get_ranking(kind, force_refresh(&headers))
        .await?;
    Ok(Json(response))
}

pub async fn top_revenue(
    extract::State(services): extract::State<Services>,
    headers: HeaderMap,
) -> Result<Json<RankingResponse>, ResponseError> {
    handle_ranking_request(RankingKind::TopRevenue, services, headers).await
}

pub async fn top_cities(
    extract::State(services): extract::State<Services>,
    headers: HeaderMap,
) -> Result<Json<RankingResponse>, ResponseError> {
    handle_ranking_request(RankingKind::TopCities, services, headers).await
}

pub async fn top_categories(
    extract::State(services): extract::State<Services>,
    headers: HeaderMap,
) -> Result<Json<RankingResponse>, ResponseError> {
    handle_ranking_request(RankingKind::TopCategories, services, headers).await
}
