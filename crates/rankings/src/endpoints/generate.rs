use axum::extract;
use axum::response::Json;
use rankings_service::services::Services;
use rankings_service::types::GenerateResponse;

use super::ResponseError;

/// Appends a batch of synthetic records to the data file.
pub async fn handle_generate_request(
    extract::State(services): extract::State<Services>,
) -> Result<Json<GenerateResponse>, ResponseError> {
    let response = services.generator.append(None).await?;
    Ok(Json(response))
}
