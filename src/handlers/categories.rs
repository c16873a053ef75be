use crate::{
    entities::category,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::catalog::CategoryInput,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

/// GET /categories and GET /admin/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

/// GET /admin/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<category::Model> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// POST /admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<Response, ServiceError> {
    let category = state.services.catalog.create_category(input).await?;
    Ok(created_response(category))
}

/// PUT /admin/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> Result<Response, ServiceError> {
    let category = state.services.catalog.update_category(id, input).await?;
    Ok(success_response(category))
}

/// DELETE /admin/categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(no_content_response())
}
