use crate::{
    errors::ServiceError,
    handlers::common::{
        created_response, no_content_response, success_response, PaginatedResponse,
        PaginationParams,
    },
    services::{
        bulk_import::ImportReport,
        catalog::{BrowseQuery, ProductDetail, ProductInput, ProductSummary},
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

const UPLOAD_FIELD: &str = "csv_file";

async fn browse_page(
    state: &AppState,
    pagination: &PaginationParams,
    filters: &BrowseQuery,
) -> Result<PaginatedResponse<ProductSummary>, ServiceError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .catalog
        .browse(filters, page, per_page)
        .await?;
    Ok(PaginatedResponse::new(items, page, per_page, total))
}

/// GET /products
pub async fn browse_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<BrowseQuery>,
) -> ApiResult<PaginatedResponse<ProductSummary>> {
    let page = browse_page(&state, &pagination, &filters).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /products/:id and GET /admin/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// GET /admin/products
pub async fn admin_list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<BrowseQuery>,
) -> ApiResult<PaginatedResponse<ProductSummary>> {
    let page = browse_page(&state, &pagination, &filters).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(product))
}

/// PUT /admin/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.update_product(id, input).await?;
    Ok(success_response(product))
}

/// DELETE /admin/products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// POST /admin/products/bulk-upload
///
/// Expects a multipart form with a `csv_file` part whose file name ends in `.csv`.
pub async fn bulk_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<ImportReport> {
    let mut upload: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ServiceError::ValidationError("No file selected".into()));
        }
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            warn!(%file_name, "rejected non-CSV upload");
            return Err(ServiceError::ValidationError(
                "Invalid file type. Please upload a CSV file.".into(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Failed to read upload: {}", e)))?;
        info!(%file_name, bytes = bytes.len(), "received product CSV");
        upload = Some(bytes.to_vec());
        break;
    }

    let data = upload.ok_or_else(|| {
        ServiceError::ValidationError(format!("Missing '{}' file part", UPLOAD_FIELD))
    })?;
    let report = state.services.bulk_import.import_csv(&data).await?;
    Ok(Json(ApiResponse::success(report)))
}
