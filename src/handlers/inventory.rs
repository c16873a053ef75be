use crate::{
    entities::{inventory, warehouse},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::inventory::{InventoryRow, ProductStock, SetQuantityInput, WarehouseInput},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

/// GET /admin/warehouses
pub async fn list_warehouses(State(state): State<AppState>) -> ApiResult<Vec<warehouse::Model>> {
    let warehouses = state.services.inventory.list_warehouses().await?;
    Ok(Json(ApiResponse::success(warehouses)))
}

/// GET /admin/warehouses/:id
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<warehouse::Model> {
    let warehouse = state.services.inventory.get_warehouse(id).await?;
    Ok(Json(ApiResponse::success(warehouse)))
}

/// POST /admin/warehouses
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(input): Json<WarehouseInput>,
) -> Result<Response, ServiceError> {
    let warehouse = state.services.inventory.create_warehouse(input).await?;
    Ok(created_response(warehouse))
}

/// PUT /admin/warehouses/:id
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<WarehouseInput>,
) -> Result<Response, ServiceError> {
    let warehouse = state.services.inventory.update_warehouse(id, input).await?;
    Ok(success_response(warehouse))
}

/// DELETE /admin/warehouses/:id
pub async fn delete_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.inventory.delete_warehouse(id).await?;
    Ok(no_content_response())
}

/// GET /admin/inventory
pub async fn list_inventory(State(state): State<AppState>) -> ApiResult<Vec<InventoryRow>> {
    let rows = state.services.inventory.list_inventory().await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// PUT /admin/inventory
pub async fn set_quantity(
    State(state): State<AppState>,
    Json(input): Json<SetQuantityInput>,
) -> ApiResult<inventory::Model> {
    let row = state
        .services
        .inventory
        .set_quantity(input.product_id, input.warehouse_id, input.quantity)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

/// GET /admin/inventory/products/:id
pub async fn product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ProductStock> {
    let stock = state
        .services
        .inventory
        .stock_for_product(product_id)
        .await?;
    Ok(Json(ApiResponse::success(stock)))
}
