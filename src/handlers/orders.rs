use crate::{
    entities::order,
    handlers::common::{PaginatedResponse, PaginationParams},
    services::orders::{OrderDetail, OrderSummary, UpdateOrderStatusRequest},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

/// GET /admin/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<OrderSummary>> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (orders, total) = state.services.orders.list_orders(page, per_page).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, page, per_page, total,
    ))))
}

/// GET /admin/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// PUT /admin/orders/:id/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .orders
        .update_status(id, &req.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
