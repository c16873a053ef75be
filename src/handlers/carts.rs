use crate::{
    auth::CustomerSession,
    entities::cart_item,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response},
    services::cart::{AddToCartInput, CartView, UpdateCartItemInput},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

/// GET /cart
pub async fn view_cart(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
) -> ApiResult<CartView> {
    let cart = state.services.cart.get_cart(identity.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// POST /cart/items
pub async fn add_item(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
    Json(input): Json<AddToCartInput>,
) -> Result<Response, ServiceError> {
    let item = state
        .services
        .cart
        .add_item(identity.user_id, input.product_id, input.quantity)
        .await?;
    Ok(created_response(item))
}

/// PUT /cart/items/:id
pub async fn update_item(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateCartItemInput>,
) -> ApiResult<cart_item::Model> {
    let item = state
        .services
        .cart
        .update_item(identity.user_id, item_id, input.quantity)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// DELETE /cart/items/:id
pub async fn remove_item(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
    Path(item_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .cart
        .remove_item(identity.user_id, item_id)
        .await?;
    Ok(no_content_response())
}
