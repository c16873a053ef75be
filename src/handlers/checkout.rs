use crate::{auth::CustomerSession, services::cart::CartView, ApiResponse, ApiResult, AppState};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

pub const CHECKOUT_NOT_AVAILABLE: &str = "not_available";

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub status: String,
    pub message: String,
    pub cart: CartView,
}

/// POST /checkout
///
/// Payment is not wired up yet: the cart is summarised and left untouched.
pub async fn checkout(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
) -> ApiResult<CheckoutResponse> {
    let cart = state.services.cart.get_cart(identity.user_id).await?;
    Ok(Json(ApiResponse::success(CheckoutResponse {
        status: CHECKOUT_NOT_AVAILABLE.to_string(),
        message: "Checkout is not available yet.".to_string(),
        cart,
    })))
}
