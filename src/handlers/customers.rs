use crate::{
    auth::CustomerSession, services::users::UserProfile, ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, Json};

/// GET /customer/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    CustomerSession(identity): CustomerSession,
) -> ApiResult<UserProfile> {
    let user = state.services.users.get_user(identity.user_id).await?;
    Ok(Json(ApiResponse::success(UserProfile::from(user))))
}
