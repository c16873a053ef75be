use crate::{
    auth::{AdminSession, Role},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response},
    services::users::{CreateAdminUserInput, UpdateRolesInput, UserProfile},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use strum::IntoEnumIterator;
use uuid::Uuid;

/// GET /admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserProfile>> {
    let users = state.services.users.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// GET /admin/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserProfile> {
    let user = state.services.users.get_user(id).await?;
    Ok(Json(ApiResponse::success(UserProfile::from(user))))
}

/// GET /admin/users/roles
pub async fn list_roles() -> ApiResult<Vec<Role>> {
    Ok(Json(ApiResponse::success(Role::iter().collect())))
}

/// POST /admin/users
pub async fn create_admin_user(
    State(state): State<AppState>,
    Json(input): Json<CreateAdminUserInput>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.create_admin_user(input).await?;
    Ok(created_response(UserProfile::from(user)))
}

/// PUT /admin/users/:id/roles
pub async fn update_roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRolesInput>,
) -> ApiResult<UserProfile> {
    let user = state.services.users.update_roles(id, &input.roles).await?;
    Ok(Json(ApiResponse::success(UserProfile::from(user))))
}

/// DELETE /admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .users
        .delete_user(id, identity.user_id)
        .await?;
    Ok(no_content_response())
}
