use crate::{
    auth::{AdminSession, CustomerSession, IssuedSession, Realm},
    entities::user,
    errors::ServiceError,
    handlers::common::{created_response, MessageResponse},
    services::users::{RegisterInput, UserProfile},
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CustomerLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub session: IssuedSession,
    pub user: UserProfile,
}

fn with_cookie(mut response: Response, cookie: String) -> Result<Response, ServiceError> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ServiceError::InternalError(format!("invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

fn start_session(
    state: &AppState,
    user: user::Model,
    realm: Realm,
) -> Result<Response, ServiceError> {
    let session = state
        .sessions
        .issue(user.id, &user.username, &user.role_set(), realm)?;
    let cookie = state.sessions.session_cookie(realm, &session.token);
    info!(user_id = %user.id, %realm, "session started");

    let body = LoginResponse {
        session,
        user: UserProfile::from(user),
    };
    with_cookie(Json(ApiResponse::success(body)).into_response(), cookie)
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.register(input).await?;
    Ok(created_response(UserProfile::from(user)))
}

/// POST /login
pub async fn customer_login(
    State(state): State<AppState>,
    Json(req): Json<CustomerLoginRequest>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .users
        .authenticate_customer(&req.email, &req.password)
        .await?;
    start_session(&state, user, Realm::Customer)
}

/// POST /logout
pub async fn customer_logout(
    State(state): State<AppState>,
    session: Option<CustomerSession>,
) -> Result<Response, ServiceError> {
    if let Some(CustomerSession(identity)) = session {
        state.sessions.revoke(&identity).await;
        info!(user_id = %identity.user_id, "customer logged out");
    }
    with_cookie(
        Json(ApiResponse::success(MessageResponse::new("You have been logged out."))).into_response(),
        state.sessions.clear_cookie(Realm::Customer),
    )
}

/// POST /admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .users
        .authenticate_admin(&req.username, &req.password)
        .await?;
    start_session(&state, user, Realm::Admin)
}

/// POST /admin/logout
pub async fn admin_logout(
    State(state): State<AppState>,
    session: Option<AdminSession>,
) -> Result<Response, ServiceError> {
    if let Some(AdminSession(identity)) = session {
        state.sessions.revoke(&identity).await;
        info!(user_id = %identity.user_id, "admin logged out");
    }
    with_cookie(
        Json(ApiResponse::success(MessageResponse::new("You have been logged out."))).into_response(),
        state.sessions.clear_cookie(Realm::Admin),
    )
}
