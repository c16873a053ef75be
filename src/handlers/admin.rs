use crate::{
    auth::{AdminSession, Permission, RoleSet},
    errors::ServiceError,
    logging::{tail_newest_log, DEFAULT_TAIL_LINES},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::error;

const MAX_TAIL_LINES: usize = 5_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub products: u64,
    pub categories: u64,
    pub orders: u64,
    pub users: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub username: String,
    pub roles: RoleSet,
    pub permissions: Vec<Permission>,
    pub counts: DashboardCounts,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogTail {
    pub file_logging: bool,
    pub lines: Vec<String>,
}

/// GET /admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    AdminSession(identity): AdminSession,
) -> ApiResult<AdminDashboard> {
    let services = &state.services;
    let counts = DashboardCounts {
        products: services.catalog.count_products().await?,
        categories: services.catalog.count_categories().await?,
        orders: services.orders.count_orders().await?,
        users: services.users.count_users().await?,
    };

    Ok(Json(ApiResponse::success(AdminDashboard {
        permissions: identity.permissions(),
        username: identity.username,
        roles: identity.roles,
        counts,
    })))
}

/// GET /admin/logs
pub async fn view_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<LogTail> {
    let Some(dir) = state.config.log_dir.clone() else {
        return Ok(Json(ApiResponse::success(LogTail {
            file_logging: false,
            lines: Vec::new(),
        })));
    };

    let lines = query
        .lines
        .unwrap_or(DEFAULT_TAIL_LINES)
        .clamp(1, MAX_TAIL_LINES);
    let tail = tokio::task::spawn_blocking(move || tail_newest_log(&PathBuf::from(dir), lines))
        .await
        .map_err(|e| ServiceError::InternalError(format!("log reader task failed: {}", e)))?
        .map_err(|e| {
            error!(error = %e, "failed to read log file");
            ServiceError::InternalError(format!("failed to read log file: {}", e))
        })?;

    Ok(Json(ApiResponse::success(LogTail {
        file_logging: true,
        lines: tail,
    })))
}
