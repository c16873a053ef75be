//! Moune storefront
//!
//! Catalog, warehouse inventory, an inventory-aware cart and a role-gated
//! back office, served as a JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod migrator;
pub mod seed;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, FromRef, State},
    http::HeaderValue,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};

use crate::auth::{AuthRouterExt, Permission, SessionService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub sessions: Arc<SessionService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let sessions = Arc::new(SessionService::new(
            &config.session_secret,
            config.session_ttl_secs,
            config.secure_cookies(),
        ));
        Self {
            services: handlers::AppServices::new(db.clone()),
            db,
            config,
            sessions,
        }
    }
}

impl FromRef<AppState> for Arc<SessionService> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Storefront routes: public catalog, customer account and cart.
pub fn storefront_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Customer account
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::customer_login))
        .route("/logout", post(handlers::auth::customer_logout))
        .route("/customer/dashboard", get(handlers::customers::dashboard))
        // Catalog
        .route("/products", get(handlers::products::browse_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route("/categories", get(handlers::categories::list_categories))
        // Cart
        .route("/cart", get(handlers::carts::view_cart))
        .route("/cart/items", post(handlers::carts::add_item))
        .route(
            "/cart/items/:id",
            put(handlers::carts::update_item).delete(handlers::carts::remove_item),
        )
        .route("/checkout", post(handlers::checkout::checkout))
}

/// Back-office routes, mounted under `/admin`. Every resource group sits
/// behind the permission that manages it.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    let sessions = state.sessions.clone();

    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::admin_list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/products/bulk-upload",
            post(handlers::products::bulk_upload)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes)),
        )
        .with_permission(sessions.clone(), Permission::ManageProducts);

    let categories = Router::new()
        .route(
            "/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        .with_permission(sessions.clone(), Permission::ManageCategories);

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .with_permission(sessions.clone(), Permission::ManageOrders);

    let inventory = Router::new()
        .route(
            "/warehouses",
            get(handlers::inventory::list_warehouses).post(handlers::inventory::create_warehouse),
        )
        .route(
            "/warehouses/:id",
            get(handlers::inventory::get_warehouse)
                .put(handlers::inventory::update_warehouse)
                .delete(handlers::inventory::delete_warehouse),
        )
        .route(
            "/inventory",
            get(handlers::inventory::list_inventory).put(handlers::inventory::set_quantity),
        )
        .route(
            "/inventory/products/:id",
            get(handlers::inventory::product_stock),
        )
        .with_permission(sessions.clone(), Permission::ManageInventory);

    let users = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_admin_user),
        )
        .route("/users/roles", get(handlers::users::list_roles))
        .route(
            "/users/:id",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )
        .route("/users/:id/roles", put(handlers::users::update_roles))
        .with_permission(sessions.clone(), Permission::ManageUsers);

    let logs = Router::new()
        .route("/logs", get(handlers::admin::view_logs))
        .with_permission(sessions, Permission::ViewLogs);

    Router::new()
        .route("/login", post(handlers::auth::admin_login))
        .route("/logout", post(handlers::auth::admin_logout))
        .route("/dashboard", get(handlers::admin::dashboard))
        .merge(products)
        .merge(categories)
        .merge(orders)
        .merge(inventory)
        .merge(users)
        .merge(logs)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if config.is_development() {
        CorsLayer::permissive()
    } else {
        // Same-origin only.
        CorsLayer::new()
    }
}

/// The complete application with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(storefront_routes())
        .nest("/admin", admin_routes(&state))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn home() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "service": "moune-storefront",
        "message": "Welcome to Moune",
        "links": {
            "products": "/products",
            "categories": "/categories",
            "cart": "/cart",
            "login": "/login",
            "register": "/register",
        },
    })))
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "service": "moune-storefront",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(e) => {
            ::tracing::warn!(error = %e, "database health check failed");
            "unhealthy"
        }
    };

    Ok(Json(ApiResponse::success(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_is_attached() {
        let response = ApiResponse::success(1).with_message("done");
        assert_eq!(response.message.as_deref(), Some("done"));
        assert!(response.success);
    }
}
