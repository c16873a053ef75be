#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::Utc;
use moune_storefront::{
    auth::{hash_password, Realm, Role, RoleSet},
    build_router,
    config::AppConfig,
    db,
    entities::{category, product, user, warehouse},
    services::{
        catalog::{CategoryInput, ProductInput},
        inventory::WarehouseInput,
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-session-secret-0123456789";

/// Helper harness for spinning up an application backed by a throwaway SQLite file.
///
/// A file (rather than `sqlite::memory:`) lets several pooled connections see
/// the same data, which the concurrency tests rely on.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("moune_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 5;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // ---- fixtures ----

    pub async fn insert_user(&self, username: &str, roles: &[Role]) -> user::Model {
        let roles: RoleSet = roles.iter().copied().collect();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(format!("{}@example.com", username)),
            password_hash: Set(hash_password("password123").expect("hash")),
            roles: Set(roles.to_storage()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert user")
    }

    pub fn token_for(&self, user: &user::Model, realm: Realm) -> String {
        self.state
            .sessions
            .issue(user.id, &user.username, &user.role_set(), realm)
            .expect("issue session")
            .token
    }

    /// A customer account plus a customer-realm token.
    pub async fn customer(&self, username: &str) -> (user::Model, String) {
        let user = self.insert_user(username, &[Role::Customer]).await;
        let token = self.token_for(&user, Realm::Customer);
        (user, token)
    }

    /// An admin account holding `roles` plus an admin-realm token.
    pub async fn admin(&self, username: &str, roles: &[Role]) -> (user::Model, String) {
        let user = self.insert_user(username, roles).await;
        let token = self.token_for(&user, Realm::Admin);
        (user, token)
    }

    pub async fn category(&self, name: &str) -> category::Model {
        self.state
            .services
            .catalog
            .create_category(CategoryInput {
                name: name.to_string(),
                parent_id: None,
            })
            .await
            .expect("create category")
    }

    pub async fn product(&self, name: &str, price: Decimal) -> product::Model {
        let category = self.category(&format!("{} category", name)).await;
        self.state
            .services
            .catalog
            .create_product(ProductInput {
                name: name.to_string(),
                description: format!("{} description", name),
                price,
                category_id: category.id,
            })
            .await
            .expect("create product")
    }

    pub async fn warehouse(&self, name: &str) -> warehouse::Model {
        self.state
            .services
            .inventory
            .create_warehouse(WarehouseInput {
                name: name.to_string(),
                location: String::new(),
            })
            .await
            .expect("create warehouse")
    }

    pub async fn stock(&self, product_id: Uuid, warehouse_id: Uuid, quantity: i32) {
        self.state
            .services
            .inventory
            .set_quantity(product_id, warehouse_id, quantity)
            .await
            .expect("set stock");
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
