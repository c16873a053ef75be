mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_json, TestApp};
use moune_storefront::auth::{Realm, Role};
use rstest::rstest;
use rust_decimal_macros::dec;
use serde_json::json;

fn location(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn inventory_manager_cannot_manage_products_but_can_set_stock() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("stockkeeper", &[Role::InventoryManager]).await;
    let product = app.product("Beans", dec!(1.99)).await;
    let main = app.warehouse("Main").await;
    let category = app.category("Canned").await;

    let refused = app
        .request(
            Method::POST,
            "/admin/products",
            Some(json!({
                "name": "Chickpeas",
                "description": "Dried chickpeas",
                "price": "2.49",
                "category_id": category.id,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(refused.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&refused), Some("/admin/dashboard"));
    let notice = body_json(refused).await;
    assert_eq!(notice["level"], "danger");
    assert!(notice["message"]
        .as_str()
        .unwrap()
        .contains("products:manage"));
    assert!(notice.get("data").is_none());

    let listing = app
        .request(Method::GET, "/admin/products", None, Some(&token))
        .await;
    assert_eq!(listing.status(), StatusCode::SEE_OTHER);

    let allowed = app
        .request(
            Method::PUT,
            "/admin/inventory",
            Some(json!({
                "product_id": product.id,
                "warehouse_id": main.id,
                "quantity": 12,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    let body = body_json(allowed).await;
    assert_eq!(body["data"]["quantity"], 12);
}

#[tokio::test]
async fn super_admin_passes_every_gate() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("root", &[Role::SuperAdmin]).await;
    let product = app.product("Beans", dec!(1.99)).await;
    let main = app.warehouse("Main").await;
    let category = app.category("Canned").await;

    let created = app
        .request(
            Method::POST,
            "/admin/products",
            Some(json!({
                "name": "Chickpeas",
                "description": "Dried chickpeas",
                "price": "2.49",
                "category_id": category.id,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let stocked = app
        .request(
            Method::PUT,
            "/admin/inventory",
            Some(json!({
                "product_id": product.id,
                "warehouse_id": main.id,
                "quantity": 3,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(stocked.status(), StatusCode::OK);

    let logs = app
        .request(Method::GET, "/admin/logs", None, Some(&token))
        .await;
    assert_eq!(logs.status(), StatusCode::OK);
    assert_eq!(body_json(logs).await["data"]["file_logging"], false);
}

#[rstest]
#[case(Role::ProductManager, "/admin/orders")]
#[case(Role::OrderManager, "/admin/users")]
#[case(Role::CategoryManager, "/admin/warehouses")]
#[case(Role::UserManager, "/admin/logs")]
#[tokio::test]
async fn roles_are_refused_outside_their_area(#[case] role: Role, #[case] path: &str) {
    let app = TestApp::new().await;
    let (_, token) = app.admin("limited", &[role]).await;

    let response = app.request(Method::GET, path, None, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/dashboard"));
}

#[tokio::test]
async fn dashboard_lists_expanded_permissions() {
    let app = TestApp::new().await;
    let (_, token) = app
        .admin("manager", &[Role::OrderManager, Role::CategoryManager])
        .await;

    let response = app
        .request(Method::GET, "/admin/dashboard", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let permissions = body["data"]["permissions"].as_array().unwrap();
    assert_eq!(permissions.len(), 2);
    assert!(permissions.contains(&json!("orders:manage")));
    assert!(permissions.contains(&json!("categories:manage")));
    assert_eq!(body["data"]["counts"]["users"], 1);
}

#[tokio::test]
async fn missing_or_wrong_realm_sessions_redirect_to_login() {
    let app = TestApp::new().await;

    let anonymous = app.request(Method::GET, "/admin/orders", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&anonymous), Some("/admin/login"));

    let (customer, customer_token) = app.customer("shopper").await;
    let as_customer = app
        .request(Method::GET, "/admin/dashboard", None, Some(&customer_token))
        .await;
    assert_eq!(as_customer.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&as_customer), Some("/admin/login"));

    // A customer holding an admin-realm token still lacks an admin role.
    let forged = app.token_for(&customer, Realm::Admin);
    let response = app
        .request(Method::GET, "/admin/dashboard", None, Some(&forged))
        .await;
    assert_eq!(location(&response), Some("/admin/login"));

    let cart = app.request(Method::GET, "/cart", None, None).await;
    assert_eq!(cart.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&cart), Some("/login"));
}
