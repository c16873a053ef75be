mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{body_json, TestApp};
use moune_storefront::{
    auth::Role,
    entities::{category, product},
    errors::ServiceError,
};
use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

const BOUNDARY: &str = "moune-test-boundary";

fn multipart_body(field: &str, file_name: &str, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n--{b}--\r\n",
        b = BOUNDARY
    )
}

fn upload_request(token: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/admin/products/bulk-upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("build upload request")
}

#[tokio::test]
async fn bad_rows_are_skipped_and_good_rows_inserted() {
    let app = TestApp::new().await;
    let csv = "\
name,description,price,category
Green Tea,Loose leaf,3.50,Beverages
Broken Row,No price here,,Beverages
Mystery,Price is text,abc,Snacks
Crisps,Salted,1.25,Snacks
Refund,Negative price,-2,Snacks
";

    let report = app
        .state
        .services
        .bulk_import
        .import_csv(csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert!(!report.aborted);
    let rows: Vec<u64> = report.skipped.iter().map(|s| s.row).collect();
    assert_eq!(rows, vec![3, 4, 6]);
    assert_eq!(
        product::Entity::find().count(&*app.state.db).await.unwrap(),
        2
    );

    let categories = app.state.services.catalog.list_categories().await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Beverages", "Snacks"]);
}

#[tokio::test]
async fn duplicates_in_same_category_are_skipped() {
    let app = TestApp::new().await;
    let csv = "\
Name,Description,Price,Category_Name
Oat Milk,Barista,2.10,Dairy Products
Oat Milk,Barista again,2.20,Dairy Products
Oat Milk,Different aisle,2.10,Beverages
";

    let report = app
        .state
        .services
        .bulk_import
        .import_csv(csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].row, 3);
    assert!(report.skipped[0].reason.contains("duplicate"));
}

#[tokio::test]
async fn skipped_rows_leave_no_category_behind() {
    let app = TestApp::new().await;
    let long_name = "x".repeat(150);
    let csv = format!(
        "name,description,price,category\n{},Too long,1.00,Ghost Aisle\nPlum,Ripe,0.40,Fruit\n",
        long_name
    );

    let report = app
        .state
        .services
        .bulk_import
        .import_csv(csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].row, 2);
    let ghosts = category::Entity::find()
        .filter(category::Column::Name.eq("Ghost Aisle"))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(ghosts, 0);
}

#[tokio::test]
async fn database_failure_stops_the_import_but_keeps_earlier_rows() {
    let app = TestApp::new().await;
    app.state
        .db
        .execute_unprepared(
            "CREATE TRIGGER reject_faulty_product BEFORE INSERT ON products \
             WHEN NEW.name = 'Faulty' \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END;",
        )
        .await
        .unwrap();
    let csv = "\
name,description,price,category
Anchovies,Tinned,2.00,Pantry
Capers,Jarred,1.50,Pantry
Faulty,Fails to store,1.00,Pantry
Olives,Never reached,3.00,Pantry
";

    let report = app
        .state
        .services
        .bulk_import
        .import_csv(csv.as_bytes())
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.inserted, 2);
    assert!(report.skipped.is_empty());

    let mut names: Vec<String> = product::Entity::find()
        .all(&*app.state.db)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Anchovies", "Capers"]);
}

#[tokio::test]
async fn missing_header_column_is_a_validation_error() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .bulk_import
        .import_csv(b"name,description,category\nTea,Green,Beverages\n")
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn upload_route_accepts_csv_files() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("catalog", &[Role::ProductManager]).await;
    let csv = "name,description,price,category\nBagel,Sesame,0.90,Bakery\nScone,,1.20,Bakery\n";

    let response = app
        .send(upload_request(&token, multipart_body("csv_file", "products.csv", csv)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["inserted"], 1);
    assert_eq!(body["data"]["skipped"][0]["row"], 3);
}

#[tokio::test]
async fn upload_route_rejects_other_file_types() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("catalog", &[Role::ProductManager]).await;

    let response = app
        .send(upload_request(
            &token,
            multipart_body("csv_file", "products.xlsx", "name\n"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        product::Entity::find().count(&*app.state.db).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn upload_requires_product_permission() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("orders", &[Role::OrderManager]).await;

    let response = app
        .send(upload_request(
            &token,
            multipart_body("csv_file", "products.csv", "name,description,price,category\n"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
