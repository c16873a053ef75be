mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};
use moune_storefront::{
    auth::Role,
    entities::{cart_item, inventory},
    errors::ServiceError,
    services::{
        catalog::{BrowseQuery, CategoryInput, ProductInput, SortField, SortOrder},
        orders::OrderLineRequest,
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn category_cannot_become_its_own_ancestor() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let food = app.category("Food").await;
    let fruit = catalog
        .create_category(CategoryInput {
            name: "Fruit".into(),
            parent_id: Some(food.id),
        })
        .await
        .unwrap();
    let citrus = catalog
        .create_category(CategoryInput {
            name: "Citrus".into(),
            parent_id: Some(fruit.id),
        })
        .await
        .unwrap();

    let err = catalog
        .update_category(
            food.id,
            CategoryInput {
                name: "Food".into(),
                parent_id: Some(citrus.id),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let err = catalog
        .update_category(
            fruit.id,
            CategoryInput {
                name: "Fruit".into(),
                parent_id: Some(fruit.id),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Moving a leaf to the root is fine.
    let moved = catalog
        .update_category(
            citrus.id,
            CategoryInput {
                name: "Citrus Fruit".into(),
                parent_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.parent_id, None);
    assert_eq!(moved.name, "Citrus Fruit");
}

#[tokio::test]
async fn category_names_are_unique() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    app.category("Bakery").await;
    let dairy = app.category("Dairy").await;

    let err = catalog
        .create_category(CategoryInput {
            name: "Bakery".into(),
            parent_id: Some(dairy.id),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let err = catalog
        .update_category(
            dairy.id,
            CategoryInput {
                name: " Bakery ".into(),
                parent_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let (_, token) = app.admin("shelves", &[Role::CategoryManager]).await;
    let res = app
        .request(
            Method::POST,
            "/admin/categories",
            Some(json!({ "name": "Dairy" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(catalog.list_categories().await.unwrap().len(), 2);
}

#[tokio::test]
async fn category_delete_requires_an_empty_category() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let parent = app.category("Household").await;
    let child = catalog
        .create_category(CategoryInput {
            name: "Kitchen".into(),
            parent_id: Some(parent.id),
        })
        .await
        .unwrap();
    let product = catalog
        .create_product(ProductInput {
            name: "Sponge".into(),
            description: "Yellow".into(),
            price: dec!(1.20),
            category_id: child.id,
        })
        .await
        .unwrap();

    assert_matches!(
        catalog.delete_category(parent.id).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        catalog.delete_category(child.id).await,
        Err(ServiceError::Conflict(_))
    );

    catalog.delete_product(product.id).await.unwrap();
    catalog.delete_category(child.id).await.unwrap();
    catalog.delete_category(parent.id).await.unwrap();

    assert_matches!(
        catalog.get_category(parent.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn product_validation_rejects_bad_input() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    let category = app.category("Misc").await;

    let negative = catalog
        .create_product(ProductInput {
            name: "Refund".into(),
            description: "Negative".into(),
            price: dec!(-1),
            category_id: category.id,
        })
        .await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));

    let blank = catalog
        .create_product(ProductInput {
            name: "   ".into(),
            description: "Blank".into(),
            price: dec!(1),
            category_id: category.id,
        })
        .await;
    assert_matches!(blank, Err(ServiceError::ValidationError(_)));

    let orphan = catalog
        .create_product(ProductInput {
            name: "Orphan".into(),
            description: "No category".into(),
            price: dec!(1),
            category_id: uuid::Uuid::new_v4(),
        })
        .await;
    assert_matches!(orphan, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn browse_sorts_filters_and_paginates() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    let drinks = app.category("Drinks").await;
    let snacks = app.category("Snacks").await;

    for (name, price, category) in [
        ("Apple Juice", dec!(3.50), drinks.id),
        ("Cola", dec!(1.25), drinks.id),
        ("Water", dec!(0.80), drinks.id),
        ("Crisps", dec!(2.10), snacks.id),
    ] {
        catalog
            .create_product(ProductInput {
                name: name.into(),
                description: format!("{} from the shelf", name),
                price,
                category_id: category,
            })
            .await
            .unwrap();
    }

    let by_price = BrowseQuery {
        sort: SortField::Price,
        order: SortOrder::Desc,
        ..Default::default()
    };
    let (first_page, total) = catalog.browse(&by_price, 1, 3).await.unwrap();
    assert_eq!(total, 4);
    let names: Vec<_> = first_page.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Apple Juice", "Crisps", "Cola"]);

    let (second_page, _) = catalog.browse(&by_price, 2, 3).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].name, "Water");

    let in_drinks = BrowseQuery {
        category_id: Some(drinks.id),
        ..Default::default()
    };
    let (items, total) = catalog.browse(&in_drinks, 1, 10).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(items[0].name, "Apple Juice");

    let search = BrowseQuery {
        q: Some("cola".into()),
        ..Default::default()
    };
    let (items, total) = catalog.browse(&search, 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].name, "Cola");
}

#[tokio::test]
async fn browse_reports_stock_across_warehouses() {
    let app = TestApp::new().await;
    let product = app.product("Tea", dec!(4.00)).await;
    let north = app.warehouse("North").await;
    let south = app.warehouse("South").await;
    app.stock(product.id, north.id, 7).await;
    app.stock(product.id, south.id, 5).await;

    let res = app
        .request(Method::GET, "/products?sort=price&order=desc", None, None)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["data"][0]["total_available"], 12);

    let res = app
        .request(Method::GET, &format!("/products/{}", product.id), None, None)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["total_available"], 12);
    assert_eq!(body["data"]["category_name"], "Tea category");
}

#[tokio::test]
async fn ordered_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20)).await;
    let (customer, _) = app.customer("buyer").await;

    app.state
        .services
        .orders
        .create_order(
            customer.id,
            &[OrderLineRequest {
                product_id: product.id,
                quantity: 1,
            }],
        )
        .await
        .unwrap();

    let (_, token) = app.admin("products", &[Role::ProductManager]).await;
    let res = app
        .request(
            Method::DELETE,
            &format!("/admin/products/{}", product.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_a_product_clears_its_stock_and_cart_lines() {
    let app = TestApp::new().await;
    let product = app.product("Mug", dec!(6)).await;
    let warehouse = app.warehouse("Depot").await;
    app.stock(product.id, warehouse.id, 10).await;

    let (customer, _) = app.customer("shopper").await;
    app.state
        .services
        .cart
        .add_item(customer.id, product.id, 2)
        .await
        .unwrap();

    let (_, token) = app.admin("products", &[Role::ProductManager]).await;
    let res = app
        .request(
            Method::DELETE,
            &format!("/admin/products/{}", product.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let db = &*app.state.db;
    let stock_rows = inventory::Entity::find()
        .filter(inventory::Column::ProductId.eq(product.id))
        .count(db)
        .await
        .unwrap();
    let cart_rows = cart_item::Entity::find()
        .filter(cart_item::Column::ProductId.eq(product.id))
        .count(db)
        .await
        .unwrap();
    assert_eq!(stock_rows, 0);
    assert_eq!(cart_rows, 0);

    let res = app
        .request(Method::GET, &format!("/products/{}", product.id), None, None)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_routes_round_trip_through_the_admin_api() {
    let app = TestApp::new().await;
    let (_, token) = app.admin("cats", &[Role::CategoryManager]).await;

    let res = app
        .request(
            Method::POST,
            "/admin/categories",
            Some(json!({ "name": "Garden" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = body_json(res).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let res = app
        .request(
            Method::PUT,
            &format!("/admin/categories/{}", id),
            Some(json!({ "name": "Garden & Outdoor" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.request(Method::GET, "/categories", None, None).await;
    let body = body_json(res).await;
    assert_eq!(body["data"][0]["name"], "Garden & Outdoor");

    let res = app
        .request(
            Method::DELETE,
            &format!("/admin/categories/{}", id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}
