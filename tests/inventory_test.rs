mod common;

use assert_matches::assert_matches;
use common::TestApp;
use moune_storefront::errors::ServiceError;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn total_is_sum_over_warehouses() {
    let app = TestApp::new().await;
    let product = app.product("Olive Oil", dec!(7.50)).await;
    let north = app.warehouse("North").await;
    let south = app.warehouse("South").await;
    let inventory = &app.state.services.inventory;

    assert_eq!(inventory.total_available(product.id).await.unwrap(), 0);

    app.stock(product.id, north.id, 3).await;
    app.stock(product.id, south.id, 2).await;
    assert_eq!(inventory.total_available(product.id).await.unwrap(), 5);

    let stock = inventory.stock_for_product(product.id).await.unwrap();
    assert_eq!(stock.total_available, 5);
    assert_eq!(stock.warehouses.len(), 2);
    assert_eq!(stock.warehouses[0].warehouse_name, "North");
}

#[tokio::test]
async fn zero_quantity_row_leaves_total_unchanged() {
    let app = TestApp::new().await;
    let product = app.product("Rice", dec!(2.00)).await;
    let main = app.warehouse("Main").await;
    let spare = app.warehouse("Spare").await;

    app.stock(product.id, main.id, 4).await;
    app.stock(product.id, spare.id, 0).await;

    let inventory = &app.state.services.inventory;
    assert_eq!(inventory.total_available(product.id).await.unwrap(), 4);
    assert_eq!(inventory.list_inventory().await.unwrap().len(), 2);
}

#[tokio::test]
async fn set_quantity_overwrites_existing_row() {
    let app = TestApp::new().await;
    let product = app.product("Flour", dec!(1.20)).await;
    let main = app.warehouse("Main").await;
    let inventory = &app.state.services.inventory;

    app.stock(product.id, main.id, 10).await;
    let row = inventory.set_quantity(product.id, main.id, 6).await.unwrap();

    assert_eq!(row.quantity, 6);
    assert_eq!(inventory.total_available(product.id).await.unwrap(), 6);
    assert_eq!(inventory.list_inventory().await.unwrap().len(), 1);
}

#[tokio::test]
async fn negative_quantity_is_rejected() {
    let app = TestApp::new().await;
    let product = app.product("Salt", dec!(0.80)).await;
    let main = app.warehouse("Main").await;

    let err = app
        .state
        .services
        .inventory
        .set_quantity(product.id, main.id, -1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn unknown_product_or_warehouse_is_not_found() {
    let app = TestApp::new().await;
    let product = app.product("Sugar", dec!(1.10)).await;
    let main = app.warehouse("Main").await;
    let inventory = &app.state.services.inventory;

    assert_matches!(
        inventory.set_quantity(Uuid::new_v4(), main.id, 1).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        inventory.set_quantity(product.id, Uuid::new_v4(), 1).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn warehouse_names_are_unique_and_delete_drops_stock() {
    let app = TestApp::new().await;
    let product = app.product("Tea", dec!(3.00)).await;
    let main = app.warehouse("Main").await;
    app.stock(product.id, main.id, 9).await;
    let inventory = &app.state.services.inventory;

    let duplicate = inventory
        .create_warehouse(moune_storefront::services::inventory::WarehouseInput {
            name: "Main".into(),
            location: String::new(),
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));

    inventory.delete_warehouse(main.id).await.unwrap();
    assert_eq!(inventory.total_available(product.id).await.unwrap(), 0);
    assert_matches!(
        inventory.delete_warehouse(main.id).await,
        Err(ServiceError::NotFound(_))
    );
}
