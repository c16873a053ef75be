pub mod admin;
pub mod auth;
pub mod carts;
pub mod categories;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod users;

use crate::services::{
    bulk_import::BulkImportService, cart::CartService, catalog::CatalogService,
    inventory::InventoryService, orders::OrderService, users::UserService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub inventory: Arc<InventoryService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<UserService>,
    pub bulk_import: Arc<BulkImportService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            inventory: Arc::new(InventoryService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone())),
            users: Arc::new(UserService::new(db.clone())),
            bulk_import: Arc::new(BulkImportService::new(db)),
        }
    }
}
