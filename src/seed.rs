//! Demo data: the super admin, a sample customer, the starter categories, a
//! warehouse holding a sample product, and one pending order.
//!
//! Every step checks for existing rows first, so seeding twice is harmless.

use crate::{
    auth::{hash_password, Role, RoleSet},
    entities::{order, product, user, warehouse},
    errors::ServiceError,
    services::{
        catalog::find_or_create_category,
        inventory::InventoryService,
        orders::{OrderLineRequest, OrderService},
    },
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const STARTER_CATEGORIES: [&str; 10] = [
    "Beverages",
    "Fresh Produce",
    "Pantry Staples",
    "Frozen Goods",
    "Cleaning Supplies",
    "Personal Care",
    "Snacks",
    "Dairy Products",
    "Meat and Poultry",
    "Bakery",
];

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const CUSTOMER_USERNAME: &str = "customer";
pub const CUSTOMER_EMAIL: &str = "customer@example.com";
pub const CUSTOMER_PASSWORD: &str = "customer123";

const SAMPLE_WAREHOUSE: &str = "Main Warehouse";
const SAMPLE_STOCK: i32 = 100;

/// What a seeding run created. Rows that already existed are not counted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SeedSummary {
    pub users: u32,
    pub categories: u32,
    pub warehouses: u32,
    pub products: u32,
    pub orders: u32,
}

async fn ensure_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<(user::Model, bool), ServiceError> {
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }

    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password)?),
        roles: Set(RoleSet::single(role).to_storage()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    info!(username, role = %role, "seeded user");
    Ok((created, true))
}

/// Loads the demo data set.
pub async fn seed(db: Arc<DatabaseConnection>) -> Result<SeedSummary, ServiceError> {
    let conn = &*db;
    let mut summary = SeedSummary::default();

    let (_, created) = ensure_user(
        conn,
        ADMIN_USERNAME,
        ADMIN_EMAIL,
        ADMIN_PASSWORD,
        Role::SuperAdmin,
    )
    .await?;
    summary.users += u32::from(created);

    let (customer, created) = ensure_user(
        conn,
        CUSTOMER_USERNAME,
        CUSTOMER_EMAIL,
        CUSTOMER_PASSWORD,
        Role::Customer,
    )
    .await?;
    summary.users += u32::from(created);

    let before = crate::entities::category::Entity::find().count(conn).await?;
    let mut first_category = None;
    for name in STARTER_CATEGORIES {
        let category = find_or_create_category(conn, name).await?;
        first_category.get_or_insert(category);
    }
    let after = crate::entities::category::Entity::find().count(conn).await?;
    summary.categories = u32::try_from(after.saturating_sub(before)).unwrap_or(u32::MAX);

    let warehouse = match warehouse::Entity::find()
        .filter(warehouse::Column::Name.eq(SAMPLE_WAREHOUSE))
        .one(conn)
        .await?
    {
        Some(existing) => existing,
        None => {
            summary.warehouses += 1;
            warehouse::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(SAMPLE_WAREHOUSE.to_string()),
                location: Set("Head office".to_string()),
                created_at: Set(Utc::now()),
            }
            .insert(conn)
            .await?
        }
    };

    let sample = match product::Entity::find()
        .order_by_asc(product::Column::CreatedAt)
        .one(conn)
        .await?
    {
        Some(existing) => existing,
        None => {
            let category = first_category.ok_or_else(|| {
                ServiceError::InternalError("no category available for the sample product".into())
            })?;
            let now = Utc::now();
            let created = product::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set("Sample Product".to_string()),
                description: Set("This is a sample product.".to_string()),
                price: Set(dec!(9.99)),
                category_id: Set(category.id),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;

            InventoryService::new(db.clone())
                .set_quantity(created.id, warehouse.id, SAMPLE_STOCK)
                .await?;
            summary.products += 1;
            created
        }
    };

    if order::Entity::find().count(conn).await? == 0 {
        OrderService::new(db.clone())
            .create_order(
                customer.id,
                &[OrderLineRequest {
                    product_id: sample.id,
                    quantity: 2,
                }],
            )
            .await?;
        summary.orders += 1;
    }

    info!(?summary, "seeding finished");
    Ok(summary)
}
