use crate::{
    entities::{inventory, product, warehouse},
    errors::ServiceError,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WarehouseInput {
    #[validate(length(min = 1, max = 100, message = "Warehouse name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityInput {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub quantity: i32,
}

/// Per-warehouse breakdown of one product's stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_available: i64,
    pub warehouses: Vec<WarehouseStock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub quantity: i32,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Sum of a product's quantities over all warehouses. No rows means zero.
pub async fn total_available_on<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<i64, DbErr> {
    let total: Option<Option<i64>> = inventory::Entity::find()
        .select_only()
        .column_as(inventory::Column::Quantity.sum(), "total")
        .filter(inventory::Column::ProductId.eq(product_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Warehouses and per-(product, warehouse) stock levels.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn total_available(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        Ok(total_available_on(&*self.db, product_id).await?)
    }

    /// Overwrites (or creates) the quantity held for a product in a warehouse.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<inventory::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must not be negative".to_string(),
            ));
        }

        let db = &*self.db;
        product::Entity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        warehouse::Entity::find_by_id(warehouse_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id))
            })?;

        let row = inventory::ActiveModel {
            product_id: Set(product_id),
            warehouse_id: Set(warehouse_id),
            quantity: Set(quantity),
            updated_at: Set(Utc::now()),
        };

        inventory::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    inventory::Column::ProductId,
                    inventory::Column::WarehouseId,
                ])
                .update_columns([inventory::Column::Quantity, inventory::Column::UpdatedAt])
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        counter!("moune_inventory.quantity_set", 1);
        info!(%product_id, %warehouse_id, quantity, "inventory quantity set");

        inventory::Entity::find_by_id((product_id, warehouse_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("Inventory row vanished after upsert".into()))
    }

    #[instrument(skip(self))]
    pub async fn stock_for_product(&self, product_id: Uuid) -> Result<ProductStock, ServiceError> {
        let db = &*self.db;
        let product = product::Entity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let rows = inventory::Entity::find()
            .filter(inventory::Column::ProductId.eq(product_id))
            .find_also_related(warehouse::Entity)
            .all(db)
            .await?;

        let mut warehouses: Vec<WarehouseStock> = rows
            .into_iter()
            .map(|(row, wh)| WarehouseStock {
                warehouse_id: row.warehouse_id,
                warehouse_name: wh.map(|w| w.name).unwrap_or_default(),
                quantity: row.quantity,
            })
            .collect();
        warehouses.sort_by(|a, b| a.warehouse_name.cmp(&b.warehouse_name));

        let total_available = warehouses.iter().map(|w| i64::from(w.quantity)).sum();

        Ok(ProductStock {
            product_id,
            product_name: product.name,
            total_available,
            warehouses,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_inventory(&self) -> Result<Vec<InventoryRow>, ServiceError> {
        let db = &*self.db;
        let warehouses: HashMap<Uuid, String> = warehouse::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|w| (w.id, w.name))
            .collect();

        let rows = inventory::Entity::find()
            .find_also_related(product::Entity)
            .all(db)
            .await?;

        let mut listing: Vec<InventoryRow> = rows
            .into_iter()
            .map(|(row, prod)| InventoryRow {
                product_id: row.product_id,
                product_name: prod.map(|p| p.name).unwrap_or_default(),
                warehouse_id: row.warehouse_id,
                warehouse_name: warehouses
                    .get(&row.warehouse_id)
                    .cloned()
                    .unwrap_or_default(),
                quantity: row.quantity,
                updated_at: row.updated_at,
            })
            .collect();
        listing.sort_by(|a, b| {
            (&a.product_name, &a.warehouse_name).cmp(&(&b.product_name, &b.warehouse_name))
        });
        Ok(listing)
    }

    #[instrument(skip(self))]
    pub async fn create_warehouse(
        &self,
        input: WarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let model = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            location: Set(input.location.trim().to_string()),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            if crate::errors::is_unique_violation(&e) {
                ServiceError::Conflict(format!("Warehouse '{}' already exists", input.name))
            } else {
                ServiceError::from(e)
            }
        })?;

        info!(warehouse_id = %created.id, "warehouse created");
        Ok(created)
    }

    pub async fn list_warehouses(&self) -> Result<Vec<warehouse::Model>, ServiceError> {
        Ok(warehouse::Entity::find()
            .order_by_asc(warehouse::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_warehouse(&self, id: Uuid) -> Result<warehouse::Model, ServiceError> {
        warehouse::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn update_warehouse(
        &self,
        id: Uuid,
        input: WarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_warehouse(id).await?;

        let mut model: warehouse::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_string());
        model.location = Set(input.location.trim().to_string());

        model.update(&*self.db).await.map_err(|e| {
            if crate::errors::is_unique_violation(&e) {
                ServiceError::Conflict(format!("Warehouse '{}' already exists", input.name))
            } else {
                ServiceError::from(e)
            }
        })
    }

    /// Deletes a warehouse together with its inventory rows.
    #[instrument(skip(self))]
    pub async fn delete_warehouse(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        inventory::Entity::delete_many()
            .filter(inventory::Column::WarehouseId.eq(id))
            .exec(&txn)
            .await?;

        let result = warehouse::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Warehouse {} not found", id)));
        }

        txn.commit().await?;
        info!(warehouse_id = %id, "warehouse deleted");
        Ok(())
    }
}
