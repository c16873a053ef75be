use crate::{
    entities::{cart, cart_item, product},
    errors::ServiceError,
    services::inventory::total_available_on,
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemInput {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A user's cart as shown to them. Users without a cart see an empty one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

/// Inventory-aware shopping cart.
///
/// A line's quantity never exceeds the product's total inventory at the time
/// of the mutation. The increment is a single conditional `UPDATE`, so two
/// concurrent adds cannot both pass the check against the same stale value.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's cart, creating it on first use.
    async fn ensure_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        cart::Entity::insert(model)
            .on_conflict(
                OnConflict::column(cart::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("Cart missing after creation".into()))
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<cart::Model>, ServiceError> {
        Ok(cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    /// Adds `requested` units of a product to the user's cart.
    ///
    /// Quantities below 1 are treated as 1. Rejected with
    /// [`ServiceError::CartQuantityExceeded`] when the cart would hold more than
    /// the product's total inventory; the error carries how many more units
    /// could still be added.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        requested: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let requested = requested.max(1);

        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        match self.try_add(user_id, product_id, requested).await {
            Err(e) if e.is_unique_violation() || matches!(e, ServiceError::ConcurrentModification(_)) => {
                warn!(%user_id, %product_id, "cart line changed concurrently, retrying add once");
                self.try_add(user_id, product_id, requested).await
            }
            other => other,
        }
    }

    async fn try_add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        requested: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let db = &*self.db;
        let total = total_available_on(db, product_id).await?;
        let cart = self.ensure_cart(user_id).await?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(db)
            .await?;

        // A line can never hold more than an i32 column stores.
        let total = total.min(i64::from(i32::MAX));
        let existing_qty = existing.as_ref().map(|i| i64::from(i.quantity)).unwrap_or(0);
        if existing_qty + i64::from(requested) > total {
            return Err(reject(product_id, requested, total, existing_qty));
        }

        let now = Utc::now();
        let item = match existing {
            Some(item) => {
                let result = cart_item::Entity::update_many()
                    .col_expr(
                        cart_item::Column::Quantity,
                        Expr::col(cart_item::Column::Quantity).add(requested),
                    )
                    .col_expr(cart_item::Column::UpdatedAt, Expr::value(now))
                    .filter(cart_item::Column::Id.eq(item.id))
                    .filter(cart_item::Column::Quantity.lte(total - i64::from(requested)))
                    .exec(db)
                    .await?;

                let fresh = cart_item::Entity::find_by_id(item.id).one(db).await?;
                match (result.rows_affected, fresh) {
                    (0, Some(fresh)) => {
                        return Err(reject(
                            product_id,
                            requested,
                            total,
                            i64::from(fresh.quantity),
                        ))
                    }
                    (_, Some(fresh)) => fresh,
                    (_, None) => return Err(ServiceError::ConcurrentModification(item.id)),
                }
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(requested),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(db)
                .await?
            }
        };

        counter!("moune_cart.items_added", 1);
        info!(%user_id, %product_id, quantity = item.quantity, "cart line updated");
        Ok(item)
    }

    /// Overwrites the quantity of one of the user's cart lines.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let db = &*self.db;
        let (item, cart) = self.owned_item(user_id, item_id).await?;

        let total = total_available_on(db, item.product_id).await?;
        if i64::from(quantity) > total {
            counter!("moune_cart.update_rejected", 1);
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} unit(s) of this product are available",
                total
            )));
        }

        let result = cart_item::Entity::update_many()
            .col_expr(cart_item::Column::Quantity, Expr::value(quantity))
            .col_expr(cart_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cart_item::Column::Id.eq(item.id))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Cart item {} not found", item_id)));
        }

        cart_item::Entity::find_by_id(item.id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))
    }

    /// Deletes one of the user's cart lines.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let (item, cart) = self.owned_item(user_id, item_id).await?;

        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::Id.eq(item.id))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Cart item {} not found", item_id)));
        }

        info!(%user_id, %item_id, "cart line removed");
        Ok(())
    }

    /// Loads a line and checks it belongs to the user's cart.
    async fn owned_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<(cart_item::Model, cart::Model), ServiceError> {
        let item = cart_item::Entity::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        match self.find_cart(user_id).await? {
            Some(cart) if cart.id == item.cart_id => Ok((item, cart)),
            _ => {
                warn!(%user_id, %item_id, "attempt to modify another user's cart line");
                Err(ServiceError::Forbidden(
                    "Cart item does not belong to your cart".to_string(),
                ))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let Some(cart) = self.find_cart(user_id).await? else {
            return Ok(CartView {
                cart_id: None,
                items: Vec::new(),
                item_count: 0,
                subtotal: Decimal::ZERO,
            });
        };

        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        let items: Vec<CartLine> = rows
            .into_iter()
            .filter_map(|(item, product)| {
                let product = product?;
                Some(CartLine {
                    item_id: item.id,
                    product_id: item.product_id,
                    product_name: product.name,
                    unit_price: product.price,
                    quantity: item.quantity,
                    line_total: product.price * Decimal::from(item.quantity),
                })
            })
            .collect();

        Ok(CartView {
            cart_id: Some(cart.id),
            item_count: items.iter().map(|l| i64::from(l.quantity)).sum(),
            subtotal: items.iter().map(|l| l.line_total).sum(),
            items,
        })
    }

    /// Removes every line from the user's cart. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let Some(cart) = self.find_cart(user_id).await? else {
            return Ok(0);
        };
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn reject(product_id: Uuid, requested: i32, total: i64, existing: i64) -> ServiceError {
    counter!("moune_cart.add_rejected", 1);
    let remaining = (total - existing).max(0);
    info!(%product_id, requested, remaining, "cart add exceeds available stock");
    ServiceError::CartQuantityExceeded {
        product_id,
        requested,
        remaining,
    }
}
