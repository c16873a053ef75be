use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item, product, user,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub username: Option<String>,
    pub items: Vec<OrderLine>,
}

/// Service for reading and administering orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists orders, newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderSummary>, u64), ServiceError> {
        let db = &*self.db;
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::OrderDate)
            .find_also_related(user::Entity)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.max(1) - 1).await?;

        let orders = rows
            .into_iter()
            .map(|(o, u)| OrderSummary {
                id: o.id,
                user_id: o.user_id,
                username: u.map(|u| u.username),
                status: o.status,
                total_amount: o.total_amount,
                order_date: o.order_date,
            })
            .collect();
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;
        let (order, owner) = order::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .find_also_related(product::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|(item, prod)| OrderLine {
                id: item.id,
                product_id: item.product_id,
                product_name: prod.map(|p| p.name),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.unit_price * Decimal::from(item.quantity),
            })
            .collect();

        Ok(OrderDetail {
            order,
            username: owner.map(|u| u.username),
            items,
        })
    }

    /// Sets an order's status. The status must name one of the known states.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: &str) -> Result<order::Model, ServiceError> {
        let new_status = OrderStatus::parse(status).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Invalid status '{}'; expected one of Pending, Processing, Shipped, Delivered, Cancelled",
                status
            ))
        })?;

        let existing = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let previous = existing.status;
        let mut model: order::ActiveModel = existing.into();
        model.status = Set(new_status);
        let updated = model.update(&*self.db).await?;

        info!(order_id = %id, from = %previous, to = %new_status, "order status updated");
        Ok(updated)
    }

    /// Creates a Pending order, capturing each product's current price.
    #[instrument(skip(self, lines))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        lines: &[OrderLineRequest],
    ) -> Result<OrderDetail, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "An order needs at least one line".into(),
            ));
        }
        if lines.iter().any(|l| l.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Order line quantities must be at least 1".into(),
            ));
        }

        let txn = self.db.begin().await?;

        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let prices: HashMap<Uuid, Decimal> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p.price))
            .collect();

        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let price = *prices.get(&line.product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;
            priced.push((line, price));
        }
        let total: Decimal = priced
            .iter()
            .map(|(line, price)| *price * Decimal::from(line.quantity))
            .sum();

        let order_id = Uuid::new_v4();
        order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total),
            order_date: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to create order");
            ServiceError::from(e)
        })?;

        for (line, price) in priced {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(price),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        info!(%order_id, %user_id, %total, "order created");
        self.get_order(order_id).await
    }

    pub async fn count_orders(&self) -> Result<u64, ServiceError> {
        Ok(order::Entity::find().count(&*self.db).await?)
    }
}
