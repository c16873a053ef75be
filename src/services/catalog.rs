use crate::{
    entities::{cart_item, category, inventory, order_item, product},
    errors::{is_unique_violation, ServiceError},
    services::inventory::total_available_on,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub price: Decimal,
    pub category_id: Uuid,
}

impl ProductInput {
    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError("Name is required".into()));
        }
        if self.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Price,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filters and ordering for product listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub order: SortOrder,
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Uuid,
    pub total_available: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub category_name: Option<String>,
    pub total_available: i64,
}

/// Resolves a category by exact name, creating it as a root category when absent.
pub async fn find_or_create_category<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<category::Model, ServiceError> {
    if let Some(existing) = category::Entity::find()
        .filter(category::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let inserted = category::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        parent_id: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(created) => {
            info!(category_id = %created.id, name, "category created");
            Ok(created)
        }
        // Another writer created the same name first.
        Err(e) if is_unique_violation(&e) => category::Entity::find()
            .filter(category::Column::Name.eq(name))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::from(e)),
        Err(e) => Err(e.into()),
    }
}

fn duplicate_category(name: &str) -> impl FnOnce(DbErr) -> ServiceError + '_ {
    move |e| {
        if is_unique_violation(&e) {
            ServiceError::Conflict(format!("Category '{}' already exists", name))
        } else {
            ServiceError::from(e)
        }
    }
}

/// Products and the category tree.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn require_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    // ---- products ----

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: ProductInput) -> Result<product::Model, ServiceError> {
        input.check()?;
        self.require_category(input.category_id).await?;

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description.trim().to_string()),
            price: Set(input.price),
            category_id: Set(input.category_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let (product, category) = product::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let total_available = total_available_on(db, id).await?;
        Ok(ProductDetail {
            product,
            category_name: category.map(|c| c.name),
            total_available,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: ProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.check()?;
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        self.require_category(input.category_id).await?;

        let mut model: product::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_string());
        model.description = Set(input.description.trim().to_string());
        model.price = Set(input.price);
        model.category_id = Set(input.category_id);
        model.updated_at = Set(Utc::now());

        Ok(model.update(&*self.db).await?)
    }

    /// Deletes a product with its inventory rows and cart lines. Products that
    /// appear on an order are kept.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let ordered = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&txn)
            .await?;
        if ordered > 0 {
            return Err(ServiceError::Conflict(
                "Product appears on existing orders and cannot be deleted".to_string(),
            ));
        }

        inventory::Entity::delete_many()
            .filter(inventory::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;

        let result = product::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }

        txn.commit().await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Lists one page of products. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn browse(
        &self,
        query: &BrowseQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductSummary>, u64), ServiceError> {
        let db = &*self.db;
        let mut select = product::Entity::find();

        if let Some(category_id) = query.category_id {
            select = select.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(term) = query.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Description.contains(term)),
            );
        }

        let column = match query.sort {
            SortField::Name => product::Column::Name,
            SortField::Price => product::Column::Price,
        };
        select = match query.order {
            SortOrder::Asc => select.order_by_asc(column),
            SortOrder::Desc => select.order_by_desc(column),
        };
        select = select.order_by_asc(product::Column::Id);

        let paginator = select.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.max(1) - 1).await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let totals = self.totals_for(&ids).await?;

        let items = products
            .into_iter()
            .map(|p| ProductSummary {
                total_available: totals.get(&p.id).copied().unwrap_or(0),
                id: p.id,
                name: p.name,
                description: p.description,
                price: p.price,
                category_id: p.category_id,
            })
            .collect();

        Ok((items, total))
    }

    /// Total inventory for several products in one query.
    async fn totals_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, Option<i64>)> = inventory::Entity::find()
            .select_only()
            .column(inventory::Column::ProductId)
            .column_as(inventory::Column::Quantity.sum(), "total")
            .filter(inventory::Column::ProductId.is_in(ids.to_vec()))
            .group_by(inventory::Column::ProductId)
            .into_tuple()
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, total)| (id, total.unwrap_or(0)))
            .collect())
    }

    pub async fn count_products(&self) -> Result<u64, ServiceError> {
        Ok(product::Entity::find().count(&*self.db).await?)
    }

    // ---- categories ----

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        self.require_category(id).await
    }

    pub async fn count_categories(&self) -> Result<u64, ServiceError> {
        Ok(category::Entity::find().count(&*self.db).await?)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        if let Some(parent_id) = input.parent_id {
            self.require_category(parent_id).await?;
        }

        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            parent_id: Set(input.parent_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(duplicate_category(input.name.trim()))?;

        info!(category_id = %created.id, "category created");
        Ok(created)
    }

    /// Renames or re-parents a category. A category may not become its own
    /// ancestor.
    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let existing = self.require_category(id).await?;

        if let Some(parent_id) = input.parent_id {
            self.require_category(parent_id).await?;
            self.ensure_not_descendant(id, parent_id).await?;
        }

        let mut model: category::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_string());
        model.parent_id = Set(input.parent_id);
        model
            .update(&*self.db)
            .await
            .map_err(duplicate_category(input.name.trim()))
    }

    /// Walks up from `new_parent`; reaching `id` means the move would close a cycle.
    async fn ensure_not_descendant(&self, id: Uuid, new_parent: Uuid) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(ServiceError::Conflict(
                    "A category cannot be moved under itself or one of its descendants"
                        .to_string(),
                ));
            }
            if !seen.insert(current) {
                break;
            }
            cursor = category::Entity::find_by_id(current)
                .one(&*self.db)
                .await?
                .and_then(|c| c.parent_id);
        }
        Ok(())
    }

    /// Deletes a category that has neither subcategories nor products.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        self.require_category(id).await?;

        let children = category::Entity::find()
            .filter(category::Column::ParentId.eq(id))
            .count(db)
            .await?;
        if children > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category has {} subcategories; move or delete them first",
                children
            )));
        }

        let products = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(db)
            .await?;
        if products > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category still holds {} products; move or delete them first",
                products
            )));
        }

        category::Entity::delete_by_id(id).exec(db).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }
}
