use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{can_manage_product, AuthenticatedUser};
use crate::entities::product::{self, Entity as Product, ProductCategory, ProductUnit};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::AuditService;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub category: ProductCategory,
    pub description: Option<String>,
    pub price: Decimal,
    pub unit: ProductUnit,
    pub inventory: i32,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub unit: Option<ProductUnit>,
    pub inventory: Option<i32>,
    pub available: Option<bool>,
    pub location: Option<String>,
}

/// One line of a bulk inventory update.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryUpdate {
    pub product_id: Uuid,
    pub inventory: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub farmer_id: Option<Uuid>,
    /// Substring match on the product name or description.
    pub q: Option<String>,
    pub max_price: Option<Decimal>,
    /// When true (the storefront default), hide unavailable and
    /// zero-inventory listings.
    pub in_stock_only: bool,
}

/// Product catalogue: listings, inventory, availability.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    audit: AuditService,
    low_stock_threshold: i32,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        audit: AuditService,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            db,
            event_sender,
            audit,
            low_stock_threshold,
        }
    }

    #[instrument(skip(self, input), fields(farmer_id = %farmer_id))]
    pub async fn create_product(
        &self,
        farmer_id: Uuid,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        validate_price(input.price)?;
        validate_inventory(input.inventory)?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            farmer_id: Set(farmer_id),
            category: Set(input.category),
            description: Set(input.description),
            price: Set(input.price),
            unit: Set(input.unit),
            inventory: Set(input.inventory),
            available: Set(true),
            location: Set(input.location),
            ..Default::default()
        };
        let created = model.insert(self.db.as_ref()).await?;
        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, actor, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        actor: &AuthenticatedUser,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_product(product_id).await?;
        if !can_manage_product(actor, &existing) {
            return Err(ServiceError::Forbidden(
                "You can only manage your own products".to_string(),
            ));
        }

        if let Some(price) = input.price {
            validate_price(price)?;
        }
        if let Some(inventory) = input.inventory {
            validate_inventory(inventory)?;
        }

        let previous_inventory = existing.inventory;
        let previous_available = existing.available;
        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit);
        }
        if let Some(inventory) = input.inventory {
            active.inventory = Set(inventory);
        }
        if let Some(available) = input.available {
            active.available = Set(available);
        }
        if let Some(location) = input.location {
            active.location = Set(Some(location));
        }

        let updated = active.update(self.db.as_ref()).await?;
        if updated.inventory != previous_inventory {
            self.audit
                .record_fire_and_forget(
                    Some(actor.id),
                    "product.inventory_changed",
                    "product",
                    Some(updated.id),
                    Some(serde_json::json!({
                        "from": previous_inventory,
                        "to": updated.inventory,
                    })),
                )
                .await;
        }
        if updated.available != previous_available {
            self.audit
                .record_fire_and_forget(
                    Some(actor.id),
                    "product.moderated",
                    "product",
                    Some(updated.id),
                    Some(serde_json::json!({
                        "from": previous_available,
                        "to": updated.available,
                    })),
                )
                .await;
        }
        self.notify_if_low(&updated).await;
        Ok(updated)
    }

    /// Set inventory across several listings at once. All-or-nothing: a bad
    /// line (negative count, unknown or foreign product) rolls the whole
    /// batch back.
    #[instrument(skip(self, actor, updates), fields(lines = updates.len()))]
    pub async fn bulk_update_inventory(
        &self,
        actor: &AuthenticatedUser,
        updates: Vec<InventoryUpdate>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        if updates.is_empty() {
            return Err(ServiceError::ValidationError(
                "No inventory updates supplied".to_string(),
            ));
        }
        for update in &updates {
            validate_inventory(update.inventory)?;
        }

        let txn = self.db.begin().await?;
        let mut changes = Vec::new();
        let mut applied = Vec::with_capacity(updates.len());
        for update in updates {
            let existing = Product::find_by_id(update.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", update.product_id))
                })?;
            if !can_manage_product(actor, &existing) {
                return Err(ServiceError::Forbidden(
                    "You can only manage your own products".to_string(),
                ));
            }
            let previous = existing.inventory;
            let mut active: product::ActiveModel = existing.into();
            active.inventory = Set(update.inventory);
            let updated = active.update(&txn).await?;
            if updated.inventory != previous {
                changes.push(serde_json::json!({
                    "product_id": updated.id,
                    "from": previous,
                    "to": updated.inventory,
                }));
            }
            applied.push(updated);
        }
        txn.commit().await?;
        info!(updated = applied.len(), "bulk inventory update applied");

        if !changes.is_empty() {
            self.audit
                .record_fire_and_forget(
                    Some(actor.id),
                    "product.inventory_bulk_updated",
                    "product",
                    None,
                    Some(serde_json::json!({ "changes": changes })),
                )
                .await;
        }
        for product in &applied {
            self.notify_if_low(product).await;
        }
        Ok(applied)
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_product(
        &self,
        actor: &AuthenticatedUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = self.get_product(product_id).await?;
        if !can_manage_product(actor, &existing) {
            return Err(ServiceError::Forbidden(
                "You can only manage your own products".to_string(),
            ));
        }
        // Sold products are referenced by order history, so listings are
        // retired rather than removed.
        let mut active: product::ActiveModel = existing.into();
        active.available = Set(false);
        active.inventory = Set(0);
        active.update(self.db.as_ref()).await?;
        self.audit
            .record_fire_and_forget(
                Some(actor.id),
                "product.retired",
                "product",
                Some(product_id),
                None,
            )
            .await;
        Ok(())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut condition = Condition::all();
        if let Some(category) = filter.category {
            condition = condition.add(product::Column::Category.eq(category));
        }
        if let Some(farmer_id) = filter.farmer_id {
            condition = condition.add(product::Column::FarmerId.eq(farmer_id));
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let q = q.trim();
            condition = condition.add(
                Condition::any()
                    .add(product::Column::Name.contains(q))
                    .add(product::Column::Description.contains(q)),
            );
        }
        if let Some(max_price) = filter.max_price {
            condition = condition.add(product::Column::Price.lte(max_price));
        }
        if filter.in_stock_only {
            condition = condition
                .add(product::Column::Available.eq(true))
                .add(product::Column::Inventory.gt(0));
        }

        let paginator = Product::find()
            .filter(condition)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page.clamp(1, 100));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((products, total))
    }

    /// A farmer's listings at or below the low stock threshold.
    #[instrument(skip(self))]
    pub async fn low_stock(&self, farmer_id: Uuid) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find()
            .filter(product::Column::FarmerId.eq(farmer_id))
            .filter(product::Column::Available.eq(true))
            .filter(product::Column::Inventory.lte(self.low_stock_threshold))
            .order_by_asc(product::Column::Inventory)
            .all(self.db.as_ref())
            .await?;
        Ok(products)
    }

    pub(crate) async fn notify_if_low(&self, product: &product::Model) {
        if product.inventory <= self.low_stock_threshold {
            self.event_sender
                .send_or_log(Event::InventoryLow {
                    product_id: product.id,
                    remaining: product.inventory,
                })
                .await;
        }
    }
}

fn validate_price(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_inventory(inventory: i32) -> Result<(), ServiceError> {
    if inventory < 0 {
        return Err(ServiceError::ValidationError(
            "Inventory cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_price_rejected() {
        assert!(validate_price(Decimal::ZERO).is_err());
        assert!(validate_price(dec!(-1.50)).is_err());
        assert!(validate_price(dec!(0.01)).is_ok());
    }

    #[test]
    fn negative_inventory_rejected() {
        assert!(validate_inventory(-1).is_err());
        assert!(validate_inventory(0).is_ok());
    }
}
