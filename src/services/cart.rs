use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::order::{self, Entity as Order, OrderPaymentStatus, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::product::Entity as Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Result of an add-to-cart request. Requests for more stock than is left
/// are partially fulfilled rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    Added { quantity: i32 },
    PartiallyAdded { requested: i32, added: i32 },
    OutOfStock,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub order: order::Model,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

/// Shopping cart operations. A cart is an order in `Cart` status; customers
/// have at most one active cart which is created on demand.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Resolve the customer's cart. An explicit `cart_id` is honored when it
    /// references a cart-status order owned by the customer; otherwise the
    /// newest existing cart is reused or a fresh empty cart created.
    #[instrument(skip(self))]
    pub async fn resolve_cart(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;
        txn.commit().await?;
        Ok(cart)
    }

    /// Add a product to the cart, capping the quantity at what is still in
    /// stock beyond what the cart already holds.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(CartView, AddOutcome), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .filter(|p| p.available)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        let existing = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(cart.id))
            .filter(order_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;
        let already_in_cart = existing.as_ref().map(|i| i.quantity).unwrap_or(0);

        let added = capped_addition(quantity, product.inventory, already_in_cart);
        if added == 0 {
            // Keep the resolved (possibly just-created) cart.
            txn.commit().await?;
            return Ok((self.load_cart_view(customer_id, Some(cart.id)).await?, AddOutcome::OutOfStock));
        }

        match existing {
            Some(item) => {
                let new_quantity = item.quantity + added;
                let mut active: order_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                active.update(&txn).await?;
            }
            None => {
                let item = order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(added),
                    price: Set(product.price),
                    ..Default::default()
                };
                item.insert(&txn).await?;
            }
        }

        let cart = recalculate_total(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ItemAddedToCart {
                cart_id: cart.id,
                customer_id,
                product_id,
                quantity: added,
            })
            .await;

        let outcome = if added == quantity {
            AddOutcome::Added { quantity: added }
        } else {
            info!(requested = quantity, added, "add to cart partially fulfilled");
            AddOutcome::PartiallyAdded {
                requested: quantity,
                added,
            }
        };
        Ok((self.load_cart_view(customer_id, Some(cart.id)).await?, outcome))
    }

    /// Set an item's quantity. Zero or negative removes the item; anything
    /// above the product's stock is capped at the stock.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;

        let item = OrderItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .filter(|i| i.order_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {item_id} not found")))?;

        if quantity <= 0 {
            item.delete(&txn).await?;
        } else {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
            let capped = quantity.min(product.inventory.max(0));
            if capped == 0 {
                item.delete(&txn).await?;
            } else {
                let mut active: order_item::ActiveModel = item.into();
                active.quantity = Set(capped);
                active.update(&txn).await?;
            }
        }

        let cart = recalculate_total(&txn, cart.id).await?;
        txn.commit().await?;
        self.load_cart_view(customer_id, Some(cart.id)).await
    }

    /// Empty the cart. The cart row itself stays around with a zero total.
    #[instrument(skip(self))]
    pub async fn clear(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;
        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(cart.id))
            .exec(&txn)
            .await?;
        let cart = recalculate_total(&txn, cart.id).await?;
        txn.commit().await?;
        self.load_cart_view(customer_id, Some(cart.id)).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        self.update_item_quantity(customer_id, cart_id, item_id, 0)
            .await
    }

    /// Cart with its items and product names, for display.
    pub async fn load_cart_view(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
    ) -> Result<CartView, ServiceError> {
        let cart = self.resolve_cart(customer_id, cart_id).await?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(cart.id))
            .find_also_related(Product)
            .all(self.db.as_ref())
            .await?;
        let items = items
            .into_iter()
            .map(|(item, product)| CartItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: product.map(|p| p.name).unwrap_or_default(),
                quantity: item.quantity,
                price: item.price,
                line_total: item.line_total,
            })
            .collect();
        Ok(CartView { order: cart, items })
    }
}

/// Quantity actually addable: what's in stock minus what the cart already
/// holds, never negative, never more than requested.
pub(crate) fn capped_addition(requested: i32, inventory: i32, already_in_cart: i32) -> i32 {
    let remaining = (inventory - already_in_cart).max(0);
    requested.min(remaining)
}

pub(crate) async fn resolve_cart_in(
    txn: &DatabaseTransaction,
    customer_id: Uuid,
    cart_id: Option<Uuid>,
) -> Result<order::Model, ServiceError> {
    // A stale or foreign reference degrades to lookup-or-create rather
    // than erroring.
    if let Some(id) = cart_id {
        let referenced = Order::find_by_id(id)
            .one(txn)
            .await?
            .filter(|o| o.customer_id == customer_id && o.is_cart());
        if let Some(cart) = referenced {
            return Ok(cart);
        }
    }

    let existing = Order::find()
        .filter(order::Column::CustomerId.eq(customer_id))
        .filter(order::Column::Status.eq(OrderStatus::Cart))
        .order_by_desc(order::Column::CreatedAt)
        .one(txn)
        .await?;
    if let Some(cart) = existing {
        return Ok(cart);
    }

    let cart = order::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        status: Set(OrderStatus::Cart),
        payment_status: Set(OrderPaymentStatus::Unpaid),
        total_amount: Set(Decimal::ZERO),
        ..Default::default()
    };
    Ok(cart.insert(txn).await?)
}

/// Recompute an order's total from its line items, inside the caller's
/// transaction.
pub(crate) async fn recalculate_total<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;
    let total: Decimal = items.iter().map(|i| i.line_total).sum();

    let order = Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
    let mut active: order::ActiveModel = order.into();
    active.total_amount = Set(total);
    Ok(active.update(conn).await?)
}
