use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{can_view_order, AuthenticatedUser};
use crate::entities::order::{self, Entity as Order, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::product::Entity as Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::AuditService;

pub const SHIPPED_CANCEL_MESSAGE: &str =
    "Shipped orders require support assistance. Please contact support to cancel.";

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<OrderItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

/// Result of a cancellation request. Shipped orders are blocked with a
/// support message; terminal orders are a safe no-op.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled { order: order::Model },
    SupportRequired { message: String },
    NoOp { order: order::Model },
}

/// Placed-order queries and lifecycle changes.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    audit: AuditService,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        audit: AuditService,
    ) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    /// A customer's placed orders, newest first. Carts are not orders yet
    /// and are excluded.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.ne(OrderStatus::Cart))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page.clamp(1, 100));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// All placed orders, optionally filtered by status. Admin only (routes
    /// enforce the role).
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().filter(order::Column::Status.ne(OrderStatus::Cart));
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page.clamp(1, 100));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self, actor))]
    pub async fn get_order(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = self.find_placed_order(order_id).await?;
        if !can_view_order(actor, &order) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(Product)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|(item, product)| OrderItemDetail {
                id: item.id,
                product_id: item.product_id,
                product_name: product.map(|p| p.name).unwrap_or_default(),
                quantity: item.quantity,
                price: item.price,
                line_total: item.line_total,
            })
            .collect();
        Ok(OrderDetail { order, items })
    }

    /// Cancel an order. Allowed while pending or confirmed; shipped orders
    /// need support; delivered or already-cancelled orders are untouched.
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn cancel(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
    ) -> Result<CancelOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|o| !o.is_cart())
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        if !can_view_order(actor, &order) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }

        match order.status {
            OrderStatus::Pending | OrderStatus::Confirmed => {
                let previous = order.status;
                let customer_id = order.customer_id;
                let total_amount = order.total_amount;
                let mut active: order::ActiveModel = order.into();
                active.status = Set(OrderStatus::Cancelled);
                let order = active.update(&txn).await?;

                self.audit
                    .record(
                        &txn,
                        Some(actor.id),
                        "order.cancelled",
                        "order",
                        Some(order_id),
                        Some(json!({
                            "from": previous,
                            "to": OrderStatus::Cancelled,
                            "total_amount": total_amount,
                        })),
                    )
                    .await?;
                txn.commit().await?;
                info!("order cancelled");

                self.event_sender
                    .send_or_log(Event::OrderCancelled {
                        order_id,
                        customer_id,
                    })
                    .await;
                Ok(CancelOutcome::Cancelled { order })
            }
            OrderStatus::Shipped => {
                txn.commit().await?;
                Ok(CancelOutcome::SupportRequired {
                    message: SHIPPED_CANCEL_MESSAGE.to_string(),
                })
            }
            OrderStatus::Delivered | OrderStatus::Cancelled => {
                txn.commit().await?;
                Ok(CancelOutcome::NoOp { order })
            }
            OrderStatus::Cart => unreachable!("carts filtered above"),
        }
    }

    /// Admin status override. Carts cannot be edited into the order
    /// lifecycle this way.
    #[instrument(skip(self, actor))]
    pub async fn admin_update_status(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if new_status == OrderStatus::Cart {
            return Err(ServiceError::InvalidStatus(
                "Orders cannot be reverted to carts".to_string(),
            ));
        }
        let order = self.find_placed_order(order_id).await?;
        let previous = order.status;
        if previous == new_status {
            return Ok(order);
        }
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        let order = active.update(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                actor_id: Some(actor.id),
                from: previous,
                to: new_status,
            })
            .await;
        Ok(order)
    }

    async fn find_placed_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .filter(|o| !o.is_cart())
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }
}
