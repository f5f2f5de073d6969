use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::delivery::{self, DeliveryStatus, Entity as Delivery};
use crate::entities::order::{self, Entity as Order, OrderPaymentStatus, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::payment::{self, Entity as Payment, PaymentStatus};
use crate::entities::product::{self, Entity as Product};
use crate::entities::user::{self, Entity as User, UserRole};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDashboard {
    pub open_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    pub total_spent: Decimal,
    pub recent_orders: Vec<order::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FarmerDashboard {
    pub listed_products: u64,
    pub low_stock_products: u64,
    pub open_deliveries: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub customers: u64,
    pub farmers: u64,
    pub orders_pending: u64,
    pub orders_confirmed: u64,
    pub orders_shipped: u64,
    pub orders_delivered: u64,
    pub orders_cancelled: u64,
    pub payments_initiated: u64,
    pub payments_succeeded: u64,
    pub revenue: Decimal,
}

/// Role-scoped aggregate views.
#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
    low_stock_threshold: i32,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>, low_stock_threshold: i32) -> Self {
        Self {
            db,
            low_stock_threshold,
        }
    }

    #[instrument(skip(self))]
    pub async fn customer_dashboard(
        &self,
        customer_id: Uuid,
    ) -> Result<CustomerDashboard, ServiceError> {
        let db = self.db.as_ref();
        let open_orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.is_in([
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Shipped,
            ]))
            .count(db)
            .await?;
        let delivered_orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.eq(OrderStatus::Delivered))
            .count(db)
            .await?;
        let cancelled_orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.eq(OrderStatus::Cancelled))
            .count(db)
            .await?;

        let paid_orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::PaymentStatus.eq(OrderPaymentStatus::Paid))
            .all(db)
            .await?;
        let total_spent = paid_orders.iter().map(|o| o.total_amount).sum();

        let recent_orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.ne(OrderStatus::Cart))
            .order_by_desc(order::Column::CreatedAt)
            .limit(5)
            .all(db)
            .await?;

        Ok(CustomerDashboard {
            open_orders,
            delivered_orders,
            cancelled_orders,
            total_spent,
            recent_orders,
        })
    }

    #[instrument(skip(self))]
    pub async fn farmer_dashboard(&self, farmer_id: Uuid) -> Result<FarmerDashboard, ServiceError> {
        let db = self.db.as_ref();
        let listed_products = Product::find()
            .filter(product::Column::FarmerId.eq(farmer_id))
            .filter(product::Column::Available.eq(true))
            .count(db)
            .await?;
        let low_stock_products = Product::find()
            .filter(product::Column::FarmerId.eq(farmer_id))
            .filter(product::Column::Available.eq(true))
            .filter(product::Column::Inventory.lte(self.low_stock_threshold))
            .count(db)
            .await?;
        let open_deliveries = Delivery::find()
            .filter(delivery::Column::AssignedFarmerId.eq(farmer_id))
            .filter(delivery::Column::Status.is_in([
                DeliveryStatus::Pending,
                DeliveryStatus::Scheduled,
                DeliveryStatus::InTransit,
            ]))
            .count(db)
            .await?;

        // Revenue: this farmer's line items on orders that have been placed
        // and not cancelled.
        let items = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(product::Column::FarmerId.eq(farmer_id))
            .filter(order::Column::Status.is_in([
                OrderStatus::Confirmed,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ]))
            .all(db)
            .await?;
        let revenue = items.iter().map(|i| i.line_total).sum();

        Ok(FarmerDashboard {
            listed_products,
            low_stock_products,
            open_deliveries,
            revenue,
        })
    }

    #[instrument(skip(self))]
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, ServiceError> {
        let db = self.db.as_ref();
        let customers = User::find()
            .filter(user::Column::Role.eq(UserRole::Customer))
            .count(db)
            .await?;
        let farmers = User::find()
            .filter(user::Column::Role.eq(UserRole::Farmer))
            .count(db)
            .await?;

        let count_orders = |status: OrderStatus| {
            Order::find()
                .filter(order::Column::Status.eq(status))
                .count(db)
        };
        let orders_pending = count_orders(OrderStatus::Pending).await?;
        let orders_confirmed = count_orders(OrderStatus::Confirmed).await?;
        let orders_shipped = count_orders(OrderStatus::Shipped).await?;
        let orders_delivered = count_orders(OrderStatus::Delivered).await?;
        let orders_cancelled = count_orders(OrderStatus::Cancelled).await?;

        let payments_initiated = Payment::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Initiated))
            .count(db)
            .await?;
        let payments_succeeded = Payment::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Success))
            .count(db)
            .await?;

        let paid_orders = Order::find()
            .filter(order::Column::PaymentStatus.eq(OrderPaymentStatus::Paid))
            .all(db)
            .await?;
        let revenue = paid_orders.iter().map(|o| o.total_amount).sum();

        Ok(AdminDashboard {
            customers,
            farmers,
            orders_pending,
            orders_confirmed,
            orders_shipped,
            orders_delivered,
            orders_cancelled,
            payments_initiated,
            payments_succeeded,
            revenue,
        })
    }
}
