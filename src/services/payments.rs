use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{can_view_order, AuthenticatedUser};
use crate::entities::order::{self, Entity as Order, OrderPaymentStatus, OrderStatus};
use crate::entities::payment::{self, Entity as Payment, PaymentProvider, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::AuditService;

/// A hosted-checkout session at an external gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub payment_id: Uuid,
    pub provider: PaymentProvider,
    pub redirect_url: String,
}

/// Open a hosted session with the gateway. Stubbed: a production build
/// would call the provider's session API here.
pub fn open_gateway_session(
    provider: PaymentProvider,
    payment_id: Uuid,
) -> Result<PaymentSession, ServiceError> {
    let redirect_url = match provider {
        PaymentProvider::Stripe => "https://checkout.stripe.com/pay/mock-session".to_string(),
        PaymentProvider::Paypal => {
            "https://www.paypal.com/checkoutnow?token=mock-token".to_string()
        }
        PaymentProvider::Cod => {
            return Err(ServiceError::InvalidOperation(
                "Cash on delivery has no payment gateway".to_string(),
            ))
        }
    };
    Ok(PaymentSession {
        payment_id,
        provider,
        redirect_url,
    })
}

/// Pull the payment correlation key and transaction id out of a provider
/// webhook payload (`data.object.metadata.payment_id` / `data.object.id`).
pub fn extract_webhook_refs(payload: &Value) -> Option<(Uuid, String)> {
    let object = payload.get("data")?.get("object")?;
    let payment_id = object.get("metadata")?.get("payment_id")?.as_str()?;
    let payment_id = Uuid::parse_str(payment_id).ok()?;
    let transaction_id = object.get("id")?.as_str()?.to_string();
    Some((payment_id, transaction_id))
}

/// Payment lifecycle: gateway sessions, success/failure application.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    audit: AuditService,
}

impl PaymentService {
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

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<payment::Model, ServiceError> {
        Payment::find_by_id(payment_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {payment_id} not found")))
    }

    /// Start a fresh gateway attempt for an unpaid order (e.g. the customer
    /// abandoned the hosted page or the first attempt failed).
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn initiate(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
    ) -> Result<PaymentSession, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        if !can_view_order(actor, &order) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }
        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::Confirmed
        ) {
            return Err(ServiceError::InvalidOperation(
                "Only pending or confirmed orders can be paid".to_string(),
            ));
        }
        if order.payment_status == OrderPaymentStatus::Paid {
            return Err(ServiceError::InvalidOperation(
                "Order is already paid".to_string(),
            ));
        }

        let latest = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No payment record for order {order_id}"))
            })?;
        if !latest.provider.is_gateway() {
            return Err(ServiceError::InvalidOperation(
                "Cash on delivery orders are settled at the door".to_string(),
            ));
        }

        // Each initiation is its own attempt row; the webhook correlates by
        // the attempt id it carries.
        let attempt = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            provider: Set(latest.provider),
            status: Set(PaymentStatus::Initiated),
            amount: Set(order.total_amount),
            currency: Set(latest.currency.clone()),
            transaction_id: Set(None),
            raw_response: Set(None),
            ..Default::default()
        };
        let attempt = attempt.insert(self.db.as_ref()).await?;

        let session = open_gateway_session(attempt.provider, attempt.id)?;
        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                payment_id: attempt.id,
                order_id,
                provider: attempt.provider,
            })
            .await;
        Ok(session)
    }

    /// Apply a successful gateway callback. The only place an order's
    /// payment_status becomes `paid`. Idempotent: an already-successful
    /// payment is left untouched and no second audit entry is written.
    #[instrument(skip(self, raw_payload), fields(payment_id = %payment_id))]
    pub async fn mark_successful(
        &self,
        payment_id: Uuid,
        transaction_id: Option<String>,
        raw_payload: Option<Value>,
    ) -> Result<payment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = Payment::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {payment_id} not found")))?;
        if existing.status == PaymentStatus::Success {
            txn.commit().await?;
            info!("payment already successful; ignoring duplicate event");
            return Ok(existing);
        }

        let order_id = existing.order_id;
        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(PaymentStatus::Success);
        if transaction_id.is_some() {
            active.transaction_id = Set(transaction_id.clone());
        }
        if raw_payload.is_some() {
            active.raw_response = Set(raw_payload);
        }
        let updated = active.update(&txn).await?;

        let parent = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        let mut parent: order::ActiveModel = parent.into();
        parent.payment_status = Set(OrderPaymentStatus::Paid);
        parent.update(&txn).await?;

        self.audit
            .record(
                &txn,
                None,
                "payment.succeeded",
                "payment",
                Some(payment_id),
                Some(json!({
                    "order_id": order_id,
                    "transaction_id": transaction_id,
                })),
            )
            .await?;

        txn.commit().await?;
        info!(%order_id, "payment marked successful");

        self.event_sender
            .send_or_log(Event::PaymentSucceeded {
                payment_id,
                order_id,
            })
            .await;
        Ok(updated)
    }

    /// Record a failed gateway attempt. Leaves the order pending so the
    /// customer can retry.
    #[instrument(skip(self, raw_payload), fields(payment_id = %payment_id))]
    pub async fn mark_failed(
        &self,
        payment_id: Uuid,
        raw_payload: Option<Value>,
    ) -> Result<payment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = Payment::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {payment_id} not found")))?;
        if existing.status != PaymentStatus::Initiated {
            txn.commit().await?;
            return Ok(existing);
        }

        let order_id = existing.order_id;
        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(PaymentStatus::Failed);
        if raw_payload.is_some() {
            active.raw_response = Set(raw_payload);
        }
        let updated = active.update(&txn).await?;

        let parent = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        let mut parent: order::ActiveModel = parent.into();
        parent.payment_status = Set(OrderPaymentStatus::Failed);
        parent.update(&txn).await?;

        txn.commit().await?;
        warn!(%order_id, "payment marked failed");

        self.event_sender
            .send_or_log(Event::PaymentFailed {
                payment_id,
                order_id,
            })
            .await;
        Ok(updated)
    }
}
