use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::entities::delivery::DeliveryStatus;
use crate::entities::order::OrderStatus;
use crate::entities::payment::PaymentProvider;
use crate::services::audit::AuditService;

/// Domain events emitted by services after state changes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    UserRegistered {
        user_id: Uuid,
    },
    ItemAddedToCart {
        cart_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    OrderPlaced {
        order_id: Uuid,
        customer_id: Uuid,
        provider: PaymentProvider,
    },
    OrderStatusChanged {
        order_id: Uuid,
        actor_id: Option<Uuid>,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderCancelled {
        order_id: Uuid,
        customer_id: Uuid,
    },
    PaymentInitiated {
        payment_id: Uuid,
        order_id: Uuid,
        provider: PaymentProvider,
    },
    PaymentSucceeded {
        payment_id: Uuid,
        order_id: Uuid,
    },
    PaymentFailed {
        payment_id: Uuid,
        order_id: Uuid,
    },
    DeliveryStatusChanged {
        delivery_id: Uuid,
        order_id: Uuid,
        actor_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
    InventoryLow {
        product_id: Uuid,
        remaining: i32,
    },
}

/// Cloneable handle for emitting events from services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.sender.send(event).await
    }

    /// Emit an event, logging instead of failing when the receiver is gone.
    /// State changes have already committed by the time events fire, so a
    /// dropped event must not fail the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            error!("failed to send event: {}", e);
        }
    }
}

pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Background loop draining the event channel. Logs every event and records
/// an audit trail entry for the ones administrators care about.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>, audit: AuditService) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        debug!(?event, "processing event");
        match &event {
            Event::OrderPlaced {
                order_id,
                customer_id,
                provider,
            } => {
                audit
                    .record_fire_and_forget(
                        Some(*customer_id),
                        "order.placed",
                        "order",
                        Some(*order_id),
                        Some(json!({ "provider": provider.code() })),
                    )
                    .await;
            }
            // Cancellation audit is written inside the cancel transaction;
            // only log here.
            Event::OrderCancelled { order_id, .. } => {
                info!(%order_id, "order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                actor_id,
                from,
                to,
            } => {
                audit
                    .record_fire_and_forget(
                        *actor_id,
                        "order.status_changed",
                        "order",
                        Some(*order_id),
                        Some(json!({ "from": from, "to": to })),
                    )
                    .await;
            }
            Event::DeliveryStatusChanged {
                delivery_id,
                actor_id,
                from,
                to,
                ..
            } => {
                audit
                    .record_fire_and_forget(
                        Some(*actor_id),
                        "delivery.status_changed",
                        "delivery",
                        Some(*delivery_id),
                        Some(json!({ "from": from, "to": to })),
                    )
                    .await;
            }
            Event::InventoryLow {
                product_id,
                remaining,
            } => {
                info!(%product_id, remaining, "product inventory running low");
            }
            _ => {}
        }
    }
    info!("event processor stopped");
}
