use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::delivery::{self, DeliveryStatus};
use crate::entities::order::{self, DeliveryWindow, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::payment::{self, PaymentProvider, PaymentStatus};
use crate::entities::product::Entity as Product;
use crate::entities::user::Entity as User;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::cart::{recalculate_total, resolve_cart_in};
use crate::services::payments::open_gateway_session;

/// Payment providers selectable for a given cart. `fallback_all` is set when
/// the sellers' accepted lists had no common provider and the full set was
/// offered instead, so callers can surface a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOptions {
    pub providers: Vec<PaymentProvider>,
    pub fallback_all: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutInput {
    pub provider: PaymentProvider,
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_window: DeliveryWindow,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Cash on delivery confirms immediately; no gateway round trip.
    Confirmed { order: order::Model },
    /// Gateway providers leave the order pending until the webhook lands.
    RedirectToGateway {
        order: order::Model,
        payment_id: Uuid,
        redirect_url: String,
    },
}

/// Turns a cart into a placed order: provider validation, delivery and
/// payment row creation, and the cart→pending(→confirmed) transition.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency,
        }
    }

    /// Providers every seller in the cart accepts. Sellers without a
    /// configured list accept everything; an empty intersection falls back
    /// to the full set.
    #[instrument(skip(self))]
    pub async fn allowed_providers(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
    ) -> Result<ProviderOptions, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;
        let options = allowed_providers_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(options)
    }

    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn checkout(
        &self,
        customer_id: Uuid,
        cart_id: Option<Uuid>,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let cart = resolve_cart_in(&txn, customer_id, cart_id).await?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(cart.id))
            .all(&txn)
            .await?;
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Your cart is empty".to_string(),
            ));
        }

        let options = allowed_providers_in(&txn, cart.id).await?;
        if !options.providers.contains(&input.provider) {
            return Err(ServiceError::ValidationError(format!(
                "Payment method '{}' is not available for this order",
                input.provider.code()
            )));
        }

        // The first line's farmer carries the delivery until an admin
        // reassigns it.
        let lead_farmer = Product::find_by_id(items[0].product_id)
            .one(&txn)
            .await?
            .map(|p| p.farmer_id);

        let order = recalculate_total(&txn, cart.id).await?;
        let total = order.total_amount;

        let confirmed = !input.provider.is_gateway();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(if confirmed {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        });
        active.delivery_address = Set(Some(input.delivery_address));
        active.scheduled_date = Set(Some(input.scheduled_date));
        active.scheduled_window = Set(Some(input.scheduled_window));
        active.notes = Set(input.notes);
        let order = active.update(&txn).await?;

        let delivery = delivery::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            status: Set(DeliveryStatus::Pending),
            assigned_farmer_id: Set(lead_farmer),
            driver_name: Set(None),
            contact_number: Set(None),
            ..Default::default()
        };
        delivery.insert(&txn).await?;

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            provider: Set(input.provider),
            status: Set(PaymentStatus::Initiated),
            amount: Set(total),
            currency: Set(self.default_currency.clone()),
            transaction_id: Set(None),
            raw_response: Set(None),
            ..Default::default()
        };
        let payment = payment.insert(&txn).await?;

        txn.commit().await?;
        info!(order_id = %order.id, provider = input.provider.code(), "checkout completed");

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                customer_id,
                provider: input.provider,
            })
            .await;

        if confirmed {
            Ok(CheckoutOutcome::Confirmed { order })
        } else {
            let session = open_gateway_session(input.provider, payment.id)?;
            self.event_sender
                .send_or_log(Event::PaymentInitiated {
                    payment_id: payment.id,
                    order_id: order.id,
                    provider: input.provider,
                })
                .await;
            Ok(CheckoutOutcome::RedirectToGateway {
                order,
                payment_id: payment.id,
                redirect_url: session.redirect_url,
            })
        }
    }
}

async fn allowed_providers_in(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<ProviderOptions, ServiceError> {
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .find_also_related(Product)
        .all(txn)
        .await?;

    let farmer_ids: HashSet<Uuid> = items
        .iter()
        .filter_map(|(_, product)| product.as_ref().map(|p| p.farmer_id))
        .collect();

    let mut accepted_lists = Vec::with_capacity(farmer_ids.len());
    for farmer_id in farmer_ids {
        let farmer = User::find_by_id(farmer_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Seller {farmer_id} not found")))?;
        accepted_lists.push(farmer.accepted_providers());
    }

    let options = intersect_accepted(&accepted_lists);
    if options.fallback_all {
        warn!(%order_id, "sellers share no payment provider; offering all");
    }
    Ok(options)
}

/// Intersect the sellers' accepted-provider lists. `None` entries accept
/// everything. An empty intersection falls back to the full provider set
/// with the fallback flag raised.
pub(crate) fn intersect_accepted(lists: &[Option<Vec<PaymentProvider>>]) -> ProviderOptions {
    let mut providers: Vec<PaymentProvider> = PaymentProvider::ALL.to_vec();
    for list in lists.iter().flatten() {
        providers.retain(|p| list.contains(p));
    }
    if providers.is_empty() {
        ProviderOptions {
            providers: PaymentProvider::ALL.to_vec(),
            fallback_all: true,
        }
    } else {
        ProviderOptions {
            providers,
            fallback_all: false,
        }
    }
}
