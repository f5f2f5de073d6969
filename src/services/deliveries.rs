use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{can_update_delivery, can_view_delivery, AuthenticatedUser};
use crate::entities::delivery::{self, DeliveryStatus, Entity as Delivery};
use crate::entities::order::{self, Entity as Order};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDeliveryInput {
    pub status: DeliveryStatus,
    pub driver_name: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryDetail {
    pub delivery: delivery::Model,
    pub order: order::Model,
}

/// Delivery logistics: visibility scoping and status updates by the
/// assigned farmer or an admin.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Deliveries visible to the actor: all of them for admins, otherwise
    /// those for the actor's own orders plus those assigned to them.
    #[instrument(skip(self, actor))]
    pub async fn list_for_actor(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<Vec<delivery::Model>, ServiceError> {
        let mut query = Delivery::find()
            .join(JoinType::InnerJoin, delivery::Relation::Order.def())
            .order_by_desc(delivery::Column::CreatedAt);
        if !actor.is_admin() {
            query = query.filter(
                Condition::any()
                    .add(order::Column::CustomerId.eq(actor.id))
                    .add(delivery::Column::AssignedFarmerId.eq(actor.id)),
            );
        }
        Ok(query.all(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_delivery(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
    ) -> Result<DeliveryDetail, ServiceError> {
        let (delivery, order) = self.find_with_order(delivery_id).await?;
        if !can_view_delivery(actor, &delivery, &order) {
            return Err(ServiceError::Forbidden(
                "You cannot view this delivery".to_string(),
            ));
        }
        Ok(DeliveryDetail { delivery, order })
    }

    /// Move a delivery along its lifecycle. Only the assigned farmer or an
    /// admin may do this, and only forwards; cancellation is allowed from
    /// any non-terminal state.
    #[instrument(skip(self, actor, input), fields(delivery_id = %delivery_id))]
    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
        input: UpdateDeliveryInput,
    ) -> Result<delivery::Model, ServiceError> {
        let (delivery, _order) = self.find_with_order(delivery_id).await?;
        if !can_update_delivery(actor, &delivery) {
            return Err(ServiceError::Forbidden(
                "Only the assigned farmer or an admin can update this delivery".to_string(),
            ));
        }

        let previous = delivery.status;
        if !transition_allowed(previous, input.status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Delivery cannot move from {previous:?} to {:?}",
                input.status
            )));
        }

        let order_id = delivery.order_id;
        let mut active: delivery::ActiveModel = delivery.into();
        active.status = Set(input.status);
        if let Some(driver_name) = input.driver_name {
            active.driver_name = Set(Some(driver_name));
        }
        if let Some(contact_number) = input.contact_number {
            active.contact_number = Set(Some(contact_number));
        }
        let updated = active.update(self.db.as_ref()).await?;
        info!(from = ?previous, to = ?updated.status, "delivery status updated");

        self.event_sender
            .send_or_log(Event::DeliveryStatusChanged {
                delivery_id,
                order_id,
                actor_id: actor.id,
                from: previous,
                to: updated.status,
            })
            .await;
        Ok(updated)
    }

    /// Assign a farmer to carry out a delivery. Admin only (routes enforce
    /// the role).
    #[instrument(skip(self))]
    pub async fn assign_farmer(
        &self,
        delivery_id: Uuid,
        farmer_id: Option<Uuid>,
    ) -> Result<delivery::Model, ServiceError> {
        let (delivery, _order) = self.find_with_order(delivery_id).await?;
        if delivery.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(
                "Completed or cancelled deliveries cannot be reassigned".to_string(),
            ));
        }
        let mut active: delivery::ActiveModel = delivery.into();
        active.assigned_farmer_id = Set(farmer_id);
        Ok(active.update(self.db.as_ref()).await?)
    }

    async fn find_with_order(
        &self,
        delivery_id: Uuid,
    ) -> Result<(delivery::Model, order::Model), ServiceError> {
        let delivery = Delivery::find_by_id(delivery_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Delivery {delivery_id} not found")))?;
        let order = Order::find_by_id(delivery.order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order for delivery not found".to_string()))?;
        Ok((delivery, order))
    }
}

/// Forward-only lifecycle. Skipping ahead is allowed (a delivery can go
/// straight to in_transit); moving backwards or out of a terminal state is
/// not. Cancellation is reachable from any non-terminal state.
pub(crate) fn transition_allowed(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == DeliveryStatus::Cancelled {
        return true;
    }
    rank(to) > rank(from)
}

fn rank(status: DeliveryStatus) -> u8 {
    match status {
        DeliveryStatus::Pending => 0,
        DeliveryStatus::Scheduled => 1,
        DeliveryStatus::InTransit => 2,
        DeliveryStatus::Completed => 3,
        DeliveryStatus::Cancelled => 4,
    }
}
