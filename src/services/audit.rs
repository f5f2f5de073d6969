use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryOrder, Set,
};
use serde_json::Value;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::entities::audit_log::{self, Entity as AuditLog};
use crate::errors::ServiceError;

/// Append-only audit trail writer.
#[derive(Clone)]
pub struct AuditService {
    db: Arc<DatabaseConnection>,
}

impl AuditService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert an audit entry on the given connection. Pass a transaction to
    /// make the entry commit or roll back with the change it describes.
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor_id: Option<Uuid>,
        action: &str,
        entity: &str,
        entity_id: Option<Uuid>,
        metadata: Option<Value>,
    ) -> Result<audit_log::Model, ServiceError> {
        let entry = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(actor_id),
            action: Set(action.to_string()),
            entity: Set(entity.to_string()),
            entity_id: Set(entity_id),
            metadata: Set(metadata),
            ..Default::default()
        };
        let model = entry.insert(conn).await?;
        Ok(model)
    }

    /// Best-effort audit write. Failures are logged and swallowed so the
    /// surrounding operation never fails because of the audit trail.
    pub async fn record_fire_and_forget(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity: &str,
        entity_id: Option<Uuid>,
        metadata: Option<Value>,
    ) {
        if let Err(e) = self
            .record(self.db.as_ref(), actor_id, action, entity, entity_id, metadata)
            .await
        {
            error!(action, entity, "failed to record audit entry: {}", e);
        }
    }

    /// Most recent audit entries, newest first.
    #[instrument(skip(self))]
    pub async fn recent(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let paginator = AuditLog::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page.clamp(1, 100));
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((entries, total))
    }
}
