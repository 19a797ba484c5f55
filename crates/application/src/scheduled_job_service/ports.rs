use async_trait::async_trait;
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::ReminderSettings;
use serde_json::Value;

/// Idempotency record for one reminder send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDelivery {
    /// Unique key per workspace, day and recipient class.
    pub delivery_key: String,
    /// Recipient class label.
    pub recipient: String,
    /// Digest summary.
    pub payload: Value,
}

/// Repository port for reminder settings and delivery claims.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Loads reminder settings; `None` means defaults apply.
    async fn find_settings(&self, workspace_id: WorkspaceId) -> AppResult<Option<ReminderSettings>>;

    /// Inserts the delivery unless its key already exists.
    ///
    /// Returns `true` when this call claimed the key.
    async fn claim_delivery(
        &self,
        workspace_id: WorkspaceId,
        delivery: ReminderDelivery,
    ) -> AppResult<bool>;
}
