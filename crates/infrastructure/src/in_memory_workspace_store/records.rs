use ptw_application::{
    NotificationLogRepository, RateLimitRepository, ReminderDelivery, ReminderRepository,
};

use super::*;

#[async_trait]
impl NotificationLogRepository for InMemoryWorkspaceStore {
    async fn record_notification(&self, record: NotificationRecord) -> AppResult<()> {
        self.state.write().await.notifications.push(record);
        Ok(())
    }
}

#[async_trait]
impl ReminderRepository for InMemoryWorkspaceStore {
    async fn find_settings(&self, workspace_id: WorkspaceId) -> AppResult<Option<ReminderSettings>> {
        Ok(self
            .state
            .read()
            .await
            .reminder_settings
            .get(&workspace_id)
            .cloned())
    }

    async fn claim_delivery(
        &self,
        _workspace_id: WorkspaceId,
        delivery: ReminderDelivery,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .reminder_deliveries
            .insert(delivery.delivery_key))
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryWorkspaceStore {
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        if window_duration_seconds <= 0 {
            return Err(AppError::Validation(
                "window_duration_seconds must be greater than zero".to_owned(),
            ));
        }

        let now = Utc::now();
        let mut state = self.state.write().await;
        let info = state
            .rate_limits
            .entry(key.to_owned())
            .or_insert(AttemptInfo {
                attempt_count: 0,
                window_started_at: now,
            });
        if window_expired(info, window_duration_seconds, now) {
            info.attempt_count = 0;
            info.window_started_at = now;
        }
        info.attempt_count += 1;

        Ok(info.clone())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let size_before = state.rate_limits.len();
        state
            .rate_limits
            .retain(|_, info| info.window_started_at >= before);

        Ok((size_before - state.rate_limits.len()) as u64)
    }
}
