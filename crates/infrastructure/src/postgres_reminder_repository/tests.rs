use ptw_application::{ReminderDelivery, ReminderRepository};
use ptw_domain::{DEFAULT_DIGEST_WINDOWS, ReminderSettings};
use serde_json::json;

use super::PostgresReminderRepository;
use crate::postgres_test_support::{seed_workspace, test_pool};

#[tokio::test]
async fn settings_are_absent_until_configured() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresReminderRepository::new(pool.clone());
    let workspace_id = seed_workspace(&pool, "Reminder Tests").await;
    assert!(matches!(repository.find_settings(workspace_id).await, Ok(None)));

    let insert = sqlx::query(
        "INSERT INTO reminder_settings (workspace_id, digest_enabled, windows_days) VALUES ($1, FALSE, ARRAY[7, 30, 7])",
    )
    .bind(workspace_id.as_uuid())
    .execute(&pool)
    .await;
    assert!(insert.is_ok());

    let settings = repository
        .find_settings(workspace_id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_default();
    assert_eq!(
        settings,
        ReminderSettings {
            digest_enabled: false,
            windows_days: vec![30, 7],
        }
    );
    assert_ne!(settings.windows_days, DEFAULT_DIGEST_WINDOWS.to_vec());
}

#[tokio::test]
async fn a_delivery_key_is_claimed_once() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresReminderRepository::new(pool.clone());
    let workspace_id = seed_workspace(&pool, "Reminder Tests").await;
    let delivery = || ReminderDelivery {
        delivery_key: format!("digest:{workspace_id}:2026-03-01:owners-admins"),
        recipient: "owners-admins".to_owned(),
        payload: json!({ "expiring_count": 3 }),
    };

    assert!(matches!(
        repository.claim_delivery(workspace_id, delivery()).await,
        Ok(true)
    ));
    assert!(matches!(
        repository.claim_delivery(workspace_id, delivery()).await,
        Ok(false)
    ));
}
