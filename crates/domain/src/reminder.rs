use chrono::{Days, NaiveDate};
use ptw_core::{AppError, AppResult, WorkspaceId};
use serde::{Deserialize, Serialize};

/// Default expiry windows in days.
pub const DEFAULT_DIGEST_WINDOWS: [u32; 3] = [30, 14, 7];

/// Recipient class used by the owners/admins digest.
pub const OWNERS_ADMINS_RECIPIENT_CLASS: &str = "owners-admins";

/// Per-workspace reminder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Whether the daily digest is sent at all.
    pub digest_enabled: bool,
    /// Windows (days before expiry) reported by the digest.
    pub windows_days: Vec<u32>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            digest_enabled: true,
            windows_days: DEFAULT_DIGEST_WINDOWS.to_vec(),
        }
    }
}

impl ReminderSettings {
    /// Creates validated settings, sorting windows descending and dropping duplicates.
    pub fn new(digest_enabled: bool, mut windows_days: Vec<u32>) -> AppResult<Self> {
        if windows_days.iter().any(|window| *window == 0 || *window > 365) {
            return Err(AppError::Validation(
                "reminder windows must be between 1 and 365 days".to_owned(),
            ));
        }

        windows_days.sort_unstable_by(|left, right| right.cmp(left));
        windows_days.dedup();
        if windows_days.is_empty() {
            windows_days = DEFAULT_DIGEST_WINDOWS.to_vec();
        }

        Ok(Self {
            digest_enabled,
            windows_days,
        })
    }

    /// Returns the last expiry date covered by a digest sent on `today`.
    #[must_use]
    pub fn horizon(&self, today: NaiveDate) -> NaiveDate {
        let widest = self.windows_days.iter().copied().max().unwrap_or(0);
        today
            .checked_add_days(Days::new(u64::from(widest)))
            .unwrap_or(today)
    }
}

/// Builds the idempotency key for one digest per workspace, day and recipient class.
#[must_use]
pub fn digest_delivery_key(workspace_id: WorkspaceId, day: NaiveDate, recipient_class: &str) -> String {
    format!(
        "digest:{workspace_id}:{}:{recipient_class}",
        day.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ptw_core::WorkspaceId;
    use uuid::Uuid;

    use super::{OWNERS_ADMINS_RECIPIENT_CLASS, ReminderSettings, digest_delivery_key};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn default_horizon_is_thirty_days() {
        let settings = ReminderSettings::default();
        assert_eq!(settings.horizon(date("2026-03-01")), date("2026-03-31"));
    }

    #[test]
    fn windows_are_sorted_and_deduplicated() {
        let settings =
            ReminderSettings::new(true, vec![7, 60, 7, 14]).unwrap_or_else(|_| unreachable!());
        assert_eq!(settings.windows_days, vec![60, 14, 7]);
    }

    #[test]
    fn zero_day_window_is_rejected() {
        assert!(ReminderSettings::new(true, vec![0]).is_err());
    }

    #[test]
    fn delivery_key_is_stable_per_day() {
        let workspace_id = WorkspaceId::from_uuid(Uuid::nil());
        assert_eq!(
            digest_delivery_key(workspace_id, date("2026-02-25"), OWNERS_ADMINS_RECIPIENT_CLASS),
            "digest:00000000-0000-0000-0000-000000000000:2026-02-25:owners-admins"
        );
    }
}
