mod directory;
mod email;
mod log;

pub use directory::{WorkspaceDirectory, WorkspaceSummary};
pub use email::{EmailMessage, EmailService};
pub use log::{NotificationKind, NotificationLogRepository, NotificationRecord};
