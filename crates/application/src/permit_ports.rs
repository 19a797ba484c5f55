mod audit;
mod clock;
mod credentials;
mod repository;
mod templates;

pub use audit::{AuditEvent, AuditRepository};
pub use clock::{Clock, SystemClock};
pub use credentials::CredentialRepository;
pub use repository::{
    ApprovalCommit, ApprovalCommitted, ApprovalResolution, PermitRepository, StatusChangeCommit,
};
pub use templates::TemplateRepository;
