pub mod credentials;
pub mod health;
pub mod jobs;
pub mod permits;
pub mod templates;
