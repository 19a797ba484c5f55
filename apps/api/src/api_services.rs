mod database;
mod email;
mod rate_limits;
mod sessions;
mod state_builder;

pub use database::connect_and_migrate;
pub use sessions::build_postgres_session_layer;
#[cfg(test)]
pub use sessions::{SESSION_COOKIE_NAME, session_layer};
pub use state_builder::build_app_state;

#[cfg(test)]
pub use state_builder::{StateSettings, WorkspacePorts, build_app_state_from_ports};
