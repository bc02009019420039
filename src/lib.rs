#[cfg(feature = "llm")]
pub mod assistant;
pub mod core;
pub mod dashboards;
pub mod directory;
pub mod learn;
#[cfg(feature = "llm")]
pub mod llm;
pub mod main_module;
#[cfg(feature = "media")]
pub mod media;
pub mod notifications;
pub mod security;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::{build_router, run_axum_server};
