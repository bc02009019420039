//! User accounts: registration, login and token refresh, profiles, and the admin
//! user management endpoints.

pub mod auth_routes;
pub mod router;
pub mod types;
pub mod users;

pub use router::configure;
pub use types::{User, UserRole, UserStatus};
pub use users::UserDirectory;
