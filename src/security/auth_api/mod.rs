//! Authentication and authorization API module
//!
//! Roles and permissions for the learning platform, the authenticated caller type,
//! token extraction and the middleware that resolves the caller on each request.

pub mod config;
pub mod error;
pub mod middleware;
pub mod tests;
pub mod types;
pub mod utils;

pub use config::AuthMiddlewareConfig;
pub use error::AuthError;
pub use middleware::{auth_middleware, authenticate_token};
pub use types::{AuthenticatedUser, Permission, Role};
pub use utils::{extract_session_from_cookies, extract_token, is_jwt_format};
