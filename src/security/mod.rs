pub mod auth_api;
pub mod cors;
pub mod jwt;
pub mod password;
pub mod request_id;

pub use auth_api::{
    auth_middleware, AuthError, AuthMiddlewareConfig, AuthenticatedUser, Permission, Role,
};
pub use cors::{create_cors_layer, CorsConfig};
pub use jwt::{Claims, JwtConfig, JwtManager, TokenPair, TokenType};
pub use password::{hash_password, validate_password, verify_password, PasswordIssue};
pub use request_id::{request_id_middleware, RequestId};
