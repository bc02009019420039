pub mod error;
pub mod schema;
pub mod state;
pub mod utils;

pub use error::{ApiError, ApiResult};
pub use schema::*;
pub use utils::{create_conn, DbConn, DbPool};
