//! HTTP server: router assembly, health checks and shutdown handling

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
