//! HTTP server for chunk-based blocklist distribution.
//!
//! This crate provides the protocol surface:
//! - Delta downloads (`POST /downloads`)
//! - Hash prefix expansion (`POST /gethash`)
//! - Served list discovery (`GET /list`)
//!
//! plus the registry of served lists and its periodic rebuild.

pub mod error;
pub mod handlers;
pub mod list;
pub mod registry;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use list::List;
pub use registry::Registry;
pub use routes::create_router;
pub use state::AppState;
