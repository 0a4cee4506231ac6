pub mod config;
pub mod middleware;
pub mod models;
pub mod service;

pub use config::ServiceConfig;
pub use middleware::{SESSION_COOKIE, SessionId};
pub use service::{AppState, build_router, create_app};
