pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mcp;
pub mod models;
pub mod sendgrid;
pub mod state;
pub mod tools;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
