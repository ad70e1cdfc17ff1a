//! Ladder market maker application.
//!
//! Wires the reference price feed, the execution adapter and the ladder
//! engine together behind a small CLI.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
