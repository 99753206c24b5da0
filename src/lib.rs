pub mod access;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod files;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use app::{app, AppState};
