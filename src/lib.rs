pub mod api;
pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod geo;
pub mod models;
pub mod notify;
pub mod observability;
pub mod presence;
pub mod rooms;
pub mod state;
