pub mod board;
pub mod client;
pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod models;
pub mod projection;
pub mod server;
pub mod store;
pub mod ui;
