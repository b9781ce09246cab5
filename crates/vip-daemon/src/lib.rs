//! vip-daemon library target.
//!
//! Exposes the router, state and adapters for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod config;
pub mod discord;
pub mod routes;
pub mod sheet;
pub mod state;
