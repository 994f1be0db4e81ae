//! `HandUp` task board server library.
//!
//! Exposes the server for use in tests and embedding: in-memory stores,
//! the task lifecycle engine, the credential gate, the broadcast hub,
//! and the axum HTTP/WebSocket surface that ties them together.

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod tasks;
