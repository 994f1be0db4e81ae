//! Shared wire types for the `HandUp` task board.
//!
//! Everything the server and its clients exchange as JSON lives here:
//! the task and user data model, request payloads, and the push-event
//! envelope delivered over the WebSocket channel.

pub mod event;
pub mod task;
pub mod user;
