//! Network plumbing subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket
//!     → websocket.rs (split into frame stream + frame sink)
//!     → connection.rs (connection id, live-connection tracking)
//!     → pipeline (reader / dispatcher / writer)
//! ```
//!
//! # Design Decisions
//! - The pipeline sees frames only; WebSocket specifics stay here
//! - Any `Stream` + `Sink` of frames can stand in for a WebSocket

pub mod connection;
pub mod websocket;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
