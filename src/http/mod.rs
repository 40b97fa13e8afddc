//! HTTP-facing subsystem: the request/response model handlers see, the
//! handler contract, and the WebSocket endpoint.
//!
//! # Data Flow
//! ```text
//! HTTP upgrade request
//!     → server.rs (upgrade policy, handshake, response headers)
//!     → pipeline (per connection)
//!         → request.rs (pooled request shell filled from an envelope)
//!         → handler.rs (Handler / tower Service invocation)
//!         → response.rs (accumulator read back into an envelope)
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{Handler, ServiceHandler};
pub use request::{ConnectionInfo, CorrelationId, Request, RequestExt};
pub use response::Response;
pub use server::{Bridge, BridgeBuilder};
