//! Multiplexed HTTP-style request/response over a single WebSocket.
//!
//! Each WebSocket message carries one request envelope tagged with a
//! correlation id. Requests are handled concurrently and their responses are
//! written back in completion order, tagged with the same id.
//!
//! ```text
//! frames in → reader → dispatcher ─┬─ handler task ─┐
//!                                  ├─ handler task ─┼→ writer → frames out
//!                                  └─ handler task ─┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
mod pipeline;
pub mod pool;

pub use codec::{Codec, HeaderMultimap, JsonCodec, RequestEnvelope, ResponseEnvelope};
pub use config::{BridgeConfig, FailurePolicy, MessageKind, PipelineConfig, UpgradePolicy};
pub use error::{Error, TransportError};
pub use http::{
    Bridge, BridgeBuilder, ConnectionInfo, CorrelationId, Handler, Request, RequestExt, Response,
    ServiceHandler,
};
pub use lifecycle::Shutdown;
pub use pool::{Pool, Poolable, Pools};
