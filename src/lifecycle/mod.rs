//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger → root token cancelled → every connection scope cancelled
//!            → listener stops accepting → drain connections → exit
//! ```
//!
//! # Design Decisions
//! - One root cancellation token per bridge; each connection owns a child
//! - Shutdown has a deadline: the binary stops waiting after it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
