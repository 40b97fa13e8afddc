//! Object reuse pools.
//!
//! # Responsibilities
//! - Hand out previously allocated request shells and response accumulators
//! - Scrub every object before a new owner sees it
//! - Bound the number of idle objects kept per pool
//!
//! # Data Flow
//! ```text
//! Reader     → Pool<Request>::acquire  → fill from envelope
//! Dispatcher → Pool<Response>::acquire → handler populates
//! Writer     → encode → release both back to their pools
//! ```
//!
//! # Design Decisions
//! - Pools are explicit objects injected into the bridge, never globals
//! - `release` resets the object so idle entries pin no bodies or scopes;
//!   `acquire` resets again, stale data across requests is a bug
//! - A miss allocates; `acquire` never fails or blocks on other users
//! - Idle objects beyond `capacity` are dropped on release

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::http::{Request, Response};

/// An object that can be scrubbed for reuse by a new owner.
pub trait Poolable: Send {
    /// Clear every field a new owner could observe.
    fn reset(&mut self);
}

/// A bounded free-list of reusable objects.
#[derive(Debug)]
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Poolable + Default> Pool<T> {
    /// Create a pool that keeps at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(1024))),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Take an object from the pool, allocating a fresh one on a miss.
    ///
    /// The returned object is always reset.
    pub fn acquire(&self) -> T {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match reused {
            Some(mut item) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                item.reset();
                item
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                T::default()
            }
        }
    }

    /// Return an object. The caller gives up ownership for good.
    pub fn release(&self, mut item: T) {
        item.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.capacity {
            idle.push(item);
        }
    }
}

impl<T> Pool<T> {
    /// Number of idle objects currently held.
    pub fn len(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of idle objects kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Request shell and response accumulator pools used by one bridge.
#[derive(Debug)]
pub struct Pools {
    /// Transport-level request shells.
    pub requests: Pool<Request>,
    /// Response accumulators.
    pub responses: Pool<Response>,
}

impl Pools {
    pub fn new(request_capacity: usize, response_capacity: usize) -> Self {
        Self {
            requests: Pool::new(request_capacity),
            responses: Pool::new(response_capacity),
        }
    }

    /// Return a finished request/response pair to their pools.
    pub(crate) fn recycle(&self, mut response: Response) {
        if let Some(request) = response.unbind() {
            self.requests.release(request);
        }
        self.responses.release(response);
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new(256, 256)
    }
}
