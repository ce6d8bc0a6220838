//! Coordination layer: a ZooKeeper-backed watched register.
//!
//! - [`client`]: session handle, path creation, register hand-out
//! - [`register`]: [`WatchedRegister`] with its watch task and CAS writes
//! - [`ensemble`]: the protocol seam; [`zk`] implements it over ZooKeeper
//! - [`retry`]: backoff for version conflicts

pub mod client;
pub mod ensemble;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod register;
pub mod retry;
pub mod zk;

pub use client::CoordinationClient;
pub use ensemble::{Ensemble, Version, Watch};
pub use error::{CoordinationError, EnsembleError};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryEnsemble;
pub use register::{RegisterState, ValueStream, WatchedRegister};
pub use retry::RetryPolicy;
pub use zk::ZkEnsemble;
