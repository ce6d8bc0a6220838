//! poke-me daemon: dispatch loop, webhook endpoint, and process wiring.

pub mod dispatch;
mod error;
pub mod runtime;
pub mod signature;
pub mod status;
pub mod webhook;

pub use dispatch::dispatch_loop;
pub use error::DaemonError;
pub use runtime::{init_tracing, level_directive, run, run_services, start_blocking, Services};
pub use status::{DeployOutcome, DeployRecord, DeployStatus};
pub use webhook::{router, WebhookError, WebhookState};
