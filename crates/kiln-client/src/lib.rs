//! kiln daemon client
//!
//! Wire protocol, the `Builder`/`Saver`/`StatusReporter`/`HealthChecker`
//! boundary, and a Unix socket implementation of it.

pub mod backend;
pub mod client;
pub mod codec;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod message;
pub mod save;

pub use backend::{
    BuildEvent, BuildStream, Builder, HealthChecker, SaveEvent, SaveStream, Saver,
    StatusReporter, wait_for_image,
};
pub use client::DaemonClient;
pub use error::{ClientError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeDaemon;
pub use message::{
    BuildOutcome, BuildPhase, BuildProgress, BuildRequest, Request, Response, SaveRequest,
    StatusRequest,
};
pub use save::save_to_file;
