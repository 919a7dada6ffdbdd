//! The daemon boundary as traits.
//!
//! Commands only ever talk to these traits, so tests can swap the socket
//! client for [`FakeDaemon`](crate::FakeDaemon).

use crate::error::{ClientError, Result};
use crate::message::{BuildOutcome, BuildProgress, BuildRequest, SaveRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

/// Events of a running build, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Accepted { build_id: String },
    Progress(BuildProgress),
    /// Always the last event of a successful stream
    Built { image_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveEvent {
    Chunk(Bytes),
    /// Always the last event of a successful stream
    Saved { images: Vec<String> },
}

pub type BuildStream = BoxStream<'static, Result<BuildEvent>>;
pub type SaveStream = BoxStream<'static, Result<SaveEvent>>;

#[async_trait]
pub trait Builder: Send + Sync {
    /// Submit a build. Dropping the returned stream closes the connection.
    async fn build(&self, request: BuildRequest) -> Result<BuildStream>;
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Unknown build ids are an error, not an empty status.
    async fn status(&self, build_id: &str) -> Result<BuildProgress>;
}

#[async_trait]
pub trait Saver: Send + Sync {
    async fn save(&self, request: SaveRequest) -> Result<SaveStream>;
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn health_check(&self) -> Result<()>;
}

/// Drain a build stream until its terminal event.
///
/// `on_progress` sees every progress message. A stream that ends
/// without `Built` is a transport error.
pub async fn wait_for_image<F>(mut events: BuildStream, mut on_progress: F) -> Result<BuildOutcome>
where
    F: FnMut(&BuildProgress),
{
    let mut build_id = None;

    while let Some(event) = events.next().await {
        match event? {
            BuildEvent::Accepted { build_id: id } => {
                tracing::info!("Build accepted: {}", id);
                build_id = Some(id);
            }
            BuildEvent::Progress(progress) => on_progress(&progress),
            BuildEvent::Built { image_id } => {
                tracing::info!("Build finished: {}", image_id);
                return Ok(BuildOutcome { build_id, image_id });
            }
        }
    }

    Err(ClientError::transport(
        "build",
        "stream ended before the build finished",
    ))
}
