//! Unix socket client for the build daemon.

use crate::backend::{
    BuildEvent, BuildStream, Builder, HealthChecker, SaveEvent, SaveStream, Saver, StatusReporter,
};
use crate::codec::{FrameReader, write_frame};
use crate::error::{ClientError, Result};
use crate::message::{BuildProgress, BuildRequest, Request, Response, SaveRequest, StatusRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;

/// Client for the build daemon.
///
/// Holds only the socket path. Every call opens its own connection, so
/// clones can be used concurrently.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

/// Response side of one request
struct Exchange {
    operation: &'static str,
    frames: FrameReader<BufReader<OwnedReadHalf>>,
}

impl Exchange {
    async fn next(&mut self) -> Result<Option<Response>> {
        self.frames
            .next()
            .await
            .map_err(|e| ClientError::transport(self.operation, e.to_string()))
    }

    /// Next frame, treating end of stream as a disconnect
    async fn reply(&mut self) -> Result<Response> {
        match self.next().await? {
            Some(Response::Error { message }) => Err(ClientError::Remote(message)),
            Some(response) => Ok(response),
            None => Err(ClientError::transport(
                self.operation,
                "daemon closed the connection before replying",
            )),
        }
    }

    fn unexpected(&self, response: &Response) -> ClientError {
        ClientError::transport(
            self.operation,
            format!("unexpected {} response", response.name()),
        )
    }
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn send(&self, request: &Request) -> Result<Exchange> {
        let operation = request.operation();
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Unreachable {
                socket: self.socket_path.clone(),
                source,
            })?;
        tracing::debug!(
            "Connected to {} for {}",
            self.socket_path.display(),
            operation
        );

        let (read, mut write) = stream.into_split();
        write_frame(&mut write, request)
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))?;
        // Half-close marks the end of the request
        write
            .shutdown()
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))?;

        Ok(Exchange {
            operation,
            frames: FrameReader::new(BufReader::new(read)),
        })
    }
}

async fn next_build_event(exchange: &mut Exchange) -> Result<(BuildEvent, bool)> {
    match exchange.reply().await? {
        Response::Accepted { build_id } => Ok((BuildEvent::Accepted { build_id }, false)),
        Response::Progress(progress) => Ok((BuildEvent::Progress(progress), false)),
        Response::Built { image_id } => Ok((BuildEvent::Built { image_id }, true)),
        other => Err(exchange.unexpected(&other)),
    }
}

async fn next_save_event(exchange: &mut Exchange) -> Result<(SaveEvent, bool)> {
    match exchange.reply().await? {
        Response::Chunk { data } => {
            let bytes = STANDARD.decode(data.as_bytes()).map_err(|e| {
                ClientError::transport(exchange.operation, format!("invalid chunk: {e}"))
            })?;
            Ok((SaveEvent::Chunk(Bytes::from(bytes)), false))
        }
        Response::Saved { images } => Ok((SaveEvent::Saved { images }, true)),
        other => Err(exchange.unexpected(&other)),
    }
}

#[async_trait]
impl Builder for DaemonClient {
    async fn build(&self, request: BuildRequest) -> Result<BuildStream> {
        tracing::info!(
            "Sending build for {} (output: {})",
            request.context_dir.display(),
            request.output
        );
        let exchange = self.send(&Request::Build(request)).await?;

        // The stream ends after a terminal event or an error
        let events = stream::unfold(Some(exchange), |state| async move {
            let Some(mut exchange) = state else {
                return None;
            };
            match next_build_event(&mut exchange).await {
                Ok((event, true)) => Some((Ok(event), None)),
                Ok((event, false)) => Some((Ok(event), Some(exchange))),
                Err(err) => Some((Err(err), None)),
            }
        });
        Ok(events.boxed())
    }
}

#[async_trait]
impl StatusReporter for DaemonClient {
    async fn status(&self, build_id: &str) -> Result<BuildProgress> {
        let request = Request::Status(StatusRequest {
            build_id: build_id.to_string(),
        });
        let mut exchange = self.send(&request).await?;

        match exchange.reply().await? {
            Response::Status(progress) => Ok(progress),
            other => Err(exchange.unexpected(&other)),
        }
    }
}

#[async_trait]
impl Saver for DaemonClient {
    async fn save(&self, request: SaveRequest) -> Result<SaveStream> {
        tracing::info!(
            "Saving {} image(s) to {}",
            request.images.len(),
            request.path.display()
        );
        let exchange = self.send(&Request::Save(request)).await?;

        let events = stream::unfold(Some(exchange), |state| async move {
            let Some(mut exchange) = state else {
                return None;
            };
            match next_save_event(&mut exchange).await {
                Ok((event, true)) => Some((Ok(event), None)),
                Ok((event, false)) => Some((Ok(event), Some(exchange))),
                Err(err) => Some((Err(err), None)),
            }
        });
        Ok(events.boxed())
    }
}

#[async_trait]
impl HealthChecker for DaemonClient {
    async fn health_check(&self) -> Result<()> {
        let mut exchange = self.send(&Request::HealthCheck).await?;

        match exchange.reply().await? {
            Response::Healthy => Ok(()),
            other => Err(exchange.unexpected(&other)),
        }
    }
}
