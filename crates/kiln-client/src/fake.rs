//! In-process daemon for tests.
//!
//! `FakeDaemon` implements every backend trait directly, and [`FakeDaemon::serve`]
//! exposes the same behavior over a real Unix socket so CLI tests can run the
//! binary end to end.

use crate::backend::{
    BuildEvent, BuildStream, Builder, HealthChecker, SaveEvent, SaveStream, Saver, StatusReporter,
};
use crate::codec::{FrameReader, write_frame};
use crate::error::{ClientError, Result};
use crate::message::{BuildPhase, BuildProgress, BuildRequest, Request, Response, SaveRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use kiln_build::OutputTarget;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};

/// Archives are streamed in pieces of at most this many bytes
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct FakeState {
    /// Image name or id → archive bytes returned by `save`
    images: HashMap<String, Vec<u8>>,
    builds: HashMap<String, BuildProgress>,
    build_requests: Vec<BuildRequest>,
    save_requests: Vec<SaveRequest>,
    build_failure: Option<String>,
    unhealthy: bool,
    next_id: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDaemon {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_image(self, name: &str, archive: Vec<u8>) -> Self {
        self.state().images.insert(name.to_string(), archive);
        self
    }

    /// Every build fails after being accepted, with `message` as the daemon error.
    pub fn failing_builds(self, message: &str) -> Self {
        self.state().build_failure = Some(message.to_string());
        self
    }

    pub fn unhealthy(self) -> Self {
        self.state().unhealthy = true;
        self
    }

    pub fn build_requests(&self) -> Vec<BuildRequest> {
        self.state().build_requests.clone()
    }

    pub fn save_requests(&self) -> Vec<SaveRequest> {
        self.state().save_requests.clone()
    }

    /// Answer requests on `listener` until the task is dropped.
    pub async fn serve(self, listener: UnixListener) -> std::io::Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            let daemon = self.clone();
            tokio::spawn(async move {
                if let Err(e) = daemon.handle(stream).await {
                    tracing::warn!("Fake daemon connection failed: {}", e);
                }
            });
        }
    }

    async fn handle(&self, stream: UnixStream) -> std::io::Result<()> {
        let (read, mut write) = stream.into_split();
        let mut frames = FrameReader::new(BufReader::new(read));
        let Some(request) = frames.next::<Request>().await? else {
            return Ok(());
        };

        for response in self.respond(request).await {
            write_frame(&mut write, &response).await?;
        }
        Ok(())
    }

    async fn respond(&self, request: Request) -> Vec<Response> {
        fn error(err: ClientError) -> Response {
            Response::Error {
                message: err.to_string(),
            }
        }

        match request {
            Request::Build(request) => match self.build(request).await {
                Ok(events) => {
                    events
                        .map(|event| match event {
                            Ok(BuildEvent::Accepted { build_id }) => Response::Accepted { build_id },
                            Ok(BuildEvent::Progress(p)) => Response::Progress(p),
                            Ok(BuildEvent::Built { image_id }) => Response::Built { image_id },
                            Err(err) => error(err),
                        })
                        .collect::<Vec<_>>()
                        .await
                }
                Err(err) => vec![error(err)],
            },
            Request::Status(request) => match self.status(&request.build_id).await {
                Ok(progress) => vec![Response::Status(progress)],
                Err(err) => vec![error(err)],
            },
            Request::Save(request) => match self.save(request).await {
                Ok(events) => {
                    events
                        .map(|event| match event {
                            Ok(SaveEvent::Chunk(bytes)) => Response::Chunk {
                                data: STANDARD.encode(&bytes),
                            },
                            Ok(SaveEvent::Saved { images }) => Response::Saved { images },
                            Err(err) => error(err),
                        })
                        .collect::<Vec<_>>()
                        .await
                }
                Err(err) => vec![error(err)],
            },
            Request::HealthCheck => match self.health_check().await {
                Ok(()) => vec![Response::Healthy],
                Err(err) => vec![error(err)],
            },
        }
    }
}

#[async_trait]
impl Builder for FakeDaemon {
    async fn build(&self, request: BuildRequest) -> Result<BuildStream> {
        let mut state = self.state();
        state.next_id += 1;
        let build_id = format!("{:016x}", state.next_id);
        let image_id = format!("{:064x}", state.next_id);

        let mut events = vec![Ok(BuildEvent::Accepted {
            build_id: build_id.clone(),
        })];

        let steps = request
            .dockerfile
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        for (i, line) in steps.enumerate() {
            events.push(Ok(BuildEvent::Progress(BuildProgress {
                build_id: build_id.clone(),
                phase: BuildPhase::Running,
                message: format!("STEP {}: {}", i + 1, line),
            })));
        }

        let phase = match state.build_failure.clone() {
            Some(message) => {
                events.push(Err(ClientError::Remote(message)));
                BuildPhase::Failed
            }
            None => {
                let archive = format!("archive of {image_id}").into_bytes();
                if let Some(tag) = &request.tag {
                    state.images.insert(tag.clone(), archive.clone());
                }
                if let OutputTarget::DockerDaemon { image } = &request.output {
                    state.images.insert(image.clone(), archive.clone());
                }
                state.images.insert(image_id.clone(), archive);
                events.push(Ok(BuildEvent::Built { image_id }));
                BuildPhase::Complete
            }
        };

        state.builds.insert(
            build_id.clone(),
            BuildProgress {
                build_id,
                phase,
                message: String::new(),
            },
        );
        state.build_requests.push(request);

        Ok(stream::iter(events).boxed())
    }
}

#[async_trait]
impl StatusReporter for FakeDaemon {
    async fn status(&self, build_id: &str) -> Result<BuildProgress> {
        self.state()
            .builds
            .get(build_id)
            .cloned()
            .ok_or_else(|| ClientError::Remote(format!("unknown build id {build_id}")))
    }
}

#[async_trait]
impl Saver for FakeDaemon {
    /// All-or-nothing: a single unknown image fails the whole save
    /// before any bytes are sent.
    async fn save(&self, request: SaveRequest) -> Result<SaveStream> {
        let mut state = self.state();
        state.save_requests.push(request.clone());

        let mut events = Vec::with_capacity(request.images.len() + 1);
        for image in &request.images {
            let archive = state.images.get(image).ok_or_else(|| {
                ClientError::Remote(format!("failed to save image {image}: image not known"))
            })?;
            for piece in archive.chunks(CHUNK_SIZE) {
                events.push(Ok(SaveEvent::Chunk(Bytes::copy_from_slice(piece))));
            }
        }
        events.push(Ok(SaveEvent::Saved {
            images: request.images,
        }));

        Ok(stream::iter(events).boxed())
    }
}

#[async_trait]
impl HealthChecker for FakeDaemon {
    async fn health_check(&self) -> Result<()> {
        if self.state().unhealthy {
            return Err(ClientError::Remote("daemon is not healthy".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::wait_for_image;
    use crate::client::DaemonClient;
    use kiln_build::ImageFormat;
    use std::path::PathBuf;

    fn request(dockerfile: &str, tag: Option<&str>) -> BuildRequest {
        BuildRequest {
            context_dir: PathBuf::from("/src"),
            dockerfile: dockerfile.into(),
            dockerfile_path: PathBuf::from("/src/Dockerfile"),
            output: OutputTarget::None,
            build_args: Vec::new(),
            encrypted: false,
            key_digest: None,
            cap_add: Vec::new(),
            format: ImageFormat::Oci,
            tag: tag.map(str::to_string),
            proxy: true,
        }
    }

    #[tokio::test]
    async fn test_build_then_status() {
        let daemon = FakeDaemon::new();
        let events = daemon
            .build(request("FROM busybox\n# comment\nRUN true\n", Some("app:1")))
            .await
            .unwrap();

        let mut steps = Vec::new();
        let outcome = wait_for_image(events, |p| steps.push(p.message.clone()))
            .await
            .unwrap();
        assert_eq!(steps, vec!["STEP 1: FROM busybox", "STEP 2: RUN true"]);

        let build_id = outcome.build_id.unwrap();
        let status = daemon.status(&build_id).await.unwrap();
        assert_eq!(status.phase, BuildPhase::Complete);
        assert_eq!(daemon.build_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_status_unknown_build() {
        let err = FakeDaemon::new().status("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown build id missing");
    }

    #[tokio::test]
    async fn test_failing_build_is_recorded() {
        let daemon = FakeDaemon::new().failing_builds("STEP 1 failed");
        let events = daemon.build(request("FROM busybox", None)).await.unwrap();
        let err = wait_for_image(events, |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "STEP 1 failed");

        let status = daemon.status(&format!("{:016x}", 1)).await.unwrap();
        assert_eq!(status.phase, BuildPhase::Failed);
    }

    #[tokio::test]
    async fn test_serve_over_socket() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket = temp_dir.path().join("kiln_build.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let daemon = FakeDaemon::new().with_image("app:latest", b"bytes".to_vec());
        let server = tokio::spawn(daemon.clone().serve(listener));

        let client = DaemonClient::new(&socket);
        client.health_check().await.unwrap();

        let events = client
            .build(request("FROM busybox", Some("app:2")))
            .await
            .unwrap();
        let outcome = wait_for_image(events, |_| {}).await.unwrap();
        assert_eq!(outcome.image_id, format!("{:064x}", 1));

        let status = client
            .status(outcome.build_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(status.phase, BuildPhase::Complete);

        let err = client.status("nope").await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(_)));

        server.abort();
    }

    #[tokio::test]
    async fn test_unhealthy() {
        let err = FakeDaemon::new().unhealthy().health_check().await.unwrap_err();
        assert!(err.to_string().contains("not healthy"));
    }

    #[tokio::test]
    async fn test_large_archive_is_chunked() {
        let archive = vec![7u8; CHUNK_SIZE * 2 + 10];
        let daemon = FakeDaemon::new().with_image("big:1", archive.clone());

        let request = SaveRequest {
            images: vec!["big:1".into()],
            path: PathBuf::from("/tmp/big.tar"),
            format: ImageFormat::Docker,
        };
        let events: Vec<_> = daemon.save(request).await.unwrap().collect().await;

        let chunks: Vec<Bytes> = events
            .into_iter()
            .filter_map(|event| match event.unwrap() {
                SaveEvent::Chunk(bytes) => Some(bytes),
                SaveEvent::Saved { .. } => None,
            })
            .collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), archive);
    }
}
