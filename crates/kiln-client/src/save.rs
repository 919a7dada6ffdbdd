//! Client side of `save`: pre-flight checks and writing the archive.

use crate::backend::{SaveEvent, Saver};
use crate::error::{ClientError, Result};
use crate::message::SaveRequest;
use futures_util::StreamExt;
use kiln_build::{ImageFormat, abs_path};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

impl SaveRequest {
    /// Validate a save before any connection is made.
    ///
    /// `path` is made absolute against `cwd`; it must not exist yet.
    pub fn new(images: Vec<String>, path: &str, cwd: &Path, format: ImageFormat) -> Result<Self> {
        if images.is_empty() {
            return Err(ClientError::InvalidRequest(
                "save accepts at least one image".into(),
            ));
        }
        if path.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "output path should not be empty".into(),
            ));
        }

        let path = abs_path(Path::new(path), cwd);
        if path.exists() {
            return Err(already_exists(&path));
        }
        if images.iter().any(|image| image.trim().is_empty()) {
            return Err(ClientError::InvalidRequest(
                "image name should not be empty".into(),
            ));
        }

        Ok(Self {
            images,
            path,
            format,
        })
    }
}

fn already_exists(path: &Path) -> ClientError {
    ClientError::InvalidRequest(format!("output file {} already exists", path.display()))
}

/// Stream the archive into `request.path`.
///
/// Bytes land in a temporary file beside the destination, which is moved
/// into place only after the daemon confirms the save. The temporary file
/// is removed on error and when this future is dropped, and an existing
/// destination is never replaced.
pub async fn save_to_file<S>(saver: &S, request: SaveRequest) -> Result<Vec<String>>
where
    S: Saver + ?Sized,
{
    let destination = request.path.clone();
    let mut events = saver.save(request).await?;

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    let temp = tempfile::Builder::new()
        .prefix(&format!(".{name}.kiln-"))
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let mut file = fs::File::from_std(temp.reopen()?);
    let mut written = 0usize;
    let images = loop {
        let Some(event) = events.next().await else {
            return Err(ClientError::transport(
                "save",
                "stream ended before the save finished",
            ));
        };
        match event? {
            SaveEvent::Chunk(bytes) => {
                file.write_all(&bytes).await?;
                written += bytes.len();
            }
            SaveEvent::Saved { images } => break images,
        }
    };
    file.sync_all().await?;
    drop(file);
    tracing::debug!("Wrote {} bytes to {}", written, temp.path().display());

    match temp.persist_noclobber(&destination) {
        Ok(_) => {
            tracing::info!("Saved {} to {}", images.join(", "), destination.display());
            Ok(images)
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(already_exists(&destination))
        }
        Err(e) => Err(e.error.into()),
    }
}
