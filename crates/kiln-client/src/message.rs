//! Protocol messages exchanged with the build daemon.
//!
//! Each connection carries exactly one [`Request`] followed by one or more
//! [`Response`] frames. Frames are JSON objects tagged by `type`, one per line.

use kiln_build::{
    BuildOptions, BuildResult, EncryptedArgs, ImageFormat, OutputTarget, ResolvedDockerfile,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Build(BuildRequest),
    Status(StatusRequest),
    Save(SaveRequest),
    HealthCheck,
}

impl Request {
    /// Operation name used in logs and transport errors
    pub fn operation(&self) -> &'static str {
        match self {
            Request::Build(_) => "build",
            Request::Status(_) => "status",
            Request::Save(_) => "save",
            Request::HealthCheck => "health check",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The daemon accepted a build and assigned it an id.
    Accepted { build_id: String },
    Progress(BuildProgress),
    /// Terminal message of a successful build.
    Built { image_id: String },
    Status(BuildProgress),
    /// Base64-encoded slice of the archive being saved.
    Chunk { data: String },
    /// Terminal message of a successful save.
    Saved { images: Vec<String> },
    Healthy,
    Error { message: String },
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Accepted { .. } => "accepted",
            Response::Progress(_) => "progress",
            Response::Built { .. } => "built",
            Response::Status(_) => "status",
            Response::Chunk { .. } => "chunk",
            Response::Saved { .. } => "saved",
            Response::Healthy => "healthy",
            Response::Error { .. } => "error",
        }
    }
}

/// Everything the daemon needs to run one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub context_dir: PathBuf,
    pub dockerfile: String,
    pub dockerfile_path: PathBuf,
    pub output: OutputTarget,
    pub build_args: Vec<String>,
    /// True when at least one build arg value is ciphertext
    #[serde(default)]
    pub encrypted: bool,
    /// SHA-256 of the public key used, so the daemon can pick the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_digest: Option<String>,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default = "default_proxy")]
    pub proxy: bool,
}

fn default_proxy() -> bool {
    true
}

impl BuildRequest {
    /// Assemble a request from already-validated parts.
    ///
    /// Build args come from `args` (the encryptor's output), never from
    /// `options`, so plaintext secrets cannot slip through. A Dockerfile
    /// that is not valid UTF-8 is rejected rather than altered.
    pub fn new(
        options: &BuildOptions,
        dockerfile: ResolvedDockerfile,
        args: EncryptedArgs,
    ) -> BuildResult<Self> {
        let text = dockerfile.text()?.to_string();
        Ok(Self {
            context_dir: options.context_dir().to_path_buf(),
            dockerfile: text,
            dockerfile_path: dockerfile.path,
            output: options.output().clone(),
            build_args: args.args,
            encrypted: args.encrypted,
            key_digest: args.key_digest,
            cap_add: options.cap_add().to_vec(),
            format: options.format(),
            tag: options.tag().map(str::to_string),
            proxy: options.proxy(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub build_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub images: Vec<String>,
    /// Absolute destination path on the client side
    pub path: PathBuf,
    #[serde(default)]
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Queued,
    Running,
    Exporting,
    Complete,
    Failed,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildPhase::Queued => "queued",
            BuildPhase::Running => "running",
            BuildPhase::Exporting => "exporting",
            BuildPhase::Complete => "complete",
            BuildPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProgress {
    pub build_id: String,
    pub phase: BuildPhase,
    /// One line of build output, e.g. `STEP 2: RUN make`
    #[serde(default)]
    pub message: String,
}

/// Result of a finished build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// `None` when the daemon finished without announcing an id
    pub build_id: Option<String>,
    pub image_id: String,
}
