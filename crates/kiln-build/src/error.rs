use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("transport should not be empty")]
    EmptyTransport,

    #[error("destination should not be empty")]
    EmptyDestination,

    #[error("transport {0} not support")]
    UnsupportedTransport(String),

    #[error("output should not longer than {limit}")]
    OutputTooLong { limit: usize },

    #[error("invalid isulad output format {0}, expected isulad:name:tag")]
    InvalidIsuladFormat(String),

    #[error("invalid image name {0}")]
    InvalidImageName(String),

    #[error("wrong image format {0} provided, expected docker or oci")]
    InvalidImageFormat(String),

    #[error("error getting the real path from {}: {source}", path.display())]
    ContextNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("context directory {} should be a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: no such file or directory", .0.display())]
    DockerfileNotFound(PathBuf),

    #[error("file {0} should be a regular file")]
    NotRegularFile(String),

    #[error("{}: dockerfile is not valid UTF-8", .0.display())]
    DockerfileNotUtf8(PathBuf),

    #[error("{0}: file is empty")]
    EmptyFile(String),

    #[error("file {name} size is: {size}, exceeds limit {limit}")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("capability {0} is invalid")]
    InvalidCapability(String),

    #[error("capability {0} is invalid: duplicated")]
    DuplicateCapability(String),

    #[error("invalid build arg {0}, expected KEY=VALUE")]
    InvalidBuildArg(String),

    #[error("load public key {} failed: {message}", path.display())]
    Key { path: PathBuf, message: String },

    #[error("encrypt build arg {key} failed: {message}")]
    Encrypt { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// エラーの分類
///
/// `InputValidation` はローカルで検出され、デーモンには送信されない。
/// `Encryption` も同様にネットワークへ到達する前に処理を中断する。
/// `Transport` と `Remote` は `kiln-client` が返すエラーの分類で、
/// どれも自動リトライはしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    Encryption,
    /// ソケット不在、接続拒否、ストリーム途中の切断
    Transport,
    /// デーモンが正当なリクエストに対して失敗を報告した
    Remote,
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Key { .. } | BuildError::Encrypt { .. } => ErrorKind::Encryption,
            _ => ErrorKind::InputValidation,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(_) => {
                format!(
                    "{}\n\
                     \n\
                     Hint:\n  \
                     • place a Dockerfile in the build context\n  \
                     • or point to one explicitly with -f/--file",
                    self
                )
            }
            BuildError::UnsupportedTransport(_) => {
                format!(
                    "{}\n\
                     \n\
                     Supported transports: docker-archive, oci-archive, docker-daemon, docker, isulad",
                    self
                )
            }
            BuildError::Key { .. } => {
                format!(
                    "{}\n\
                     \n\
                     Sensitive build args are only sent encrypted.\n\
                     Check that the daemon is running and its public key is readable.",
                    self
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
