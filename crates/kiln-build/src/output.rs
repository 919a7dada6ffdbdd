//! 出力先指定（`--output`）の解析
//!
//! `transport:destination` 形式の文字列を、トランスポートごとの
//! バリアントを持つ [`OutputTarget`] に変換します。各バリアントが
//! 自身のフィールド数と書式のルールを持ちます。

use crate::error::{BuildError, BuildResult};
use crate::resolver::abs_path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 出力先文字列の最大長
///
/// デーモン側の固定長フィールドに埋め込まれるため、切り詰めは許されない。
pub const MAX_OUTPUT_LEN: usize = 512;

/// タグの最大長
const MAX_TAG_LEN: usize = 128;

const DOCKER_ARCHIVE: &str = "docker-archive";
const OCI_ARCHIVE: &str = "oci-archive";
const DOCKER_DAEMON: &str = "docker-daemon";
const DOCKER_REGISTRY: &str = "docker";
const ISULAD: &str = "isulad";

/// 解析済みの出力先
///
/// ワイヤ上では正規化された `transport:destination` 文字列として送られ、
/// デシリアライズ時には再度検証される。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputTarget {
    /// 出力なし（ビルドのみ）
    #[default]
    None,
    DockerArchive {
        path: PathBuf,
        image: Option<String>,
    },
    OciArchive {
        path: PathBuf,
        image: Option<String>,
    },
    DockerDaemon {
        image: String,
    },
    Registry {
        reference: String,
    },
    Isulad {
        name: String,
        tag: String,
    },
}

impl OutputTarget {
    /// カレントディレクトリを基準に出力先を解析
    ///
    /// カレントディレクトリは相対パスのアーカイブを解決するときだけ参照する。
    pub fn parse(raw: &str) -> BuildResult<Self> {
        Self::parse_with(raw, || Ok(std::env::current_dir()?))
    }

    /// `cwd` を基準に出力先を解析
    ///
    /// アーカイブのパスは `cwd` からの絶対パスに変換される。
    pub fn parse_in(raw: &str, cwd: &Path) -> BuildResult<Self> {
        Self::parse_with(raw, || Ok(cwd.to_path_buf()))
    }

    fn parse_with<F>(raw: &str, cwd: F) -> BuildResult<Self>
    where
        F: FnOnce() -> BuildResult<PathBuf>,
    {
        if raw.is_empty() {
            return Ok(OutputTarget::None);
        }

        if raw.len() > MAX_OUTPUT_LEN {
            return Err(BuildError::OutputTooLong {
                limit: MAX_OUTPUT_LEN,
            });
        }

        let (transport, destination) = match raw.split_once(':') {
            Some((t, d)) => (t, d),
            None => (raw, ""),
        };

        if transport.is_empty() {
            return Err(BuildError::EmptyTransport);
        }
        if destination.trim().is_empty() {
            return Err(BuildError::EmptyDestination);
        }

        let target = match transport {
            DOCKER_ARCHIVE => {
                let (path, image) = split_archive(destination, cwd)?;
                OutputTarget::DockerArchive { path, image }
            }
            OCI_ARCHIVE => {
                let (path, image) = split_archive(destination, cwd)?;
                OutputTarget::OciArchive { path, image }
            }
            DOCKER_DAEMON => {
                validate_image_name(destination)?;
                OutputTarget::DockerDaemon {
                    image: destination.to_string(),
                }
            }
            DOCKER_REGISTRY => {
                let reference = destination.strip_prefix("//").unwrap_or(destination);
                if reference.trim().is_empty() {
                    return Err(BuildError::EmptyDestination);
                }
                validate_image_name(reference)?;
                OutputTarget::Registry {
                    reference: reference.to_string(),
                }
            }
            ISULAD => {
                let fields: Vec<&str> = destination.split(':').collect();
                if fields.len() != 2 || fields.iter().any(|f| f.trim().is_empty()) {
                    return Err(BuildError::InvalidIsuladFormat(raw.to_string()));
                }
                validate_image_name(destination)?;
                OutputTarget::Isulad {
                    name: fields[0].to_string(),
                    tag: fields[1].to_string(),
                }
            }
            other => return Err(BuildError::UnsupportedTransport(other.to_string())),
        };

        // 絶対パス化で伸びた場合も上限を守る
        if target.to_string().len() > MAX_OUTPUT_LEN {
            return Err(BuildError::OutputTooLong {
                limit: MAX_OUTPUT_LEN,
            });
        }

        tracing::debug!("Resolved output {} -> {}", raw, target);
        Ok(target)
    }

    /// トランスポート名（出力なしの場合は空文字列）
    pub fn transport(&self) -> &'static str {
        match self {
            OutputTarget::None => "",
            OutputTarget::DockerArchive { .. } => DOCKER_ARCHIVE,
            OutputTarget::OciArchive { .. } => OCI_ARCHIVE,
            OutputTarget::DockerDaemon { .. } => DOCKER_DAEMON,
            OutputTarget::Registry { .. } => DOCKER_REGISTRY,
            OutputTarget::Isulad { .. } => ISULAD,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, OutputTarget::None)
    }

    pub fn is_archive(&self) -> bool {
        matches!(
            self,
            OutputTarget::DockerArchive { .. } | OutputTarget::OciArchive { .. }
        )
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::None => Ok(()),
            OutputTarget::DockerArchive { path, image } | OutputTarget::OciArchive { path, image } => {
                write!(f, "{}:{}", self.transport(), path.display())?;
                if let Some(image) = image {
                    write!(f, ":{}", image)?;
                }
                Ok(())
            }
            OutputTarget::DockerDaemon { image } => write!(f, "{}:{}", DOCKER_DAEMON, image),
            OutputTarget::Registry { reference } => {
                write!(f, "{}://{}", DOCKER_REGISTRY, reference)
            }
            OutputTarget::Isulad { name, tag } => write!(f, "{}:{}:{}", ISULAD, name, tag),
        }
    }
}

impl FromStr for OutputTarget {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OutputTarget {
    type Error = BuildError;

    fn try_from(value: String) -> BuildResult<Self> {
        Self::parse(&value)
    }
}

impl From<OutputTarget> for String {
    fn from(target: OutputTarget) -> Self {
        target.to_string()
    }
}

/// アーカイブの `path[:image]` を分割
///
/// 次の `:` でのみ分割する。以降の `:` はイメージ名のタグとして扱う。
fn split_archive<F>(destination: &str, cwd: F) -> BuildResult<(PathBuf, Option<String>)>
where
    F: FnOnce() -> BuildResult<PathBuf>,
{
    let (path, image) = match destination.split_once(':') {
        Some((path, image)) => (path, Some(image)),
        None => (destination, None),
    };

    if path.trim().is_empty() {
        return Err(BuildError::EmptyDestination);
    }

    let image = match image {
        Some(image) if !image.is_empty() => {
            validate_image_name(image)?;
            Some(image.to_string())
        }
        _ => None,
    };

    let path = Path::new(path);
    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        cwd()?
    };
    Ok((abs_path(path, &base), image))
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `registry.example.com/app:v1.0` -> `("registry.example.com/app", Some("v1.0"))`
/// - `localhost:5000/app` -> `("localhost:5000/app", None)`
pub fn split_image_tag(image: &str) -> (&str, Option<&str>) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        // `/` を含む場合はレジストリのポート番号
        if !potential_tag.contains('/') {
            return (&image[..pos], Some(potential_tag));
        }
    }
    (image, None)
}

/// イメージ参照のバリデーション
///
/// 参照の制約:
/// - ダイジェスト（`@sha256:...`）は受け付けない
/// - リポジトリは小文字英数字と `.` `_` `-` 区切り
/// - 先頭コンポーネントはレジストリホスト（`:port` 付き可）でもよい
/// - タグは128文字以下の英数字、ピリオド、ハイフン、アンダースコア
pub fn validate_image_name(image: &str) -> BuildResult<()> {
    let invalid = || BuildError::InvalidImageName(image.to_string());

    if image.is_empty() || image.contains('@') || image.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (name, tag) = split_image_tag(image);
    if let Some(tag) = tag {
        validate_tag(tag).map_err(|_| invalid())?;
    }

    let components: Vec<&str> = name.split('/').collect();
    for (i, component) in components.iter().enumerate() {
        let is_registry = i == 0
            && components.len() > 1
            && (component.contains('.') || component.contains(':') || *component == "localhost");
        let valid = if is_registry {
            is_valid_registry(component)
        } else {
            is_valid_path_component(component)
        };
        if !valid {
            return Err(invalid());
        }
    }

    Ok(())
}

fn validate_tag(tag: &str) -> BuildResult<()> {
    let valid = !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && !tag.starts_with('.')
        && !tag.starts_with('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidImageName(tag.to_string()))
    }
}

fn is_valid_registry(host: &str) -> bool {
    let (host, port) = match host.split_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (host, None),
    };
    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn is_valid_path_component(component: &str) -> bool {
    let first_last_ok = component
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && component
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    first_last_ok
        && component.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_' || c == '-'
        })
}
