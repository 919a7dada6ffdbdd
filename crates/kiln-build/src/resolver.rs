use crate::error::{BuildError, BuildResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Dockerfile の最大サイズ（10MiB）
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// `-f` 未指定時に探索するファイル名（この順で探索）
const DEFAULT_DOCKERFILES: [&str; 2] = ["Dockerfile", "dockerfile"];

/// 解決済みの Dockerfile
#[derive(Debug, Clone)]
pub struct ResolvedDockerfile {
    pub content: Vec<u8>,
    /// デーモン側でも再検証できるよう絶対パスで保持する
    pub path: PathBuf,
}

impl ResolvedDockerfile {
    /// 内容を UTF-8 文字列として取り出す（不正なバイト列は置換せずエラー）
    pub fn text(&self) -> BuildResult<&str> {
        std::str::from_utf8(&self.content)
            .map_err(|_| BuildError::DockerfileNotUtf8(self.path.clone()))
    }
}

/// ビルドコンテキストのパスを解決
///
/// 最初の位置引数があればそれを、なければ `cwd` を使う。
/// 結果は常にシンボリックリンク解決済みの絶対パス。
pub fn resolve_context(args: &[String], cwd: &Path) -> BuildResult<PathBuf> {
    let requested = match args.first() {
        Some(arg) => abs_path(Path::new(arg), cwd),
        None => cwd.to_path_buf(),
    };

    let context = fs::canonicalize(&requested).map_err(|source| BuildError::ContextNotFound {
        path: requested.clone(),
        source,
    })?;

    if !context.is_dir() {
        return Err(BuildError::NotADirectory(context));
    }

    tracing::debug!("Resolved build context: {}", context.display());
    Ok(context)
}

/// Dockerfileのパスを解決して内容を読み込む
///
/// 検索順序:
/// 1. 明示的な指定（`-f`）。相対パスはコンテキストからの相対
/// 2. 規約ベース:
///    - {context}/Dockerfile
///    - {context}/dockerfile
pub fn resolve_dockerfile(
    context_dir: &Path,
    file: &str,
    allow_empty: bool,
) -> BuildResult<ResolvedDockerfile> {
    let path = if !file.is_empty() {
        let path = abs_path(Path::new(file), context_dir);
        if !path.exists() {
            return Err(BuildError::DockerfileNotFound(path));
        }
        path
    } else {
        probe_default_dockerfile(context_dir)?
    };

    check_file(&path, allow_empty)?;
    let content = fs::read(&path)?;

    tracing::debug!(
        "Resolved Dockerfile: {} ({} bytes)",
        path.display(),
        content.len()
    );
    Ok(ResolvedDockerfile { content, path })
}

fn probe_default_dockerfile(context_dir: &Path) -> BuildResult<PathBuf> {
    for candidate in DEFAULT_DOCKERFILES {
        let path = context_dir.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    // 最後に探索した候補を報告する
    Err(BuildError::DockerfileNotFound(
        context_dir.join(DEFAULT_DOCKERFILES[DEFAULT_DOCKERFILES.len() - 1]),
    ))
}

/// 通常ファイルであること、空でないこと、サイズ上限を確認
fn check_file(path: &Path, allow_empty: bool) -> BuildResult<()> {
    let metadata = fs::metadata(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if !metadata.is_file() {
        return Err(BuildError::NotRegularFile(name));
    }
    if metadata.len() == 0 && !allow_empty {
        return Err(BuildError::EmptyFile(name));
    }
    if metadata.len() > MAX_FILE_SIZE {
        return Err(BuildError::FileTooLarge {
            name,
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }

    Ok(())
}

/// `cwd` を基準に絶対パスへ変換（存在確認はしない）
///
/// `.` と `..` は字句的に取り除く。
pub fn abs_path(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DOCKERFILE: &str = "FROM alpine:latest\nRUN echo hello world\n";

    #[test]
    fn test_resolve_context_defaults_to_cwd() {
        let temp_dir = tempdir().unwrap();
        let real = fs::canonicalize(temp_dir.path()).unwrap();

        let context = resolve_context(&[], temp_dir.path()).unwrap();
        assert_eq!(context, real);
    }

    #[test]
    fn test_resolve_context_uses_first_arg() {
        let temp_dir = tempdir().unwrap();
        let sub = temp_dir.path().join("app");
        fs::create_dir(&sub).unwrap();

        let args = vec!["app".to_string(), "ignored".to_string()];
        let context = resolve_context(&args, temp_dir.path()).unwrap();
        assert_eq!(context, fs::canonicalize(&sub).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_context_resolves_symlinks() {
        let temp_dir = tempdir().unwrap();
        let real_dir = temp_dir.path().join("real");
        fs::create_dir(&real_dir).unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real_dir, &link).unwrap();

        let context = resolve_context(&[link.display().to_string()], temp_dir.path()).unwrap();
        assert_eq!(context, fs::canonicalize(&real_dir).unwrap());
    }

    #[test]
    fn test_resolve_context_not_found() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("test").display().to_string();

        let err = resolve_context(&[missing], temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("error getting the real path"));
    }

    #[test]
    fn test_resolve_context_not_a_directory() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("test");
        fs::write(&file, "").unwrap();

        let err = resolve_context(&[file.display().to_string()], temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("should be a directory"));
    }

    #[test]
    fn test_resolve_dockerfile_full_path() {
        let temp_dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        let dockerfile = temp_dir.path().join("testDockerfile");
        fs::write(&dockerfile, DOCKERFILE).unwrap();

        let resolved =
            resolve_dockerfile(other.path(), dockerfile.to_str().unwrap(), false).unwrap();
        assert_eq!(resolved.path, dockerfile);
        assert_eq!(resolved.content, DOCKERFILE.as_bytes());
    }

    #[test]
    fn test_resolve_dockerfile_relative_to_context() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("testDockerfile"), DOCKERFILE).unwrap();

        let resolved = resolve_dockerfile(temp_dir.path(), "testDockerfile", false).unwrap();
        assert_eq!(resolved.path, temp_dir.path().join("testDockerfile"));
    }

    #[test]
    fn test_resolve_dockerfile_default_name() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), DOCKERFILE).unwrap();

        let resolved = resolve_dockerfile(temp_dir.path(), "", false).unwrap();
        assert!(resolved.path.ends_with("Dockerfile"));
        assert_eq!(resolved.content, DOCKERFILE.as_bytes());
    }

    #[test]
    fn test_resolve_dockerfile_lowercase_fallback() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("dockerfile"), DOCKERFILE).unwrap();

        let resolved = resolve_dockerfile(temp_dir.path(), "", false).unwrap();
        assert_eq!(resolved.content, DOCKERFILE.as_bytes());
    }

    #[test]
    fn test_resolve_dockerfile_not_found() {
        let temp_dir = tempdir().unwrap();

        let err = resolve_dockerfile(temp_dir.path(), "", false).unwrap_err();
        assert!(
            err.to_string()
                .contains("dockerfile: no such file or directory")
        );
    }

    #[test]
    fn test_resolve_dockerfile_explicit_missing() {
        let temp_dir = tempdir().unwrap();

        let err = resolve_dockerfile(temp_dir.path(), "Containerfile", false).unwrap_err();
        assert!(matches!(err, BuildError::DockerfileNotFound(_)));
    }

    #[test]
    fn test_resolve_dockerfile_empty() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "").unwrap();

        let err = resolve_dockerfile(temp_dir.path(), "Dockerfile", false).unwrap_err();
        assert!(err.to_string().contains("file is empty"));

        let resolved = resolve_dockerfile(temp_dir.path(), "Dockerfile", true).unwrap();
        assert!(resolved.content.is_empty());
    }

    #[test]
    fn test_resolve_dockerfile_directory() {
        let temp_dir = tempdir().unwrap();

        let err = resolve_dockerfile(temp_dir.path(), ".", false).unwrap_err();
        assert!(err.to_string().contains("should be a regular file"));
    }

    #[test]
    fn test_resolve_dockerfile_too_large() {
        let temp_dir = tempdir().unwrap();
        let dockerfile = temp_dir.path().join("Dockerfile");
        let file = fs::File::create(&dockerfile).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();

        let err = resolve_dockerfile(temp_dir.path(), "", false).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_non_utf8_dockerfile_is_rejected_as_text() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join("Dockerfile"),
            b"FROM busybox\nLABEL x=\xff\xfe\n",
        )
        .unwrap();

        // 読み込み自体は生のバイト列のまま成功する
        let resolved = resolve_dockerfile(temp_dir.path(), "", false).unwrap();
        assert_eq!(resolved.content, b"FROM busybox\nLABEL x=\xff\xfe\n");

        let err = resolved.text().unwrap_err();
        assert!(matches!(err, BuildError::DockerfileNotUtf8(_)));
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_abs_path() {
        let cwd = Path::new("/home/user/project");
        assert_eq!(
            abs_path(Path::new("./imageID.txt"), cwd),
            PathBuf::from("/home/user/project/imageID.txt")
        );
        assert_eq!(
            abs_path(Path::new("/tmp/imageID.txt"), cwd),
            PathBuf::from("/tmp/imageID.txt")
        );
        assert_eq!(
            abs_path(Path::new("../out/image.tar"), cwd),
            PathBuf::from("/home/user/out/image.tar")
        );
    }
}
