use crate::capability::validate_capabilities;
use crate::crypto::split_build_arg;
use crate::error::{BuildError, BuildResult};
use crate::output::{OutputTarget, validate_image_name};
use crate::resolver::{ResolvedDockerfile, abs_path, resolve_context, resolve_dockerfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// イメージマニフェストの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Docker,
    #[default]
    Oci,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Docker => write!(f, "docker"),
            ImageFormat::Oci => write!(f, "oci"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s {
            "docker" => Ok(ImageFormat::Docker),
            "oci" => Ok(ImageFormat::Oci),
            other => Err(BuildError::InvalidImageFormat(other.to_string())),
        }
    }
}

/// CLI から受け取った未検証の値
#[derive(Debug, Clone)]
pub struct BuildFlags {
    pub file: String,
    pub output: String,
    pub build_args: Vec<String>,
    pub cap_add: Vec<String>,
    pub format: ImageFormat,
    pub tag: Option<String>,
    pub iidfile: Option<PathBuf>,
    pub proxy: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        Self {
            file: String::new(),
            output: String::new(),
            build_args: Vec::new(),
            cap_add: Vec::new(),
            format: ImageFormat::default(),
            tag: None,
            iidfile: None,
            proxy: true,
        }
    }
}

/// 1回の呼び出しで一度だけ作られる、検証済みのビルド設定
///
/// 構築後は変更されない。パイプラインには参照で渡す。
#[derive(Debug, Clone)]
pub struct BuildOptions {
    context_dir: PathBuf,
    file: String,
    output: OutputTarget,
    build_args: Vec<String>,
    cap_add: Vec<String>,
    format: ImageFormat,
    tag: Option<String>,
    iidfile: Option<PathBuf>,
    proxy: bool,
}

impl BuildOptions {
    /// 位置引数・フラグ・作業ディレクトリから設定を組み立てる
    ///
    /// コンテキスト、出力先、capability、タグ、ビルド引数の書式を
    /// ここで検証する。Dockerfile は [`BuildOptions::read_dockerfile`] で
    /// 遅延解決する。
    pub fn resolve(args: &[String], cwd: &Path, flags: BuildFlags) -> BuildResult<Self> {
        let context_dir = resolve_context(args, cwd)?;
        let output = OutputTarget::parse_in(&flags.output, cwd)?;
        validate_capabilities(&flags.cap_add)?;

        for arg in &flags.build_args {
            split_build_arg(arg)?;
        }
        if let Some(tag) = &flags.tag {
            validate_image_name(tag)?;
        }

        let iidfile = flags.iidfile.map(|p| abs_path(&p, cwd));

        tracing::debug!(
            "Build options: context={}, output={}, format={}",
            context_dir.display(),
            output,
            flags.format
        );

        Ok(Self {
            context_dir,
            file: flags.file,
            output,
            build_args: flags.build_args,
            cap_add: flags.cap_add,
            format: flags.format,
            tag: flags.tag,
            iidfile,
            proxy: flags.proxy,
        })
    }

    pub fn read_dockerfile(&self) -> BuildResult<ResolvedDockerfile> {
        resolve_dockerfile(&self.context_dir, &self.file, false)
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    pub fn build_args(&self) -> &[String] {
        &self.build_args
    }

    pub fn cap_add(&self) -> &[String] {
        &self.cap_add
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn iidfile(&self) -> Option<&Path> {
        self.iidfile.as_deref()
    }

    pub fn proxy(&self) -> bool {
        self.proxy
    }
}
