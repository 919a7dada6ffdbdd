pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// デーモンソケットの既定パス
pub const DEFAULT_SOCKET: &str = "/run/kiln/kiln_build.sock";
/// ビルド引数の暗号化に使う公開鍵の既定パス
pub const DEFAULT_PUBLIC_KEY: &str = "/etc/kiln/kiln.pub";

pub const SOCKET_ENV: &str = "KILN_SOCKET";
pub const PUBLIC_KEY_ENV: &str = "KILN_PUBLIC_KEY";
pub const CONFIG_PATH_ENV: &str = "KILN_CONFIG_PATH";

/// 設定ファイル（JSON）の内容
///
/// どのキーも省略可能。省略されたキーは環境変数または既定値で補う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PathBuf>,
}

/// 解決済みのクライアント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub socket: PathBuf,
    pub public_key: PathBuf,
}

/// コマンドラインで明示された値
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub socket: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
}

/// 設定ファイルのパスを取得
///
/// 1. 環境変数 KILN_CONFIG_PATH
/// 2. ~/.config/kiln/config.json
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_path(CONFIG_PATH_ENV) {
        return Some(path);
    }
    dirs::config_dir().map(|dir| dir.join("kiln").join("config.json"))
}

/// 設定ファイルを読み込む。存在しなければ空の設定を返す
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}", path.display());
            return Ok(ConfigFile::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// クライアント設定を解決
///
/// 以下の優先順位で値を決定:
/// 1. コマンドライン引数
/// 2. 環境変数 (KILN_SOCKET, KILN_PUBLIC_KEY)
/// 3. 設定ファイル
/// 4. 既定値
pub fn resolve(overrides: Overrides) -> Result<ClientConfig> {
    let file = match config_file_path() {
        Some(path) => load_config_file(&path)?,
        None => ConfigFile::default(),
    };

    let socket = pick("socket", overrides.socket, SOCKET_ENV, file.socket, DEFAULT_SOCKET)?;
    let public_key = pick(
        "public key",
        overrides.public_key,
        PUBLIC_KEY_ENV,
        file.public_key,
        DEFAULT_PUBLIC_KEY,
    )?;

    tracing::debug!(
        "Resolved config: socket={}, public_key={}",
        socket.display(),
        public_key.display()
    );
    Ok(ClientConfig { socket, public_key })
}

fn pick(
    name: &'static str,
    flag: Option<PathBuf>,
    env: &str,
    file: Option<PathBuf>,
    default: &str,
) -> Result<PathBuf> {
    let value = flag
        .or_else(|| env_path(env))
        .or(file)
        .unwrap_or_else(|| PathBuf::from(default));

    if value.as_os_str().is_empty() {
        return Err(ConfigError::EmptyValue { name });
    }
    Ok(value)
}

/// 空文字の環境変数は未設定として扱う
fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
