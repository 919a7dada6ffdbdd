//! kiln build request pipeline
//!
//! CLI から受け取った未検証の入力（出力先指定、パス、ビルド引数、
//! capability 名）を、デーモンへ渡せる検証済みの値に変換します。
//! デーモンとの通信そのものは `kiln-client` が担当します。

pub mod capability;
pub mod crypto;
pub mod error;
pub mod options;
pub mod output;
pub mod resolver;

pub use capability::validate_capabilities;
pub use crypto::{ArgEncryptor, EncryptedArgs, encrypt_build_args, is_sensitive_arg};
pub use error::{BuildError, BuildResult, ErrorKind};
pub use options::{BuildFlags, BuildOptions, ImageFormat};
pub use output::{MAX_OUTPUT_LEN, OutputTarget};
pub use resolver::{ResolvedDockerfile, abs_path, resolve_context, resolve_dockerfile};
