//! `--cap-add` で指定された Linux capability 名の検証

use crate::error::{BuildError, BuildResult};
use std::collections::HashSet;

/// 正規の Linux capability 名（カーネルの番号順）
pub const CAPABILITIES: [&str; 41] = [
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_DAC_READ_SEARCH",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_LINUX_IMMUTABLE",
    "CAP_NET_BIND_SERVICE",
    "CAP_NET_BROADCAST",
    "CAP_NET_ADMIN",
    "CAP_NET_RAW",
    "CAP_IPC_LOCK",
    "CAP_IPC_OWNER",
    "CAP_SYS_MODULE",
    "CAP_SYS_RAWIO",
    "CAP_SYS_CHROOT",
    "CAP_SYS_PTRACE",
    "CAP_SYS_PACCT",
    "CAP_SYS_ADMIN",
    "CAP_SYS_BOOT",
    "CAP_SYS_NICE",
    "CAP_SYS_RESOURCE",
    "CAP_SYS_TIME",
    "CAP_SYS_TTY_CONFIG",
    "CAP_MKNOD",
    "CAP_LEASE",
    "CAP_AUDIT_WRITE",
    "CAP_AUDIT_CONTROL",
    "CAP_SETFCAP",
    "CAP_MAC_OVERRIDE",
    "CAP_MAC_ADMIN",
    "CAP_SYSLOG",
    "CAP_WAKE_ALARM",
    "CAP_BLOCK_SUSPEND",
    "CAP_AUDIT_READ",
    "CAP_PERFMON",
    "CAP_BPF",
    "CAP_CHECKPOINT_RESTORE",
];

/// `name` が正規の capability 名か（大文字小文字を区別）
pub fn is_valid_capability(name: &str) -> bool {
    CAPABILITIES.contains(&name)
}

/// `--cap-add` で要求された capability を検証
///
/// 空のリストは何も付与しないので有効。
pub fn validate_capabilities(names: &[String]) -> BuildResult<()> {
    let mut seen = HashSet::with_capacity(names.len());

    for name in names {
        if !is_valid_capability(name) {
            return Err(BuildError::InvalidCapability(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            return Err(BuildError::DuplicateCapability(name.clone()));
        }
    }

    Ok(())
}
