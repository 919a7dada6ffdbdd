use assert_cmd::Command;
use kiln_client::FakeDaemon;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::runtime::Runtime;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_dockerfile(&self, content: &str) {
        let path = self.root.path().join("Dockerfile");
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// プロジェクトをカレントディレクトリにした kiln コマンド
    ///
    /// 利用者の環境変数や設定ファイルの影響を受けないようにする。
    pub fn kiln(&self, socket: &Path) -> Command {
        let mut cmd = Command::cargo_bin("kiln").unwrap();
        cmd.current_dir(self.path())
            .env("KILN_CONFIG_PATH", self.path().join("no-config.json"))
            .env_remove("KILN_SOCKET")
            .env_remove("KILN_PUBLIC_KEY")
            .arg("-H")
            .arg(socket);
        cmd
    }
}

/// 別スレッドのランタイムで FakeDaemon をソケット越しに動かす
#[allow(dead_code)]
pub struct DaemonHandle {
    pub socket: PathBuf,
    _dir: TempDir,
    _runtime: Runtime,
}

#[allow(dead_code)]
pub fn start_daemon(daemon: FakeDaemon) -> DaemonHandle {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("kiln_build.sock");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let listener = {
        let _guard = runtime.enter();
        UnixListener::bind(&socket).unwrap()
    };
    runtime.spawn(daemon.serve(listener));

    DaemonHandle {
        socket,
        _dir: dir,
        _runtime: runtime,
    }
}

/// 存在しないソケットのパス
#[allow(dead_code)]
pub fn missing_socket(project: &TestProject) -> PathBuf {
    project.path().join("run").join("kiln_build.sock")
}
