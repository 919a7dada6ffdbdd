use crate::progress::Spinner;
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use kiln_build::{BuildFlags, BuildOptions, ImageFormat, encrypt_build_args};
use kiln_client::{BuildOutcome, BuildRequest, Builder, DaemonClient, wait_for_image};
use kiln_config::ClientConfig;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// ビルドコンテキスト（省略時はカレントディレクトリ）
    pub context: Option<String>,

    /// Dockerfile のパス（コンテキストからの相対パス可）
    #[arg(short = 'f', long = "file", default_value = "")]
    pub file: String,

    /// 出力先 (transport:destination)
    ///
    /// docker-archive:<path>[:<image>], oci-archive:<path>[:<image>],
    /// docker-daemon:<image>, docker://<reference>, isulad:<name>:<tag>
    #[arg(short = 'o', long = "output", default_value = "")]
    pub output: String,

    /// ビルド引数 (KEY=VALUE)。認証情報を含む値は暗号化して送信
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// ビルド中に付与する Linux capability
    #[arg(long = "cap-add", value_name = "CAP")]
    pub cap_add: Vec<String>,

    /// イメージ形式 (docker, oci)
    #[arg(long, default_value = "oci")]
    pub format: ImageFormat,

    /// ビルドしたイメージに付けるタグ
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// イメージIDを書き出すファイル
    #[arg(long)]
    pub iidfile: Option<PathBuf>,

    /// ホストのプロキシ環境変数を引き継ぐ
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub proxy: bool,

    /// ビルド引数の暗号化に使う公開鍵
    #[arg(long = "public-key", env = "KILN_PUBLIC_KEY")]
    pub public_key: Option<PathBuf>,
}

impl BuildArgs {
    pub fn into_options(self, cwd: &Path) -> anyhow::Result<BuildOptions> {
        let args: Vec<String> = self.context.into_iter().collect();
        let flags = BuildFlags {
            file: self.file,
            output: self.output,
            build_args: self.build_args,
            cap_add: self.cap_add,
            format: self.format,
            tag: self.tag,
            iidfile: self.iidfile,
            proxy: self.proxy,
        };
        Ok(BuildOptions::resolve(&args, cwd, flags)?)
    }
}

pub async fn handle(args: BuildArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let options = args.into_options(&cwd)?;
    let client = DaemonClient::new(&config.socket);

    let outcome = run_build(&options, &config.public_key, &client).await?;

    println!(
        "{} {}",
        "Build success with image id:".green().bold(),
        outcome.image_id
    );
    if let Some(build_id) = &outcome.build_id {
        tracing::info!("Build id: {}", build_id);
    }
    Ok(())
}

/// 検証済みの設定から1回のビルドを実行
///
/// 解決・暗号化はすべてネットワークに触れる前に終わらせる。
/// 成功したら iidfile にイメージIDを書き出す。
pub async fn run_build<B>(
    options: &BuildOptions,
    public_key: &Path,
    builder: &B,
) -> anyhow::Result<BuildOutcome>
where
    B: Builder + ?Sized,
{
    let dockerfile = options.read_dockerfile()?;
    dockerfile.text()?;
    let args = encrypt_build_args(options.build_args(), public_key)?;
    if args.encrypted {
        tracing::info!("Sensitive build args encrypted with {}", public_key.display());
    }

    let request = BuildRequest::new(options, dockerfile, args)?;
    let events = builder.build(request).await?;

    let spinner = Spinner::new(&format!("Building {}...", options.context_dir().display()));
    let result = tokio::select! {
        result = wait_for_image(events, |p| spinner.step(p)) => result,
        _ = tokio::signal::ctrl_c() => {
            spinner.finish_error("interrupted");
            anyhow::bail!("interrupted");
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.finish_error(&e.to_string());
            return Err(e.into());
        }
    };
    spinner.finish("Build completed ✓");

    if let Some(iidfile) = options.iidfile() {
        tokio::fs::write(iidfile, &outcome.image_id)
            .await
            .with_context(|| format!("failed to write image id to {}", iidfile.display()))?;
    }

    Ok(outcome)
}
