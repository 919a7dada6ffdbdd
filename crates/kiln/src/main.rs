mod commands;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use kiln_build::BuildError;
use kiln_client::ClientError;
use kiln_config::Overrides;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "kiln ビルドデーモンのクライアント", long_about = None)]
struct Cli {
    /// デーモンのソケットパス
    #[arg(short = 'H', long = "host", env = "KILN_SOCKET", global = true)]
    host: Option<PathBuf>,

    /// デバッグログを出力
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dockerfile からイメージをビルド
    Build(commands::build::BuildArgs),
    /// ビルドの状態を表示
    Status {
        /// ビルド開始時に払い出されたID
        build_id: String,
    },
    /// イメージをアーカイブに保存
    Save(commands::save::SaveArgs),
    /// デーモンの稼働確認
    Health,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// ライブラリのエラーにはヒント付きのメッセージを使う
fn render_error(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<BuildError>() {
        return e.user_message();
    }
    if let Some(e) = err.downcast_ref::<ClientError>() {
        return e.user_message();
    }
    format!("{:#}", err)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Versionコマンドは設定不要
    if matches!(cli.command, Commands::Version) {
        println!("kiln {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let public_key = match &cli.command {
        Commands::Build(args) => args.public_key.clone(),
        _ => None,
    };
    let config = kiln_config::resolve(Overrides {
        socket: cli.host,
        public_key,
    })?;

    match cli.command {
        Commands::Build(args) => commands::build::handle(args, &config).await?,
        Commands::Status { build_id } => commands::status::handle(build_id, &config).await?,
        Commands::Save(args) => commands::save::handle(args, &config).await?,
        Commands::Health => commands::health::handle(&config).await?,
        Commands::Version => unreachable!("Version is handled before config loading"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), render_error(&err));
        std::process::exit(1);
    }
}
