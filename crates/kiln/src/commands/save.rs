use crate::progress::Spinner;
use clap::Args;
use colored::Colorize;
use kiln_build::ImageFormat;
use kiln_client::{DaemonClient, SaveRequest, Saver, save_to_file};
use kiln_config::ClientConfig;

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// 保存するイメージの名前またはID
    #[arg(required = true)]
    pub images: Vec<String>,

    /// 出力先のアーカイブファイル
    #[arg(short = 'o', long = "output", default_value = "")]
    pub output: String,

    /// アーカイブ形式 (docker, oci)
    #[arg(long, default_value = "oci")]
    pub format: ImageFormat,
}

pub async fn handle(args: SaveArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let request = SaveRequest::new(args.images, &args.output, &cwd, args.format)?;
    let client = DaemonClient::new(&config.socket);

    let path = request.path.clone();
    let images = run_save(request, &client).await?;

    println!(
        "{} {} → {}",
        "Save success with image:".green().bold(),
        images.join(", "),
        path.display().to_string().cyan()
    );
    Ok(())
}

pub async fn run_save<S>(request: SaveRequest, saver: &S) -> anyhow::Result<Vec<String>>
where
    S: Saver + ?Sized,
{
    let spinner = Spinner::new(&format!("Saving {}...", request.images.join(", ")));

    let result = tokio::select! {
        result = save_to_file(saver, request) => result,
        _ = tokio::signal::ctrl_c() => {
            spinner.finish_error("interrupted");
            anyhow::bail!("interrupted");
        }
    };

    match result {
        Ok(images) => {
            spinner.finish("Save completed ✓");
            Ok(images)
        }
        Err(e) => {
            spinner.finish_error(&e.to_string());
            Err(e.into())
        }
    }
}
