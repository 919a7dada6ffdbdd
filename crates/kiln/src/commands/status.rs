use colored::Colorize;
use kiln_client::{BuildPhase, BuildProgress, DaemonClient, StatusReporter};
use kiln_config::ClientConfig;

pub async fn handle(build_id: String, config: &ClientConfig) -> anyhow::Result<()> {
    let client = DaemonClient::new(&config.socket);
    let progress = query(&build_id, &client).await?;
    println!("{}", render(&progress));
    Ok(())
}

pub async fn query<R>(build_id: &str, reporter: &R) -> anyhow::Result<BuildProgress>
where
    R: StatusReporter + ?Sized,
{
    if build_id.trim().is_empty() {
        anyhow::bail!("build id should not be empty");
    }
    Ok(reporter.status(build_id).await?)
}

fn render(progress: &BuildProgress) -> String {
    let phase = match progress.phase {
        BuildPhase::Complete => progress.phase.to_string().green(),
        BuildPhase::Failed => progress.phase.to_string().red(),
        _ => progress.phase.to_string().yellow(),
    };

    if progress.message.is_empty() {
        format!("{}: {}", progress.build_id.cyan(), phase)
    } else {
        format!(
            "{}: {} ({})",
            progress.build_id.cyan(),
            phase,
            progress.message
        )
    }
}
