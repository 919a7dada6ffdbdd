use indicatif::{ProgressBar, ProgressStyle};
use kiln_client::BuildProgress;

/// ビルド／保存中に表示するスピナー
pub struct Spinner {
    progress_bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());

        Self { progress_bar: pb }
    }

    /// デーモンから届いたステップを表示
    ///
    /// 各行はスピナーの上に残し、最新の行をメッセージにする。
    pub fn step(&self, progress: &BuildProgress) {
        if progress.message.is_empty() {
            return;
        }
        self.progress_bar.println(&progress.message);
        self.progress_bar
            .set_message(format!("{} ({})", progress.message, progress.phase));
    }

    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("Failed: {}", error));
    }
}
