use std::ffi::OsString;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::process::Command;

use super::YtDlp;
use crate::entities::song::with_appended_extension;
use crate::ports::fetch::AudioFetcher;

/// yt-dlp output template: the stem followed by whatever extension it picks
/// before post-processing.
fn output_template(output_stem: &Path) -> OsString {
    let mut template = OsString::from(output_stem.as_os_str());
    template.push(".%(ext)s");
    template
}

#[async_trait::async_trait]
impl AudioFetcher for YtDlp {
    async fn fetch(&self, link: &str, output_stem: &Path) -> Result<Option<PathBuf>> {
        tracing::debug!("Downloading {} to {}", link, output_stem.display());

        let output = Command::new(&self.program)
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .args(["--no-playlist", "--quiet", "--no-warnings", "--output"])
            .arg(output_template(output_stem))
            .arg(link)
            .output()
            .await
            .wrap_err("Failed to run yt-dlp download")?;

        if !output.status.success() {
            return Err(eyre!(
                "yt-dlp download exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let produced = with_appended_extension(output_stem, &self.audio_format);
        if produced.is_file() {
            Ok(Some(produced))
        } else {
            tracing::debug!("yt-dlp exited cleanly but {} is missing", produced.display());
            Ok(None)
        }
    }
}
