use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use tokio::process::Command;

use super::YtDlp;
use crate::ports::search::{SearchCandidate, VideoSearch};

/// One line of `--dump-json --flat-playlist` output. Only the fields the
/// resolver needs are read.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    /// Seconds, fractional for some extractors. Missing for live streams.
    duration: Option<f64>,
    url: Option<String>,
}

fn format_duration(seconds: f64) -> String {
    let seconds = seconds.round() as u64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Parse yt-dlp's JSON-lines output into candidates, in result order.
/// Lines that are not JSON objects are ignored.
pub fn parse_search_output(output: &str) -> Vec<SearchCandidate> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::trace!("Ignoring unparsable yt-dlp line: {}", e);
                None
            }
        })
        .filter_map(|entry| {
            let link = entry.url.or_else(|| {
                entry
                    .id
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })?;
            Some(SearchCandidate {
                title: entry.title.unwrap_or_default(),
                duration: entry.duration.map(format_duration),
                link,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl VideoSearch for YtDlp {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        self.rate_limiter.until_ready().await;

        let target = format!("ytsearch{}:{}", self.search_results, query);
        tracing::debug!("Searching: {}", target);

        let output = Command::new(&self.program)
            .args(["--dump-json", "--flat-playlist", "--no-warnings"])
            .arg(&target)
            .output()
            .await
            .wrap_err("Failed to run yt-dlp search")?;

        if !output.status.success() {
            return Err(eyre!(
                "yt-dlp search exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let stdout =
            String::from_utf8(output.stdout).wrap_err("yt-dlp search output is not UTF-8")?;
        Ok(parse_search_output(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_output() {
        let output = concat!(
            r#"{"_type": "url", "id": "fJ9rUzIMcZQ", "title": "Queen - Bohemian Rhapsody (Official Video)", "duration": 355.0, "url": "https://www.youtube.com/watch?v=fJ9rUzIMcZQ"}"#,
            "\n",
            r#"{"_type": "url", "id": "abc", "title": "Live stream", "duration": null}"#,
            "\n",
            "WARNING: something odd\n",
            "\n",
        );

        let candidates = parse_search_output(output);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].duration.as_deref(), Some("5:55"));
        assert_eq!(
            candidates[0].link,
            "https://www.youtube.com/watch?v=fJ9rUzIMcZQ"
        );
        assert_eq!(candidates[1].duration, None);
        assert_eq!(candidates[1].link, "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_entry_without_link_is_dropped() {
        let candidates = parse_search_output(r#"{"title": "orphan", "duration": 12}"#);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59.6), "1:00");
        assert_eq!(format_duration(200.0), "3:20");
        assert_eq!(format_duration(3723.0), "62:03");
    }
}
