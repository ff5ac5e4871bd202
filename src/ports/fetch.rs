use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download `link` as audio to `output_stem` plus the fetcher's extension.
    ///
    /// Returns the realized file, or `None` when the download produced nothing.
    async fn fetch(&self, link: &str, output_stem: &Path) -> Result<Option<PathBuf>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}
