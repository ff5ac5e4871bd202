use color_eyre::eyre::Result;

/// A single hit returned by the video search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub title: String,
    /// `MM:SS` or `SS` as reported by the service; other shapes are unusable.
    pub duration: Option<String>,
    /// Reference handed to the fetcher.
    pub link: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VideoSearch: Send + Sync {
    /// Candidates in the order the service ranked them.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>>;
}
