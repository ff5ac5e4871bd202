use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use color_eyre::eyre::Result;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::entities::song::Song;
use crate::ports::fetch::AudioFetcher;
use crate::ports::search::VideoSearch;
use crate::services::matching::MatchResolver;

/// Why a single song could not be acquired. The display string is what ends
/// up in the failure report.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("directory create failed")]
    DirectoryCreate(#[source] std::io::Error),
    #[error("no match found")]
    NoMatch,
    #[error("fetch failed")]
    Fetch,
}

#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub music_dir: PathBuf,
    /// Extension of the files the fetcher produces.
    pub audio_format: String,
    pub workers: usize,
}

impl From<&Config> for AcquireOptions {
    fn from(config: &Config) -> Self {
        Self {
            music_dir: config.music_dir(),
            audio_format: config.download.audio_format.clone(),
            workers: config.download.workers,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Pending songs whose asset was already on disk.
    pub already_present: usize,
    pub attempted: usize,
    pub resolved: usize,
    pub failed: usize,
}

struct RunState<'a> {
    catalog: &'a mut Catalog,
    completed: usize,
    resolved: usize,
}

pub struct AcquisitionPipeline<S: VideoSearch, F: AudioFetcher> {
    resolver: MatchResolver<S>,
    fetcher: F,
    options: AcquireOptions,
}

impl<S: VideoSearch, F: AudioFetcher> AcquisitionPipeline<S, F> {
    pub fn new(search: S, fetcher: F, options: AcquireOptions) -> Self {
        Self {
            resolver: MatchResolver::new(search),
            fetcher,
            options,
        }
    }

    /// Resolve every pending song whose asset already exists on disk.
    pub fn mark_existing(&self, catalog: &mut Catalog) -> Result<usize> {
        let mut found = 0;
        for song in catalog.pending_songs() {
            let path = song.asset_path(&self.options.music_dir, &self.options.audio_format);
            if path.is_file() {
                tracing::debug!("Already on disk: {}", path.display());
                catalog.resolve(&song.id, path)?;
                found += 1;
            }
        }
        Ok(found)
    }

    /// One acquisition attempt. Never touches the catalog.
    pub async fn acquire_one(&self, song: &Song) -> Result<PathBuf, AcquireError> {
        let stem = song.save_location(&self.options.music_dir);
        if let Some(parent) = stem.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(AcquireError::DirectoryCreate)?;
        }

        let candidate = self
            .resolver
            .resolve(&song.title, &song.artist, song.duration_ms)
            .await
            .ok_or(AcquireError::NoMatch)?;

        match self.fetcher.fetch(&candidate.link, &stem).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => {
                tracing::warn!("Fetching {} produced no file", candidate.link);
                Err(AcquireError::Fetch)
            }
            Err(e) => {
                tracing::warn!("Fetching {} failed: {:?}", candidate.link, e);
                Err(AcquireError::Fetch)
            }
        }
    }

    /// Drain the pending queue with at most `workers` attempts in flight,
    /// then write the failure report and the snapshot.
    ///
    /// A failed song only gets its reason recorded; the rest of the batch
    /// carries on.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        catalog: &mut Catalog,
        snapshot_path: &Path,
        report_path: &Path,
    ) -> Result<AcquisitionSummary> {
        let already_present = self.mark_existing(catalog)?;
        let queue = catalog.pending_songs();
        let total = queue.len();
        tracing::info!(
            "Acquiring {} songs with {} workers ({} already on disk)",
            total,
            self.options.workers,
            already_present
        );

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let state = Mutex::new(RunState {
            catalog,
            completed: 0,
            resolved: 0,
        });

        let tasks = queue.iter().map(|song| {
            let sem = semaphore.clone();
            let state = &state;
            async move {
                let _permit = sem.acquire().await.ok();
                let outcome = self.acquire_one(song).await;

                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.completed += 1;
                let completed = state.completed;
                let recorded = match outcome {
                    Ok(path) => {
                        tracing::info!(
                            "[{}/{}] Acquired {} - {}",
                            completed,
                            total,
                            song.artist,
                            song.title
                        );
                        state.resolved += 1;
                        state.catalog.resolve(&song.id, path).map(|_| ())
                    }
                    Err(e) => {
                        tracing::warn!(
                            "[{}/{}] {} - {}: {}",
                            completed,
                            total,
                            song.artist,
                            song.title,
                            e
                        );
                        state.catalog.record_error(&song.id, e.to_string())
                    }
                };
                if let Err(e) = recorded {
                    tracing::error!("Failed to record outcome for {}: {:?}", song.id, e);
                }
            }
        });
        join_all(tasks).await;

        let state = state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let resolved = state.resolved;
        let catalog = state.catalog;

        catalog.write_failure_report(report_path)?;
        catalog.persist(snapshot_path)?;

        let summary = AcquisitionSummary {
            already_present,
            attempted: total,
            resolved,
            failed: total - resolved,
        };
        tracing::info!("Acquisition finished: {:?}", summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::song::with_appended_extension;
    use crate::ports::fetch::MockAudioFetcher;
    use crate::ports::search::MockVideoSearch;
    use crate::test_utils::{make_candidate, make_song};

    fn options(music_dir: &Path, workers: usize) -> AcquireOptions {
        AcquireOptions {
            music_dir: music_dir.to_path_buf(),
            audio_format: "mp3".into(),
            workers,
        }
    }

    fn matching_search() -> MockVideoSearch {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .returning(|query| Ok(vec![make_candidate("3:20", &format!("link:{}", query))]));
        search
    }

    fn succeeding_fetcher() -> MockAudioFetcher {
        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch().returning(|_, stem| {
            assert!(stem.parent().unwrap().is_dir());
            Ok(Some(with_appended_extension(stem, "mp3")))
        });
        fetcher
    }

    #[tokio::test]
    async fn test_successful_acquisition_resolves_song() {
        let dir = tempfile::tempdir().unwrap();
        let music_dir = dir.path().join("music");
        let snapshot = dir.path().join("library.txt");
        let report = dir.path().join("failed.txt");

        let mut catalog = Catalog::new();
        catalog.merge(make_song("t1", "Title", "Artist", 200_000));

        let pipeline = AcquisitionPipeline::new(
            matching_search(),
            succeeding_fetcher(),
            options(&music_dir, 2),
        );
        let summary = pipeline.run(&mut catalog, &snapshot, &report).await.unwrap();

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(catalog.pending_len(), 0);
        let expected = music_dir.join("tracks/Artist/Album/Title.mp3");
        assert_eq!(catalog.get("t1").unwrap().local_path.as_ref(), Some(&expected));

        let saved = std::fs::read_to_string(&snapshot).unwrap();
        assert!(saved.ends_with(&format!("|{}\n", expected.display())));
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "");
    }

    #[tokio::test]
    async fn test_no_match_records_reason() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("failed.txt");

        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .times(2)
            .returning(|_| Ok(vec![make_candidate("9:59", "too-long")]));
        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch().never();

        let mut catalog = Catalog::new();
        catalog.merge(make_song("t1", "Title", "Artist", 200_000));

        let pipeline = AcquisitionPipeline::new(search, fetcher, options(dir.path(), 1));
        let summary = pipeline
            .run(&mut catalog, &dir.path().join("library.txt"), &report)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(catalog.is_pending("t1"));
        assert_eq!(
            catalog.get("t1").unwrap().last_error.as_deref(),
            Some("no match found")
        );
        assert_eq!(
            std::fs::read_to_string(&report).unwrap(),
            "Artist - Title (no match found)\n"
        );
    }

    #[tokio::test]
    async fn test_empty_or_failed_fetch_records_reason() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockAudioFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|link, _| link.contains("Empty"))
            .returning(|_, _| Ok(None));
        fetcher
            .expect_fetch()
            .withf(|link, _| link.contains("Broken"))
            .returning(|_, _| Err(color_eyre::eyre::eyre!("yt-dlp exited with status 1")));

        let mut catalog = Catalog::new();
        catalog.merge(make_song("t1", "Empty", "Artist", 200_000));
        catalog.merge(make_song("t2", "Broken", "Artist", 200_000));

        let pipeline = AcquisitionPipeline::new(matching_search(), fetcher, options(dir.path(), 2));
        pipeline
            .run(
                &mut catalog,
                &dir.path().join("library.txt"),
                &dir.path().join("failed.txt"),
            )
            .await
            .unwrap();

        for id in ["t1", "t2"] {
            assert!(catalog.is_pending(id));
            assert_eq!(
                catalog.get(id).unwrap().last_error.as_deref(),
                Some("fetch failed")
            );
        }
    }

    #[tokio::test]
    async fn test_directory_create_failure_skips_search() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut search = MockVideoSearch::new();
        search.expect_search().never();
        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch().never();

        let mut catalog = Catalog::new();
        catalog.merge(make_song("t1", "Title", "Artist", 200_000));

        let pipeline = AcquisitionPipeline::new(search, fetcher, options(&blocker, 1));
        let report = dir.path().join("failed.txt");
        pipeline
            .run(&mut catalog, &dir.path().join("library.txt"), &report)
            .await
            .unwrap();

        assert!(catalog.is_pending("t1"));
        assert_eq!(
            std::fs::read_to_string(&report).unwrap(),
            "Artist - Title (directory create failed)\n"
        );
    }

    #[tokio::test]
    async fn test_existing_asset_is_resolved_without_searching() {
        let dir = tempfile::tempdir().unwrap();
        let song = make_song("t1", "Title", "Artist", 200_000);
        let existing = song.asset_path(dir.path(), "mp3");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"audio").unwrap();

        let mut search = MockVideoSearch::new();
        search.expect_search().never();
        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch().never();

        let mut catalog = Catalog::new();
        catalog.merge(song);

        let pipeline = AcquisitionPipeline::new(search, fetcher, options(dir.path(), 1));
        let summary = pipeline
            .run(
                &mut catalog,
                &dir.path().join("library.txt"),
                &dir.path().join("failed.txt"),
            )
            .await
            .unwrap();

        assert_eq!(summary.already_present, 1);
        assert_eq!(summary.attempted, 0);
        assert_eq!(catalog.get("t1").unwrap().local_path.as_ref(), Some(&existing));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_the_batch() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockAudioFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|link, _| link.contains("Song 2"))
            .returning(|_, _| Ok(None));
        fetcher
            .expect_fetch()
            .returning(|_, stem| Ok(Some(with_appended_extension(stem, "mp3"))));

        let mut catalog = Catalog::new();
        for i in 0..5 {
            catalog.merge(make_song(
                &format!("t{}", i),
                &format!("Song {}", i),
                "Artist",
                200_000,
            ));
        }

        let pipeline = AcquisitionPipeline::new(matching_search(), fetcher, options(dir.path(), 2));
        let summary = pipeline
            .run(
                &mut catalog,
                &dir.path().join("library.txt"),
                &dir.path().join("failed.txt"),
            )
            .await
            .unwrap();

        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.resolved, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(catalog.pending_len(), 1);
        assert!(catalog.is_pending("t2"));
        for song in catalog.songs() {
            assert_eq!(catalog.is_pending(&song.id), song.local_path.is_none());
        }
    }

    #[test]
    fn test_error_reasons() {
        assert_eq!(
            AcquireError::DirectoryCreate(std::io::Error::other("denied")).to_string(),
            "directory create failed"
        );
        assert_eq!(AcquireError::NoMatch.to_string(), "no match found");
        assert_eq!(AcquireError::Fetch.to_string(), "fetch failed");
    }
}
