use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::entities::playlist::Playlist;
use crate::entities::song::Song;
use crate::ports::spotify::{SpotifyApiPlaylist, SpotifyClient};

/// Spotify caps playlist item pages at 100.
const PLAYLIST_TRACK_PAGE_SIZE: u32 = 100;

/// Collection policy, taken from the config at construction.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub track_page_size: u32,
    pub playlist_page_size: u32,
    pub exclude_playlists: Vec<String>,
    pub only_my_playlists: bool,
    pub sort_by_release_date: Vec<String>,
}

impl From<&Config> for CollectOptions {
    fn from(config: &Config) -> Self {
        Self {
            track_page_size: config.download.track_page_size,
            playlist_page_size: config.download.playlist_page_size,
            exclude_playlists: config.exclude_playlists.clone(),
            only_my_playlists: config.only_my_playlists,
            sort_by_release_date: config.sort_by_release_date.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStage {
    SavedTracks,
    Playlists,
}

/// Reported after every page fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectProgress {
    pub stage: CollectStage,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Saved tracks were not paged because the snapshot count matched.
    pub used_cached_tracks: bool,
    pub new_songs: usize,
    pub playlists: usize,
    pub skipped_playlists: usize,
}

pub struct SpotifySyncService<C: SpotifyClient> {
    client: C,
    options: CollectOptions,
}

impl<C: SpotifyClient> SpotifySyncService<C> {
    pub fn new(client: C, options: CollectOptions) -> Self {
        Self { client, options }
    }

    /// Merge the remote library into `catalog`: saved tracks first, then the
    /// playlists that pass the exclusion and ownership filters.
    #[instrument(skip_all)]
    pub async fn sync_library(
        &self,
        catalog: &mut Catalog,
        progress: &mut impl FnMut(CollectProgress),
    ) -> Result<SyncSummary> {
        let songs_before = catalog.len();

        let first_page = self
            .client
            .saved_tracks(1, 0)
            .await
            .wrap_err("Failed to fetch saved track count")?;

        let used_cached_tracks = catalog.is_cache_current(first_page.total);
        if used_cached_tracks {
            tracing::info!(
                "Snapshot holds all {} saved tracks, skipping saved track collection",
                first_page.total
            );
        } else {
            self.collect_saved_tracks(catalog, progress).await?;
        }

        let (playlists, skipped_playlists) = self.collect_playlists(catalog, progress).await?;

        let summary = SyncSummary {
            used_cached_tracks,
            new_songs: catalog.len() - songs_before,
            playlists,
            skipped_playlists,
        };
        tracing::info!("Spotify sync finished: {:?}", summary);
        Ok(summary)
    }

    /// Page through the saved tracks and merge every acquirable one.
    /// Returns the number of songs new to the catalog.
    pub async fn collect_saved_tracks(
        &self,
        catalog: &mut Catalog,
        progress: &mut impl FnMut(CollectProgress),
    ) -> Result<usize> {
        let limit = self.options.track_page_size.max(1);
        let mut offset = 0;
        let mut added = 0;

        loop {
            let page = self
                .client
                .saved_tracks(limit, offset)
                .await
                .wrap_err(format!("Failed to fetch saved tracks at offset {}", offset))?;

            for item in &page.items {
                match Song::from_remote(item) {
                    Some(song) => {
                        if catalog.merge(song) {
                            added += 1;
                        }
                    }
                    None => tracing::debug!("Skipping non-track item: {:?}", item.id),
                }
            }

            offset += limit;
            progress(CollectProgress {
                stage: CollectStage::SavedTracks,
                completed: offset.min(page.total),
                total: page.total,
            });

            if offset >= page.total {
                break;
            }
        }

        tracing::info!("Collected saved tracks, {} new", added);
        Ok(added)
    }

    /// Page through the user's playlists. Returns how many were collected and
    /// how many were filtered out.
    pub async fn collect_playlists(
        &self,
        catalog: &mut Catalog,
        progress: &mut impl FnMut(CollectProgress),
    ) -> Result<(usize, usize)> {
        let owner = if self.options.only_my_playlists {
            let user = self
                .client
                .current_user()
                .await
                .wrap_err("Failed to fetch current spotify user")?;
            Some(user.id)
        } else {
            None
        };

        let limit = self.options.playlist_page_size.max(1);
        let mut offset = 0;
        let mut collected = 0;
        let mut skipped = 0;

        loop {
            let page = self
                .client
                .current_user_playlists(limit, offset)
                .await
                .wrap_err(format!("Failed to fetch playlists at offset {}", offset))?;

            for remote in &page.items {
                if self.options.exclude_playlists.contains(&remote.name) {
                    tracing::debug!("Skipping excluded playlist: {}", remote.name);
                    skipped += 1;
                    continue;
                }
                if let Some(owner) = &owner
                    && remote.owner_id != *owner
                {
                    tracing::debug!(
                        "Skipping playlist '{}' owned by {}",
                        remote.name,
                        remote.owner_id
                    );
                    skipped += 1;
                    continue;
                }

                let playlist = self.collect_playlist(catalog, remote).await?;
                tracing::info!(
                    "Collected playlist '{}' ({} tracks)",
                    playlist.name,
                    playlist.members.len()
                );
                catalog.upsert_playlist(playlist);
                collected += 1;
            }

            offset += limit;
            progress(CollectProgress {
                stage: CollectStage::Playlists,
                completed: offset.min(page.total),
                total: page.total,
            });

            if offset >= page.total {
                break;
            }
        }

        Ok((collected, skipped))
    }

    /// Build one playlist, merging any of its tracks the catalog does not
    /// know yet. Known tracks are referenced as they are.
    async fn collect_playlist(
        &self,
        catalog: &mut Catalog,
        remote: &SpotifyApiPlaylist,
    ) -> Result<Playlist> {
        let mut playlist = Playlist::from_remote(remote);
        let mut release_dates = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .client
                .playlist_tracks(&remote.id, PLAYLIST_TRACK_PAGE_SIZE, offset)
                .await
                .wrap_err(format!("Failed to fetch tracks of playlist {}", remote.id))?;

            for item in page.items.iter().flatten() {
                let Some(song) = Song::from_remote(item) else {
                    continue;
                };
                let id = song.id.clone();
                catalog.merge(song);
                release_dates.push((id.clone(), item.album_release_date.clone()));
                playlist.members.push(id);
            }

            offset += PLAYLIST_TRACK_PAGE_SIZE;
            if offset >= page.total || page.items.is_empty() {
                break;
            }
        }

        if self.options.sort_by_release_date.contains(&remote.name) {
            playlist.sort_by_release_date(&release_dates);
        }

        Ok(playlist)
    }
}
