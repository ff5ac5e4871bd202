use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::catalog::Catalog;
use crate::entities::playlist::Playlist;
use crate::ports::fetch::ArtworkFetcher;

/// Artwork side files live in this directory, relative to the playlist files.
pub const COVER_IMAGE_DIR: &str = "coverImages";

/// Render a playlist as M3U. Members without a local asset are left out.
pub fn render_m3u(playlist: &Playlist, catalog: &Catalog, cover_image: Option<&str>) -> String {
    let mut out = String::from("#EXTM3U\n\n");
    out.push_str(&format!("#PLAYLIST:{}\n\n", playlist.name));

    if let Some(cover_image) = cover_image {
        out.push_str(&format!("#EXTIMG:{}\n\n", cover_image));
    }

    for song in playlist.members.iter().filter_map(|id| catalog.get(id)) {
        let Some(local_path) = &song.local_path else {
            continue;
        };
        let local_path = std::path::absolute(local_path).unwrap_or_else(|_| local_path.clone());
        out.push_str(&format!(
            "#EXTINF:{},{} - {}\n{}\n\n",
            song.duration_ms / 1000,
            song.artist,
            song.title,
            local_path.display()
        ));
    }

    out
}

/// `reqwest` backed artwork download.
#[derive(Default)]
pub struct HttpArtworkFetcher {
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .wrap_err(format!("Failed to request artwork: {}", url))?
            .error_for_status()
            .wrap_err(format!("Artwork request rejected: {}", url))?;

        let bytes = response
            .bytes()
            .await
            .wrap_err("Failed to read artwork body")?;
        Ok(bytes.to_vec())
    }
}

pub struct PlaylistExporter<A: ArtworkFetcher> {
    playlist_dir: PathBuf,
    artwork: A,
}

impl<A: ArtworkFetcher> PlaylistExporter<A> {
    pub fn new(playlist_dir: PathBuf, artwork: A) -> Self {
        Self {
            playlist_dir,
            artwork,
        }
    }

    /// Write one playlist file and, when it can be fetched, its artwork.
    pub async fn export(&self, playlist: &Playlist, catalog: &Catalog) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.playlist_dir)
            .await
            .wrap_err(format!(
                "Failed to create playlist directory: {}",
                self.playlist_dir.display()
            ))?;

        let cover_image = self.save_artwork(playlist).await;
        let contents = render_m3u(playlist, catalog, cover_image.as_deref());

        let path = self.playlist_dir.join(playlist.file_name());
        tokio::fs::write(&path, contents)
            .await
            .wrap_err(format!("Failed to write playlist: {}", path.display()))?;

        tracing::debug!("Exported playlist '{}' to {}", playlist.name, path.display());
        Ok(path)
    }

    /// Export every playlist in the catalog. A playlist that fails is logged
    /// and skipped. Returns the number written.
    #[instrument(skip_all)]
    pub async fn export_all(&self, catalog: &Catalog) -> usize {
        let mut exported = 0;
        for playlist in catalog.playlists() {
            match self.export(playlist, catalog).await {
                Ok(_) => exported += 1,
                Err(e) => tracing::error!("Failed to export playlist '{}': {:?}", playlist.name, e),
            }
        }
        tracing::info!(
            "Exported {} playlists to {}",
            exported,
            self.playlist_dir.display()
        );
        exported
    }

    /// Returns the artwork reference relative to the playlist directory, or
    /// `None` if there is no artwork or it could not be stored.
    async fn save_artwork(&self, playlist: &Playlist) -> Option<String> {
        let url = playlist.cover_art_url.as_deref()?;

        let file_name = format!("{}.jpg", playlist.file_stem());
        let target = self.playlist_dir.join(COVER_IMAGE_DIR).join(&file_name);

        if let Err(e) = self.write_artwork(url, &target).await {
            tracing::debug!("No artwork for '{}': {:?}", playlist.name, e);
            return None;
        }

        Some(format!("{}/{}", COVER_IMAGE_DIR, file_name))
    }

    async fn write_artwork(&self, url: &str, target: &Path) -> Result<()> {
        let image = self.artwork.fetch_image(url).await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, image).await?;
        Ok(())
    }
}
