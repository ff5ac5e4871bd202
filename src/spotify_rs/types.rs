use serde::Deserialize;

use crate::ports::spotify::{Page, SpotifyApiPlaylist, SpotifyApiTrack, SpotifyApiUser};

/// Spotify OAuth token response
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Spotify user profile
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Offset-based paging object
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPaging<T> {
    pub items: Vec<T>,
    pub total: u32,
}

/// Saved-track entries can carry a null track once it was pulled from Spotify.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySavedTrack {
    pub track: Option<SpotifyTrack>,
}

/// The track is null when it was removed from Spotify.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylistItem {
    pub track: Option<SpotifyTrack>,
}

/// Spotify playlist from API
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: SpotifyUser,
    pub images: Option<Vec<SpotifyImage>>,
    pub tracks: SpotifyPlaylistTracks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylistTracks {
    pub total: u32,
}

/// Track or episode from API. Episodes carry no album and no artists.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: Option<SpotifyAlbum>,
    #[serde(default)]
    pub duration_ms: u64,
    pub track_number: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

impl From<SpotifyUser> for SpotifyApiUser {
    fn from(user: SpotifyUser) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
        }
    }
}

impl From<SpotifyPlaylist> for SpotifyApiPlaylist {
    fn from(playlist: SpotifyPlaylist) -> Self {
        Self {
            id: playlist.id,
            name: playlist.name,
            owner_id: playlist.owner.id,
            image_url: playlist
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
            total_tracks: playlist.tracks.total,
        }
    }
}

impl From<SpotifyTrack> for SpotifyApiTrack {
    fn from(track: SpotifyTrack) -> Self {
        let album = track.album;
        Self {
            id: track.id,
            kind: track.kind,
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album_name: album.as_ref().map(|a| a.name.clone()),
            album_image_url: album
                .as_ref()
                .and_then(|a| a.images.first())
                .map(|image| image.url.clone()),
            album_release_date: album.as_ref().and_then(|a| a.release_date.clone()),
            album_total_tracks: album.as_ref().and_then(|a| a.total_tracks),
            duration_ms: track.duration_ms,
            track_number: track.track_number,
        }
    }
}

impl<T, U: From<T>> From<SpotifyPaging<T>> for Page<U> {
    fn from(paging: SpotifyPaging<T>) -> Self {
        Self {
            items: paging.items.into_iter().map(U::from).collect(),
            total: paging.total,
        }
    }
}

impl SpotifyPaging<SpotifySavedTrack> {
    /// Unwrap the saved entries, dropping the ones whose track is gone.
    /// `total` stays the remote count so paging still terminates.
    pub fn into_tracks(self) -> Page<SpotifyApiTrack> {
        let received = self.items.len();
        let items: Vec<SpotifyApiTrack> = self
            .items
            .into_iter()
            .filter_map(|saved| saved.track.map(SpotifyApiTrack::from))
            .collect();
        if items.len() < received {
            tracing::debug!("Skipped {} null saved tracks", received - items.len());
        }

        Page {
            items,
            total: self.total,
        }
    }
}
