use color_eyre::eyre::Result;

/// One page of a paginated Spotify listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u32,
}

/// Decoupled representation of the current Spotify user.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyApiUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Decoupled representation of a Spotify playlist from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyApiPlaylist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub image_url: Option<String>,
    pub total_tracks: u32,
}

/// Decoupled representation of a playable item from the API.
///
/// Playlists can hold podcast episodes too, so `kind` carries the API's
/// `type` discriminator and the track-only fields are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyApiTrack {
    pub id: Option<String>,
    pub kind: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub album_release_date: Option<String>,
    pub album_total_tracks: Option<u32>,
    pub duration_ms: u64,
    pub track_number: Option<u32>,
}

/// Port trait wrapping the Spotify API capabilities used by business logic.
///
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user(&self) -> Result<SpotifyApiUser>;
    async fn saved_tracks(&self, limit: u32, offset: u32) -> Result<Page<SpotifyApiTrack>>;
    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SpotifyApiPlaylist>>;
    /// Items whose track is missing (removed or local-only) come back as `None`.
    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Option<SpotifyApiTrack>>>;
}
