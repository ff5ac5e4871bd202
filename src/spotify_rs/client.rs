use std::time::Duration;

use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::de::DeserializeOwned;

use crate::config::SpotifyCredentials;
use crate::ports::spotify::{
    Page, SpotifyApiPlaylist, SpotifyApiTrack, SpotifyApiUser, SpotifyClient,
};
use crate::spotify_rs::auth::refresh_access_token;
use crate::spotify_rs::types::{
    SpotifyPaging, SpotifyPlaylist, SpotifyPlaylistItem, SpotifySavedTrack, SpotifyUser,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Spotify Web API client
pub struct SpotifyWebClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyWebClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Use the configured access token, or trade the refresh token for one.
    pub async fn connect(credentials: &SpotifyCredentials) -> Result<Self> {
        if let Some(access_token) = &credentials.access_token {
            tracing::debug!("Using configured spotify access token");
            return Ok(Self::new(access_token.clone()));
        }

        let client_id = credentials
            .client_id
            .as_deref()
            .ok_or_eyre("Spotify client id is not configured")?;
        let client_secret = credentials
            .client_secret
            .as_deref()
            .ok_or_eyre("Spotify client secret is not configured")?;
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or_eyre("Spotify refresh token is not configured")?;

        let token = refresh_access_token(client_id, client_secret, refresh_token)
            .await
            .wrap_err("Failed to refresh spotify access token")?;
        tracing::debug!("Refreshed spotify access token, expires in {}s", token.expires_in);

        Ok(Self::new(token.access_token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, u32)]) -> Result<T> {
        let url = format!("{}{}", SPOTIFY_API_URL, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .wrap_err(format!("Failed to send request to {}", url))?
            .error_for_status()
            .wrap_err(format!("Spotify rejected request to {}", url))?;

        response
            .json()
            .await
            .wrap_err(format!("Failed to parse response from {}", url))
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyWebClient {
    async fn current_user(&self) -> Result<SpotifyApiUser> {
        let user: SpotifyUser = self.get("/me", &[]).await?;
        Ok(user.into())
    }

    async fn saved_tracks(&self, limit: u32, offset: u32) -> Result<Page<SpotifyApiTrack>> {
        let paging: SpotifyPaging<SpotifySavedTrack> = self
            .get("/me/tracks", &[("limit", limit), ("offset", offset)])
            .await?;

        Ok(paging.into_tracks())
    }

    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SpotifyApiPlaylist>> {
        let paging: SpotifyPaging<SpotifyPlaylist> = self
            .get("/me/playlists", &[("limit", limit), ("offset", offset)])
            .await?;

        Ok(paging.into())
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Option<SpotifyApiTrack>>> {
        let paging: SpotifyPaging<SpotifyPlaylistItem> = self
            .get(
                &format!("/playlists/{}/tracks", playlist_id),
                &[("limit", limit), ("offset", offset)],
            )
            .await?;

        Ok(Page {
            items: paging
                .items
                .into_iter()
                .map(|item| item.track.map(SpotifyApiTrack::from))
                .collect(),
            total: paging.total,
        })
    }
}
