use crate::entities::song::Song;
use crate::ports::search::SearchCandidate;
use crate::ports::spotify::{SpotifyApiPlaylist, SpotifyApiTrack};

pub fn make_spotify_track(
    id: &str,
    name: &str,
    artist: &str,
    duration_ms: u64,
) -> SpotifyApiTrack {
    SpotifyApiTrack {
        id: Some(id.to_string()),
        kind: "track".to_string(),
        name: name.to_string(),
        artists: vec![artist.to_string()],
        album_name: Some("Album".to_string()),
        album_image_url: Some(format!("https://i.scdn.co/image/{}", id)),
        album_release_date: None,
        album_total_tracks: None,
        duration_ms,
        track_number: Some(1),
    }
}

pub fn make_spotify_playlist(id: &str, name: &str, owner_id: &str) -> SpotifyApiPlaylist {
    SpotifyApiPlaylist {
        id: id.to_string(),
        name: name.to_string(),
        owner_id: owner_id.to_string(),
        image_url: None,
        total_tracks: 0,
    }
}

pub fn make_song(id: &str, title: &str, artist: &str, duration_ms: u64) -> Song {
    Song {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: "Album".to_string(),
        duration_ms,
        track_number: "1".to_string(),
        cover_art_url: String::new(),
        local_path: None,
        last_error: None,
    }
}

pub fn make_candidate(duration: &str, link: &str) -> SearchCandidate {
    SearchCandidate {
        title: format!("video {}", link),
        duration: Some(duration.to_string()),
        link: link.to_string(),
    }
}
