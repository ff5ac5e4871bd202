use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::ports::spotify::SpotifyApiTrack;

/// Field separator of the snapshot record format.
pub const RECORD_SEPARATOR: char = '|';

/// Number of fields in a snapshot record. A line with any other count is
/// from an incompatible format and is rejected outright.
pub const RECORD_FIELD_COUNT: usize = 8;

/// One acquirable track of the mirrored catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    /// Positional metadata, `N` or `N/total`.
    pub track_number: String,
    pub cover_art_url: String,
    /// Set once the asset has been acquired. `None` means the song is pending.
    pub local_path: Option<PathBuf>,
    /// Reason the last acquisition attempt failed. Never persisted.
    pub last_error: Option<String>,
}

fn breaks_record_char(c: char) -> bool {
    c == RECORD_SEPARATOR || c == '\n' || c == '\r'
}

/// Whether `value` cannot be stored in a record field as is.
pub fn breaks_record(value: &str) -> bool {
    value.chars().any(breaks_record_char)
}

/// Strip characters that would break the record format.
fn clean_text(value: &str) -> String {
    value.chars().filter(|c| !breaks_record_char(*c)).collect()
}

/// Catalog ids are used in file names and record lines, so in addition to the
/// record-breaking characters the path-unsafe ones go too.
fn clean_id(value: &str) -> String {
    clean_text(value)
        .chars()
        .filter(|c| !matches!(c, '?' | '/' | '\\' | '\'' | '"' | '.'))
        .collect()
}

/// Sanitize one path component for the filesystem (remove invalid characters)
pub fn sanitize_path_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

impl Song {
    /// Build a song from a Spotify item. Returns `None` for anything that is
    /// not an acquirable track (episodes, local files without an id).
    pub fn from_remote(track: &SpotifyApiTrack) -> Option<Self> {
        if track.kind != "track" {
            return None;
        }

        let id = clean_id(track.id.as_deref()?);
        if id.is_empty() {
            return None;
        }

        let track_number = match (track.track_number, track.album_total_tracks) {
            (Some(number), Some(total)) => format!("{}/{}", number, total),
            (Some(number), None) => number.to_string(),
            (None, _) => String::new(),
        };

        Some(Self {
            id,
            title: clean_text(&track.name),
            artist: clean_text(track.artists.first().map(String::as_str).unwrap_or("")),
            album: clean_text(track.album_name.as_deref().unwrap_or("")),
            duration_ms: track.duration_ms,
            track_number: clean_text(&track_number),
            cover_art_url: clean_text(track.album_image_url.as_deref().unwrap_or("")),
            local_path: None,
            last_error: None,
        })
    }

    /// Serialize to a single snapshot line, terminated by `\n`.
    pub fn to_record(&self) -> String {
        let local_path = self
            .local_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}\n",
            self.id,
            self.title,
            self.artist,
            self.album,
            self.duration_ms,
            self.track_number,
            self.cover_art_url,
            local_path
        )
    }

    /// Parse a snapshot line. Returns `None` unless the line carries exactly
    /// [`RECORD_FIELD_COUNT`] fields with a numeric duration.
    pub fn from_record(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let parts: Vec<&str> = line.split(RECORD_SEPARATOR).collect();
        if parts.len() != RECORD_FIELD_COUNT {
            return None;
        }

        let duration_ms = parts[4].parse().ok()?;
        let local_path = match parts[7] {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        Some(Self {
            id: parts[0].to_string(),
            title: parts[1].to_string(),
            artist: parts[2].to_string(),
            album: parts[3].to_string(),
            duration_ms,
            track_number: parts[5].to_string(),
            cover_art_url: parts[6].to_string(),
            local_path,
            last_error: None,
        })
    }

    /// Target location without extension: `DIR/tracks/Artist/Album/Title`.
    pub fn save_location(&self, music_dir: &Path) -> PathBuf {
        music_dir
            .join("tracks")
            .join(sanitize_path_component(&self.artist))
            .join(sanitize_path_component(&self.album))
            .join(sanitize_path_component(&self.title))
    }

    /// Where the acquired asset lands for a given audio extension.
    pub fn asset_path(&self, music_dir: &Path, extension: &str) -> PathBuf {
        with_appended_extension(&self.save_location(music_dir), extension)
    }
}

/// Append `.ext` without touching dots already present in the file name.
pub fn with_appended_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
