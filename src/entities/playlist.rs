use std::collections::HashMap;

use chrono::NaiveDate;

use crate::ports::spotify::SpotifyApiPlaylist;

/// Ordered collection of catalog songs, mirrored from a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    /// Display name, already safe to use as a file name stem.
    pub name: String,
    pub cover_art_url: Option<String>,
    /// Song ids in playlist order.
    pub members: Vec<String>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.replace(['\\', '/', '?'], " "),
            cover_art_url: None,
            members: Vec::new(),
        }
    }

    pub fn from_remote(playlist: &SpotifyApiPlaylist) -> Self {
        let mut converted = Self::new(playlist.id.clone(), &playlist.name);
        converted.cover_art_url = playlist.image_url.clone();
        converted
    }

    /// File name of the exported playlist, without extension.
    pub fn file_stem(&self) -> String {
        self.name.replace(['<', '>', '\\', '/'], "")
    }

    pub fn file_name(&self) -> String {
        format!("{}.m3u", self.file_stem())
    }

    /// Stable re-sort of `members` by album release date, oldest first.
    ///
    /// `dated` pairs member ids with the release date string reported by
    /// Spotify. Members without a parsable date keep their relative order
    /// and go last.
    pub fn sort_by_release_date(&mut self, dated: &[(String, Option<String>)]) {
        let mut dates: HashMap<&str, NaiveDate> = HashMap::with_capacity(dated.len());
        for (id, date) in dated {
            if let Some(date) = date.as_deref().and_then(parse_release_date) {
                dates.entry(id.as_str()).or_insert(date);
            }
        }

        self.members.sort_by_key(|id| match dates.get(id.as_str()) {
            Some(date) => (0, *date),
            None => (1, NaiveDate::MIN),
        });
    }
}

/// Spotify reports release dates at year, month or day precision.
fn parse_release_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next().map(str::parse).transpose().ok()?.unwrap_or(1);
    let day = parts.next().map(str::parse).transpose().ok()?.unwrap_or(1);
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_sanitized_on_construction() {
        let playlist = Playlist::new("p1", "Rock/Metal? \\o/");
        assert_eq!(playlist.name, "Rock Metal   o ");
    }

    #[test]
    fn test_file_name() {
        let playlist = Playlist::new("p1", "<Road Trip>");
        assert_eq!(playlist.file_name(), "Road Trip.m3u");
    }

    #[test]
    fn test_from_remote_keeps_artwork() {
        let playlist = Playlist::from_remote(&SpotifyApiPlaylist {
            id: "p1".into(),
            name: "Chill".into(),
            owner_id: "me".into(),
            image_url: Some("https://mosaic.scdn.co/640/abc".into()),
            total_tracks: 3,
        });

        assert_eq!(playlist.id, "p1");
        assert_eq!(
            playlist.cover_art_url.as_deref(),
            Some("https://mosaic.scdn.co/640/abc")
        );
        assert!(playlist.members.is_empty());
    }

    #[test]
    fn test_parse_release_date_precisions() {
        assert_eq!(parse_release_date("1999"), NaiveDate::from_ymd_opt(1999, 1, 1));
        assert_eq!(parse_release_date("1999-07"), NaiveDate::from_ymd_opt(1999, 7, 1));
        assert_eq!(parse_release_date("1999-07-21"), NaiveDate::from_ymd_opt(1999, 7, 21));
        assert_eq!(parse_release_date("soon"), None);
    }

    #[test]
    fn test_sort_by_release_date() {
        let mut playlist = Playlist::new("p1", "Episodes");
        playlist.members = vec!["c".into(), "undated".into(), "a".into(), "b".into()];

        let dated = vec![
            ("a".to_string(), Some("2001-05-02".to_string())),
            ("b".to_string(), Some("2001".to_string())),
            ("c".to_string(), Some("2020-01-01".to_string())),
            ("undated".to_string(), None),
        ];
        playlist.sort_by_release_date(&dated);

        assert_eq!(playlist.members, vec!["b", "a", "c", "undated"]);
    }

    #[test]
    fn test_sort_by_release_date_with_unlisted_members() {
        let mut playlist = Playlist::new("p1", "Archive");
        playlist.members = (0..200).rev().map(|i| format!("t{}", i)).collect();
        playlist.members.push("missing".into());
        playlist.members.insert(0, "also-missing".into());

        let dated: Vec<(String, Option<String>)> = (0..200)
            .map(|i| (format!("t{}", i), Some(format!("{}-01-01", 1800 + i))))
            .collect();
        playlist.sort_by_release_date(&dated);

        let expected: Vec<String> = (0..200)
            .map(|i| format!("t{}", i))
            .chain(["also-missing".to_string(), "missing".to_string()])
            .collect();
        assert_eq!(playlist.members, expected);
    }
}
