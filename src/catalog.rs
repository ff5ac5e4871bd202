use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use tempfile::NamedTempFile;

use crate::entities::playlist::Playlist;
use crate::entities::song::{Song, breaks_record};

/// In-memory mirror of the remote library: every known song, the subset
/// still waiting for a local asset, and the collected playlists.
///
/// Invariant: a song id is in `pending` exactly when that song has no
/// `local_path`.
#[derive(Debug, Default)]
pub struct Catalog {
    songs: HashMap<String, Song>,
    /// Song ids in insertion order; drives snapshot and report order.
    order: Vec<String>,
    pending: HashSet<String>,
    playlists: Vec<Playlist>,
    persisted_count: usize,
}

/// Read a snapshot file into songs, in file order. Lines that do not parse
/// are skipped. A missing file is an empty snapshot.
pub fn read_snapshot(path: &Path) -> Result<Vec<Song>> {
    if !path.exists() {
        tracing::debug!("No snapshot at {}, starting empty", path.display());
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)
        .wrap_err(format!("Failed to read snapshot: {}", path.display()))?;

    let mut songs = Vec::new();
    let mut skipped = 0;
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match Song::from_record(line) {
            Some(song) => songs.push(song),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} malformed record(s) in {}",
            skipped,
            path.display()
        );
    }

    Ok(songs)
}

/// Replace `path` with `contents` via a temporary file in the same directory,
/// so a crash mid-write leaves the previous file intact.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .wrap_err(format!("Failed to create directory: {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(dir)
        .wrap_err(format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(contents.as_bytes())
        .wrap_err("Failed to write temp file")?;
    temp.as_file()
        .sync_all()
        .wrap_err("Failed to sync temp file")?;
    temp.persist(path)
        .wrap_err(format!("Failed to replace {}", path.display()))?;

    Ok(())
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a catalog from a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        for song in read_snapshot(path)? {
            catalog.merge(song);
        }
        catalog.persisted_count = catalog.len();

        tracing::info!(
            "Loaded {} songs ({} pending) from {}",
            catalog.len(),
            catalog.pending_len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Insert a song whose id is new. A song already on file is kept as is,
    /// so its recorded asset path and error survive. Returns whether the song
    /// was inserted.
    pub fn merge(&mut self, song: Song) -> bool {
        if self.songs.contains_key(&song.id) {
            return false;
        }

        if song.local_path.is_none() {
            self.pending.insert(song.id.clone());
        }
        self.order.push(song.id.clone());
        self.songs.insert(song.id.clone(), song);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Song> {
        self.songs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.songs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Number of songs that came from the snapshot at load time.
    pub fn persisted_count(&self) -> usize {
        self.persisted_count
    }

    /// Whether the snapshot can stand in for a fresh saved-tracks listing.
    ///
    /// Only the counts are compared, so a removal paired with an addition
    /// goes unnoticed until the totals differ again.
    ///
    /// The snapshot also holds songs that were only reached through a
    /// playlist, and those count too. Once any collected playlist has a track
    /// that is not saved, the snapshot is larger than the saved-tracks total
    /// and this never holds, so saved tracks are paged every run. Playlists
    /// are collected on every run regardless.
    pub fn is_cache_current(&self, remote_total: u32) -> bool {
        self.persisted_count > 0 && self.persisted_count == remote_total as usize
    }

    /// Songs in catalog order.
    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.order.iter().filter_map(|id| self.songs.get(id))
    }

    /// Snapshot of the pending queue, in catalog order.
    pub fn pending_songs(&self) -> Vec<Song> {
        self.songs()
            .filter(|song| self.pending.contains(&song.id))
            .cloned()
            .collect()
    }

    /// The only success transition: attach the asset and leave the queue.
    /// Songs that are already resolved are left untouched.
    pub fn resolve(&mut self, id: &str, local_path: PathBuf) -> Result<bool> {
        let song = self
            .songs
            .get_mut(id)
            .ok_or_eyre(format!("Song not in catalog: {}", id))?;

        if breaks_record(&local_path.to_string_lossy()) {
            return Err(eyre!(
                "Asset path cannot be stored in the snapshot: {}",
                local_path.display()
            ));
        }
        if !self.pending.remove(id) {
            return Ok(false);
        }
        song.local_path = Some(local_path);
        song.last_error = None;
        Ok(true)
    }

    /// Record why a pending song could not be acquired. The song stays pending.
    pub fn record_error(&mut self, id: &str, reason: impl Into<String>) -> Result<()> {
        let song = self
            .songs
            .get_mut(id)
            .ok_or_eyre(format!("Song not in catalog: {}", id))?;
        song.last_error = Some(reason.into());
        Ok(())
    }

    /// Add a playlist, replacing an earlier one with the same id.
    pub fn upsert_playlist(&mut self, playlist: Playlist) {
        match self.playlists.iter_mut().find(|p| p.id == playlist.id) {
            Some(existing) => *existing = playlist,
            None => self.playlists.push(playlist),
        }
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    /// One `artist - title (reason)` line per song still pending.
    pub fn failure_report(&self) -> String {
        self.songs()
            .filter(|song| self.pending.contains(&song.id))
            .map(|song| {
                format!(
                    "{} - {} ({})\n",
                    song.artist,
                    song.title,
                    song.last_error.as_deref().unwrap_or("not attempted")
                )
            })
            .collect()
    }

    pub fn write_failure_report(&self, path: &Path) -> Result<()> {
        write_atomically(path, &self.failure_report())
            .wrap_err("Failed to write failure report")
    }

    /// Write every song to the snapshot file, replacing the previous one.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let contents: String = self.songs().map(Song::to_record).collect();
        write_atomically(path, &contents).wrap_err("Failed to persist snapshot")?;

        tracing::info!("Persisted {} songs to {}", self.len(), path.display());
        Ok(())
    }
}
