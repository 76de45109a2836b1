// Track catalog - which files belong to which mood
// Lists are static once loaded; whether a file is actually playable is asked
// of the backend at selection time

use super::{AudioFormat, PlaybackBackend};
use crate::mood::Mood;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCatalog {
    tracks: BTreeMap<Mood, Vec<PathBuf>>,
}

/// Result of checking every catalog entry against the backend.
#[derive(Debug, Clone, Default)]
pub struct CatalogReport {
    pub found: BTreeMap<Mood, Vec<PathBuf>>,
    pub missing: BTreeMap<Mood, Vec<PathBuf>>,
}

impl CatalogReport {
    pub fn any_available(&self) -> bool {
        self.found.values().any(|tracks| !tracks.is_empty())
    }

    /// Moods listed in the catalog with nothing playable.
    pub fn empty_moods(&self) -> Vec<Mood> {
        self.missing
            .keys()
            .filter(|mood| self.found.get(mood).map_or(true, |t| t.is_empty()))
            .copied()
            .collect()
    }
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(tracks: BTreeMap<Mood, Vec<PathBuf>>) -> Self {
        let mut catalog = Self::new();
        for (mood, paths) in tracks {
            for path in paths {
                catalog.insert(mood, path);
            }
        }
        catalog
    }

    /// The stock layout: `<root>/<mood>/song1.mp3` .. `song3.mp3` per mood.
    pub fn default_layout(root: &Path) -> Self {
        let mut catalog = Self::new();
        for mood in Mood::ALL {
            for n in 1..=3 {
                catalog.insert(mood, root.join(mood.as_str()).join(format!("song{}.mp3", n)));
            }
        }
        catalog
    }

    /// Build from a directory laid out as `<root>/<mood>/<file>`.
    /// Subdirectories that are not mood names and non-audio files are ignored.
    pub fn scan_dir(root: &Path) -> Self {
        let mut catalog = Self::new();

        for mood in Mood::ALL {
            let mood_dir = root.join(mood.as_str());
            if !mood_dir.is_dir() {
                debug!(dir = %mood_dir.display(), "no directory for mood");
                continue;
            }

            let mut files: Vec<PathBuf> = WalkDir::new(&mood_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", mood_dir.display(), e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| AudioFormat::from_path(path).is_supported())
                .collect();

            files.sort();
            for file in files {
                catalog.insert(mood, file);
            }
        }

        info!("Scanned {} tracks from {}", catalog.len(), root.display());
        catalog
    }

    /// Add a track; duplicates within a mood are ignored.
    pub fn insert(&mut self, mood: Mood, track: PathBuf) {
        let entry = self.tracks.entry(mood).or_default();
        if !entry.contains(&track) {
            entry.push(track);
        }
    }

    pub fn contains_mood(&self, mood: Mood) -> bool {
        self.tracks.contains_key(&mood)
    }

    pub fn tracks(&self, mood: Mood) -> &[PathBuf] {
        self.tracks.get(&mood).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn moods(&self) -> impl Iterator<Item = Mood> + '_ {
        self.tracks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracks for `mood` the backend can play right now, in catalog order.
    pub fn candidates<B: PlaybackBackend + ?Sized>(&self, mood: Mood, backend: &B) -> Vec<&Path> {
        self.tracks(mood)
            .iter()
            .map(PathBuf::as_path)
            .filter(|track| backend.is_resolvable(track))
            .collect()
    }

    /// Check every entry against the backend and log what is missing.
    pub fn audit<B: PlaybackBackend + ?Sized>(&self, backend: &B) -> CatalogReport {
        let mut report = CatalogReport::default();

        for (&mood, tracks) in &self.tracks {
            let (found, missing): (Vec<PathBuf>, Vec<PathBuf>) = tracks
                .iter()
                .cloned()
                .partition(|track| backend.is_resolvable(track));

            for track in &missing {
                debug!(%mood, track = %track.display(), "missing track");
            }
            if found.is_empty() {
                warn!("No songs available for '{}'", mood);
            }

            report.found.insert(mood, found);
            report.missing.insert(mood, missing);
        }

        if !report.any_available() {
            warn!("No music files were found - add audio files under the music directory");
        }

        report
    }
}
