//! id→filename mapping derived from filenames already present in the audio
//! directory. Built fresh from disk by every consumer (downloader, player,
//! RPC handlers) rather than kept as shared mutable state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct FileLibrary {
    by_id: HashMap<i64, String>,
}

impl FileLibrary {
    /// Scans `dir` for files named `<name>-<id>.<ext>`. Never fails: an
    /// unreadable directory yields an empty library, logged.
    pub fn open(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "could not read audio directory");
                return Self::default();
            }
        };

        let mut by_id = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(id) = id_from_filename(filename) {
                by_id.insert(id, filename.to_string());
            }
        }
        Self { by_id }
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Ascending-by-id vector of `(id, filename)`, used by `SoundChooser` to
    /// make `"random"` deterministic given a seeded RNG.
    pub fn sorted_entries(&self) -> Vec<(i64, String)> {
        let mut v: Vec<_> = self
            .by_id
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect();
        v.sort_by_key(|(id, _)| *id);
        v
    }

    pub fn path_for(&self, dir: &Path, id: i64) -> Option<PathBuf> {
        self.get(id).map(|name| dir.join(name))
    }
}

/// Strips the extension, takes the substring after the final `-`, and
/// parses it as an integer id. Files that fail to parse are ignored.
fn id_from_filename(filename: &str) -> Option<i64> {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    let (_, suffix) = stem.rsplit_once('-')?;
    suffix.parse::<i64>().ok()
}

pub fn make_filename(api_original_name: &str, api_name: &str, id: i64) -> String {
    let ext = Path::new(api_original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{api_name}-{id}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn id_extraction_from_typical_filename() {
        assert_eq!(id_from_filename("morepork-call-42.wav"), Some(42));
    }

    #[test]
    fn id_extraction_ignores_non_numeric_suffix() {
        assert_eq!(id_from_filename("morepork-call-final.wav"), None);
    }

    #[test]
    fn id_extraction_requires_a_dash() {
        assert_eq!(id_from_filename("42.wav"), None);
    }

    #[test]
    fn make_filename_preserves_original_extension() {
        assert_eq!(make_filename("Possum Growl.WAV", "possum", 7), "possum-7.WAV");
    }

    #[test]
    fn make_filename_with_no_extension() {
        assert_eq!(make_filename("possum", "possum", 7), "possum-7");
    }

    #[test]
    fn open_scans_directory_and_ignores_unparsable_names() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("beep-1.wav")).unwrap();
        File::create(dir.path().join("howl-2.mp3")).unwrap();
        File::create(dir.path().join("schedule.json")).unwrap();

        let lib = FileLibrary::open(dir.path());
        assert_eq!(lib.get(1), Some("beep-1.wav"));
        assert_eq!(lib.get(2), Some("howl-2.mp3"));
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn open_on_missing_directory_is_empty_not_an_error() {
        let lib = FileLibrary::open(Path::new("/no/such/directory/at/all"));
        assert!(lib.is_empty());
    }

    #[test]
    fn every_id_round_trips_through_its_own_filename() {
        let dir = tempfile::tempdir().unwrap();
        for id in [3, 17, 256] {
            File::create(dir.path().join(format!("sound-{id}.wav"))).unwrap();
        }
        let lib = FileLibrary::open(dir.path());
        for (id, name) in lib.sorted_entries() {
            assert_eq!(id_from_filename(&name), Some(id));
        }
    }
}
