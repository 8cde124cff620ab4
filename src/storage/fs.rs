//! Finds audio files to import.

use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

const MUSIC_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac", "opus"];

pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MUSIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively collects music files under `root`, sorted by path.
/// Unreadable entries are logged and skipped.
pub fn scan_music_files(root: &Path, follow_symlinks: bool) -> Vec<PathBuf> {
    let root_str = root.to_string_lossy();

    let mut paths = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_music_file(path))
        .collect::<Vec<PathBuf>>();

    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn recognises_music_extensions_case_insensitively() {
        assert!(is_music_file(Path::new("a/b/song.MP3")));
        assert!(is_music_file(Path::new("track.opus")));
        assert!(!is_music_file(Path::new("cover.jpg")));
        assert!(!is_music_file(Path::new("README")));
    }

    #[test]
    fn scan_finds_music_files_recursively() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let song1 = root.join("song1.mp3");
        let nested = root.join("Air").join("Moon Safari");
        std::fs::create_dir_all(&nested).unwrap();
        let song2 = nested.join("02 Sexy Boy.flac");
        let not_music = root.join("notes.txt");

        std::fs::write(&song1, b"aaa").unwrap();
        std::fs::write(&song2, b"bbb").unwrap();
        std::fs::write(&not_music, b"ccc").unwrap();

        let files = scan_music_files(root, false);

        assert_eq!(files.len(), 2);
        assert!(files.contains(&song1));
        assert!(files.contains(&song2));
    }

    #[test]
    fn directory_named_like_music_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("album.flac")).unwrap();

        assert!(scan_music_files(tmp.path(), false).is_empty());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_music_files(&tmp.path().join("gone"), false).is_empty());
    }
}
