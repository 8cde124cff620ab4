//! Content-addressed store for album cover thumbnails.
//!
//! Each album hash owns at most one JPEG at `{dir}/{album_hash}.jpg`.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers never observe a half written thumbnail.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use log::debug;
use tempfile::NamedTempFile;

use crate::{domain::album_hash::AlbumHash, storage::error::ArtError};

pub const MAX_ART_SIZE: u32 = 1200;
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct ArtStore {
    dir: PathBuf,
}

impl ArtStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, hash: &AlbumHash) -> PathBuf {
        self.dir.join(format!("{hash}.jpg"))
    }

    pub fn exists(&self, hash: &AlbumHash) -> bool {
        self.path_for(hash).is_file()
    }

    /// returns the stored thumbnail, or None if the album has no art
    pub fn read(&self, hash: &AlbumHash) -> Result<Option<Vec<u8>>, ArtError> {
        match std::fs::read(self.path_for(hash)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores `raw` as the art of `hash` unless that album already has art.
    ///
    /// Returns whether anything was written. First writer wins, also when two
    /// saves race for the same hash.
    pub fn save(&self, hash: &AlbumHash, raw: &[u8]) -> Result<bool, ArtError> {
        if self.exists(hash) {
            debug!("art for {hash} already present, keeping it");
            return Ok(false);
        }
        let thumbnail = render_thumbnail(raw)?;
        self.write_new(hash, &thumbnail)
    }

    /// Stores `raw` as the art of `hash`, replacing existing art.
    pub fn replace(&self, hash: &AlbumHash, raw: &[u8]) -> Result<(), ArtError> {
        let thumbnail = render_thumbnail(raw)?;
        let tmp = self.stage(&thumbnail)?;
        tmp.persist(self.path_for(hash)).map_err(|e| e.error)?;
        debug!("art for {hash} replaced");
        Ok(())
    }

    /// Duplicates the art of `from` under `to`, if `from` has art and `to` has none.
    pub fn copy_if_missing(&self, from: &AlbumHash, to: &AlbumHash) -> Result<bool, ArtError> {
        if self.exists(to) {
            return Ok(false);
        }
        let Some(bytes) = self.read(from)? else {
            return Ok(false);
        };
        let copied = self.write_new(to, &bytes)?;
        if copied {
            debug!("art copied from {from} to {to}");
        }
        Ok(copied)
    }

    /// Deletes the art of `hash` unless `is_referenced` says a track still uses it.
    ///
    /// Returns whether a file was removed.
    pub fn delete_if_unreferenced<E, F>(
        &self,
        hash: &AlbumHash,
        is_referenced: F,
    ) -> Result<bool, E>
    where
        E: From<ArtError>,
        F: FnOnce(&AlbumHash) -> Result<bool, E>,
    {
        if is_referenced(hash)? {
            debug!("art for {hash} still referenced");
            return Ok(false);
        }
        match std::fs::remove_file(self.path_for(hash)) {
            Ok(()) => {
                debug!("art for {hash} deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArtError::Io(e).into()),
        }
    }

    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile, ArtError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".art-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn write_new(&self, hash: &AlbumHash, bytes: &[u8]) -> Result<bool, ArtError> {
        let tmp = self.stage(bytes)?;
        match tmp.persist_noclobber(self.path_for(hash)) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("art for {hash} appeared concurrently, keeping it");
                Ok(false)
            }
            Err(e) => Err(e.error.into()),
        }
    }
}

/// Largest size with the same aspect ratio that fits in `max` x `max`.
/// Never enlarges.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    let (mut w, mut h) = (width, height);
    // halves round to even
    if w > max {
        w = max;
        h = (w as f64 / aspect).round_ties_even() as u32;
    }
    if h > max {
        h = max;
        w = (h as f64 * aspect).round_ties_even() as u32;
    }
    (w.max(1), h.max(1))
}

/// decode, shrink to fit, center crop to a square, encode as JPEG
pub fn render_thumbnail(raw: &[u8]) -> Result<Vec<u8>, ArtError> {
    let image = image::load_from_memory(raw).map_err(ArtError::Decode)?;

    let (width, height) = fit_within(image.width(), image.height(), MAX_ART_SIZE);
    let image = if (width, height) != (image.width(), image.height()) {
        image.resize_exact(width, height, FilterType::CatmullRom)
    } else {
        image
    };

    let side = width.min(height);
    let square = image.crop_imm((width - side) / 2, (height - side) / 2, side, side);

    // jpeg has no alpha channel
    let rgb = DynamicImage::ImageRgb8(square.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))
        .map_err(ArtError::Encode)?;
    Ok(jpeg)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::tempdir;

    use super::*;
    use crate::storage::error::LibraryError;

    pub(crate) fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn dimensions(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(jpeg).unwrap();
        (img.width(), img.height())
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn fit_within_only_shrinks() {
        assert_eq!(fit_within(2400, 1200, 1200), (1200, 600));
        assert_eq!(fit_within(1000, 3000, 1200), (400, 1200));
        assert_eq!(fit_within(300, 500, 1200), (300, 500));
        assert_eq!(fit_within(1200, 1200, 1200), (1200, 1200));
    }

    #[test]
    fn fit_within_rounds_halves_to_even() {
        // 1200 / 480 = 2.5
        assert_eq!(fit_within(2400, 5, 1200), (1200, 2));
        // 1200 / 240 = 5 exactly, untouched
        assert_eq!(fit_within(2400, 10, 1200), (1200, 5));
    }

    #[test]
    fn thumbnail_is_square_jpeg() {
        let jpeg = render_thumbnail(&png(2400, 1200, [200, 10, 10])).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        assert_eq!(dimensions(&jpeg), (600, 600));
    }

    #[test]
    fn small_thumbnail_is_not_enlarged() {
        let jpeg = render_thumbnail(&png(300, 500, [0, 0, 255])).unwrap();
        assert_eq!(dimensions(&jpeg), (300, 300));
    }

    #[test]
    fn save_writes_under_hash_and_creates_dir() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path().join("art"));
        let hash = AlbumHash::of("Discovery", "Daft Punk");

        assert!(!store.exists(&hash));
        assert!(store.save(&hash, &png(64, 64, [1, 2, 3]))?);
        assert!(store.exists(&hash));
        assert_eq!(
            store.path_for(&hash),
            tmp.path().join("art").join(format!("{hash}.jpg"))
        );
        assert_eq!(leftover_temp_files(&tmp.path().join("art")), 0);
        Ok(())
    }

    #[test]
    fn save_is_first_writer_wins() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let hash = AlbumHash::of("Discovery", "Daft Punk");

        store.save(&hash, &png(64, 64, [255, 0, 0]))?;
        let first = store.read(&hash)?.unwrap();

        assert!(!store.save(&hash, &png(128, 128, [0, 255, 0]))?);
        assert_eq!(store.read(&hash)?.unwrap(), first);
        Ok(())
    }

    #[test]
    fn replace_overwrites_existing_art() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let hash = AlbumHash::of("Discovery", "Daft Punk");

        store.save(&hash, &png(64, 64, [255, 0, 0]))?;
        store.replace(&hash, &png(32, 32, [0, 255, 0]))?;

        assert_eq!(dimensions(&store.read(&hash)?.unwrap()), (32, 32));
        assert_eq!(leftover_temp_files(tmp.path()), 0);
        Ok(())
    }

    #[test]
    fn undecodable_image_leaves_no_file() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let hash = AlbumHash::of("Broken", "Nobody");

        let err = store.save(&hash, b"definitely not an image").unwrap_err();

        assert!(matches!(err, ArtError::Decode(_)));
        assert!(!store.exists(&hash));
        assert_eq!(leftover_temp_files(tmp.path()), 0);
        Ok(())
    }

    #[test]
    fn copy_if_missing_duplicates_bytes() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let from = AlbumHash::of("Discovery", "Daft Punk");
        let to = AlbumHash::of("Homework", "Daft Punk");

        store.save(&from, &png(64, 64, [9, 9, 9]))?;

        assert!(store.copy_if_missing(&from, &to)?);
        assert_eq!(store.read(&to)?, store.read(&from)?);
        Ok(())
    }

    #[test]
    fn copy_if_missing_keeps_existing_destination() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let from = AlbumHash::of("Discovery", "Daft Punk");
        let to = AlbumHash::of("Homework", "Daft Punk");

        store.save(&from, &png(64, 64, [9, 9, 9]))?;
        store.save(&to, &png(16, 16, [1, 1, 1]))?;
        let before = store.read(&to)?;

        assert!(!store.copy_if_missing(&from, &to)?);
        assert_eq!(store.read(&to)?, before);
        Ok(())
    }

    #[test]
    fn copy_if_missing_without_source_is_noop() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let from = AlbumHash::of("Nothing", "Here");
        let to = AlbumHash::of("Homework", "Daft Punk");

        assert!(!store.copy_if_missing(&from, &to)?);
        assert!(!store.exists(&to));
        Ok(())
    }

    #[test]
    fn delete_respects_reference_check() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = ArtStore::new(tmp.path());
        let hash = AlbumHash::of("Discovery", "Daft Punk");
        store.save(&hash, &png(8, 8, [0, 0, 0]))?;

        let removed = store.delete_if_unreferenced::<LibraryError, _>(&hash, |_| Ok(true))?;
        assert!(!removed);
        assert!(store.exists(&hash));

        let removed = store.delete_if_unreferenced::<LibraryError, _>(&hash, |_| Ok(false))?;
        assert!(removed);
        assert!(!store.exists(&hash));

        // already gone
        let removed = store.delete_if_unreferenced::<LibraryError, _>(&hash, |_| Ok(false))?;
        assert!(!removed);
        Ok(())
    }
}
