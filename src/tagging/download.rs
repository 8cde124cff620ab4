//! On-demand downloads whose tags mirror the library.
//!
//! fetch -> open tags -> rewrite tags -> stream -> delete temp file.
//! The fetched file is wrapped in a [`TempArtifact`] right away, so it is
//! removed on every exit path once the fetch succeeded.

use std::{fs::File, io::Write};

use log::{debug, info};

use crate::{domain::track::TrackMetadata, storage::art::ArtStore};

use super::{AudioFetcher, DownloadError, TagCodec, TagEdit, TagHandle, TempArtifact};

pub struct DownloadTagger<F, C> {
    fetcher: F,
    codec: C,
    art: ArtStore,
}

/// A retagged file ready to be streamed. Dropping it deletes the file.
#[derive(Debug)]
pub struct TaggedDownload {
    pub file_name: String,
    pub mime_type: String,
    artifact: TempArtifact,
}

impl TaggedDownload {
    /// Writes the file to `out` and deletes it, whether or not writing worked.
    pub fn stream_to<W: Write + ?Sized>(self, out: &mut W) -> Result<u64, DownloadError> {
        let mut file = File::open(self.artifact.path())?;
        let written = std::io::copy(&mut file, out)?;
        debug!("streamed {written} bytes of {}", self.file_name);
        Ok(written)
    }
}

/// The tag values a download gets, taken from the library's metadata.
pub fn tag_edit_for(track: &TrackMetadata, cover: Option<Vec<u8>>) -> TagEdit {
    TagEdit {
        title: track.title.clone(),
        performers: track.artist.clone(),
        album: track.album.clone(),
        album_artist: track.album_artist.clone(),
        year: track.year,
        track_number: track.track_number,
        track_count: track.track_count,
        disc_number: track.disc_number,
        disc_count: track.disc_count,
        genre: (!track.genre.is_empty()).then(|| track.genre.clone()),
        cover,
    }
}

impl<F: AudioFetcher, C: TagCodec> DownloadTagger<F, C> {
    pub fn new(fetcher: F, codec: C, art: ArtStore) -> Self {
        Self {
            fetcher,
            codec,
            art,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn prepare(&self, track: &TrackMetadata) -> Result<TaggedDownload, DownloadError> {
        let path = self
            .fetcher
            .fetch(&track.download)
            .map_err(|e| DownloadError::UpstreamFetch(format!("{e:#}")))?;
        let artifact = TempArtifact::new(path);

        let mut handle = self
            .codec
            .open(artifact.path())
            .map_err(|e| DownloadError::TagRead(e.to_string()))?;

        let cover = self
            .art
            .read(&track.album_hash)
            .map_err(|e| DownloadError::TagWrite(e.to_string()))?;
        handle
            .apply(&tag_edit_for(track, cover))
            .map_err(|e| DownloadError::TagWrite(e.to_string()))?;
        handle
            .save()
            .map_err(|e| DownloadError::TagWrite(e.to_string()))?;

        let extension = artifact
            .path()
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let file_name = format!("{} - {}{}", track.artist, track.title, extension);
        info!("prepared download {file_name}");

        Ok(TaggedDownload {
            file_name,
            mime_type: handle.mime_type(),
            artifact,
        })
    }

    /// Full pipeline: prepare, then stream into `out`.
    pub fn download<W: Write + ?Sized>(
        &self,
        track: &TrackMetadata,
        out: &mut W,
    ) -> Result<(String, String), DownloadError> {
        let prepared = self.prepare(track)?;
        let file_name = prepared.file_name.clone();
        let mime_type = prepared.mime_type.clone();
        prepared.stream_to(out)?;
        Ok((file_name, mime_type))
    }
}
