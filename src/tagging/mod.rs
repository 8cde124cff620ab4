//! Audio files coming from outside the library: fetching them, and reading
//! or rewriting their embedded tags.
//!
//! The fetcher and the tag codec are traits so the download and import
//! pipelines can run against anything that behaves like them.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

pub mod download;
pub mod fetch;
pub mod import;
pub mod lofty_codec;

/// Fetches an audio URI into a local file the caller then owns.
pub trait AudioFetcher {
    fn fetch(&self, uri: &str) -> anyhow::Result<PathBuf>;
}

pub trait TagCodec {
    type Handle: TagHandle;

    fn open(&self, path: &Path) -> Result<Self::Handle, TagError>;
}

/// An opened tag container. Edits stay in memory until `save`.
pub trait TagHandle {
    fn read(&self) -> TagFields;
    fn apply(&mut self, edit: &TagEdit) -> Result<(), TagError>;
    fn save(&mut self) -> Result<(), TagError>;
    fn mime_type(&self) -> String;
}

/// Tags as found in a container. Absent tags are None.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFields {
    pub title: Option<String>,
    pub performers: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_count: Option<u32>,
    pub lyrics: Option<String>,
    pub pictures: Vec<TagPicture>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagPicture {
    pub front_cover: bool,
    pub data: Vec<u8>,
}

/// Tags to overwrite in a container.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEdit {
    pub title: String,
    pub performers: String,
    pub album: String,
    pub album_artist: String,
    pub year: u32,
    pub track_number: u32,
    pub track_count: u32,
    pub disc_number: u32,
    pub disc_count: u32,
    /// left as found in the file when None
    pub genre: Option<String>,
    /// JPEG to embed as the front cover
    pub cover: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to read tags: {0}")]
    Read(String),

    #[error("failed to write tags: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not fetch audio: {0}")]
    UpstreamFetch(String),

    #[error("could not read audio tags: {0}")]
    TagRead(String),

    #[error("could not write audio tags: {0}")]
    TagWrite(String),

    #[error("io error while streaming: {0}")]
    Io(#[from] std::io::Error),
}

/// A fetched file that is deleted when this value goes away.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed temp file {}", self.path.to_string_lossy()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "failed to remove temp file {}: {e}",
                self.path.to_string_lossy()
            ),
        }
    }
}
