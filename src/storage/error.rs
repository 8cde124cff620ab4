use thiserror::Error;

use crate::{
    domain::{playlist::PlaylistId, track::TrackId},
    tagging::DownloadError,
};

#[derive(Debug, Error)]
pub enum ArtError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("could not encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),

    #[error("art store io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("missing required field '{0}'")]
    Validation(&'static str),

    #[error("track {0} not found")]
    TrackNotFound(TrackId),

    #[error("playlist {0} not found")]
    PlaylistNotFound(PlaylistId),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Art(#[from] ArtError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
