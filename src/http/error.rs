use rouille::Response;

use crate::{
    storage::error::{ArtError, LibraryError},
    tagging::DownloadError,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Validation(field) => {
                ApiError::BadRequest(format!("missing or invalid field: {field}"))
            }

            LibraryError::Art(ArtError::Decode(e)) => {
                ApiError::BadRequest(format!("unusable album art: {e}"))
            }

            LibraryError::Unauthorized => ApiError::Unauthorized,

            LibraryError::TrackNotFound(id) => ApiError::NotFound(format!("track {id} not found")),

            LibraryError::PlaylistNotFound(id) => {
                ApiError::NotFound(format!("playlist {id} not found"))
            }

            LibraryError::UserNotFound(name) => {
                ApiError::NotFound(format!("user {name} not found"))
            }

            LibraryError::Download(e) => ApiError::from(e),

            LibraryError::Art(_)
            | LibraryError::Database(_)
            | LibraryError::Fs(_)
            | LibraryError::Internal(_) => {
                log::error!("internal error: {err}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        log::warn!("download failed: {err}");
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::Unauthorized => Response::text("unauthorized")
                .with_status_code(status)
                .with_additional_header("WWW-Authenticate", "Bearer"),

            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                Response::text(msg).with_status_code(status)
            }
        }
    }
}
