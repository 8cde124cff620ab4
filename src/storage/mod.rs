pub mod art;
pub mod db;
pub mod error;
pub mod fs;
pub mod operations;
pub mod playlists;
pub(crate) mod schema;
pub mod tracks;
