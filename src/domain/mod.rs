pub mod album_hash;
pub mod playlist;
pub mod track;
pub mod user;
