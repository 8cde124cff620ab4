use std::fmt::Display;

use super::track::{Track, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistId(pub i64);

impl Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub owner: String,
    pub title: String,
}

/// A weak reference from a playlist to a track, ordered by `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub position: u32,
    pub playlist_id: PlaylistId,
    pub track_id: TrackId,
}

/// A playlist together with the tracks it still resolves to, in order.
#[derive(Debug, Clone)]
pub struct PlaylistView {
    pub playlist: Playlist,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub title: String,
    pub tracks: Option<Vec<TrackId>>,
}

/// Partial update of a playlist. `tracks` replaces the whole entry list.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPatch {
    pub title: Option<String>,
    pub tracks: Option<Vec<TrackId>>,
}
