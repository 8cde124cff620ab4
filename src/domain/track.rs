use std::fmt::Display;

use super::album_hash::AlbumHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub i64);

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represent a music track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub owner: String,
    pub metadata: TrackMetadata,
}

/// Canonical metadata of a track.
///
/// `album_hash` is a cache of `AlbumHash::of(album, album_artist)` and is
/// only ever recomputed, never set on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub album_hash: AlbumHash,
    pub genre: String,
    pub lyrics: String,
    pub year: u32,
    pub track_number: u32,
    pub track_count: u32,
    pub disc_number: u32,
    pub disc_count: u32,
    pub listen: String,
    pub download: String,
}

/// Input for creating a track.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_count: Option<u32>,
    /// raw image bytes, any format the decoder understands
    pub art: Option<Vec<u8>>,
    pub listen: String,
    pub download: Option<String>,
}

impl NewTrack {
    /// returns the name of the first missing required field
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.is_empty() {
            Some("title")
        } else if self.artist.is_empty() {
            Some("artist")
        } else if self.listen.is_empty() {
            Some("listen")
        } else {
            None
        }
    }

    pub fn into_parts(self) -> (TrackMetadata, Option<Vec<u8>>) {
        let album = self.album.unwrap_or_else(|| self.title.clone());
        let album_artist = self.album_artist.unwrap_or_else(|| self.artist.clone());
        let download = self.download.unwrap_or_else(|| self.listen.clone());

        let metadata = TrackMetadata {
            album_hash: AlbumHash::of(&album, &album_artist),
            title: self.title,
            artist: self.artist,
            album,
            album_artist,
            genre: self.genre.unwrap_or_default(),
            lyrics: self.lyrics.unwrap_or_default(),
            year: self.year.unwrap_or(0),
            track_number: self.track_number.unwrap_or(1),
            track_count: self.track_count.unwrap_or(1),
            disc_number: self.disc_number.unwrap_or(1),
            disc_count: self.disc_count.unwrap_or(1),
            listen: self.listen,
            download,
        };
        (metadata, self.art)
    }
}

/// Partial update of a track. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TrackPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub art: Option<Vec<u8>>,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_count: Option<u32>,
    pub listen: Option<String>,
    pub download: Option<String>,
}

/// What has to happen to the art store for a patch to be consistent.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtChange {
    Keep,
    /// write the new image at the current hash, replacing whatever is there
    Replace(Vec<u8>),
    /// album identity moved, carry the old art over if the new hash has none
    CopyForward { from: AlbumHash, to: AlbumHash },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    pub metadata: TrackMetadata,
    pub previous_hash: AlbumHash,
    pub art: ArtChange,
}

impl TrackUpdate {
    pub fn hash_changed(&self) -> bool {
        self.metadata.album_hash != self.previous_hash
    }
}

impl TrackPatch {
    /// Applies the patch to `current` without touching any storage.
    ///
    /// Identity fields go first, then the album hash and the art decision,
    /// then everything else.
    pub fn apply(self, current: &TrackMetadata) -> TrackUpdate {
        let mut next = current.clone();

        if let Some(title) = self.title {
            next.title = title;
        }
        if let Some(artist) = self.artist {
            next.artist = artist;
        }
        let identity_touched = self.album.is_some() || self.album_artist.is_some();
        if let Some(album) = self.album {
            next.album = album;
        }
        if let Some(album_artist) = self.album_artist {
            next.album_artist = album_artist;
        }
        if identity_touched {
            next.album_hash = AlbumHash::of(&next.album, &next.album_artist);
        }

        let art = match self.art {
            Some(bytes) => ArtChange::Replace(bytes),
            None if next.album_hash != current.album_hash => ArtChange::CopyForward {
                from: current.album_hash.clone(),
                to: next.album_hash.clone(),
            },
            None => ArtChange::Keep,
        };

        if let Some(genre) = self.genre {
            next.genre = genre;
        }
        if let Some(lyrics) = self.lyrics {
            next.lyrics = lyrics;
        }
        if let Some(year) = self.year {
            next.year = year;
        }
        if let Some(n) = self.track_number {
            next.track_number = n;
        }
        if let Some(n) = self.track_count {
            next.track_count = n;
        }
        if let Some(n) = self.disc_number {
            next.disc_number = n;
        }
        if let Some(n) = self.disc_count {
            next.disc_count = n;
        }
        if let Some(listen) = self.listen {
            next.listen = listen;
        }
        if let Some(download) = self.download {
            next.download = download;
        }

        TrackUpdate {
            metadata: next,
            previous_hash: current.album_hash.clone(),
            art,
        }
    }
}
