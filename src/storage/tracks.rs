use std::path::Path;

use anyhow::anyhow;
use log::{debug, info, warn};
use rusqlite::{OptionalExtension, Row, params, types::Type};

use crate::{
    domain::{
        album_hash::AlbumHash,
        track::{ArtChange, NewTrack, Track, TrackId, TrackMetadata, TrackPatch},
        user::User,
    },
    storage::{
        error::LibraryError,
        operations::{Library, ensure_owner},
        schema::{columns::*, tables::*},
    },
    tagging::{DownloadError, TagCodec, import},
};

pub(crate) fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    let hash: String = row.get(6)?;
    let album_hash = AlbumHash::from_hex(&hash)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;

    Ok(Track {
        id: TrackId(row.get(0)?),
        owner: row.get(1)?,
        metadata: TrackMetadata {
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            album_artist: row.get(5)?,
            album_hash,
            genre: row.get(7)?,
            lyrics: row.get(8)?,
            year: row.get(9)?,
            track_number: row.get(10)?,
            track_count: row.get(11)?,
            disc_number: row.get(12)?,
            disc_count: row.get(13)?,
            listen: row.get(14)?,
            download: row.get(15)?,
        },
    })
}

impl Library {
    pub fn get_track(&self, id: TrackId) -> Result<Track, LibraryError> {
        self.db
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM {TRACKS} WHERE {ID} = ?1"),
                params![id.0],
                track_from_row,
            )
            .optional()?
            .ok_or(LibraryError::TrackNotFound(id))
    }

    /// All tracks uploaded by `owner`, oldest first.
    pub fn list_tracks(&self, owner: &str) -> Result<Vec<Track>, LibraryError> {
        self.get_user(owner)?;
        let mut stmt = self.db.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM {TRACKS} WHERE {OWNER} = ?1 ORDER BY {ID}"
        ))?;
        let tracks = stmt
            .query_map(params![owner], track_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    pub fn track_lyrics(&self, id: TrackId) -> Result<String, LibraryError> {
        Ok(self.get_track(id)?.metadata.lyrics)
    }

    /// The cover thumbnail of the track's album, if any.
    pub fn track_art(&self, id: TrackId) -> Result<Option<Vec<u8>>, LibraryError> {
        let track = self.get_track(id)?;
        Ok(self.art.read(&track.metadata.album_hash)?)
    }

    /// Creates a track from explicit input. Cover art is required.
    pub fn create_track(&mut self, owner: &User, new: NewTrack) -> Result<Track, LibraryError> {
        if new.art.as_ref().is_none_or(|art| art.is_empty()) {
            return Err(LibraryError::Validation("art"));
        }
        self.insert_track(owner, new)
    }

    /// Creates a track whose fields were derived from an audio file's tags.
    /// Files without pictures produce a track without art.
    pub fn import_track(&mut self, owner: &User, new: NewTrack) -> Result<Track, LibraryError> {
        self.insert_track(owner, new)
    }

    /// Reads the tags of a local audio file and imports it, pointing both
    /// URIs at the file itself.
    pub fn import_file<C: TagCodec>(
        &mut self,
        owner: &User,
        codec: &C,
        path: &Path,
    ) -> Result<Track, LibraryError> {
        let path = path.canonicalize()?;
        let uri = reqwest::Url::from_file_path(&path)
            .map_err(|_| anyhow!("cannot build file URI for {}", path.to_string_lossy()))?
            .to_string();
        let fields = import::read_tags(codec, &path)
            .map_err(|e| DownloadError::TagRead(format!("{}: {e}", path.to_string_lossy())))?;
        self.import_track(owner, import::new_track_from_tags(fields, uri, None))
    }

    fn insert_track(&mut self, owner: &User, new: NewTrack) -> Result<Track, LibraryError> {
        if let Some(field) = new.missing_field() {
            return Err(LibraryError::Validation(field));
        }
        let (metadata, art) = new.into_parts();

        // art first: a decode failure must not leave a track behind
        if let Some(raw) = art.filter(|raw| !raw.is_empty()) {
            self.art.save(&metadata.album_hash, &raw)?;
        }

        self.db.execute(
            &format!(
                "INSERT INTO {TRACKS} ({TRACK_COLUMNS})
                 VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                owner.username,
                metadata.title,
                metadata.artist,
                metadata.album,
                metadata.album_artist,
                metadata.album_hash.as_str(),
                metadata.genre,
                metadata.lyrics,
                metadata.year,
                metadata.track_number,
                metadata.track_count,
                metadata.disc_number,
                metadata.disc_count,
                metadata.listen,
                metadata.download,
            ],
        )?;
        let id = TrackId(self.db.last_insert_rowid());
        info!("track {id} '{}' created for {}", metadata.title, owner.username);

        Ok(Track {
            id,
            owner: owner.username.clone(),
            metadata,
        })
    }

    fn owned_track(&self, actor: &User, id: TrackId) -> Result<Track, LibraryError> {
        let track = self.get_track(id)?;
        ensure_owner(actor, &track.owner)?;
        Ok(track)
    }

    /// Applies a partial update.
    ///
    /// New art replaces the art at the (possibly new) album hash. Without new
    /// art, a changed album identity carries the old art over. Art of the
    /// previous hash is deleted once no track uses it anymore.
    pub fn update_track(
        &mut self,
        actor: &User,
        id: TrackId,
        patch: TrackPatch,
    ) -> Result<Track, LibraryError> {
        let track = self.owned_track(actor, id)?;
        let update = patch.apply(&track.metadata);

        match &update.art {
            ArtChange::Replace(raw) => self.art.replace(&update.metadata.album_hash, raw)?,
            ArtChange::CopyForward { from, to } => {
                self.art.copy_if_missing(from, to)?;
            }
            ArtChange::Keep => {}
        }

        let m = &update.metadata;
        self.db.execute(
            &format!(
                "UPDATE {TRACKS} SET title = ?1, artist = ?2, album = ?3, album_artist = ?4,
                 album_hash = ?5, genre = ?6, lyrics = ?7, year = ?8, track_number = ?9,
                 track_count = ?10, disc_number = ?11, disc_count = ?12, listen = ?13,
                 download = ?14
                 WHERE {ID} = ?15"
            ),
            params![
                m.title,
                m.artist,
                m.album,
                m.album_artist,
                m.album_hash.as_str(),
                m.genre,
                m.lyrics,
                m.year,
                m.track_number,
                m.track_count,
                m.disc_number,
                m.disc_count,
                m.listen,
                m.download,
                id.0,
            ],
        )?;
        debug!("track {id} updated");

        if update.hash_changed() {
            self.reclaim_art(&update.previous_hash);
        }

        Ok(Track {
            id,
            owner: track.owner,
            metadata: update.metadata,
        })
    }

    /// Deletes a track, its playlist entries, and its art if no other track
    /// shares it. A failure to remove the art file is logged and the delete
    /// still succeeds.
    pub fn delete_track(&mut self, actor: &User, id: TrackId) -> Result<(), LibraryError> {
        let track = self.owned_track(actor, id)?;

        let tx = self.db.transaction()?;
        tx.execute(
            &format!("DELETE FROM {PLAYLIST_TRACKS} WHERE {TRACK_ID} = ?1"),
            params![id.0],
        )?;
        tx.execute(
            &format!("DELETE FROM {TRACKS} WHERE {ID} = ?1"),
            params![id.0],
        )?;
        tx.commit()?;
        info!("track {id} deleted");

        self.reclaim_art(&track.metadata.album_hash);
        Ok(())
    }

    /// Whether any live track resolves to `hash`. Scans the tracks table.
    pub fn is_album_hash_referenced(&self, hash: &AlbumHash) -> Result<bool, LibraryError> {
        let count: i64 = self.db.query_row(
            &format!("SELECT COUNT(*) FROM {TRACKS} WHERE {ALBUM_HASH} = ?1"),
            params![hash.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Runs after the owning transaction has committed, so failures are only
    /// logged and the art file stays behind as an orphan.
    fn reclaim_art(&self, hash: &AlbumHash) {
        match self
            .art
            .delete_if_unreferenced(hash, |h| self.is_album_hash_referenced(h))
        {
            Ok(true) => info!("art for album {hash} reclaimed"),
            Ok(false) => {}
            Err(e) => warn!("art for album {hash} not reclaimed: {e}"),
        }
    }
}
