use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    domain::{
        playlist::{NewPlaylist, Playlist, PlaylistEntry, PlaylistId, PlaylistPatch, PlaylistView},
        track::TrackId,
        user::User,
    },
    storage::{
        error::LibraryError,
        operations::{Library, ensure_owner},
        schema::{columns::*, tables::*},
        tracks::track_from_row,
    },
};

fn playlist_from_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: PlaylistId(row.get(0)?),
        owner: row.get(1)?,
        title: row.get(2)?,
    })
}

fn track_exists(conn: &Connection, id: TrackId) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {TRACKS} WHERE {ID} = ?1)"),
        params![id.0],
        |row| row.get(0),
    )
}

fn insert_entry(conn: &Connection, entry: &PlaylistEntry) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {PLAYLIST_TRACKS} ({PLAYLIST_ID}, {TRACK_ID}, {POSITION})
             VALUES (?1, ?2, ?3)"
        ),
        params![entry.playlist_id.0, entry.track_id.0, entry.position],
    )?;
    Ok(())
}

/// Appends `ids` to a playlist, skipping ids that name no track.
///
/// The i-th id lands at position `i - skipped_so_far`, so the stored
/// positions are contiguous from 0 when the playlist starts out empty.
pub(crate) fn append_tracks(
    conn: &Connection,
    playlist: PlaylistId,
    ids: &[TrackId],
) -> Result<Vec<PlaylistEntry>, LibraryError> {
    let mut entries = Vec::with_capacity(ids.len());
    let mut skipped = 0u32;

    for (index, &track_id) in ids.iter().enumerate() {
        if !track_exists(conn, track_id)? {
            debug!("playlist {playlist}: skipping unknown track {track_id}");
            skipped += 1;
            continue;
        }
        let entry = PlaylistEntry {
            position: index as u32 - skipped,
            playlist_id: playlist,
            track_id,
        };
        insert_entry(conn, &entry)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Drops every entry of the playlist, then appends `ids`.
pub(crate) fn replace_all(
    conn: &Connection,
    playlist: PlaylistId,
    ids: &[TrackId],
) -> Result<Vec<PlaylistEntry>, LibraryError> {
    conn.execute(
        &format!("DELETE FROM {PLAYLIST_TRACKS} WHERE {PLAYLIST_ID} = ?1"),
        params![playlist.0],
    )?;
    append_tracks(conn, playlist, ids)
}

impl Library {
    pub fn get_playlist(&self, id: PlaylistId) -> Result<Playlist, LibraryError> {
        self.db
            .query_row(
                &format!("SELECT {ID}, {OWNER}, {TITLE} FROM {PLAYLISTS} WHERE {ID} = ?1"),
                params![id.0],
                playlist_from_row,
            )
            .optional()?
            .ok_or(LibraryError::PlaylistNotFound(id))
    }

    pub fn list_playlists(&self, owner: &str) -> Result<Vec<Playlist>, LibraryError> {
        self.get_user(owner)?;
        let mut stmt = self.db.prepare(&format!(
            "SELECT {ID}, {OWNER}, {TITLE} FROM {PLAYLISTS} WHERE {OWNER} = ?1 ORDER BY {ID}"
        ))?;
        let playlists = stmt
            .query_map(params![owner], playlist_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    /// The playlist with its tracks ordered by position. Entries pointing at
    /// missing tracks are left out.
    pub fn playlist_view(&self, id: PlaylistId) -> Result<PlaylistView, LibraryError> {
        let playlist = self.get_playlist(id)?;
        let mut stmt = self.db.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM {TRACKS}
             JOIN (SELECT {TRACK_ID}, {POSITION}, {ID} AS entry_id FROM {PLAYLIST_TRACKS}
                   WHERE {PLAYLIST_ID} = ?1) pt
             ON pt.{TRACK_ID} = {TRACKS}.{ID}
             ORDER BY pt.{POSITION}, pt.entry_id"
        ))?;
        let tracks = stmt
            .query_map(params![id.0], track_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PlaylistView { playlist, tracks })
    }

    fn owned_playlist(&self, actor: &User, id: PlaylistId) -> Result<Playlist, LibraryError> {
        let playlist = self.get_playlist(id)?;
        ensure_owner(actor, &playlist.owner)?;
        Ok(playlist)
    }

    pub fn create_playlist(
        &mut self,
        owner: &User,
        new: NewPlaylist,
    ) -> Result<PlaylistView, LibraryError> {
        if new.title.is_empty() {
            return Err(LibraryError::Validation("title"));
        }

        let tx = self.db.transaction()?;
        tx.execute(
            &format!("INSERT INTO {PLAYLISTS} ({OWNER}, {TITLE}) VALUES (?1, ?2)"),
            params![owner.username, new.title],
        )?;
        let id = PlaylistId(tx.last_insert_rowid());
        if let Some(ids) = &new.tracks {
            append_tracks(&tx, id, ids)?;
        }
        tx.commit()?;
        info!("playlist {id} '{}' created for {}", new.title, owner.username);

        self.playlist_view(id)
    }

    /// Renames the playlist and, when `tracks` is given, replaces all of
    /// its entries.
    pub fn update_playlist(
        &mut self,
        actor: &User,
        id: PlaylistId,
        patch: PlaylistPatch,
    ) -> Result<PlaylistView, LibraryError> {
        self.owned_playlist(actor, id)?;
        if patch.title.as_deref() == Some("") {
            return Err(LibraryError::Validation("title"));
        }

        let tx = self.db.transaction()?;
        if let Some(title) = &patch.title {
            tx.execute(
                &format!("UPDATE {PLAYLISTS} SET {TITLE} = ?1 WHERE {ID} = ?2"),
                params![title, id.0],
            )?;
        }
        if let Some(ids) = &patch.tracks {
            replace_all(&tx, id, ids)?;
        }
        tx.commit()?;
        debug!("playlist {id} updated");

        self.playlist_view(id)
    }

    /// Appends one track at position = current entry count. The track id is
    /// not checked.
    pub fn append_track(
        &mut self,
        actor: &User,
        id: PlaylistId,
        track: TrackId,
    ) -> Result<PlaylistEntry, LibraryError> {
        self.owned_playlist(actor, id)?;

        let tx = self.db.transaction()?;
        let position: u32 = tx.query_row(
            &format!("SELECT COUNT(*) FROM {PLAYLIST_TRACKS} WHERE {PLAYLIST_ID} = ?1"),
            params![id.0],
            |row| row.get(0),
        )?;
        let entry = PlaylistEntry {
            position,
            playlist_id: id,
            track_id: track,
        };
        insert_entry(&tx, &entry)?;
        tx.commit()?;
        debug!("playlist {id}: appended track {track} at {position}");

        Ok(entry)
    }

    /// Removes the entry of `track`. Remaining positions keep their values.
    pub fn remove_track(
        &mut self,
        actor: &User,
        id: PlaylistId,
        track: TrackId,
    ) -> Result<bool, LibraryError> {
        self.owned_playlist(actor, id)?;
        let removed = self.db.execute(
            &format!("DELETE FROM {PLAYLIST_TRACKS} WHERE {PLAYLIST_ID} = ?1 AND {TRACK_ID} = ?2"),
            params![id.0, track.0],
        )?;
        Ok(removed > 0)
    }

    pub fn delete_playlist(&mut self, actor: &User, id: PlaylistId) -> Result<(), LibraryError> {
        self.owned_playlist(actor, id)?;
        // entries go with it through ON DELETE CASCADE
        self.db.execute(
            &format!("DELETE FROM {PLAYLISTS} WHERE {ID} = ?1"),
            params![id.0],
        )?;
        info!("playlist {id} deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::track::{NewTrack, Track},
        storage::operations::tests::setup_library,
    };

    use super::*;

    fn alice() -> User {
        User {
            username: "alice".into(),
        }
    }

    fn bob() -> User {
        User {
            username: "bob".into(),
        }
    }

    fn setup() -> anyhow::Result<(Library, tempfile::TempDir)> {
        let (mut library, dir) = setup_library()?;
        library.add_user("alice", "token-a")?;
        library.add_user("bob", "token-b")?;
        Ok((library, dir))
    }

    fn add_track(library: &mut Library, title: &str) -> anyhow::Result<Track> {
        let new = NewTrack {
            title: title.into(),
            artist: "Air".into(),
            album: Some("Moon Safari".into()),
            listen: format!("https://cdn.example/{title}.mp3"),
            ..Default::default()
        };
        Ok(library.import_track(&alice(), new)?)
    }

    /// raw entries in position order, including ones whose track is gone
    fn entries(library: &Library, id: PlaylistId) -> anyhow::Result<Vec<PlaylistEntry>> {
        let mut stmt = library.db.prepare(&format!(
            "SELECT {POSITION}, {PLAYLIST_ID}, {TRACK_ID} FROM {PLAYLIST_TRACKS}
             WHERE {PLAYLIST_ID} = ?1 ORDER BY {POSITION}, {ID}"
        ))?;
        let entries = stmt
            .query_map(params![id.0], |row| {
                Ok(PlaylistEntry {
                    position: row.get(0)?,
                    playlist_id: PlaylistId(row.get(1)?),
                    track_id: TrackId(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn positions(entries: &[PlaylistEntry]) -> Vec<(u32, i64)> {
        entries.iter().map(|e| (e.position, e.track_id.0)).collect()
    }

    fn empty_playlist(library: &mut Library) -> anyhow::Result<PlaylistId> {
        let view = library.create_playlist(
            &alice(),
            NewPlaylist {
                title: "Chill".into(),
                tracks: None,
            },
        )?;
        Ok(view.playlist.id)
    }

    #[test]
    fn test_append_tracks_skips_unknown_ids() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "La femme d'argent")?.id;
        let b = add_track(&mut library, "Sexy Boy")?.id;
        let playlist = empty_playlist(&mut library)?;

        let appended = append_tracks(&library.db, playlist, &[a, TrackId(999), b])?;

        assert_eq!(positions(&appended), vec![(0, a.0), (1, b.0)]);
        assert_eq!(entries(&library, playlist)?, appended);
        Ok(())
    }

    #[test]
    fn test_create_with_tracks_orders_by_input() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "Kelly Watch the Stars")?.id;
        let b = add_track(&mut library, "Talisman")?.id;

        let view = library.create_playlist(
            &alice(),
            NewPlaylist {
                title: "Moon".into(),
                tracks: Some(vec![b, a]),
            },
        )?;

        let ids: Vec<_> = view.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(view.playlist.owner, "alice");
        Ok(())
    }

    #[test]
    fn test_create_requires_title() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let err = library
            .create_playlist(&alice(), NewPlaylist::default())
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation("title")));
        assert!(library.list_playlists("alice")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_replace_all_is_idempotent() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "Remember")?.id;
        let b = add_track(&mut library, "Ce matin-là")?.id;
        let playlist = empty_playlist(&mut library)?;

        let first = replace_all(&library.db, playlist, &[a, b, TrackId(404)])?;
        let second = replace_all(&library.db, playlist, &[a, b, TrackId(404)])?;

        assert_eq!(first, second);
        assert_eq!(entries(&library, playlist)?, second);
        Ok(())
    }

    #[test]
    fn test_update_replaces_tracks_and_title() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "New Star in the Sky")?.id;
        let b = add_track(&mut library, "Le voyage de Pénélope")?.id;
        let playlist = empty_playlist(&mut library)?;
        library.append_track(&alice(), playlist, a)?;

        let view = library.update_playlist(
            &alice(),
            playlist,
            PlaylistPatch {
                title: Some("Evening".into()),
                tracks: Some(vec![b]),
            },
        )?;

        assert_eq!(view.playlist.title, "Evening");
        let ids: Vec<_> = view.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b]);
        Ok(())
    }

    #[test]
    fn test_update_title_only_keeps_entries() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "All I Need")?.id;
        let playlist = empty_playlist(&mut library)?;
        library.append_track(&alice(), playlist, a)?;

        library.update_playlist(
            &alice(),
            playlist,
            PlaylistPatch {
                title: Some("Renamed".into()),
                tracks: None,
            },
        )?;

        assert_eq!(entries(&library, playlist)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_remove_leaves_gap_and_append_uses_count() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "a")?.id;
        let b = add_track(&mut library, "b")?.id;
        let c = add_track(&mut library, "c")?.id;
        let d = add_track(&mut library, "d")?.id;
        let playlist = empty_playlist(&mut library)?;
        replace_all(&library.db, playlist, &[a, b, c])?;

        assert!(library.remove_track(&alice(), playlist, b)?);
        assert_eq!(
            positions(&entries(&library, playlist)?),
            vec![(0, a.0), (2, c.0)]
        );

        // two entries left, so the next one goes to position 2 as well
        let entry = library.append_track(&alice(), playlist, d)?;
        assert_eq!(entry.position, 2);

        let ids: Vec<_> = library
            .playlist_view(playlist)?
            .tracks
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![a, c, d]);
        Ok(())
    }

    #[test]
    fn test_remove_missing_entry() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let playlist = empty_playlist(&mut library)?;
        assert!(!library.remove_track(&alice(), playlist, TrackId(1))?);
        Ok(())
    }

    #[test]
    fn test_single_append_does_not_check_track() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let playlist = empty_playlist(&mut library)?;

        let entry = library.append_track(&alice(), playlist, TrackId(777))?;

        assert_eq!(entry.position, 0);
        assert_eq!(entries(&library, playlist)?, vec![entry]);
        // nothing to resolve it to
        assert!(library.playlist_view(playlist)?.tracks.is_empty());
        Ok(())
    }

    #[test]
    fn test_deleted_track_leaves_playlists() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "a")?.id;
        let b = add_track(&mut library, "b")?.id;
        let playlist = empty_playlist(&mut library)?;
        replace_all(&library.db, playlist, &[a, b])?;

        library.delete_track(&alice(), a)?;

        assert_eq!(
            positions(&entries(&library, playlist)?),
            vec![(1, b.0)]
        );
        Ok(())
    }

    #[test]
    fn test_delete_playlist_removes_entries() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "a")?.id;
        let playlist = empty_playlist(&mut library)?;
        library.append_track(&alice(), playlist, a)?;

        library.delete_playlist(&alice(), playlist)?;

        assert!(matches!(
            library.get_playlist(playlist),
            Err(LibraryError::PlaylistNotFound(_))
        ));
        assert!(entries(&library, playlist)?.is_empty());
        // the track itself is untouched
        assert!(library.get_track(a).is_ok());
        Ok(())
    }

    #[test]
    fn test_other_user_cannot_modify() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        let a = add_track(&mut library, "a")?.id;
        let playlist = empty_playlist(&mut library)?;

        assert!(matches!(
            library.append_track(&bob(), playlist, a),
            Err(LibraryError::Unauthorized)
        ));
        assert!(matches!(
            library.delete_playlist(&bob(), playlist),
            Err(LibraryError::Unauthorized)
        ));
        assert!(matches!(
            library.update_playlist(&bob(), PlaylistId(9999), PlaylistPatch::default()),
            Err(LibraryError::PlaylistNotFound(_))
        ));
        assert!(entries(&library, playlist)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_list_playlists_per_owner() -> anyhow::Result<()> {
        let (mut library, _dir) = setup()?;
        empty_playlist(&mut library)?;
        library.create_playlist(
            &bob(),
            NewPlaylist {
                title: "Bob's".into(),
                tracks: None,
            },
        )?;

        let titles: Vec<_> = library
            .list_playlists("alice")?
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Chill"]);
        Ok(())
    }
}
