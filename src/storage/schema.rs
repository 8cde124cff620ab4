use rusqlite::Connection;

pub mod tables {
    pub const USERS: &str = "users";
    pub const TRACKS: &str = "tracks";
    pub const PLAYLISTS: &str = "playlists";
    pub const PLAYLIST_TRACKS: &str = "playlist_tracks";

    pub const ALL_TABLES: &[&str] = &[USERS, TRACKS, PLAYLISTS, PLAYLIST_TRACKS];
}

pub mod columns {
    pub const ID: &str = "id";
    pub const OWNER: &str = "owner";
    pub const TITLE: &str = "title";
    pub const USERNAME: &str = "username";
    pub const TOKEN: &str = "token";
    pub const ALBUM_HASH: &str = "album_hash";
    pub const PLAYLIST_ID: &str = "playlist_id";
    pub const TRACK_ID: &str = "track_id";
    pub const POSITION: &str = "position";

    /// every track column, in the order `tracks::track_from_row` reads them
    pub const TRACK_COLUMNS: &str = "id, owner, title, artist, album, album_artist, album_hash, \
         genre, lyrics, year, track_number, track_count, disc_number, disc_count, listen, download";
}

pub use columns::*;
pub use tables::*;

// playlist_tracks.track_id has no foreign key. Single appends store
// unverified ids and track deletion removes entries itself.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY NOT NULL,
    token TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS users_token ON users (token);

CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    album TEXT NOT NULL,
    album_artist TEXT NOT NULL,
    album_hash TEXT NOT NULL,
    genre TEXT NOT NULL,
    lyrics TEXT NOT NULL,
    year INTEGER NOT NULL,
    track_number INTEGER NOT NULL,
    track_count INTEGER NOT NULL,
    disc_number INTEGER NOT NULL,
    disc_count INTEGER NOT NULL,
    listen TEXT NOT NULL,
    download TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tracks_owner ON tracks (owner);

CREATE TABLE IF NOT EXISTS playlists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    title TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS playlists_owner ON playlists (owner);

CREATE TABLE IF NOT EXISTS playlist_tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    playlist_id INTEGER NOT NULL REFERENCES playlists (id) ON DELETE CASCADE,
    track_id INTEGER NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS playlist_tracks_playlist ON playlist_tracks (playlist_id);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}
