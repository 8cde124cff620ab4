use rusqlite::{OptionalExtension, params};

use crate::{
    config,
    domain::user::User,
    storage::{
        art::ArtStore,
        db,
        error::LibraryError,
        schema::{columns::*, tables::*},
    },
};

/// Main structure that implements all library logic.
///
/// Track operations live in `storage::tracks`, playlist operations in
/// `storage::playlists`.
pub struct Library {
    pub(crate) db: rusqlite::Connection,
    pub(crate) art: ArtStore,
}

impl Library {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database, art: ArtStore) -> Result<Self, LibraryError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db, art))
    }

    pub fn from_existing_conn(db: rusqlite::Connection, art: ArtStore) -> Self {
        Self { db, art }
    }

    pub fn art(&self) -> &ArtStore {
        &self.art
    }

    /// Registers a user, or changes the token of an existing one.
    pub fn add_user(&mut self, username: &str, token: &str) -> Result<User, LibraryError> {
        if username.is_empty() {
            return Err(LibraryError::Validation("username"));
        }
        if token.is_empty() {
            return Err(LibraryError::Validation("token"));
        }
        self.db.execute(
            &format!(
                "INSERT INTO {USERS} ({USERNAME}, {TOKEN}) VALUES (?1, ?2)
                 ON CONFLICT({USERNAME}) DO UPDATE SET {TOKEN} = excluded.{TOKEN}"
            ),
            params![username, token],
        )?;
        log::info!("user {username} registered");
        Ok(User {
            username: username.to_string(),
        })
    }

    /// Resolves a bearer token to its user.
    pub fn authenticate(&self, token: &str) -> Result<Option<User>, LibraryError> {
        if token.is_empty() {
            return Ok(None);
        }
        let username = self
            .db
            .query_row(
                &format!("SELECT {USERNAME} FROM {USERS} WHERE {TOKEN} = ?1"),
                params![token],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(username.map(|username| User { username }))
    }

    pub fn get_user(&self, username: &str) -> Result<User, LibraryError> {
        let found = self
            .db
            .query_row(
                &format!("SELECT {USERNAME} FROM {USERS} WHERE {USERNAME} = ?1"),
                params![username],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        found
            .map(|username| User { username })
            .ok_or_else(|| LibraryError::UserNotFound(username.to_string()))
    }
}

/// `Unauthorized` unless `actor` owns the record
pub(crate) fn ensure_owner(actor: &User, owner: &str) -> Result<(), LibraryError> {
    if actor.username == owner {
        Ok(())
    } else {
        Err(LibraryError::Unauthorized)
    }
}
