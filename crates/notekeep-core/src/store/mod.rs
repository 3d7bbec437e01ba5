//! Persistence traits and their implementations
//!
//! [`CredentialStore`] holds users and refresh-token sessions, [`NoteRepository`]
//! holds notes. Both are implemented by [`PgStore`] (PostgreSQL) and
//! [`MemoryStore`] (process-local, used by tests and local runs).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::{NewNote, NewRefreshToken, NewUser, Note, NoteChanges, RefreshTokenRecord, Result, User};
use async_trait::async_trait;

/// Users and refresh-token sessions
///
/// Implementations must provide atomic single-row create/update semantics.
/// Refresh-token state is never cached by callers, so the guarantees below are
/// the only protection against token reuse.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by exact email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find a user by id
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Create a user; fails with `Conflict` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Persist a new refresh-token record (`revoked = false`)
    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord>;

    /// Find a refresh-token record by the hex digest of its raw value
    async fn find_refresh_token_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>>;

    /// Mark a record revoked if it is not already
    ///
    /// Returns `true` only for the call that performed the transition.
    async fn revoke_refresh_token(&self, id: i64) -> Result<bool>;

    /// Revoke `old_id` and insert `replacement` as one atomic step
    ///
    /// Returns `None` without inserting anything when `old_id` was already
    /// revoked, so at most one of several concurrent rotations succeeds.
    async fn rotate_refresh_token(
        &self,
        old_id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>>;
}

/// Notes scoped to their owner
///
/// Every lookup takes the owner id; a note owned by someone else behaves
/// exactly like a missing one.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn create_note(&self, user_id: i64, note: NewNote) -> Result<Note>;

    /// All notes of a user, newest first
    async fn list_notes(&self, user_id: i64) -> Result<Vec<Note>>;

    async fn find_note(&self, user_id: i64, note_id: i64) -> Result<Option<Note>>;

    async fn update_note(
        &self,
        user_id: i64,
        note_id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>>;

    /// Returns `false` when nothing was deleted
    async fn delete_note(&self, user_id: i64, note_id: i64) -> Result<bool>;
}
