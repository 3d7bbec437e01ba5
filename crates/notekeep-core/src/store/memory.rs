//! In-memory store
//!
//! Mirrors the PostgreSQL semantics (unique email, unique token hash,
//! compare-and-set revocation) behind a single async lock. Data lives only
//! as long as the process.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CredentialStore, NoteRepository};
use crate::{
    NewNote, NewRefreshToken, NewUser, Note, NoteChanges, NotekeepError, RefreshTokenRecord,
    Result, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    refresh_tokens: HashMap<i64, RefreshTokenRecord>,
    notes: HashMap<i64, Note>,
    last_user_id: i64,
    last_token_id: i64,
    last_note_id: i64,
}

impl Tables {
    fn insert_refresh_token(&mut self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        if self
            .refresh_tokens
            .values()
            .any(|r| r.token_hash == token.token_hash)
        {
            return Err(NotekeepError::Conflict(
                "Refresh token hash already stored".to_string(),
            ));
        }

        self.last_token_id += 1;
        let record = RefreshTokenRecord {
            id: self.last_token_id,
            token_hash: token.token_hash,
            user_id: token.user_id,
            expires_at: token.expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        self.refresh_tokens.insert(record.id, record.clone());
        Ok(record)
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refresh-token records ever issued
    pub async fn refresh_token_count(&self) -> usize {
        self.tables.read().await.refresh_tokens.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(NotekeepError::Conflict("Email already registered".to_string()));
        }

        tables.last_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.last_user_id,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        self.tables.write().await.insert_refresh_token(token)
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_refresh_token(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(&id) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_refresh_token(
        &self,
        old_id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get(&old_id) {
            Some(record) if !record.revoked => {}
            _ => return Ok(None),
        }

        // Insert first so a failed insert leaves the old record untouched
        let created = tables.insert_refresh_token(replacement)?;
        if let Some(old) = tables.refresh_tokens.get_mut(&old_id) {
            old.revoked = true;
        }
        Ok(Some(created))
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn create_note(&self, user_id: i64, note: NewNote) -> Result<Note> {
        let mut tables = self.tables.write().await;
        tables.last_note_id += 1;
        let now = Utc::now();
        let created = Note {
            id: tables.last_note_id,
            title: note.title,
            content: note.content,
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.notes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_notes(&self, user_id: i64) -> Result<Vec<Note>> {
        let tables = self.tables.read().await;
        let mut notes: Vec<Note> = tables
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes)
    }

    async fn find_note(&self, user_id: i64, note_id: i64) -> Result<Option<Note>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .get(&note_id)
            .filter(|n| n.user_id == user_id)
            .cloned())
    }

    async fn update_note(
        &self,
        user_id: i64,
        note_id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>> {
        let mut tables = self.tables.write().await;
        let Some(note) = tables
            .notes
            .get_mut(&note_id)
            .filter(|n| n.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(content) = changes.content {
            note.content = content;
        }
        note.updated_at = Utc::now();
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, user_id: i64, note_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .notes
            .get(&note_id)
            .is_some_and(|n| n.user_id == user_id);
        if owned {
            tables.notes.remove(&note_id);
        }
        Ok(owned)
    }
}
