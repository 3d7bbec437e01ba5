//! PostgreSQL store
//!
//! Users, refresh tokens and notes using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use super::{CredentialStore, NoteRepository};
use crate::config::DatabaseConfig;
use crate::{
    NewNote, NewRefreshToken, NewUser, Note, NoteChanges, NotekeepError, RefreshTokenRecord,
    Result, User,
};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.postgres_url)
            .await
            .map_err(|e| NotekeepError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| NotekeepError::DatabaseError(format!("Migration failed: {e}")))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Refresh token row from database
#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: i64,
    token_hash: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshTokenRecord {
            id: row.id,
            token_hash: row.token_hash,
            user_id: row.user_id,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
        }
    }
}

/// Note row from database
#[derive(Debug, FromRow)]
struct NoteRow {
    id: i64,
    title: String,
    content: String,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            title: row.title,
            content: row.content,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, created_at, updated_at";
const TOKEN_COLUMNS: &str = "id, token_hash, user_id, expires_at, revoked, created_at";
const NOTE_COLUMNS: &str = "id, title, content, user_id, created_at, updated_at";

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| NotekeepError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| NotekeepError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, password_hash, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                NotekeepError::Conflict("Email already registered".to_string())
            }
            _ => NotekeepError::DatabaseError(format!("Failed to create user: {e}")),
        })?;

        Ok(row.into())
    }

    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        let row: RefreshTokenRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to store refresh token: {e}")))?;

        Ok(row.into())
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to fetch refresh token: {e}")))?;

        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn revoke_refresh_token(&self, id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    NotekeepError::DatabaseError(format!("Failed to revoke refresh token: {e}"))
                })?;

        Ok(result.rows_affected() == 1)
    }

    async fn rotate_refresh_token(
        &self,
        old_id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| NotekeepError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        // Compare-and-set: only one concurrent rotation can flip the flag
        let revoked =
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE")
                .bind(old_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    NotekeepError::DatabaseError(format!("Failed to revoke refresh token: {e}"))
                })?
                .rows_affected();

        if revoked == 0 {
            tx.rollback().await.map_err(|e| {
                NotekeepError::DatabaseError(format!("Failed to roll back transaction: {e}"))
            })?;
            return Ok(None);
        }

        let row: RefreshTokenRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(&replacement.token_hash)
        .bind(replacement.user_id)
        .bind(replacement.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to store refresh token: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| NotekeepError::DatabaseError(format!("Failed to commit rotation: {e}")))?;

        Ok(Some(row.into()))
    }
}

#[async_trait]
impl NoteRepository for PgStore {
    async fn create_note(&self, user_id: i64, note: NewNote) -> Result<Note> {
        let row: NoteRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO notes (title, content, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(&note.title)
        .bind(&note.content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to create note: {e}")))?;

        Ok(row.into())
    }

    async fn list_notes(&self, user_id: i64) -> Result<Vec<Note>> {
        let rows: Vec<NoteRow> = sqlx::query_as(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to list notes: {e}")))?;

        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn find_note(&self, user_id: i64, note_id: i64) -> Result<Option<Note>> {
        let row: Option<NoteRow> = sqlx::query_as(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to get note: {e}")))?;

        Ok(row.map(Note::from))
    }

    async fn update_note(
        &self,
        user_id: i64,
        note_id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>> {
        let row: Option<NoteRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notes SET
                title = COALESCE($3, title),
                content = COALESCE($4, content),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(note_id)
        .bind(user_id)
        .bind(changes.title)
        .bind(changes.content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| NotekeepError::DatabaseError(format!("Failed to update note: {e}")))?;

        Ok(row.map(Note::from))
    }

    async fn delete_note(&self, user_id: i64, note_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| NotekeepError::DatabaseError(format!("Failed to delete note: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
