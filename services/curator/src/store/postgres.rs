//! PostgreSQL draft repository

use async_trait::async_trait;
use common::error::{DatabaseError, StoreError, StoreResult};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::DraftStore;
use crate::models::{DraftStatus, PlaylistDraft, Track};

const SCHEMA: &str = include_str!("../../migrations/0001_playlist_drafts.sql");

/// Draft repository for database operations
#[derive(Clone)]
pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    /// Create a new draft repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the drafts table if it does not exist yet
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        info!("Ensuring playlist_drafts schema");
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }

    fn from_row(row: &PgRow) -> StoreResult<PlaylistDraft> {
        let status: String = row.try_get("status").map_err(DatabaseError::Query)?;
        let status = DraftStatus::parse(&status)
            .ok_or_else(|| StoreError::Serialization(format!("Unknown draft status: {status}")))?;
        let tracks: Json<Vec<Track>> = row.try_get("tracks").map_err(DatabaseError::Query)?;
        let refinement_count: i32 = row
            .try_get("refinement_count")
            .map_err(DatabaseError::Query)?;

        Ok(PlaylistDraft {
            id: row.try_get("id").map_err(DatabaseError::Query)?,
            owner_key: row.try_get("owner_key").map_err(DatabaseError::Query)?,
            session_id: row.try_get("session_id").map_err(DatabaseError::Query)?,
            prompt: row.try_get("prompt").map_err(DatabaseError::Query)?,
            tracks: tracks.0,
            refinement_count: refinement_count.max(0) as u32,
            status,
            external_playlist_id: row
                .try_get("external_playlist_id")
                .map_err(DatabaseError::Query)?,
            version: row.try_get("version").map_err(DatabaseError::Query)?,
            created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
            updated_at: row.try_get("updated_at").map_err(DatabaseError::Query)?,
        })
    }
}

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<PlaylistDraft>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_key, session_id, prompt, tracks, refinement_count, status,
                   external_playlist_id, version, created_at, updated_at
            FROM playlist_drafts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn insert(&self, draft: &PlaylistDraft) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO playlist_drafts (id, owner_key, session_id, prompt, tracks,
                refinement_count, status, external_playlist_id, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(draft.id)
        .bind(&draft.owner_key)
        .bind(&draft.session_id)
        .bind(&draft.prompt)
        .bind(Json(&draft.tracks))
        .bind(draft.refinement_count as i32)
        .bind(draft.status.as_str())
        .bind(&draft.external_playlist_id)
        .bind(draft.version)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn update_if_version(
        &self,
        draft: &PlaylistDraft,
        expected_version: i64,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE playlist_drafts
            SET tracks = $2, refinement_count = $3, status = $4, external_playlist_id = $5,
                version = $6, updated_at = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(draft.id)
        .bind(Json(&draft.tracks))
        .bind(draft.refinement_count as i32)
        .bind(draft.status.as_str())
        .bind(&draft.external_playlist_id)
        .bind(draft.version)
        .bind(draft.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM playlist_drafts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
