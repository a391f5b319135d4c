//! Sync queue repository
//!
//! The persisted record keeps the operational Spanish field names
//! (`tipo`, `accion`, `estado`, `ultimo_error`, `proximo_intento_at`).
//! The partial unique index on (despacho_id, accion) over live states is
//! what guarantees a single live entry per key; the upsert leans on it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;
use domain_sync::{QueueStatus, SyncAction, SyncQueueEntry};

/// Database row representation of a queue entry
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncQueueRow {
    pub id: Uuid,
    pub despacho_id: Uuid,
    pub accion: String,
    pub estado: String,
    pub ultimo_error: Option<String>,
    pub proximo_intento_at: DateTime<Utc>,
    pub intentos: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncQueueRow {
    pub fn into_domain(self) -> Result<SyncQueueEntry, DatabaseError> {
        Ok(SyncQueueEntry {
            id: self.id.into(),
            despacho_id: self.despacho_id.into(),
            action: parse_action(&self.accion)?,
            status: parse_status(&self.estado)?,
            last_error: self.ultimo_error,
            next_attempt_at: self.proximo_intento_at,
            attempts: self.intentos.max(0) as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_action(value: &str) -> Result<SyncAction, DatabaseError> {
    match value {
        "push" => Ok(SyncAction::Push),
        "import" => Ok(SyncAction::Import),
        other => Err(DatabaseError::SerializationError(format!(
            "unknown sync action '{}'",
            other
        ))),
    }
}

fn parse_status(value: &str) -> Result<QueueStatus, DatabaseError> {
    match value {
        "pendiente" => Ok(QueueStatus::Pending),
        "fallido" => Ok(QueueStatus::Failed),
        "resuelto" => Ok(QueueStatus::Resolved),
        "muerto" => Ok(QueueStatus::Dead),
        other => Err(DatabaseError::SerializationError(format!(
            "unknown queue status '{}'",
            other
        ))),
    }
}

const SELECT_COLUMNS: &str = "id, despacho_id, accion, estado, ultimo_error, \
     proximo_intento_at, intentos, created_at, updated_at";

/// Repository for sync queue entries
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: PgPool,
}

impl SyncQueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates or refreshes the single live entry for (despacho, action)
    pub async fn upsert_failure(
        &self,
        despacho_id: Uuid,
        action: SyncAction,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<SyncQueueRow, DatabaseError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO despacho_sync_queue \
                 (id, despacho_id, tipo, accion, estado, ultimo_error, \
                  proximo_intento_at, intentos, created_at, updated_at) \
             VALUES ($1, $2, 'despacho', $3, 'fallido', $4, $5, 1, $6, $6) \
             ON CONFLICT (despacho_id, accion) WHERE estado IN ('pendiente', 'fallido') \
             DO UPDATE SET \
                 estado = 'fallido', \
                 ultimo_error = EXCLUDED.ultimo_error, \
                 proximo_intento_at = EXCLUDED.proximo_intento_at, \
                 intentos = despacho_sync_queue.intentos + 1, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            SELECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, SyncQueueRow>(&query)
            .bind(Uuid::new_v4())
            .bind(despacho_id)
            .bind(action.to_string())
            .bind(error)
            .bind(next_attempt_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Marks the live entry for (despacho, action) resolved, if present
    pub async fn resolve(&self, despacho_id: Uuid, action: SyncAction) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE despacho_sync_queue SET estado = 'resuelto', updated_at = $3 \
             WHERE despacho_id = $1 AND accion = $2 AND estado IN ('pendiente', 'fallido')",
        )
        .bind(despacho_id)
        .bind(action.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Selects live entries that are due, oldest first
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SyncQueueRow>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM despacho_sync_queue \
             WHERE estado IN ('pendiente', 'fallido') AND proximo_intento_at <= $1 \
             ORDER BY proximo_intento_at ASC \
             LIMIT $2",
            SELECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, SyncQueueRow>(&query)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Marks an entry dead; dead entries are never selected for re-drive
    pub async fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE despacho_sync_queue SET estado = 'muerto', ultimo_error = $2, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("SyncQueueEntry", id));
        }
        Ok(())
    }
}
