//! Sede repository
//!
//! Structured sub-objects (practice areas, schedule, social links) are
//! stored as JSONB columns and decoded through `sqlx::types::Json`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;
use domain_sync::{NewSede, ScheduleEntry, Sede, SocialLinks};

/// Database row representation of a sede
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SedeRow {
    pub id: Uuid,
    pub despacho_id: Uuid,
    pub is_principal: bool,
    pub street: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub practice_areas: Json<Vec<String>>,
    pub schedule: Json<Vec<ScheduleEntry>>,
    pub social: Json<SocialLinks>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SedeRow {
    pub fn into_domain(self) -> Sede {
        Sede {
            id: self.id.into(),
            despacho_id: self.despacho_id.into(),
            is_principal: self.is_principal,
            street: self.street,
            city: self.city,
            province: self.province,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
            email: self.email,
            practice_areas: self.practice_areas.0,
            schedule: self.schedule.0,
            social: self.social.0,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, despacho_id, is_principal, street, city, province, \
     postal_code, country, phone, email, practice_areas, schedule, social, active, \
     created_at, updated_at";

/// Repository for sede rows
#[derive(Debug, Clone)]
pub struct SedeRepository {
    pool: PgPool,
}

impl SedeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists the active sedes of a despacho, principal first
    pub async fn list_active(&self, despacho_id: Uuid) -> Result<Vec<SedeRow>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM sedes \
             WHERE despacho_id = $1 AND active \
             ORDER BY is_principal DESC, created_at ASC",
            SELECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, SedeRow>(&query)
            .bind(despacho_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Inserts a sede row
    ///
    /// A second active principal for the same despacho violates the partial
    /// unique index and surfaces as [`DatabaseError::DuplicateEntry`].
    pub async fn insert(&self, new: NewSede) -> Result<SedeRow, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let despacho_id: Uuid = new.despacho_id.into();

        let query = format!(
            "INSERT INTO sedes \
                 (id, despacho_id, is_principal, street, city, province, postal_code, \
                  country, phone, email, practice_areas, schedule, social, active, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, TRUE, $14, $14) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, SedeRow>(&query)
            .bind(id)
            .bind(despacho_id)
            .bind(new.is_principal)
            .bind(&new.data.street)
            .bind(&new.data.city)
            .bind(&new.data.province)
            .bind(&new.data.postal_code)
            .bind(&new.data.country)
            .bind(&new.data.phone)
            .bind(&new.data.email)
            .bind(Json(&new.data.practice_areas))
            .bind(Json(&new.data.schedule))
            .bind(Json(&new.data.social))
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Deactivates a sede, keeping the row for history
    pub async fn deactivate(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result =
            sqlx::query("UPDATE sedes SET active = FALSE, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Sede", id));
        }
        Ok(())
    }
}
