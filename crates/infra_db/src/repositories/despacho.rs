//! Despacho repository
//!
//! Row-level access to the `despachos` table. Correlation writes live here:
//! the set-once semantics of `cms_id` and the uniqueness constraint that
//! breaks concurrent-import races are both enforced against this table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;
use domain_sync::{Despacho, NewDespacho, PublicationState, VerificationState};

/// Database row representation of a despacho
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DespachoRow {
    pub id: Uuid,
    pub cms_id: Option<i64>,
    pub search_index_id: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub verification: String,
    pub publication: String,
    pub last_sync_succeeded: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DespachoRow {
    /// Converts the row into the domain shape
    pub fn into_domain(self) -> Result<Despacho, DatabaseError> {
        Ok(Despacho {
            id: self.id.into(),
            cms_id: self.cms_id.map(Into::into),
            search_index_id: self
                .cms_id
                .map(|id| core_kernel::CmsId::new(id).search_index_id()),
            name: self.name,
            slug: self.slug,
            description: self.description,
            verification: parse_verification(&self.verification)?,
            publication: parse_publication(&self.publication)?,
            last_sync_succeeded: self.last_sync_succeeded,
            last_sync_at: self.last_sync_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn parse_verification(value: &str) -> Result<VerificationState, DatabaseError> {
    match value {
        "unverified" => Ok(VerificationState::Unverified),
        "pending" => Ok(VerificationState::Pending),
        "verified" => Ok(VerificationState::Verified),
        other => Err(DatabaseError::SerializationError(format!(
            "unknown verification state '{}'",
            other
        ))),
    }
}

pub(crate) fn verification_str(value: VerificationState) -> &'static str {
    match value {
        VerificationState::Unverified => "unverified",
        VerificationState::Pending => "pending",
        VerificationState::Verified => "verified",
    }
}

pub(crate) fn parse_publication(value: &str) -> Result<PublicationState, DatabaseError> {
    match value {
        "draft" => Ok(PublicationState::Draft),
        "published" => Ok(PublicationState::Published),
        "unlisted" => Ok(PublicationState::Unlisted),
        other => Err(DatabaseError::SerializationError(format!(
            "unknown publication state '{}'",
            other
        ))),
    }
}

pub(crate) fn publication_str(value: PublicationState) -> &'static str {
    match value {
        PublicationState::Draft => "draft",
        PublicationState::Published => "published",
        PublicationState::Unlisted => "unlisted",
    }
}

const SELECT_COLUMNS: &str = "id, cms_id, search_index_id, name, slug, description, \
     verification, publication, last_sync_succeeded, last_sync_at, created_at, updated_at";

/// Repository for despacho rows
#[derive(Debug, Clone)]
pub struct DespachoRepository {
    pool: PgPool,
}

impl DespachoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches a despacho by id
    pub async fn get_by_id(&self, id: Uuid) -> Result<DespachoRow, DatabaseError> {
        let query = format!("SELECT {} FROM despachos WHERE id = $1", SELECT_COLUMNS);
        sqlx::query_as::<_, DespachoRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Despacho", id))
    }

    /// Finds the despacho correlated with a CMS id, if any
    pub async fn find_by_cms_id(&self, cms_id: i64) -> Result<Option<DespachoRow>, DatabaseError> {
        let query = format!("SELECT {} FROM despachos WHERE cms_id = $1", SELECT_COLUMNS);
        Ok(sqlx::query_as::<_, DespachoRow>(&query)
            .bind(cms_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Inserts a despacho row
    ///
    /// A duplicate `cms_id` surfaces as [`DatabaseError::DuplicateEntry`];
    /// the caller redirects that onto the completion path.
    pub async fn insert(&self, new: NewDespacho) -> Result<DespachoRow, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let cms_id = new.cms_id.map(|c| c.value());
        let search_index_id = new.cms_id.map(|c| c.search_index_id().to_string());

        let query = format!(
            "INSERT INTO despachos \
                 (id, cms_id, search_index_id, name, slug, description, \
                  verification, publication, last_sync_succeeded, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $9) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, DespachoRow>(&query)
            .bind(id)
            .bind(cms_id)
            .bind(search_index_id)
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description)
            .bind(verification_str(new.verification))
            .bind(publication_str(new.publication))
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Updates verification/publication state and clears the sync flag
    pub async fn update_states(
        &self,
        id: Uuid,
        verification: Option<VerificationState>,
        publication: Option<PublicationState>,
    ) -> Result<DespachoRow, DatabaseError> {
        let query = format!(
            "UPDATE despachos SET \
                 verification = COALESCE($2, verification), \
                 publication = COALESCE($3, publication), \
                 last_sync_succeeded = FALSE, \
                 updated_at = $4 \
             WHERE id = $1 \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, DespachoRow>(&query)
            .bind(id)
            .bind(verification.map(verification_str))
            .bind(publication.map(publication_str))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Despacho", id))
    }

    /// Records the CMS correlation, set-once
    ///
    /// Returns the row as it stands after the attempt: if a concurrent
    /// writer set the correlation first, that correlation wins and the
    /// current row is returned unchanged.
    pub async fn assign_correlation(
        &self,
        id: Uuid,
        cms_id: i64,
        search_index_id: &str,
    ) -> Result<DespachoRow, DatabaseError> {
        let query = format!(
            "UPDATE despachos SET \
                 cms_id = $2, search_index_id = $3, updated_at = $4 \
             WHERE id = $1 AND cms_id IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let updated = sqlx::query_as::<_, DespachoRow>(&query)
            .bind(id)
            .bind(cms_id)
            .bind(search_index_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => Ok(row),
            // Guarded update matched nothing: either the despacho is gone
            // or its correlation is already set; re-read to distinguish.
            None => self.get_by_id(id).await,
        }
    }

    /// Records the outcome of the latest outbound attempt
    pub async fn set_sync_outcome(
        &self,
        id: Uuid,
        succeeded: bool,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE despachos SET last_sync_succeeded = $2, last_sync_at = $3, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(succeeded)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Despacho", id));
        }
        Ok(())
    }

    /// Deletes an uncorrelated despacho
    ///
    /// Refused once a `cms_id` is set: correlated records are never
    /// hard-deleted here.
    pub async fn delete_uncorrelated(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM despachos WHERE id = $1 AND cms_id IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let row = self.get_by_id(id).await?;
            return Err(DatabaseError::ConstraintViolation(format!(
                "despacho {} is correlated with cms id {:?} and cannot be deleted",
                id, row.cms_id
            )));
        }
        Ok(())
    }
}
