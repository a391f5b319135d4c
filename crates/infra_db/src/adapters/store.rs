//! PostgreSQL implementation of the Store port
//!
//! Composes the row-level repositories and converts between row shapes and
//! domain shapes. Database errors fold into the shared port taxonomy here;
//! no caller above this point sees an sqlx error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use core_kernel::{CmsId, DespachoId, DomainPort, PortError, SedeId, SyncEntryId};
use domain_sync::{
    Correlation, Despacho, DespachoAggregate, NewDespacho, NewSede, PublicationState, Sede,
    StorePort, SyncAction, SyncQueueEntry, VerificationState,
};

use crate::repositories::{DespachoRepository, SedeRepository, SyncQueueRepository};

/// Store adapter backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresStoreAdapter {
    despachos: DespachoRepository,
    sedes: SedeRepository,
    queue: SyncQueueRepository,
}

impl PostgresStoreAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            despachos: DespachoRepository::new(pool.clone()),
            sedes: SedeRepository::new(pool.clone()),
            queue: SyncQueueRepository::new(pool),
        }
    }

    async fn load_aggregate(
        &self,
        despacho: Despacho,
    ) -> Result<DespachoAggregate, PortError> {
        let sedes: Vec<Sede> = self
            .sedes
            .list_active(*despacho.id.as_uuid())
            .await
            .map_err(PortError::from)?
            .into_iter()
            .map(|row| row.into_domain())
            .collect();
        Ok(DespachoAggregate { despacho, sedes })
    }
}

impl DomainPort for PostgresStoreAdapter {}

#[async_trait]
impl StorePort for PostgresStoreAdapter {
    async fn get_aggregate(&self, id: DespachoId) -> Result<DespachoAggregate, PortError> {
        let despacho = self
            .despachos
            .get_by_id(*id.as_uuid())
            .await
            .map_err(PortError::from)?
            .into_domain()?;
        self.load_aggregate(despacho).await
    }

    async fn find_by_cms_id(
        &self,
        cms_id: CmsId,
    ) -> Result<Option<DespachoAggregate>, PortError> {
        match self
            .despachos
            .find_by_cms_id(cms_id.value())
            .await
            .map_err(PortError::from)?
        {
            Some(row) => {
                let despacho = row.into_domain()?;
                Ok(Some(self.load_aggregate(despacho).await?))
            }
            None => Ok(None),
        }
    }

    async fn create_despacho(&self, new: NewDespacho) -> Result<Despacho, PortError> {
        let row = self.despachos.insert(new).await.map_err(PortError::from)?;
        Ok(row.into_domain()?)
    }

    async fn create_sede(&self, new: NewSede) -> Result<Sede, PortError> {
        let row = self.sedes.insert(new).await.map_err(PortError::from)?;
        Ok(row.into_domain())
    }

    async fn update_states(
        &self,
        id: DespachoId,
        verification: Option<VerificationState>,
        publication: Option<PublicationState>,
    ) -> Result<Despacho, PortError> {
        let row = self
            .despachos
            .update_states(*id.as_uuid(), verification, publication)
            .await
            .map_err(PortError::from)?;
        Ok(row.into_domain()?)
    }

    async fn assign_correlation(
        &self,
        id: DespachoId,
        cms_id: CmsId,
    ) -> Result<Correlation, PortError> {
        let row = self
            .despachos
            .assign_correlation(
                *id.as_uuid(),
                cms_id.value(),
                cms_id.search_index_id().as_str(),
            )
            .await
            .map_err(PortError::from)?;

        // The row reflects whichever correlation won; set-once semantics
        // mean an existing cms_id is never overwritten.
        let recorded = row.cms_id.map(CmsId::new).ok_or_else(|| {
            PortError::internal(format!(
                "correlation write for despacho {} left no cms id",
                id
            ))
        })?;
        Ok(Correlation {
            despacho_id: id,
            cms_id: recorded,
            search_index_id: recorded.search_index_id(),
        })
    }

    async fn set_sync_outcome(
        &self,
        id: DespachoId,
        succeeded: bool,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.despachos
            .set_sync_outcome(*id.as_uuid(), succeeded, at)
            .await
            .map_err(PortError::from)
    }

    async fn upsert_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<SyncQueueEntry, PortError> {
        let row = self
            .queue
            .upsert_failure(*despacho_id.as_uuid(), action, error, next_attempt_at)
            .await
            .map_err(PortError::from)?;
        Ok(row.into_domain()?)
    }

    async fn resolve_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
    ) -> Result<(), PortError> {
        self.queue
            .resolve(*despacho_id.as_uuid(), action)
            .await
            .map_err(PortError::from)
    }

    async fn due_queue_entries(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SyncQueueEntry>, PortError> {
        let rows = self.queue.due(now, limit).await.map_err(PortError::from)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(PortError::from))
            .collect()
    }

    async fn mark_queue_dead(&self, id: SyncEntryId, error: &str) -> Result<(), PortError> {
        self.queue
            .mark_dead(*id.as_uuid(), error)
            .await
            .map_err(PortError::from)
    }

    async fn delete_despacho(&self, id: DespachoId) -> Result<(), PortError> {
        self.despachos
            .delete_uncorrelated(*id.as_uuid())
            .await
            .map_err(|e| match e {
                crate::error::DatabaseError::ConstraintViolation(message) => {
                    PortError::Conflict { message }
                }
                other => other.into(),
            })
    }

    async fn deactivate_sede(&self, id: SedeId) -> Result<(), PortError> {
        self.sedes
            .deactivate(*id.as_uuid())
            .await
            .map_err(PortError::from)
    }
}
