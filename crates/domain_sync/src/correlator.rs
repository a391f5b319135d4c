//! Identifier correlator
//!
//! Owns the {store-id ↔ cms-id ↔ search-index-id} mapping and the
//! create-vs-update / import-vs-already-imported decisions. The pre-check
//! here is advisory only: the uniqueness constraint on `cms_id` at the
//! Store layer is what actually breaks concurrent-import races.

use std::sync::Arc;

use core_kernel::{CmsId, DespachoId, PortError};

use crate::model::Correlation;
use crate::ports::StorePort;

/// Decision for an inbound record bearing a CMS id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDecision {
    /// A correlation exists and the despacho has at least one sede
    AlreadyImported(Correlation),
    /// A correlation exists but the despacho has no sedes; the import
    /// should complete the existing record, not create a second one
    Completable {
        despacho_id: DespachoId,
        correlation: Correlation,
    },
    /// No despacho is correlated with this CMS id
    New,
}

/// Resolves correlations between the Store and the CMS
#[derive(Clone)]
pub struct Correlator {
    store: Arc<dyn StorePort>,
}

impl Correlator {
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        Self { store }
    }

    /// Returns the correlation for a despacho, or NotFound when it has none
    pub async fn lookup_by_store_id(&self, id: DespachoId) -> Result<Correlation, PortError> {
        let aggregate = self.store.get_aggregate(id).await?;
        aggregate
            .despacho
            .correlation()
            .ok_or_else(|| PortError::not_found("Correlation", id))
    }

    /// Returns the correlation holding a CMS id, or NotFound
    pub async fn lookup_by_cms_id(&self, cms_id: CmsId) -> Result<Correlation, PortError> {
        match self.store.find_by_cms_id(cms_id).await? {
            Some(aggregate) => aggregate
                .despacho
                .correlation()
                .ok_or_else(|| PortError::not_found("Correlation", cms_id)),
            None => Err(PortError::not_found("Correlation", cms_id)),
        }
    }

    /// Decides how an inbound record with this CMS id should be handled
    ///
    /// A despacho row alone does not make a record "already imported": a
    /// correlated despacho with zero sedes was left behind by a partial
    /// import and remains eligible for completion.
    pub async fn resolve(&self, cms_id: CmsId) -> Result<ImportDecision, PortError> {
        match self.store.find_by_cms_id(cms_id).await? {
            None => Ok(ImportDecision::New),
            Some(aggregate) => {
                let correlation = aggregate.despacho.correlation().ok_or_else(|| {
                    PortError::internal(format!(
                        "store returned despacho {} for cms id {} without correlation",
                        aggregate.despacho.id, cms_id
                    ))
                })?;
                if aggregate.is_imported() {
                    Ok(ImportDecision::AlreadyImported(correlation))
                } else {
                    Ok(ImportDecision::Completable {
                        despacho_id: aggregate.despacho.id,
                        correlation,
                    })
                }
            }
        }
    }
}
