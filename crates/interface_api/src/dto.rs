//! Request/response data transfer objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_sync::{
    decode_entities, CmsDespachoDoc, CmsSedeDoc, CmsStatus, Despacho, PublicationState,
    VerificationState,
};

/// Body of the internal sync-trigger endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub despacho_id: Uuid,
}

/// Outcome of a sync trigger
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub despacho_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueued: Option<bool>,
}

/// Inbound webhook payload
///
/// Lenient by design: only the external id is mandatory, and its absence is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub verificado: bool,
    #[serde(default)]
    pub sedes: Vec<CmsSedeDoc>,
}

impl WebhookPayload {
    /// Normalizes the payload into the domain-side document shape
    pub fn into_doc(self) -> CmsDespachoDoc {
        CmsDespachoDoc {
            id: self.id.map(Into::into),
            title: self.title.unwrap_or_default(),
            slug: self.slug,
            content: self.content,
            status: match self.status.as_deref() {
                Some("publish") => CmsStatus::Publish,
                Some("private") => CmsStatus::Private,
                _ => CmsStatus::Draft,
            },
            verificado: self.verificado,
            sedes: self.sedes,
            link: None,
            featured_media: None,
        }
    }
}

/// Body of the manual import endpoint
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[validate(range(min = 1, message = "cmsId must be a positive id"))]
    pub cms_id: i64,
}

/// Outcome of an inbound import
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// One of "imported", "completed", "alreadyImported"
    pub result: String,
    pub despacho_id: Uuid,
    pub object_id: i64,
}

/// Query string of the CMS search proxy
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200, message = "q must be 1-200 characters"))]
    pub q: String,
    pub per_page: Option<u32>,
}

/// One row of the manual-import search results
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: Option<i64>,
    pub title: String,
    pub slug: Option<String>,
    pub already_imported: bool,
}

/// Published-total response
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub total: u64,
}

/// Verification mutation body
#[derive(Debug, Deserialize)]
pub struct UpdateVerificationRequest {
    pub state: VerificationState,
}

/// Publication mutation body
#[derive(Debug, Deserialize)]
pub struct UpdatePublicationRequest {
    pub state: PublicationState,
}

/// Despacho representation returned by mutation endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DespachoResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cms_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_index_id: Option<String>,
    pub name: String,
    pub slug: String,
    pub verification: VerificationState,
    pub publication: PublicationState,
    pub last_sync_succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Despacho> for DespachoResponse {
    fn from(d: Despacho) -> Self {
        Self {
            id: *d.id.as_uuid(),
            cms_id: d.cms_id.map(|c| c.value()),
            search_index_id: d.search_index_id.map(|s| s.to_string()),
            name: d.name,
            slug: d.slug,
            verification: d.verification,
            publication: d.publication,
            last_sync_succeeded: d.last_sync_succeeded,
            last_sync_at: d.last_sync_at,
        }
    }
}

/// Result of the best-effort push that follows a local mutation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSyncStatus {
    pub success: bool,
    pub enqueued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the state-mutation endpoints
///
/// The mutation itself always committed when this body is returned; `sync`
/// only reports what happened to the follow-up push.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub despacho: DespachoResponse,
    pub sync: MutationSyncStatus,
}

impl SearchResultItem {
    pub fn from_doc(doc: &CmsDespachoDoc, already_imported: bool) -> Self {
        Self {
            id: doc.id.map(|c| c.value()),
            title: decode_entities(&doc.title),
            slug: doc.slug.clone(),
            already_imported,
        }
    }
}
