//! Wire shapes of the CMS REST API
//!
//! The CMS serves despacho posts with rendered (entity-encoded) text fields
//! nested under `rendered` keys. These DTOs match the wire exactly; the
//! domain-side document shape lives in `domain_sync` and the conversions
//! below bridge the two. Rendered text is passed through still encoded;
//! decoding happens in the pure transform, not here.

use serde::{Deserialize, Serialize};

use domain_sync::{CmsDespachoDoc, CmsSedeDoc, CmsStatus};

/// Rendered text field as the CMS serves it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WpRendered {
    #[serde(default)]
    pub rendered: String,
}

/// Structured despacho fields stored as post meta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WpDespachoMeta {
    #[serde(default)]
    pub verificado: bool,
    #[serde(default)]
    pub sedes: Vec<CmsSedeDoc>,
}

/// A despacho post as returned by the CMS
#[derive(Debug, Clone, Deserialize)]
pub struct WpDespachoResponse {
    pub id: i64,
    #[serde(default)]
    pub title: WpRendered,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<WpRendered>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub meta: WpDespachoMeta,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub featured_media: Option<i64>,
}

fn default_status() -> String {
    "draft".to_string()
}

/// The payload sent on create/update
#[derive(Debug, Clone, Serialize)]
pub struct WpDespachoRequest {
    pub title: String,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub status: String,
    pub meta: WpDespachoMeta,
}

/// Acknowledgement of a create/update; only the id matters to the caller
#[derive(Debug, Clone, Deserialize)]
pub struct WpUpsertAck {
    pub id: i64,
}

pub(crate) fn status_to_wire(status: CmsStatus) -> &'static str {
    match status {
        CmsStatus::Publish => "publish",
        CmsStatus::Draft => "draft",
        CmsStatus::Private => "private",
    }
}

pub(crate) fn status_from_wire(status: &str) -> CmsStatus {
    match status {
        "publish" => CmsStatus::Publish,
        "private" => CmsStatus::Private,
        // Pending/future/etc. are not public; treat them as drafts
        _ => CmsStatus::Draft,
    }
}

impl From<WpDespachoResponse> for CmsDespachoDoc {
    fn from(wp: WpDespachoResponse) -> Self {
        CmsDespachoDoc {
            id: Some(wp.id.into()),
            title: wp.title.rendered,
            slug: wp.slug,
            content: wp.content.map(|c| c.rendered).filter(|c| !c.is_empty()),
            status: status_from_wire(&wp.status),
            verificado: wp.meta.verificado,
            sedes: wp.meta.sedes,
            link: wp.link,
            featured_media: wp.featured_media,
        }
    }
}

impl From<&CmsDespachoDoc> for WpDespachoRequest {
    fn from(doc: &CmsDespachoDoc) -> Self {
        WpDespachoRequest {
            title: doc.title.clone(),
            slug: doc.slug.clone(),
            content: doc.content.clone(),
            status: status_to_wire(doc.status).to_string(),
            meta: WpDespachoMeta {
                verificado: doc.verificado,
                sedes: doc.sedes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes_rendered_fields() {
        let json = r#"{
            "id": 1001,
            "title": {"rendered": "Garc&iacute;a &amp; Asociados"},
            "slug": "garcia-asociados",
            "content": {"rendered": "<p>Perfil</p>"},
            "status": "publish",
            "meta": {
                "verificado": true,
                "sedes": [{"ciudad": "Madrid", "es_principal": true}]
            },
            "link": "https://cms.example/despacho/garcia-asociados"
        }"#;
        let wp: WpDespachoResponse = serde_json::from_str(json).unwrap();
        let doc: CmsDespachoDoc = wp.into();

        assert_eq!(doc.id.unwrap().value(), 1001);
        // Wire text stays encoded; decoding belongs to the transform
        assert_eq!(doc.title, "Garc&iacute;a &amp; Asociados");
        assert_eq!(doc.status, CmsStatus::Publish);
        assert!(doc.verificado);
        assert_eq!(doc.sedes.len(), 1);
        assert_eq!(doc.link.as_deref(), Some("https://cms.example/despacho/garcia-asociados"));
    }

    #[test]
    fn test_response_tolerates_minimal_payload() {
        let wp: WpDespachoResponse = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        let doc: CmsDespachoDoc = wp.into();
        assert_eq!(doc.id.unwrap().value(), 7);
        assert_eq!(doc.status, CmsStatus::Draft);
        assert!(doc.sedes.is_empty());
    }

    #[test]
    fn test_unknown_status_maps_to_draft() {
        assert_eq!(status_from_wire("future"), CmsStatus::Draft);
        assert_eq!(status_from_wire("publish"), CmsStatus::Publish);
        assert_eq!(status_from_wire("private"), CmsStatus::Private);
    }

    #[test]
    fn test_request_carries_meta() {
        let doc = CmsDespachoDoc {
            id: None,
            title: "Bufete Ejemplo".to_string(),
            slug: Some("bufete-ejemplo".to_string()),
            content: None,
            status: CmsStatus::Publish,
            verificado: true,
            sedes: vec![CmsSedeDoc {
                ciudad: Some("Madrid".to_string()),
                es_principal: true,
                ..Default::default()
            }],
            link: None,
            featured_media: None,
        };
        let request = WpDespachoRequest::from(&doc);
        assert_eq!(request.status, "publish");
        assert!(request.meta.verificado);
        assert_eq!(request.meta.sedes.len(), 1);

        // Rendering fields never serialize into the request
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("link").is_none());
        assert!(json.get("featured_media").is_none());
    }
}
