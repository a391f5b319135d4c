//! Test data builders
//!
//! Builder patterns for constructing test data with sensible defaults, so
//! tests specify only the fields they care about.

use chrono::Utc;

use core_kernel::{CmsId, DespachoId, SedeId};
use domain_sync::{
    CmsDespachoDoc, CmsSedeDoc, CmsStatus, Despacho, DespachoAggregate, PublicationState,
    ScheduleEntry, Sede, SocialLinks, VerificationState,
};

/// Builder for a despacho row
pub struct DespachoBuilder {
    id: DespachoId,
    cms_id: Option<CmsId>,
    name: String,
    slug: Option<String>,
    description: Option<String>,
    verification: VerificationState,
    publication: PublicationState,
    last_sync_succeeded: bool,
}

impl Default for DespachoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DespachoBuilder {
    pub fn new() -> Self {
        Self {
            id: DespachoId::new(),
            cms_id: None,
            name: "Bufete Ejemplo".to_string(),
            slug: None,
            description: Some("Despacho generalista".to_string()),
            verification: VerificationState::Unverified,
            publication: PublicationState::Published,
            last_sync_succeeded: false,
        }
    }

    pub fn with_id(mut self, id: DespachoId) -> Self {
        self.id = id;
        self
    }

    pub fn with_cms_id(mut self, cms_id: i64) -> Self {
        self.cms_id = Some(CmsId::new(cms_id));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn verified(mut self) -> Self {
        self.verification = VerificationState::Verified;
        self
    }

    pub fn with_publication(mut self, publication: PublicationState) -> Self {
        self.publication = publication;
        self
    }

    pub fn synced(mut self) -> Self {
        self.last_sync_succeeded = true;
        self
    }

    pub fn build(self) -> Despacho {
        let now = Utc::now();
        Despacho {
            id: self.id,
            cms_id: self.cms_id,
            search_index_id: self.cms_id.map(|id| id.search_index_id()),
            slug: self
                .slug
                .unwrap_or_else(|| domain_sync::slugify(&self.name)),
            name: self.name,
            description: self.description,
            verification: self.verification,
            publication: self.publication,
            last_sync_succeeded: self.last_sync_succeeded,
            last_sync_at: if self.last_sync_succeeded {
                Some(now)
            } else {
                None
            },
            created_at: now,
            updated_at: now,
        }
    }
}

/// Builder for a sede row
pub struct SedeBuilder {
    despacho_id: DespachoId,
    is_principal: bool,
    city: String,
    street: Option<String>,
    practice_areas: Vec<String>,
    active: bool,
}

impl SedeBuilder {
    pub fn for_despacho(despacho_id: DespachoId) -> Self {
        Self {
            despacho_id,
            is_principal: true,
            city: "Madrid".to_string(),
            street: Some("Calle Mayor 1".to_string()),
            practice_areas: vec!["civil".to_string()],
            active: true,
        }
    }

    pub fn secondary(mut self) -> Self {
        self.is_principal = false;
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> Sede {
        let now = Utc::now();
        Sede {
            id: SedeId::new(),
            despacho_id: self.despacho_id,
            is_principal: self.is_principal,
            street: self.street,
            city: self.city,
            province: Some("Madrid".to_string()),
            postal_code: Some("28001".to_string()),
            country: Some("ES".to_string()),
            phone: Some("+34 910 000 000".to_string()),
            email: None,
            practice_areas: self.practice_areas,
            schedule: vec![ScheduleEntry {
                day: "lunes".to_string(),
                hours: "09:00-18:00".to_string(),
            }],
            social: SocialLinks::default(),
            active: self.active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Builder for an inbound CMS document
pub struct CmsDocBuilder {
    id: Option<CmsId>,
    title: String,
    status: CmsStatus,
    verificado: bool,
    city: Option<String>,
}

impl Default for CmsDocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CmsDocBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            title: "Bufete Remoto".to_string(),
            status: CmsStatus::Publish,
            verificado: false,
            city: Some("Sevilla".to_string()),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(CmsId::new(id));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn verified(mut self) -> Self {
        self.verificado = true;
        self
    }

    pub fn without_locality(mut self) -> Self {
        self.city = None;
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn build(self) -> CmsDespachoDoc {
        let sedes = match self.city {
            Some(city) => vec![CmsSedeDoc {
                ciudad: Some(city),
                direccion: Some("Avenida de la Constitución 5".to_string()),
                es_principal: true,
                ..Default::default()
            }],
            None => vec![],
        };
        CmsDespachoDoc {
            id: self.id,
            title: self.title,
            slug: None,
            content: Some("Perfil del despacho".to_string()),
            status: self.status,
            verificado: self.verificado,
            sedes,
            link: None,
            featured_media: None,
        }
    }
}

/// Convenience for a full aggregate
pub fn aggregate_with_sede(despacho: Despacho) -> DespachoAggregate {
    let sede = SedeBuilder::for_despacho(despacho.id).build();
    DespachoAggregate {
        despacho,
        sedes: vec![sede],
    }
}
