//! Pure, bidirectional mapping between the Store schema and the CMS schema
//!
//! Both representations are explicit tagged structures; the mapping owns no
//! I/O and is unit-testable without network access. Round-trip equivalence
//! holds for the fields both systems own; CMS-only rendering fields
//! (`link`, `featured_media`) pass through unmodified on import and are
//! ignored on export.

use serde::{Deserialize, Serialize};

use core_kernel::CmsId;

use crate::model::{
    DespachoAggregate, PublicationState, ScheduleEntry, Sede, SocialLinks, VerificationState,
};

/// CMS post status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmsStatus {
    Publish,
    Draft,
    Private,
}

/// Per-sede sub-object as the CMS stores it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsSedeDoc {
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub ciudad: Option<String>,
    #[serde(default)]
    pub provincia: Option<String>,
    #[serde(default)]
    pub codigo_postal: Option<String>,
    #[serde(default)]
    pub pais: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub es_principal: bool,
    #[serde(default)]
    pub areas_practica: Vec<String>,
    #[serde(default)]
    pub horario: Vec<CmsHorarioDoc>,
    #[serde(default)]
    pub redes: CmsRedesDoc,
}

/// Schedule row as the CMS stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsHorarioDoc {
    pub dia: String,
    pub horas: String,
}

/// Social links sub-object as the CMS stores it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsRedesDoc {
    #[serde(default)]
    pub web: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
}

/// A despacho document in the CMS representation
///
/// `title` and `content` may arrive HTML-entity-encoded from the CMS
/// renderer; [`from_cms`] decodes them before they are used as display
/// names or slug sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmsDespachoDoc {
    #[serde(default)]
    pub id: Option<CmsId>,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub status: CmsStatus,
    #[serde(default)]
    pub verificado: bool,
    #[serde(default)]
    pub sedes: Vec<CmsSedeDoc>,
    // Rendering fields owned by the CMS; passed through on import,
    // never written on export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<i64>,
}

/// Store-side candidate produced from an inbound CMS document
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCandidate {
    pub cms_id: Option<CmsId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub verification: VerificationState,
    pub publication: PublicationState,
    /// Present only when the document carries locality data; absence means
    /// the despacho is created without sedes and stays completable.
    pub principal_sede: Option<SedeData>,
}

/// Sede fields extracted from a CMS document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SedeData {
    pub street: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub practice_areas: Vec<String>,
    pub schedule: Vec<ScheduleEntry>,
    pub social: SocialLinks,
}

/// Maps a local aggregate to its CMS representation
pub fn to_cms(aggregate: &DespachoAggregate) -> CmsDespachoDoc {
    let despacho = &aggregate.despacho;
    CmsDespachoDoc {
        id: despacho.cms_id,
        title: despacho.name.clone(),
        slug: Some(despacho.slug.clone()),
        content: despacho.description.clone(),
        status: match despacho.publication {
            PublicationState::Published => CmsStatus::Publish,
            PublicationState::Draft => CmsStatus::Draft,
            PublicationState::Unlisted => CmsStatus::Private,
        },
        verificado: despacho.verification == VerificationState::Verified,
        sedes: aggregate
            .sedes
            .iter()
            .filter(|s| s.active)
            .map(sede_to_cms)
            .collect(),
        link: None,
        featured_media: None,
    }
}

fn sede_to_cms(sede: &Sede) -> CmsSedeDoc {
    CmsSedeDoc {
        direccion: sede.street.clone(),
        ciudad: Some(sede.city.clone()),
        provincia: sede.province.clone(),
        codigo_postal: sede.postal_code.clone(),
        pais: sede.country.clone(),
        telefono: sede.phone.clone(),
        email: sede.email.clone(),
        es_principal: sede.is_principal,
        areas_practica: sede.practice_areas.clone(),
        horario: sede
            .schedule
            .iter()
            .map(|e| CmsHorarioDoc {
                dia: e.day.clone(),
                horas: e.hours.clone(),
            })
            .collect(),
        redes: CmsRedesDoc {
            web: sede.social.website.clone(),
            linkedin: sede.social.linkedin.clone(),
            twitter: sede.social.twitter.clone(),
            facebook: sede.social.facebook.clone(),
        },
    }
}

/// Maps an inbound CMS document to a Store-side candidate
///
/// Entity-decodes rendered text before using it as a display name or slug
/// source. Locality data is taken from the principal sede sub-object, or
/// the first one when none is flagged principal.
pub fn from_cms(doc: &CmsDespachoDoc) -> ImportCandidate {
    let name = decode_entities(doc.title.trim());
    let slug = match doc.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(slug) => slug.trim().to_string(),
        None => slugify(&name),
    };

    let sede_doc = doc
        .sedes
        .iter()
        .find(|s| s.es_principal)
        .or_else(|| doc.sedes.first());

    ImportCandidate {
        cms_id: doc.id,
        name,
        slug,
        description: doc
            .content
            .as_deref()
            .map(|c| decode_entities(c))
            .filter(|c| !c.is_empty()),
        verification: if doc.verificado {
            VerificationState::Verified
        } else {
            VerificationState::Unverified
        },
        publication: match doc.status {
            CmsStatus::Publish => PublicationState::Published,
            CmsStatus::Draft => PublicationState::Draft,
            CmsStatus::Private => PublicationState::Unlisted,
        },
        principal_sede: sede_doc.and_then(sede_from_cms),
    }
}

fn sede_from_cms(doc: &CmsSedeDoc) -> Option<SedeData> {
    // Locality is the gate: no city means no sede, the despacho stays
    // completable on a later import.
    let city = doc.ciudad.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    Some(SedeData {
        street: doc.direccion.clone(),
        city: decode_entities(city),
        province: doc.provincia.clone(),
        postal_code: doc.codigo_postal.clone(),
        country: doc.pais.clone(),
        phone: doc.telefono.clone(),
        email: doc.email.clone(),
        practice_areas: doc.areas_practica.clone(),
        schedule: doc
            .horario
            .iter()
            .map(|h| ScheduleEntry {
                day: h.dia.clone(),
                hours: h.horas.clone(),
            })
            .collect(),
        social: SocialLinks {
            website: doc.redes.web.clone(),
            linkedin: doc.redes.linkedin.clone(),
            twitter: doc.redes.twitter.clone(),
            facebook: doc.redes.facebook.clone(),
        },
    })
}

/// Decodes the HTML entities the CMS renderer emits
///
/// Covers the named core set, the accented forms common in Spanish text,
/// and decimal/hex numeric references. Unknown entities are left intact.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            // Entities are short; anything longer is treated as literal text
            Some(end) if end <= 10 => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(num, 16).ok().and_then(char::from_u32);
    }
    if let Some(num) = entity.strip_prefix('#') {
        return num.parse::<u32>().ok().and_then(char::from_u32);
    }
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "mdash" => '—',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "uuml" => 'ü',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "Ntilde" => 'Ñ',
        "Uuml" => 'Ü',
        _ => return None,
    };
    Some(ch)
}

/// Derives a URL slug from a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        let mapped = match ch {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => Some('a'),
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => Some('e'),
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => Some('i'),
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => Some('o'),
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => Some('u'),
            'ñ' | 'Ñ' => Some('n'),
            'ç' | 'Ç' => Some('c'),
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some(c) => {
                slug.push(c);
                last_dash = false;
            }
            None if !last_dash => {
                slug.push('-');
                last_dash = true;
            }
            None => {}
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Despacho;
    use chrono::Utc;
    use core_kernel::{DespachoId, SedeId};

    fn aggregate() -> DespachoAggregate {
        let now = Utc::now();
        let id = DespachoId::new();
        DespachoAggregate {
            despacho: Despacho {
                id,
                cms_id: Some(CmsId::new(1001)),
                search_index_id: Some(CmsId::new(1001).search_index_id()),
                name: "García & Asociados".to_string(),
                slug: "garcia-asociados".to_string(),
                description: Some("Despacho especializado en civil".to_string()),
                verification: VerificationState::Verified,
                publication: PublicationState::Published,
                last_sync_succeeded: true,
                last_sync_at: Some(now),
                created_at: now,
                updated_at: now,
            },
            sedes: vec![Sede {
                id: SedeId::new(),
                despacho_id: id,
                is_principal: true,
                street: Some("Gran Vía 10".to_string()),
                city: "Madrid".to_string(),
                province: Some("Madrid".to_string()),
                postal_code: Some("28013".to_string()),
                country: Some("ES".to_string()),
                phone: Some("+34 910 000 000".to_string()),
                email: Some("info@garcia.example".to_string()),
                practice_areas: vec!["civil".to_string(), "mercantil".to_string()],
                schedule: vec![ScheduleEntry {
                    day: "lunes".to_string(),
                    hours: "09:00-18:00".to_string(),
                }],
                social: SocialLinks {
                    website: Some("https://garcia.example".to_string()),
                    ..Default::default()
                },
                active: true,
                created_at: now,
                updated_at: now,
            }],
        }
    }

    #[test]
    fn test_to_cms_maps_states_and_sedes() {
        let doc = to_cms(&aggregate());
        assert_eq!(doc.id, Some(CmsId::new(1001)));
        assert_eq!(doc.status, CmsStatus::Publish);
        assert!(doc.verificado);
        assert_eq!(doc.sedes.len(), 1);
        assert_eq!(doc.sedes[0].ciudad.as_deref(), Some("Madrid"));
        assert!(doc.sedes[0].es_principal);
        assert_eq!(doc.sedes[0].areas_practica.len(), 2);
        // Rendering fields are never exported
        assert!(doc.link.is_none());
        assert!(doc.featured_media.is_none());
    }

    #[test]
    fn test_to_cms_skips_inactive_sedes() {
        let mut agg = aggregate();
        agg.sedes[0].active = false;
        assert!(to_cms(&agg).sedes.is_empty());
    }

    #[test]
    fn test_from_cms_decodes_entities() {
        let doc = CmsDespachoDoc {
            id: Some(CmsId::new(2002)),
            title: "Garc&iacute;a &amp; Asociados".to_string(),
            slug: None,
            content: Some("Derecho civil &#038; mercantil".to_string()),
            status: CmsStatus::Publish,
            verificado: false,
            sedes: vec![],
            link: Some("https://cms.example/despacho/garcia".to_string()),
            featured_media: None,
        };
        let candidate = from_cms(&doc);
        assert_eq!(candidate.name, "García & Asociados");
        assert_eq!(candidate.slug, "garcia-asociados");
        assert_eq!(
            candidate.description.as_deref(),
            Some("Derecho civil & mercantil")
        );
        assert!(candidate.principal_sede.is_none());
    }

    #[test]
    fn test_from_cms_requires_locality_for_sede() {
        let mut doc = to_cms(&aggregate());
        doc.sedes[0].ciudad = None;
        assert!(from_cms(&doc).principal_sede.is_none());

        doc.sedes[0].ciudad = Some("  ".to_string());
        assert!(from_cms(&doc).principal_sede.is_none());
    }

    #[test]
    fn test_from_cms_prefers_principal_sede() {
        let mut doc = to_cms(&aggregate());
        doc.sedes.insert(
            0,
            CmsSedeDoc {
                ciudad: Some("Valencia".to_string()),
                es_principal: false,
                ..Default::default()
            },
        );
        let candidate = from_cms(&doc);
        assert_eq!(candidate.principal_sede.unwrap().city, "Madrid");
    }

    #[test]
    fn test_round_trip_of_jointly_owned_fields() {
        let agg = aggregate();
        let candidate = from_cms(&to_cms(&agg));
        assert_eq!(candidate.name, agg.despacho.name);
        assert_eq!(candidate.slug, agg.despacho.slug);
        assert_eq!(candidate.description, agg.despacho.description);
        assert_eq!(candidate.verification, agg.despacho.verification);
        assert_eq!(candidate.publication, agg.despacho.publication);
        let sede = candidate.principal_sede.unwrap();
        assert_eq!(sede.city, agg.sedes[0].city);
        assert_eq!(sede.practice_areas, agg.sedes[0].practice_areas);
        assert_eq!(sede.schedule, agg.sedes[0].schedule);
        assert_eq!(sede.social, agg.sedes[0].social);
    }

    #[test]
    fn test_decode_entities_numeric_forms() {
        assert_eq!(decode_entities("Mu&#241;oz"), "Muñoz");
        assert_eq!(decode_entities("Mu&#xF1;oz"), "Muñoz");
        assert_eq!(decode_entities("P&eacute;rez &#8211; L&oacute;pez"), "Pérez – López");
    }

    #[test]
    fn test_decode_entities_leaves_unknown_intact() {
        assert_eq!(decode_entities("a &unknown; b"), "a &unknown; b");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("fish & chips;"), "fish & chips;");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("García & Asociados"), "garcia-asociados");
        assert_eq!(slugify("  Bufete   Muñoz  "), "bufete-munoz");
        assert_eq!(slugify("Peña, Ruiz y Cía."), "pena-ruiz-y-cia");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slugify_emits_only_url_safe_chars(input in ".{0,64}") {
                let slug = slugify(&input);
                prop_assert!(slug
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                prop_assert!(!slug.starts_with('-'));
                prop_assert!(!slug.ends_with('-'));
            }

            #[test]
            fn decode_entities_is_identity_without_ampersands(input in "[^&]{0,64}") {
                prop_assert_eq!(decode_entities(&input), input);
            }

            #[test]
            fn decode_entities_never_panics(input in ".{0,64}") {
                let _ = decode_entities(&input);
            }
        }
    }
}
