use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::config::SourceConfig;
use crate::models::{Leaning, MediaSource};

/// Lowercase a hostname and strip a leading `www.`. All domain comparisons
/// go through this.
pub fn normalize_domain(domain: &str) -> String {
    let d = domain.trim().to_lowercase();
    d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
}

/// Extract the normalized hostname from a URL, or None if it doesn't parse.
pub fn host_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    parsed.host_str().map(normalize_domain)
}

/// The allow-listed set of news outlets. Built from config, or from the
/// default catalog when the config declares none.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<MediaSource>,
}

impl SourceRegistry {
    pub fn from_config(configured: &[SourceConfig]) -> Self {
        let sources = if configured.is_empty() {
            default_catalog()
        } else {
            configured
                .iter()
                .map(|s| MediaSource {
                    id: Uuid::new_v4().to_string(),
                    domain: normalize_domain(&s.domain),
                    name: s.name.clone(),
                    leaning: s.leaning,
                    active: s.active,
                    description: s.description.clone(),
                })
                .collect()
        };
        SourceRegistry { sources }
    }

    pub fn sources(&self) -> &[MediaSource] {
        &self.sources
    }

    /// Every registered domain, active or not. The active flag gates what a
    /// run requests; the allow-list gates what the search adapter returns.
    pub fn allowed_domains(&self) -> HashSet<String> {
        self.sources.iter().map(|s| s.domain.clone()).collect()
    }

    pub fn active_domains(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| s.active)
            .map(|s| s.domain.clone())
            .collect()
    }

    /// Normalized domain → leaning label, for analysis context.
    pub fn leanings(&self) -> HashMap<String, String> {
        self.sources
            .iter()
            .map(|s| (s.domain.clone(), s.leaning.label().to_string()))
            .collect()
    }
}

/// The default outlet catalog from the original deployment.
fn default_catalog() -> Vec<MediaSource> {
    const CATALOG: &[(&str, &str, Leaning)] = &[
        ("kayhan.ir", "Kayhan", Leaning::Principlist),
        ("rajanews.com", "Raja News", Leaning::Principlist),
        ("irna.ir", "IRNA", Leaning::State),
        ("resalat-news.com", "Resalat", Leaning::Principlist),
        ("afkarnews.com", "Afkar News", Leaning::Principlist),
        ("irannewspaper.ir", "Iran Newspaper", Leaning::State),
        ("jamejamonline.ir", "Jame Jam", Leaning::State),
        ("hamshahrionline.ir", "Hamshahri", Leaning::State),
        ("donya-e-eqtesad.com", "Donya-e-Eqtesad", Leaning::Economic),
        ("ettelaat.com", "Ettelaat", Leaning::Moderate),
        ("etemadonline.com", "Etemad", Leaning::Reformist),
        ("sharghdaily.com", "Shargh", Leaning::Reformist),
        ("aftabyazdonline.ir", "Aftab Yazd", Leaning::Reformist),
        ("nournews.ir", "Nour News", Leaning::State),
        ("mehrnews.com", "Mehr News", Leaning::Principlist),
        ("armanmeli.ir", "Arman Meli", Leaning::Reformist),
        ("hammihanonline.ir", "Hammihan", Leaning::Reformist),
    ];

    CATALOG
        .iter()
        .map(|(domain, name, leaning)| MediaSource {
            id: Uuid::new_v4().to_string(),
            domain: (*domain).to_string(),
            name: (*name).to_string(),
            leaning: *leaning,
            active: true,
            description: None,
        })
        .collect()
}
