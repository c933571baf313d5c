use super::GroundingSource;
use crate::config::GroundingConfig;
use crate::providers::Citation;

/// Keeps only citations that point at allow-listed domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAllowList {
    domains: Vec<String>,
    fallback_title: String,
}

impl DomainAllowList {
    pub fn new<I, S>(domains: I, fallback_title: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            domains,
            fallback_title: fallback_title.into(),
        }
    }

    pub fn from_config(config: &GroundingConfig) -> Self {
        Self::new(&config.allowed_domains, config.fallback_title.clone())
    }

    /// True when `uri` mentions an allowed domain anywhere, so search
    /// redirect links that carry the target in their query are kept too.
    pub fn allows(&self, uri: &str) -> bool {
        !uri.is_empty() && self.domains.iter().any(|domain| uri.contains(domain.as_str()))
    }

    /// Maps citations to display sources in arrival order, dropping
    /// disallowed ones.
    pub fn filter(&self, citations: &[Citation]) -> Vec<GroundingSource> {
        let sources: Vec<GroundingSource> = citations
            .iter()
            .filter_map(|citation| {
                let uri = citation.uri.as_deref().filter(|uri| self.allows(uri))?;
                let title = citation
                    .title
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(self.fallback_title.as_str());
                Some(GroundingSource {
                    title: title.to_string(),
                    uri: uri.to_string(),
                })
            })
            .collect();

        if sources.len() < citations.len() {
            tracing::debug!(
                kept = sources.len(),
                total = citations.len(),
                "filtered grounding citations"
            );
        }
        sources
    }
}

impl Default for DomainAllowList {
    fn default() -> Self {
        Self::from_config(&GroundingConfig::default())
    }
}
