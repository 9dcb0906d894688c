use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod youtube;

use crate::media::CandidateRef;
use crate::Result;

/// One search hit as reported by a provider; either field may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: Option<String>,
    pub title: Option<String>,
}

/// A service that finds candidate media for a free-text query
///
/// `Ok` carries the provider's hits in ranking order; `None` marks a hit the
/// provider returned without any data. `Err` means the query itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<Option<SearchEntry>>>;

    /// Get the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Turns an artist name and a count into an ordered list of candidates
pub struct MediaLocator {
    provider: Arc<dyn DiscoveryProvider>,
    query_suffix: String,
}

impl MediaLocator {
    pub fn new(provider: Arc<dyn DiscoveryProvider>, query_suffix: impl Into<String>) -> Self {
        Self {
            provider,
            query_suffix: query_suffix.into(),
        }
    }

    pub fn query_for(&self, subject: &str) -> String {
        let suffix = self.query_suffix.trim();
        if suffix.is_empty() {
            subject.trim().to_string()
        } else {
            format!("{} {}", subject.trim(), suffix)
        }
    }

    /// Find up to `count` candidates for `subject`
    ///
    /// Never fails: a provider error yields an empty list, a short answer yields
    /// a shorter list, and hits without an identifier are skipped. Ordinals are
    /// positions in the provider's answer, so skipped hits leave gaps.
    pub async fn locate(&self, subject: &str, count: usize) -> Vec<CandidateRef> {
        if count == 0 {
            return Vec::new();
        }

        let query = self.query_for(subject);
        tracing::info!(
            "Searching {} for {} result(s): {}",
            self.provider.provider_name(),
            count,
            query
        );

        let entries = match self.provider.search(&query, count).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Search failed: {}", e);
                return Vec::new();
            }
        };

        if entries.len() < count {
            tracing::warn!(
                "Only found {} result(s) out of {} requested",
                entries.len(),
                count
            );
        }

        let mut candidates = Vec::with_capacity(count.min(entries.len()));
        for (ordinal, entry) in entries.into_iter().take(count).enumerate() {
            let Some(entry) = entry else {
                tracing::debug!("Skipping empty search result #{}", ordinal);
                continue;
            };

            let source_id = match entry.id.map(|id| id.trim().to_string()) {
                Some(id) if !id.is_empty() => id,
                _ => {
                    tracing::debug!("Skipping search result #{} without an id", ordinal);
                    continue;
                }
            };

            candidates.push(CandidateRef {
                source_id,
                title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
                ordinal,
            });
        }

        tracing::info!("Located {} candidate(s)", candidates.len());
        candidates
    }
}
