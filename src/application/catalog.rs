use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::{
    api::{self, ApiClient},
    domain::{CatalogEntry, ConsoleSourceSet, ListingEntry, SourceUrl},
    utils::normalize_title,
};

/// Fixed-delay retry for mirror listing requests. No backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// A mirror that could not be listed. Never fatal to an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFailure {
    pub mirror: String,
    pub error: String,
}

/// Deduplicated listing of everything the mirrors of one console offer.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub console: String,
    pub entries: Vec<CatalogEntry>,
    /// Per-mirror file counts, in mirror order; failed mirrors are absent.
    pub loaded: Vec<(String, usize)>,
    pub failures: Vec<MirrorFailure>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone)]
pub struct SourceAggregator {
    client: ApiClient,
    sources: Arc<ConsoleSourceSet>,
    retry: RetryPolicy,
}

impl SourceAggregator {
    pub fn new(client: ApiClient, sources: Arc<ConsoleSourceSet>, retry: RetryPolicy) -> Self {
        Self {
            client,
            sources,
            retry,
        }
    }

    pub fn sources(&self) -> &ConsoleSourceSet {
        &self.sources
    }

    /// List one mirror, retrying per the policy.
    pub async fn fetch_one(&self, mirror_url: &str) -> api::Result<Vec<ListingEntry>> {
        let mut attempt = 0;
        loop {
            match self.client.fetch_listing(mirror_url).await {
                Ok(entries) => return Ok(entries),
                Err(e) if attempt < self.retry.retries => {
                    attempt += 1;
                    log::debug!("Retrying {mirror_url} after error: {e}");
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch every mirror of `console` concurrently and merge the results.
    ///
    /// An unknown console gives an empty catalog; callers decide how to
    /// report it.
    pub async fn aggregate(&self, console: &str) -> Catalog {
        let mirrors = self.sources.sources(console);
        if mirrors.is_empty() {
            log::info!("No mirrors configured for {console}");
        }

        let results = join_all(mirrors.iter().map(|mirror| self.fetch_one(mirror))).await;

        let mut listings = Vec::with_capacity(mirrors.len());
        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for (mirror, result) in mirrors.iter().zip(results) {
            match result {
                Ok(entries) => {
                    log::info!("Loaded {} ROMs from {mirror}", entries.len());
                    loaded.push((mirror.clone(), entries.len()));
                    listings.push((mirror.as_str(), entries));
                }
                Err(e) => {
                    log::warn!("Failed to load from {mirror}: {e}");
                    failures.push(MirrorFailure {
                        mirror: mirror.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Catalog {
            console: console.to_string(),
            entries: merge_listings(listings),
            loaded,
            failures,
        }
    }
}

/// Merge per-mirror listings (in mirror order) into one entry per canonical
/// name. Later mirrors only append their URL to an existing entry.
pub fn merge_listings<'a, I>(listings: I) -> Vec<CatalogEntry>
where
    I: IntoIterator<Item = (&'a str, Vec<ListingEntry>)>,
{
    let mut entries: Vec<CatalogEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (mirror, listing) in listings {
        for item in listing {
            let canonical = normalize_title(&item.name);
            if canonical.is_empty() {
                continue;
            }
            let source = SourceUrl {
                mirror_base_url: mirror.to_string(),
                full_url: item.url,
            };
            match index.get(&canonical) {
                Some(&i) => entries[i].add_source(source),
                None => {
                    index.insert(canonical.clone(), entries.len());
                    entries.push(CatalogEntry::new(canonical, item.extension, source));
                }
            }
        }
    }

    entries
}
