use std::time::Duration;

use crate::{
    api::HashResult,
    application::catalog::{Catalog, MirrorFailure, SourceAggregator},
    domain::{CatalogEntry, ListingEntry, MatchResult},
    utils::{extract_arcade_key, normalize_filename, normalize_title},
};

pub const ARCADE: &str = "Arcade";

/// Search key for `title` on `console`. Arcade sets are matched by their
/// short ROM name.
pub fn derive_title(title: &str, console: &str) -> String {
    if console == ARCADE {
        extract_arcade_key(title)
    } else {
        normalize_title(title)
    }
}

/// Pick the hash record to take a title from: the first unpatched record,
/// else the first record. This is first-wins, not a "best version" choice.
pub fn select_unpatched(results: &[HashResult]) -> Option<&HashResult> {
    results
        .iter()
        .find(|r| !r.is_patched())
        .or_else(|| results.first())
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// First listing entry whose label contains `derived` (case-insensitive).
pub fn first_listing_match<'a>(entries: &'a [ListingEntry], derived: &str) -> Option<&'a ListingEntry> {
    if derived.is_empty() {
        return None;
    }
    let needle = derived.to_lowercase();
    entries.iter().find(|e| contains_ignore_case(&e.label, &needle))
}

/// First catalog entry whose name contains `derived` (case-insensitive).
pub fn first_catalog_match<'a>(catalog: &'a Catalog, derived: &str) -> Option<&'a CatalogEntry> {
    if derived.is_empty() {
        return None;
    }
    let needle = derived.to_lowercase();
    catalog.entries.iter().find(|e| {
        contains_ignore_case(e.canonical_name(), &needle) || contains_ignore_case(&e.file_name(), &needle)
    })
}

#[derive(Clone)]
pub struct Matcher {
    aggregator: SourceAggregator,
    mirror_delay: Duration,
}

impl Matcher {
    pub fn new(aggregator: SourceAggregator, mirror_delay: Duration) -> Self {
        Self {
            aggregator,
            mirror_delay,
        }
    }

    /// Resolve `title` against a catalog that was already aggregated.
    pub fn resolve_in_catalog(&self, title: &str, catalog: &Catalog) -> MatchResult {
        if !self.aggregator.sources().is_supported(&catalog.console) {
            return MatchResult::NoSourceForConsole;
        }
        let derived = derive_title(title, &catalog.console);
        first_catalog_match(catalog, &derived)
            .and_then(|entry| {
                entry.primary_source().map(|source| MatchResult::Matched {
                    url: source.full_url.clone(),
                    filename: normalize_filename(&entry.file_name()),
                })
            })
            .unwrap_or(MatchResult::NoMatch)
    }

    pub async fn find_and_resolve(&self, title: &str, console: &str) -> MatchResult {
        self.find_and_resolve_with(title, console, |_| {}).await
    }

    /// Walk the console's mirrors in order, one listing at a time, and stop
    /// at the first that has a match. Mirror failures go to `on_failure`.
    pub async fn find_and_resolve_with<F>(&self, title: &str, console: &str, mut on_failure: F) -> MatchResult
    where
        F: FnMut(&MirrorFailure),
    {
        let mirrors = self.aggregator.sources().sources(console);
        if mirrors.is_empty() {
            return MatchResult::NoSourceForConsole;
        }

        let derived = derive_title(title, console);
        if derived.is_empty() {
            log::warn!("Title {title:?} has no searchable text");
            return MatchResult::NoMatch;
        }

        for (i, mirror) in mirrors.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.mirror_delay).await;
            }
            match self.aggregator.fetch_one(mirror).await {
                Ok(entries) => {
                    if let Some(entry) = first_listing_match(&entries, &derived) {
                        log::info!("Match for {derived:?}: {}", entry.url);
                        return MatchResult::Matched {
                            url: entry.url.clone(),
                            filename: normalize_filename(&entry.file_name()),
                        };
                    }
                }
                Err(e) => {
                    let failure = MirrorFailure {
                        mirror: mirror.clone(),
                        error: e.to_string(),
                    };
                    log::warn!("Error accessing {}: {}", failure.mirror, failure.error);
                    on_failure(&failure);
                }
            }
        }

        MatchResult::NoMatch
    }
}
