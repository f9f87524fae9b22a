use std::path::PathBuf;

/// One file link pulled out of a mirror's directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Decoded file name without its extension.
    pub name: String,
    /// Extension including the leading dot, e.g. `.zip`.
    pub extension: String,
    /// Absolute URL the file can be fetched from.
    pub url: String,
    /// Full decoded label shown for the link (title attribute or text).
    pub label: String,
}

impl ListingEntry {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// A mirror that can serve a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    pub mirror_base_url: String,
    pub full_url: String,
}

/// Deduplicated catalog record; one per canonical name per console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    canonical_name: String,
    pub extension: String,
    pub source_urls: Vec<SourceUrl>,
}

impl CatalogEntry {
    pub fn new(canonical_name: String, extension: String, source: SourceUrl) -> Self {
        Self {
            canonical_name,
            extension,
            source_urls: vec![source],
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Records another mirror for this entry. The same URL is never listed twice.
    pub fn add_source(&mut self, source: SourceUrl) {
        if !self.source_urls.iter().any(|s| s.full_url == source.full_url) {
            self.source_urls.push(source);
        }
    }

    pub fn primary_source(&self) -> Option<&SourceUrl> {
        self.source_urls.first()
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.canonical_name, self.extension)
    }
}

/// One claim to resolve into a downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTask {
    pub game_id: u64,
    pub console_name: String,
    pub raw_achievement_title: String,
}

/// Terminal state of a [`ResolutionTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Downloaded(PathBuf),
    SkippedExists(PathBuf),
    NoMatch,
    Error(String),
}

impl TaskOutcome {
    /// Downloads and already-present files both count as success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded(_) | Self::SkippedExists(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub filename: String,
    pub bytes_downloaded: u64,
    /// 0 when the server did not declare a length.
    pub total_bytes: u64,
}

impl DownloadProgress {
    /// Fraction complete, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f32> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.bytes_downloaded as f32 / self.total_bytes as f32).min(1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched { url: String, filename: String },
    NoSourceForConsole,
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    FetchingClaims,
    SelectingTopN,
    ResolvingTitles,
    MatchingAndDownloading,
    Done,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(mirror: &str, url: &str) -> SourceUrl {
        SourceUrl {
            mirror_base_url: mirror.to_string(),
            full_url: url.to_string(),
        }
    }

    #[test]
    fn test_catalog_entry_keeps_mirror_order_without_duplicates() {
        let mut entry = CatalogEntry::new(
            "Tetris".to_string(),
            ".zip".to_string(),
            source("https://a/", "https://a/Tetris.zip"),
        );
        entry.add_source(source("https://b/", "https://b/Tetris.zip"));
        entry.add_source(source("https://a/", "https://a/Tetris.zip"));

        assert_eq!(entry.canonical_name(), "Tetris");
        assert_eq!(entry.source_urls.len(), 2);
        assert_eq!(entry.primary_source().unwrap().mirror_base_url, "https://a/");
        assert_eq!(entry.file_name(), "Tetris.zip");
    }

    #[test]
    fn test_progress_fraction() {
        let mut p = DownloadProgress {
            filename: "x.zip".to_string(),
            bytes_downloaded: 50,
            total_bytes: 0,
        };
        assert_eq!(p.fraction(), None);
        p.total_bytes = 200;
        assert_eq!(p.fraction(), Some(0.25));
    }
}
