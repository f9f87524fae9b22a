use regex::RegexBuilder;

use crate::domain::CatalogEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Entries whose name or extension matches `pattern` as a regex.
///
/// An empty or malformed pattern filters nothing, so a half-typed query
/// still shows the full catalog.
pub fn filter_catalog<'a>(entries: &'a [CatalogEntry], pattern: &str, options: SearchOptions) -> Vec<&'a CatalogEntry> {
    if pattern.is_empty() {
        return entries.iter().collect();
    }

    let source = if options.whole_word {
        format!(r"\b(?:{pattern})\b")
    } else {
        pattern.to_string()
    };
    let regex = match RegexBuilder::new(&source)
        .case_insensitive(!options.case_sensitive)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            log::debug!("Ignoring invalid search pattern {pattern:?}: {e}");
            return entries.iter().collect();
        }
    };

    entries
        .iter()
        .filter(|e| regex.is_match(e.canonical_name()) || regex.is_match(&e.extension))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceUrl;

    fn entry(name: &str, extension: &str) -> CatalogEntry {
        CatalogEntry::new(
            name.to_string(),
            extension.to_string(),
            SourceUrl {
                mirror_base_url: "https://m/".to_string(),
                full_url: format!("https://m/{name}{extension}"),
            },
        )
    }

    fn names<'a>(found: &[&'a CatalogEntry]) -> Vec<&'a str> {
        found.iter().map(|e| e.canonical_name()).collect()
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            entry("Super Mario Land", ".zip"),
            entry("Super Mario Land 2", ".zip"),
            entry("Mario Paint", ".7z"),
            entry("Dr. Mario", ".zip"),
        ]
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let entries = catalog();
        let found = filter_catalog(&entries, "mario land", SearchOptions::default());
        assert_eq!(names(&found), vec!["Super Mario Land", "Super Mario Land 2"]);
    }

    #[test]
    fn test_case_sensitive() {
        let entries = catalog();
        let options = SearchOptions {
            case_sensitive: true,
            ..SearchOptions::default()
        };
        assert!(filter_catalog(&entries, "mario", options).is_empty());
        assert_eq!(filter_catalog(&entries, "Mario", options).len(), 4);
    }

    #[test]
    fn test_whole_word() {
        let entries = catalog();
        let options = SearchOptions {
            whole_word: true,
            ..SearchOptions::default()
        };
        assert_eq!(names(&filter_catalog(&entries, "Land", options)), vec!["Super Mario Land", "Super Mario Land 2"]);
        assert!(filter_catalog(&entries, "Mari", options).is_empty());
    }

    #[test]
    fn test_matches_extension() {
        let entries = catalog();
        let found = filter_catalog(&entries, r"^\.7z$", SearchOptions::default());
        assert_eq!(names(&found), vec!["Mario Paint"]);
    }

    #[test]
    fn test_empty_or_invalid_pattern_keeps_everything() {
        let entries = catalog();
        assert_eq!(filter_catalog(&entries, "", SearchOptions::default()).len(), 4);
        assert_eq!(filter_catalog(&entries, "(unclosed", SearchOptions::default()).len(), 4);
    }
}
