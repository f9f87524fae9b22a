//! Directory-listing HTML to file records.
//!
//! Listings come from several mirror flavours (nginx/Apache autoindex tables,
//! archive collection pages). Only the anchors matter; unknown markup is ignored.

use scraper::{Html, Selector};
use url::Url;

use crate::domain::ListingEntry;
use crate::utils::percent_decode;

const ARCHIVE_MARKER: &str = "/download/";

/// Parse every file link in `html`, resolving URLs against `base_url`.
/// Directories, parent links and anything without an extension are skipped.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<ListingEntry> {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            log::warn!("Cannot resolve links against {base_url}: {e}");
            return Vec::new();
        }
    };
    let resolver = UrlResolver::for_base(&base, base_url);
    let links = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(e) => {
            log::warn!("Invalid link selector: {e}");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    document
        .select(&links)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            if is_navigation_link(href) {
                return None;
            }

            let label = match link.value().attr("title").filter(|t| !t.trim().is_empty()) {
                Some(title) => title.to_string(),
                None => link.text().collect::<String>(),
            };

            let (label, name, extension) = file_parts(&label)
                .or_else(|| file_parts(last_segment(href)))?;
            let url = resolver.resolve(href)?;

            Some(ListingEntry {
                name,
                extension,
                url,
                label,
            })
        })
        .collect()
}

enum UrlResolver<'a> {
    /// `{origin}/download/{collection}/{file}`; nested collection paths
    /// break plain relative joins.
    Archive { origin: String, collection: String },
    Standard(&'a Url),
}

impl<'a> UrlResolver<'a> {
    fn for_base(base: &'a Url, raw: &str) -> Self {
        let Some((_, after)) = raw.split_once(ARCHIVE_MARKER) else {
            return Self::Standard(base);
        };
        let collection = after
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        if collection.is_empty() {
            return Self::Standard(base);
        }
        Self::Archive {
            origin: base.origin().ascii_serialization(),
            collection,
        }
    }

    fn resolve(&self, href: &str) -> Option<String> {
        match self {
            Self::Archive { origin, collection } => {
                let file = last_segment(href);
                if file.is_empty() {
                    return None;
                }
                Some(format!("{origin}{ARCHIVE_MARKER}{collection}/{file}"))
            }
            Self::Standard(base) => base.join(href).ok().map(String::from),
        }
    }
}

fn is_navigation_link(href: &str) -> bool {
    let href = href.trim();
    href.is_empty()
        || href.starts_with('?')
        || href.starts_with('#')
        || href.ends_with('/')
        || matches!(href, "." | ".." | "../" | "./")
}

fn last_segment(href: &str) -> &str {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default()
}

/// Decoded label split at its last dot, or `None` for non-files.
fn file_parts(raw: &str) -> Option<(String, String, String)> {
    let label = percent_decode(raw.trim()).trim().to_string();
    let (name, ext) = label.rsplit_once('.')?;
    if name.trim().is_empty() || ext.is_empty() || ext.chars().any(char::is_whitespace) {
        return None;
    }
    let (name, extension) = (name.to_string(), format!(".{ext}"));
    Some((label, name, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIRROR: &str = "https://mirror.example/files/No-Intro/Nintendo%20-%20Game%20Boy/";

    #[test]
    fn test_decodes_link_text_and_splits_extension() {
        let html = r#"<tr><td class="link"><a href="Game%20Name.iso">Game%20Name.iso</a></td></tr>"#;
        let entries = parse_listing(html, MIRROR);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Game Name");
        assert_eq!(entries[0].extension, ".iso");
        assert_eq!(entries[0].label, "Game Name.iso");
        assert_eq!(
            entries[0].url,
            "https://mirror.example/files/No-Intro/Nintendo%20-%20Game%20Boy/Game%20Name.iso"
        );
    }

    #[test]
    fn test_skips_parents_directories_and_sort_links() {
        let html = r#"
            <table>
            <tr><td><a href="?C=N;O=D">Name</a></td></tr>
            <tr><td class="link"><a href="../">Parent directory/</a></td></tr>
            <tr><td class="link"><a href="Subdir/" title="Subdir">Subdir/</a></td></tr>
            <tr><td class="link"><a>No href.zip</a></td></tr>
            <tr><td class="link"><a href="README">README</a></td></tr>
            <tr><td class="link"><a href="Tetris%20(World).zip" title="Tetris (World).zip">Tetris (World).zip</a></td></tr>
            </table>"#;
        let entries = parse_listing(html, MIRROR);
        let names: Vec<_> = entries.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, vec!["Tetris (World).zip"]);
    }

    #[test]
    fn test_prefers_title_attribute_over_truncated_text() {
        let html = r#"<td class="link"><a href="Legend%20of%20Zelda%2C%20The%20-%20Link%27s%20Awakening%20DX%20(USA%2C%20Europe)%20(Rev%202).zip" title="Legend of Zelda, The - Link&#39;s Awakening DX (USA, Europe) (Rev 2).zip">Legend of Zelda, The - Link's Awa..&gt;</a></td>"#;
        let entries = parse_listing(html, MIRROR);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].name,
            "Legend of Zelda, The - Link's Awakening DX (USA, Europe) (Rev 2)"
        );
        assert_eq!(entries[0].extension, ".zip");
    }

    #[test]
    fn test_falls_back_to_href_when_text_is_not_a_filename() {
        let html = r#"<a href="Pac-Man%20(USA).a26"><img src="icon.png"> download</a>"#;
        let entries = parse_listing(html, MIRROR);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "Pac-Man (USA).a26");
    }

    #[test]
    fn test_archive_origin_uses_collection_path() {
        let base = "https://archive.example/download/chd-saturn/CHD-Saturn/USA";
        let html = r#"<a href="/download/chd-saturn/Astal%20(USA).chd">Astal (USA).chd</a>
                      <a href="Bug%21%20(USA).chd">Bug! (USA).chd</a>"#;
        let entries = parse_listing(html, base);
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://archive.example/download/chd-saturn/CHD-Saturn/USA/Astal%20(USA).chd",
                "https://archive.example/download/chd-saturn/CHD-Saturn/USA/Bug%21%20(USA).chd",
            ]
        );
    }

    #[test]
    fn test_standard_origin_resolves_relative_and_absolute_hrefs() {
        let html = r#"<a href="/mirror/other/Game.zip">Game.zip</a>
                      <a href="https://cdn.example/x/Other.7z">Other.7z</a>"#;
        let entries = parse_listing(html, MIRROR);
        assert_eq!(entries[0].url, "https://mirror.example/mirror/other/Game.zip");
        assert_eq!(entries[1].url, "https://cdn.example/x/Other.7z");
    }

    #[test]
    fn test_invalid_base_url_yields_nothing() {
        let html = r#"<a href="Game.zip">Game.zip</a>"#;
        assert!(parse_listing(html, "not a url").is_empty());
    }

    #[test]
    fn test_entities_in_href_and_text() {
        let html = r#"<a href="Sega%20CD%20&amp;%20Mega%20CD.zip">Sega CD &amp; Mega CD.zip</a>"#;
        let entries = parse_listing(html, MIRROR);
        assert_eq!(entries[0].name, "Sega CD & Mega CD");
        assert!(entries[0].url.ends_with("/Sega%20CD%20&%20Mega%20CD.zip"));
    }

    #[test]
    fn test_numeric_entities_and_markup_in_title() {
        let html = r#"<a href="Pok%C3%A9mon%20Red.gb" title="Pok&#233;mon Red.gb">Pok&eacute;mon Red.gb</a>
                      <a href="A%20%3E%20B.zip" title="A > B.zip">A &gt; B.zip</a>"#;
        let entries = parse_listing(html, MIRROR);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Pokémon Red", "A > B"]);
        assert_eq!(entries[1].label, "A > B.zip");
    }
}
