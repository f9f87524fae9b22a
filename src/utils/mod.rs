use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

// At least one letter, so version numbers like "2.5" stay in the title.
static TRAILING_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.[a-z0-9]*[a-z][a-z0-9]*$").unwrap());
static ANGLE_BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^>]*)>").unwrap());
static TAG_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-–—]+$").unwrap());
static SEPARATOR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-]+").unwrap());

/// Percent-decode `raw`, keeping the input untouched when it does not decode
/// to valid UTF-8.
pub fn percent_decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Canonical, comparison-ready form of an achievement or listing title.
///
/// `"Cool%20Game%20Title%20-%20.iso"` becomes `"Cool Game Title"`.
///
/// Cleaning one layer can expose another (`"Game.iso -"`, `"%2525"`), so
/// passes repeat until the title stops changing.
pub fn normalize_title(raw: &str) -> String {
    let mut title = title_pass(raw);
    loop {
        let next = title_pass(&title);
        if next == title {
            return title;
        }
        title = next;
    }
}

fn title_pass(raw: &str) -> String {
    let decoded = percent_decode(raw);

    // Some feeds carry the real title between angle brackets.
    let title = match ANGLE_BRACKETED.captures(&decoded) {
        Some(caps) => caps[1].to_string(),
        None => decoded.into_owned(),
    };

    let title = TRAILING_EXTENSION.replace(&title, "");
    let title = TAG_SEGMENT.replace_all(&title, "");
    let title = WHITESPACE_RUN.replace_all(&title, " ");
    let title = TRAILING_DASHES.replace(title.trim(), "");
    title.trim().to_string()
}

/// Filesystem-safe filename: region/revision tags dropped, separators folded
/// into single underscores, reserved characters replaced.
///
/// `"Super%20Mario%20World%20-%20USA.zip"` becomes `"Super_Mario_World_USA.zip"`.
pub fn normalize_filename(raw: &str) -> String {
    let decoded = percent_decode(raw);
    let (stem, extension) = split_extension(&decoded);

    let mut cleaned = clean_stem(&TAG_SEGMENT.replace_all(stem, ""));
    if cleaned.is_empty() {
        // A name that is nothing but tags keeps them.
        cleaned = clean_stem(stem);
    }

    format!("{}{}", cleaned, sanitize_filename(extension))
}

fn clean_stem(stem: &str) -> String {
    let stem = WHITESPACE_RUN.replace_all(stem, " ");
    let stem = SEPARATOR_RUN.replace_all(&stem, "_");
    sanitize_filename(&stem).trim_matches('_').to_string()
}

/// Split `name` at its trailing `.ext`, if it has one. The extension keeps
/// its leading dot.
pub fn split_extension(name: &str) -> (&str, &str) {
    match TRAILING_EXTENSION.find(name) {
        Some(m) if m.start() > 0 => name.split_at(m.start()),
        _ => (name, ""),
    }
}

/// Arcade sets are keyed by their short ROM name, which the feed puts first
/// in the title: `"pacman.zip Pac-Man"` gives `"pacman"`.
pub fn extract_arcade_key(raw: &str) -> String {
    let first = raw.split_whitespace().next().unwrap_or_default();
    TRAILING_EXTENSION.replace(first, "").into_owned()
}

/// Replace characters that are invalid in file names on common filesystems.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Human readable byte count, e.g. `1.5 MB`.
pub fn format_file_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if size_bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", size, UNITS[unit])
}
