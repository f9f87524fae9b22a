use std::collections::BTreeMap;

const MYRIENT: &str = "https://myrient.erista.me/files";

/// Built-in console table: display name followed by mirror paths under Myrient.
const BUILTIN_SOURCES: &[(&str, &[&str])] = &[
    ("Game Boy Color", &["No-Intro/Nintendo%20-%20Game%20Boy%20Color/"]),
    ("Game Boy", &["No-Intro/Nintendo%20-%20Game%20Boy/"]),
    (
        "Game Boy Advance",
        &[
            "No-Intro/Nintendo%20-%20Game%20Boy%20Advance/",
            "No-Intro/Nintendo%20-%20Game%20Boy%20Advance%20(Multiboot)/",
            "No-Intro/Nintendo%20-%20Game%20Boy%20Advance%20(Video)/",
            "No-Intro/Nintendo%20-%20Game%20Boy%20Advance%20(e-Reader)/",
        ],
    ),
    (
        "NES/Famicom",
        &[
            "No-Intro/Nintendo%20-%20Nintendo%20Entertainment%20System%20(Headered)/",
            "No-Intro/Nintendo%20-%20Nintendo%20Entertainment%20System%20(Headerless)/",
        ],
    ),
    (
        "SNES/Super Famicom",
        &["No-Intro/Nintendo%20-%20Super%20Nintendo%20Entertainment%20System/"],
    ),
    (
        "Nintendo 64",
        &[
            "No-Intro/Nintendo%20-%20Nintendo%2064%20(BigEndian)/",
            "No-Intro/Nintendo%20-%20Nintendo%2064%20(ByteSwapped)/",
        ],
    ),
    (
        "GameCube",
        &[
            "Internet%20Archive/Unknown/RedumpNintendoGameCubeAmerica/",
            "Internet%20Archive/Unknown/RedumpNintendoGameCubeAmericaPart2/",
            "Internet%20Archive/Unknown/RedumpNintendoGameCubeAmericaPart3/",
            "Internet%20Archive/kodi_amp_spmc_canada/EuropeanGamecubeCollectionByGhostware/",
        ],
    ),
    (
        "Nintendo DS",
        &[
            "No-Intro/Nintendo%20-%20Nintendo%20DS%20(Decrypted)/",
            "No-Intro/Nintendo%20-%20Nintendo%20DS%20(Encrypted)/",
            "No-Intro/Nintendo%20-%20Nintendo%20DS%20(Download%20Play)/",
        ],
    ),
    ("PlayStation", &["Redump/Sony%20-%20PlayStation/"]),
    ("PlayStation 2", &["Redump/Sony%20-%20PlayStation%202/"]),
    ("PlayStation Portable", &["Redump/Sony%20-%20PlayStation%20Portable/"]),
    ("Atari 2600", &["No-Intro/Atari%20-%202600/"]),
    ("Atari 7800", &["No-Intro/Atari%20-%207800/"]),
    (
        "Atari Jaguar",
        &["Internet%20Archive/chadmaster/jagcd-chd-zstd/jagcd-chd-zstd/"],
    ),
    (
        "Atari Jaguar CD",
        &["Redump/Atari%20-%20Jaguar%20CD%20Interactive%20Multimedia%20System/"],
    ),
    ("Master System", &["No-Intro/Sega%20-%20Master%20System%20-%20Mark%20III/"]),
    ("Game Gear", &["No-Intro/Sega%20-%20Game%20Gear/"]),
    ("Genesis/Mega Drive", &["No-Intro/Sega%20-%20Mega%20Drive%20-%20Genesis/"]),
    ("Sega CD", &["Redump/Sega%20-%20Mega%20CD%20&%20Sega%20CD/"]),
    ("32X", &["No-Intro/Sega%20-%2032X/"]),
    (
        "Saturn",
        &[
            "Internet%20Archive/chadmaster/chd_saturn/CHD-Saturn/USA/",
            "Internet%20Archive/chadmaster/chd_saturn/CHD-Saturn/Japan/",
        ],
    ),
    (
        "Dreamcast",
        &["Internet%20Archive/chadmaster/dc-chd-zstd-redump/dc-chd-zstd/"],
    ),
    (
        "PC Engine/TurboGrafx-16",
        &["No-Intro/NEC%20-%20PC%20Engine%20-%20TurboGrafx-16/"],
    ),
    (
        "PC Engine CD/TurboGrafx-CD",
        &["Redump/NEC%20-%20PC%20Engine%20CD%20&%20TurboGrafx%20CD/"],
    ),
    ("Neo Geo CD", &["Redump/SNK%20-%20Neo%20Geo%20CD/"]),
    ("Neo Geo Pocket", &["No-Intro/SNK%20-%20NeoGeo%20Pocket%20Color/"]),
    (
        "Arcade",
        &["Internet%20Archive/chadmaster/fbnarcade-fullnonmerged/arcade/"],
    ),
];

/// Immutable mapping from console display name to its mirrors, in the order
/// they should be tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleSourceSet {
    consoles: BTreeMap<String, Vec<String>>,
}

impl ConsoleSourceSet {
    pub fn new(consoles: BTreeMap<String, Vec<String>>) -> Self {
        Self { consoles }
    }

    pub fn builtin() -> Self {
        let consoles = BUILTIN_SOURCES
            .iter()
            .map(|(console, paths)| {
                let urls = paths.iter().map(|p| format!("{MYRIENT}/{p}")).collect();
                (console.to_string(), urls)
            })
            .collect();
        Self { consoles }
    }

    /// Mirrors for `console`; empty when the console is not configured.
    pub fn sources(&self, console: &str) -> &[String] {
        self.consoles.get(console).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_supported(&self, console: &str) -> bool {
        !self.sources(console).is_empty()
    }

    pub fn supported_consoles(&self) -> Vec<&str> {
        self.consoles.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let sources = ConsoleSourceSet::builtin();
        assert!(sources.is_supported("Arcade"));
        assert_eq!(sources.sources("Game Boy Advance").len(), 4);
        assert_eq!(
            sources.sources("Game Boy")[0],
            "https://myrient.erista.me/files/No-Intro/Nintendo%20-%20Game%20Boy/"
        );
        assert!(sources.supported_consoles().contains(&"PlayStation 2"));
    }

    #[test]
    fn test_unknown_console_has_no_sources() {
        let sources = ConsoleSourceSet::builtin();
        assert!(sources.sources("Virtual Boy").is_empty());
        assert!(!sources.is_supported("Virtual Boy"));
    }
}
