use tracing::{info, warn};

/// Case-insensitive host-prefix blocklist. Loaded once at startup and
/// immutable afterwards, so handlers read it without synchronization.
pub struct HostFilter {
    prefixes: Vec<String>,
}

impl HostFilter {
    /// Loads prefixes from `path`, one per line. Blank lines and lines whose
    /// first non-whitespace character is `#` are skipped; the rest are kept
    /// lowercased. A missing or unreadable file yields an empty filter, not
    /// an error.
    pub async fn load(path: &str) -> Self {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    target: "pasarela::filter",
                    file = %path,
                    error = ?e,
                    "Blocklist file not readable; no hosts will be blocked"
                );
                return Self {
                    prefixes: Vec::new(),
                };
            }
        };

        let filter = Self::from_lines(&contents);
        info!(
            target: "pasarela::filter",
            file = %path,
            prefixes = filter.prefixes.len(),
            "Blocklist loaded"
        );
        filter
    }

    pub fn from_prefixes(prefixes: Vec<String>) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }

    fn from_lines(contents: &str) -> Self {
        let prefixes = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_ascii_lowercase)
            .collect();
        Self { prefixes }
    }

    /// True iff the lowercased host equals or begins with any loaded prefix.
    pub fn is_blocked(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.prefixes
            .iter()
            .any(|prefix| host.starts_with(prefix.as_str()))
    }
}
