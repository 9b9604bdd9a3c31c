//! The four reference texts every draft is grounded on.
//!
//! Loaded once at startup and shared read-only behind an `Arc`.

use std::path::Path;

use {otis_config::ReferencesConfig, tracing::warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTexts {
    style: String,
    rules: String,
    domain_guide: String,
    raffle: String,
}

impl ReferenceTexts {
    pub fn new(
        style: impl Into<String>,
        rules: impl Into<String>,
        domain_guide: impl Into<String>,
        raffle: impl Into<String>,
    ) -> Self {
        Self {
            style: style.into(),
            rules: rules.into(),
            domain_guide: domain_guide.into(),
            raffle: raffle.into(),
        }
    }

    /// Read all four texts from the configured directory.
    ///
    /// A missing or unreadable file yields an empty text and a warning so the
    /// bot still starts; each text is cut to `max_chars` characters.
    #[must_use]
    pub fn load(config: &ReferencesConfig) -> Self {
        let read = |path: &Path| read_text(path, config.max_chars);
        Self {
            style: read(&config.style_path()),
            rules: read(&config.rules_path()),
            domain_guide: read(&config.domain_guide_path()),
            raffle: read(&config.raffle_path()),
        }
    }

    #[must_use]
    pub fn style(&self) -> &str {
        &self.style
    }

    #[must_use]
    pub fn rules(&self) -> &str {
        &self.rules
    }

    #[must_use]
    pub fn domain_guide(&self) -> &str {
        &self.domain_guide
    }

    #[must_use]
    pub fn raffle(&self) -> &str {
        &self.raffle
    }

    /// Titled sections in prompt order.
    #[must_use]
    pub fn sections(&self) -> [(&'static str, &str); 4] {
        [
            ("Style guide", self.style.as_str()),
            ("Rules", self.rules.as_str()),
            ("Domain guide", self.domain_guide.as_str()),
            ("Raffle information", self.raffle.as_str()),
        ]
    }

    /// Names of the texts that loaded empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        self.sections()
            .into_iter()
            .filter(|(_, text)| text.trim().is_empty())
            .map(|(title, _)| title)
            .collect()
    }
}

fn read_text(path: &Path, max_chars: usize) -> String {
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let text = raw.trim();
            match text.char_indices().nth(max_chars) {
                Some((cut, _)) => {
                    warn!(
                        path = %path.display(),
                        max_chars,
                        "reference text truncated"
                    );
                    text[..cut].to_string()
                },
                None => text.to_string(),
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "reference text not loaded");
            String::new()
        },
    }
}
