//! KDL schema for `config.kdl`.
//!
//! ```kdl
//! // AllViewer preferences
//! debounce-ms 300
//! resources-file "/srv/gallery/resources.json"
//! watch "off"
//! ```

use std::path::PathBuf;

use kdl::{KdlDocument, KdlValue};
use serde::{Deserialize, Serialize};

/// Longest accepted quiet period for free-text validation.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

/// User preferences stored in config.kdl. Unset values fall through to
/// the next source in the precedence chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Quiet period before free-text path input is validated
    pub debounce_ms: Option<u64>,

    /// Location of the resources document, replacing the data directory default
    pub resources_file: Option<PathBuf>,

    /// Whether `av watch` monitors configured directories
    pub watch: Option<bool>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the settings values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ms) = self.debounce_ms {
            if ms > MAX_DEBOUNCE_MS {
                return Err(format!(
                    "debounce-ms must be 0-{}, got {}",
                    MAX_DEBOUNCE_MS, ms
                ));
            }
        }
        Ok(())
    }

    /// Parse settings from a KDL document. Unknown nodes and values of the
    /// wrong type are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut settings = Self::new();

        if let Some(value) = first_value(doc, "debounce-ms") {
            if let Some(i) = value.as_integer() {
                if (0..=MAX_DEBOUNCE_MS as i128).contains(&i) {
                    settings.debounce_ms = Some(i as u64);
                }
            }
        }

        if let Some(value) = first_value(doc, "resources-file") {
            if let Some(s) = value.as_string() {
                settings.resources_file = Some(PathBuf::from(s));
            }
        }

        if let Some(value) = first_value(doc, "watch") {
            settings.watch = value
                .as_bool()
                .or_else(|| value.as_string().and_then(parse_switch));
        }

        settings
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

/// Parse "on"/"off"-style switches, case-insensitive.
pub fn parse_switch(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Settings {
        let doc: KdlDocument = text.parse().unwrap();
        Settings::from_kdl(&doc)
    }

    #[test]
    fn test_parse_all_keys() {
        let settings = parse(
            r#"
debounce-ms 250
resources-file "/srv/gallery/resources.json"
watch "off"
"#,
        );
        assert_eq!(settings.debounce_ms, Some(250));
        assert_eq!(
            settings.resources_file,
            Some(PathBuf::from("/srv/gallery/resources.json"))
        );
        assert_eq!(settings.watch, Some(false));
    }

    #[test]
    fn test_parse_empty_document() {
        assert_eq!(parse(""), Settings::default());
    }

    #[test]
    fn test_out_of_range_debounce_ignored() {
        assert_eq!(parse("debounce-ms 99999").debounce_ms, None);
    }

    #[test]
    fn test_wrong_type_ignored() {
        let settings = parse(r#"debounce-ms "fast""#);
        assert_eq!(settings.debounce_ms, None);
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::new();
        settings.debounce_ms = Some(500);
        assert!(settings.validate().is_ok());
        settings.debounce_ms = Some(MAX_DEBOUNCE_MS + 1);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("ON"), Some(true));
        assert_eq!(parse_switch("no"), Some(false));
        assert_eq!(parse_switch("maybe"), None);
    }
}
