//! Engine configuration
//!
//! Thresholds and classification tables, loaded once at process start.
//! The application/domain tables are data, not behavior: they can grow
//! without touching the scoring algorithm.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Static configuration for the heuristics pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Gaps at or above this length are reported as idle periods (minutes)
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_minutes: f64,
    /// Gaps strictly above this length terminate the session (minutes)
    #[serde(default = "default_merge_threshold")]
    pub max_merge_idle_minutes: f64,
    /// Entries below this confidence are flagged for verification
    #[serde(default = "default_verify_threshold")]
    pub verify_confidence_threshold: f64,
    /// Application/domain lookup tables
    #[serde(default)]
    pub tables: ClassificationTables,
}

fn default_idle_threshold() -> f64 {
    5.0
}

fn default_merge_threshold() -> f64 {
    10.0
}

fn default_verify_threshold() -> f64 {
    0.5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_threshold_minutes: default_idle_threshold(),
            max_merge_idle_minutes: default_merge_threshold(),
            verify_confidence_threshold: default_verify_threshold(),
            tables: ClassificationTables::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON document, validating threshold sanity
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.idle_threshold_minutes <= 0.0 {
            return Err(EngineError::ConfigError(
                "idle_threshold_minutes must be positive".to_string(),
            ));
        }
        if self.max_merge_idle_minutes < self.idle_threshold_minutes {
            return Err(EngineError::ConfigError(format!(
                "max_merge_idle_minutes ({}) must not be below idle_threshold_minutes ({})",
                self.max_merge_idle_minutes, self.idle_threshold_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.verify_confidence_threshold) {
            return Err(EngineError::ConfigError(
                "verify_confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lookup tables mapping normalized application identifiers and domains to
/// activity categories. Keys are matched after normalization (lowercased,
/// trimmed; domains additionally lose a leading "www.").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationTables {
    /// Development/editor tools (focused work when typed or clicked in)
    #[serde(default = "default_editors")]
    pub editors: HashSet<String>,
    /// Video-conferencing clients
    #[serde(default = "default_conferencing")]
    pub conferencing: HashSet<String>,
    /// Chat and mail clients
    #[serde(default = "default_messaging")]
    pub messaging: HashSet<String>,
    /// Web browsers
    #[serde(default = "default_browsers")]
    pub browsers: HashSet<String>,
    /// Domains that count as work-related research
    #[serde(default = "default_work_domains")]
    pub work_domains: HashSet<String>,
}

impl Default for ClassificationTables {
    fn default() -> Self {
        Self {
            editors: default_editors(),
            conferencing: default_conferencing(),
            messaging: default_messaging(),
            browsers: default_browsers(),
            work_domains: default_work_domains(),
        }
    }
}

impl ClassificationTables {
    pub fn is_editor(&self, app: &str) -> bool {
        self.editors.contains(app)
    }

    pub fn is_conferencing(&self, app: &str) -> bool {
        self.conferencing.contains(app)
    }

    pub fn is_messaging(&self, app: &str) -> bool {
        self.messaging.contains(app)
    }

    pub fn is_browser(&self, app: &str) -> bool {
        self.browsers.contains(app)
    }

    pub fn is_work_domain(&self, domain: &str) -> bool {
        self.work_domains.contains(domain)
    }
}

/// Normalize an application identifier for table lookup
pub fn normalize_application(app: &str) -> String {
    app.trim().to_lowercase()
}

/// Normalize a domain for table lookup (drops a leading "www.")
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    lowered
        .strip_prefix("www.")
        .map(|d| d.to_string())
        .unwrap_or(lowered)
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_editors() -> HashSet<String> {
    set(&[
        "vscode", "code", "intellij", "idea", "pycharm", "webstorm", "clion", "rider",
        "android-studio", "xcode", "vim", "nvim", "neovim", "emacs", "sublime", "zed",
        "terminal", "iterm2", "alacritty",
    ])
}

fn default_conferencing() -> HashSet<String> {
    set(&["zoom", "teams", "webex", "gotomeeting", "around", "whereby"])
}

fn default_messaging() -> HashSet<String> {
    set(&[
        "slack", "discord", "telegram", "whatsapp", "signal", "mail", "outlook",
        "thunderbird",
    ])
}

fn default_browsers() -> HashSet<String> {
    set(&["chrome", "google-chrome", "chromium", "firefox", "safari", "edge", "brave", "arc"])
}

fn default_work_domains() -> HashSet<String> {
    set(&[
        "github.com", "gitlab.com", "bitbucket.org", "stackoverflow.com",
        "docs.google.com", "atlassian.net", "notion.so", "figma.com", "linear.app",
        "developer.mozilla.org", "docs.rs", "crates.io", "aws.amazon.com",
        "console.cloud.google.com", "portal.azure.com",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_thresholds() {
        let config = EngineConfig::default();
        assert_eq!(config.idle_threshold_minutes, 5.0);
        assert_eq!(config.max_merge_idle_minutes, 10.0);
        assert_eq!(config.verify_confidence_threshold, 0.5);
    }

    #[test]
    fn test_from_json_partial_override() {
        let config = EngineConfig::from_json(r#"{"idle_threshold_minutes": 3.0}"#).unwrap();
        assert_eq!(config.idle_threshold_minutes, 3.0);
        // Omitted fields fall back to defaults
        assert_eq!(config.max_merge_idle_minutes, 10.0);
        assert!(config.tables.is_editor("vscode"));
    }

    #[test]
    fn test_from_json_custom_tables() {
        let json = r#"{
            "tables": {
                "editors": ["myeditor"],
                "work_domains": ["internal.example.com"]
            }
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert!(config.tables.is_editor("myeditor"));
        assert!(!config.tables.is_editor("vscode"));
        assert!(config.tables.is_work_domain("internal.example.com"));
        // Tables not named in the document keep their defaults
        assert!(config.tables.is_browser("firefox"));
    }

    #[test]
    fn test_validation_rejects_inverted_thresholds() {
        let result = EngineConfig::from_json(
            r#"{"idle_threshold_minutes": 15.0, "max_merge_idle_minutes": 10.0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_application("  VSCode "), "vscode");
        assert_eq!(normalize_domain("WWW.GitHub.com"), "github.com");
        assert_eq!(normalize_domain("docs.rs"), "docs.rs");
    }
}
