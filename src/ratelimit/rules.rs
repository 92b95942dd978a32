//! Route-scoped rate limit rules.
//!
//! Rules attach a dedicated limit to a path prefix, e.g. a stricter quota on
//! `/api/auth` than on the rest of the API. Matching is by path segment and
//! the longest matching prefix wins.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::limiter::LimiterConfig;
use crate::error::{Jam3aError, Result};

/// A complete rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Route-specific limits
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    /// Paths that bypass rate limiting entirely
    #[serde(default)]
    pub exempt_paths: Vec<String>,
}

/// A rate limit bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Name used in logs
    pub name: String,
    /// Path prefix this rule applies to
    pub path_prefix: String,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Maximum requests per window per client
    pub max: u64,
}

impl RouteRule {
    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig::new(self.window_ms, self.max)
    }
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RuleSet = serde_yaml::from_str(yaml)
            .map_err(|e| Jam3aError::Config(format!("Failed to parse rate limit rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check every rule's limits, reject duplicate prefixes and require
    /// absolute paths for rules and exemptions.
    pub fn validate(&self) -> Result<()> {
        for path in &self.exempt_paths {
            if !path.starts_with('/') {
                return Err(Jam3aError::Config(format!(
                    "exempt path '{}' must start with '/'",
                    path
                )));
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.window_ms == 0 || rule.max == 0 {
                return Err(Jam3aError::Config(format!(
                    "rule '{}': window_ms and max must be positive",
                    rule.name
                )));
            }

            if !rule.path_prefix.starts_with('/') {
                return Err(Jam3aError::Config(format!(
                    "rule '{}': path_prefix must start with '/'",
                    rule.name
                )));
            }

            if self.rules[..i].iter().any(|r| r.path_prefix == rule.path_prefix) {
                return Err(Jam3aError::Config(format!(
                    "rule '{}': duplicate path_prefix '{}'",
                    rule.name, rule.path_prefix
                )));
            }
        }
        Ok(())
    }

    /// Find the rule with the longest prefix matching `path`.
    pub fn find_rule(&self, path: &str) -> Option<(usize, &RouteRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| path_matches(&rule.path_prefix, path))
            .max_by_key(|(_, rule)| rule.path_prefix.len())
    }

    /// Whether `path` bypasses rate limiting.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths
            .iter()
            .any(|prefix| path_matches(prefix, path))
    }
}

/// Segment-aware prefix match: `/api/auth` matches `/api/auth/login` but not `/api/authors`.
fn path_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
rules:
  - name: api
    path_prefix: /api
    window_ms: 900000
    max: 100
  - name: auth
    path_prefix: /api/auth
    window_ms: 3600000
    max: 5
exempt_paths:
  - /health
"#;

    #[test]
    fn test_parse_rules() {
        let rules = RuleSet::from_yaml(RULES).unwrap();
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.rules[1].name, "auth");
        assert_eq!(rules.rules[1].max, 5);
        assert_eq!(rules.exempt_paths, vec!["/health".to_string()]);
    }

    #[test]
    fn test_find_rule_longest_prefix() {
        let rules = RuleSet::from_yaml(RULES).unwrap();

        let (_, rule) = rules.find_rule("/api/auth/login").unwrap();
        assert_eq!(rule.name, "auth");

        let (_, rule) = rules.find_rule("/api/products/42").unwrap();
        assert_eq!(rule.name, "api");

        let (index, rule) = rules.find_rule("/api/auth").unwrap();
        assert_eq!(index, 1);
        assert_eq!(rule.name, "auth");
    }

    #[test]
    fn test_find_rule_respects_segments() {
        let rules = RuleSet::from_yaml(RULES).unwrap();

        let (_, rule) = rules.find_rule("/api/authors").unwrap();
        assert_eq!(rule.name, "api");

        assert!(rules.find_rule("/apiary").is_none());
        assert!(rules.find_rule("/").is_none());
    }

    #[test]
    fn test_exempt_paths() {
        let rules = RuleSet::from_yaml(RULES).unwrap();
        assert!(rules.is_exempt("/health"));
        assert!(rules.is_exempt("/health/live"));
        assert!(!rules.is_exempt("/healthz"));
        assert!(!rules.is_exempt("/api/health"));
    }

    #[test]
    fn test_trailing_slash_prefix() {
        assert!(path_matches("/static/", "/static/app.js"));
        assert!(path_matches("/", "/anything"));
    }

    #[test]
    fn test_rejects_zero_limits() {
        let yaml = r#"
rules:
  - name: broken
    path_prefix: /api
    window_ms: 0
    max: 10
"#;
        let err = RuleSet::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let yaml = r#"
rules:
  - name: one
    path_prefix: /api
    window_ms: 1000
    max: 10
  - name: two
    path_prefix: /api
    window_ms: 1000
    max: 20
"#;
        assert!(RuleSet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let yaml = r#"
rules:
  - name: relative
    path_prefix: api
    window_ms: 1000
    max: 10
"#;
        assert!(RuleSet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_relative_exempt_path() {
        let err = RuleSet::from_yaml("exempt_paths: [health]").unwrap_err();
        assert!(err.to_string().contains("health"));

        // An empty entry would otherwise match every path
        assert!(RuleSet::from_yaml("exempt_paths: ['']").is_err());

        let rules = RuleSet {
            rules: Vec::new(),
            exempt_paths: vec![String::new()],
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_empty_rule_set() {
        let rules = RuleSet::from_yaml("{}").unwrap();
        assert_eq!(rules, RuleSet::new());
        assert!(rules.find_rule("/api").is_none());
    }
}
