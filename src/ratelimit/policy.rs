//! Selection of the limiter responsible for a request path.

use tracing::info;

use super::limiter::{LimiterConfig, RateLimiter};
use super::rules::RuleSet;
use crate::error::Result;

/// Name of the limiter used for paths no rule matches.
pub const DEFAULT_POLICY: &str = "default";

/// A set of independent limiters: one default plus one per route rule.
pub struct RateLimitPolicies {
    default: RateLimiter,
    rules: RuleSet,
    /// Limiters in the same order as `rules.rules`
    limiters: Vec<RateLimiter>,
}

/// The limiter chosen for a path.
pub struct Policy<'a> {
    pub name: &'a str,
    pub limiter: &'a RateLimiter,
}

impl RateLimitPolicies {
    /// Build the default limiter and one limiter per rule.
    pub fn new(default: LimiterConfig, rules: RuleSet) -> Result<Self> {
        rules.validate()?;

        let limiters = rules
            .rules
            .iter()
            .map(|rule| RateLimiter::new(rule.limiter_config()))
            .collect::<Result<Vec<_>>>()?;

        info!(
            default_window_ms = default.window_ms,
            default_max = default.max,
            rules = rules.rules.len(),
            exempt = rules.exempt_paths.len(),
            "Rate limit policies initialized"
        );

        Ok(Self {
            default: RateLimiter::new(default)?,
            rules,
            limiters,
        })
    }

    /// A single default limiter with no route rules.
    pub fn single(default: LimiterConfig) -> Result<Self> {
        Self::new(default, RuleSet::new())
    }

    /// Pick the limiter for `path`, or `None` if the path is exempt.
    pub fn select(&self, path: &str) -> Option<Policy<'_>> {
        if self.rules.is_exempt(path) {
            return None;
        }

        let policy = match self.rules.find_rule(path) {
            Some((index, rule)) => Policy {
                name: &rule.name,
                limiter: &self.limiters[index],
            },
            None => Policy {
                name: DEFAULT_POLICY,
                limiter: &self.default,
            },
        };
        Some(policy)
    }

    pub fn default_limiter(&self) -> &RateLimiter {
        &self.default
    }
}
