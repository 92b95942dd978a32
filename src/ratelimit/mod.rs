//! Rate limiting logic and state management.

mod client;
mod clock;
mod counter;
mod decision;
mod limiter;
mod policy;
mod rules;

pub use client::{ClientId, UNKNOWN_CLIENT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::WindowRecord;
pub use decision::Decision;
pub use limiter::{LimiterConfig, RateLimiter};
pub use policy::{Policy, RateLimitPolicies, DEFAULT_POLICY};
pub use rules::{RouteRule, RuleSet};
