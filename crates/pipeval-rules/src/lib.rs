//! Stage classification, rule scopes, derived metrics and the sheet pipeline.

pub mod classify;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod validate;

pub use classify::{classify, is_excluded_stage, Classification};
pub use config::{ConfigError, EngineConfig, RuleSettings, ValidationToggles};
pub use metrics::{days_since, normalize_status, parse_date};
pub use notify::{resolve_notify_target, NotifyTarget};
pub use pipeline::{ValidationEngine, ValidationRequest};
pub use validate::{validate_record, RuleSet};

pub const CRATE_NAME: &str = "pipeval-rules";
