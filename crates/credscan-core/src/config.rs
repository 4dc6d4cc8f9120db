//! Orchestrator configuration.

use tracing::warn;

use crate::validation::ValidationPolicy;

/// Name reported in [`credscan_types::ServiceInfo`].
pub const SERVICE_NAME: &str = "credscan";

/// Tunables for an [`crate::Orchestrator`].
///
/// Every field has a default so an orchestrator works without any
/// environment variables set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum number of tasks executing at once. Further submissions wait
    /// as `Pending` for a free worker.
    pub max_concurrent_tasks: usize,

    /// Images larger than this are rejected as invalid.
    pub max_image_bytes: u64,

    /// Accepted file extensions, lowercase and without the dot.
    pub supported_formats: Vec<String>,

    pub policy: ValidationPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            max_image_bytes: 10 * 1024 * 1024,
            supported_formats: ["jpg", "jpeg", "png", "bmp"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            policy: ValidationPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Build from `CREDSCAN_*` environment variables, falling back to
    /// [`OrchestratorConfig::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_tasks: parse_env(
                "CREDSCAN_MAX_CONCURRENT_TASKS",
                defaults.max_concurrent_tasks,
            )
            .max(1),
            max_image_bytes: parse_env("CREDSCAN_MAX_IMAGE_BYTES", defaults.max_image_bytes),
            supported_formats: defaults.supported_formats,
            policy: ValidationPolicy {
                strict: env_flag("CREDSCAN_STRICT_VALIDATION"),
            },
        }
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    pub fn with_max_image_bytes(mut self, max: u64) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `true` when `extension` (any case) is one of the supported formats.
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.supported_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(extension))
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_value(key, std::env::var(key).ok(), default)
}

fn env_flag(key: &str) -> bool {
    flag_value(key, std::env::var(key).ok())
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting; using default");
            default
        }
    }
}

fn flag_value(key: &str, raw: Option<String>) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    let value = raw.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        true
    } else if value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false") {
        false
    } else {
        warn!(key, value = %raw, "ignoring unrecognised flag; treating as false");
        false
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn defaults_accept_common_image_formats() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.max_image_bytes, 10_485_760);
        assert!(config.supports_extension("JPG"));
        assert!(config.supports_extension("png"));
        assert!(!config.supports_extension("gif"));
        assert!(!config.policy.strict);
    }

    #[test]
    fn concurrency_never_drops_to_zero() {
        let config = OrchestratorConfig::default().with_max_concurrent_tasks(0);
        assert_eq!(config.max_concurrent_tasks, 1);
    }

    #[traced_test]
    #[test]
    fn unparsable_values_fall_back_with_a_warning() {
        assert_eq!(
            parse_value("CREDSCAN_MAX_IMAGE_BYTES", Some("ten megs".into()), 7_u64),
            7
        );
        assert!(logs_contain("ignoring unparsable setting"));
        assert!(logs_contain("CREDSCAN_MAX_IMAGE_BYTES"));

        assert_eq!(parse_value("CREDSCAN_MAX_CONCURRENT_TASKS", Some(" 8 ".into()), 4_usize), 8);
        assert_eq!(parse_value("CREDSCAN_MAX_CONCURRENT_TASKS", None, 4_usize), 4);
    }

    #[traced_test]
    #[test]
    fn flags_accept_common_spellings() {
        assert!(flag_value("CREDSCAN_STRICT_VALIDATION", Some("TRUE".into())));
        assert!(flag_value("CREDSCAN_STRICT_VALIDATION", Some("1".into())));
        assert!(!flag_value("CREDSCAN_STRICT_VALIDATION", Some("false".into())));
        assert!(!flag_value("CREDSCAN_STRICT_VALIDATION", None));
        assert!(!logs_contain("unrecognised flag"));

        assert!(!flag_value("CREDSCAN_STRICT_VALIDATION", Some("strict".into())));
        assert!(logs_contain("unrecognised flag"));
    }
}
