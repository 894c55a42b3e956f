//! Runner configuration.

/// Line that ends code intake.
pub const DEFAULT_SENTINEL: &str = "__END_OF_CODE__";

/// Source name reported in tracebacks.
pub const DEFAULT_SOURCE_NAME: &str = "<string>";

const SENTINEL_VAR: &str = "PYRUNNER_SENTINEL";
const SOURCE_NAME_VAR: &str = "PYRUNNER_SOURCE_NAME";

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Code intake stops at a line equal to this, surrounding whitespace ignored.
    pub sentinel: String,
    /// File name the engine attributes the submitted code to.
    pub source_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Build from `PYRUNNER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values use the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            sentinel: get(SENTINEL_VAR, DEFAULT_SENTINEL).trim().to_string(),
            source_name: get(SOURCE_NAME_VAR, DEFAULT_SOURCE_NAME),
        }
    }

    /// Override the sentinel.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Whether `line` ends code intake.
    #[must_use]
    pub fn is_sentinel(&self, line: &str) -> bool {
        line.trim() == self.sentinel
    }
}
