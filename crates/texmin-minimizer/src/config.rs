//! Search configuration.

/// Default cap on search passes.
pub const DEFAULT_MAX_PASSES: usize = 1000;

/// Configuration for a minimization run.
#[derive(Debug, Clone)]
pub struct MinimizerConfig {
    /// Maximum number of search passes before giving up.
    pub max_passes: usize,

    /// Maximum number of oracle calls, the initial one included.
    pub max_oracle_calls: Option<usize>,

    /// Whether to re-test the final document against the target signature.
    pub verify_final: bool,

    /// Whether to step into the arguments of `\newcommand`-style definitions.
    pub descend_definitions: bool,

    /// Name of the environment holding the document body.
    pub body_environment: String,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_oracle_calls: None,
            verify_final: true,
            descend_definitions: true,
            body_environment: "document".to_string(),
        }
    }
}

impl MinimizerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of passes.
    pub fn with_max_passes(mut self, max: usize) -> Self {
        self.max_passes = max;
        self
    }

    /// Cap the number of oracle calls.
    pub fn with_max_oracle_calls(mut self, max: usize) -> Self {
        self.max_oracle_calls = Some(max);
        self
    }

    /// Enable or disable final verification.
    pub fn with_verify_final(mut self, enabled: bool) -> Self {
        self.verify_final = enabled;
        self
    }

    /// Enable or disable the definition walk.
    pub fn with_descend_definitions(mut self, enabled: bool) -> Self {
        self.descend_definitions = enabled;
        self
    }

    /// Set the body environment name.
    pub fn with_body_environment(mut self, name: impl Into<String>) -> Self {
        self.body_environment = name.into();
        self
    }
}
