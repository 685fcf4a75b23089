//! Error taxonomy for the evaluation kernel.
//!
//! Mirrors the error kinds in spec §7. Infrastructure code (container decode,
//! resampling) still returns `anyhow::Result` and is mapped into a
//! [`PipelineError`] at the module boundary that talks to the kernel.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The error kinds a kernel entry point can return. Never retried beyond the
/// single automatic retry described in §7 for `ProviderTransient`.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Unparseable audio, empty text where required, out-of-range option.
    #[error("invalid input: {detail}")]
    InvalidInput { detail: String },

    /// Cyclic aliases, missing plugin, unsupported language, incompatible
    /// `output_type`. Fatal at pipeline construction.
    #[error("configuration error: {detail}")]
    ConfigError { detail: String },

    /// Plugin initialization failed or a dependency is missing.
    #[error("provider `{plugin}` unavailable: {detail}")]
    ProviderUnavailable { plugin: String, detail: String },

    /// Timeout or I/O from a provider; retried once by the runner.
    #[error("provider `{plugin}` transient failure: {detail}")]
    ProviderTransient { plugin: String, detail: String },

    /// Second failure of a `ProviderTransient` error.
    #[error("provider `{plugin}` failed: {detail}")]
    ProviderFailed { plugin: String, detail: String },

    /// Audio failed the quality gate under a caller-set strict flag. Under
    /// the default policy this never escapes as an error (see
    /// `RunOptions`/`CompareReport::warnings`), only when the caller opts in.
    #[error("quality gate failed: {detail}")]
    QualityGateFailed { detail: String },

    /// Deadline exceeded; providers were sent a cancellation signal.
    #[error("operation timed out after {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    /// Invariant violation. Never retried; carries a stable id for support.
    #[error("internal error [{id}]: {detail}")]
    Internal { id: &'static str, detail: String },
}

impl PipelineError {
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::ConfigError {
            detail: detail.into(),
        }
    }

    pub fn provider_unavailable(plugin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            plugin: plugin.into(),
            detail: detail.into(),
        }
    }

    pub fn provider_transient(plugin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProviderTransient {
            plugin: plugin.into(),
            detail: detail.into(),
        }
    }

    pub fn provider_failed(plugin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProviderFailed {
            plugin: plugin.into(),
            detail: detail.into(),
        }
    }

    pub fn internal(id: &'static str, detail: impl Into<String>) -> Self {
        Self::Internal {
            id,
            detail: detail.into(),
        }
    }

    /// The plugin name this error names, when it names one, for user-visible
    /// "which plugin failed" messaging (§7 propagation policy).
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::ProviderUnavailable { plugin, .. }
            | Self::ProviderTransient { plugin, .. }
            | Self::ProviderFailed { plugin, .. } => Some(plugin),
            _ => None,
        }
    }

    /// Whether the runner should retry this error once (`ProviderTransient`
    /// only, per §7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderTransient { .. })
    }
}
