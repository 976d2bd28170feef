//! Error types shared by the library.

use thiserror::Error;

/// Failures surfaced by the resolution and aggregation core.
///
/// Ambiguous or unresolvable locations are not errors; they resolve to
/// `None` at the affected level.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// An external provider returned a non-success status or a payload we
    /// could not decode.
    #[error("upstream {provider} unavailable: {message}")]
    UpstreamUnavailable {
        provider: &'static str,
        message: String,
    },

    /// A geometry or drill-down level outside district/municipality/parish.
    #[error("invalid geometry level '{0}' (expected district, municipality or parish)")]
    InvalidGeometryLevel(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        DashboardError::UpstreamUnavailable {
            provider,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
