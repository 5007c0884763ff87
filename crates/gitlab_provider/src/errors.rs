use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;
use crate::validation::ValidationErrors;

/// Errors surfaced by every provider operation.
///
/// Vendor responses are classified into these kinds exactly once, at the
/// vendor client boundary. Higher layers branch on the kind, never on message
/// text.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// A resource with the same natural key already exists.
    #[error("Already exists: {resource}")]
    AlreadyExists { resource: String },

    /// The vendor returned a success status with an unusable body.
    #[error("Invalid server data: {message}")]
    InvalidServerData { message: String },

    /// Token rejected (401) or lacking access (403).
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// A destructive call was attempted without opting in.
    #[error("Destructive call disallowed: {operation}")]
    DestructiveCallDisallowed { operation: String },

    /// A reference names a domain this client is not configured for.
    #[error("Domain {domain} is not supported by this client (configured: {supported})")]
    DomainUnsupported { domain: String, supported: String },

    /// The feature cannot be expressed against this provider.
    #[error("No provider support: {feature}")]
    NoProviderSupport { feature: String },

    /// A permission or access level outside the known table.
    #[error("Invalid permission level: {level}")]
    InvalidPermissionLevel { level: String },

    /// Caller-supplied data failed validation.
    #[error(transparent)]
    InvalidArgument(#[from] ValidationErrors),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// The merge request stayed in a transient mergeability state.
    #[error("Merge request !{iid} still {status} after {attempts} attempts")]
    MergeabilityPending {
        iid: u64,
        status: String,
        attempts: usize,
    },

    /// The vendor finished checking and reported the merge request unmergeable.
    #[error("Merge request !{iid} cannot be merged: {status}")]
    NotMergeable { iid: u64, status: String },

    /// Any other vendor error status.
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network or connection error below the HTTP layer.
    #[error(transparent)]
    Transport(#[from] HttpError),
}

impl From<config::ConfigError> for ProviderError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl ProviderError {
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn invalid_server_data(message: impl Into<String>) -> Self {
        Self::InvalidServerData {
            message: message.into(),
        }
    }

    #[inline]
    pub fn no_provider_support(feature: impl Into<String>) -> Self {
        Self::NoProviderSupport {
            feature: feature.into(),
        }
    }

    #[inline]
    pub fn destructive_call_disallowed(operation: impl Into<String>) -> Self {
        Self::DestructiveCallDisallowed {
            operation: operation.into(),
        }
    }

    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[inline]
    pub fn invalid_argument(
        kind: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument(ValidationErrors::single(kind, field, reason))
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line vendor bodies.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
