//! Error types for reconciliation operations.
//!
//! Every failure crossing the engine boundary is a value of [`Error`].
//! Errors are categorized so callers can tell "the write itself failed" apart
//! from "the write succeeded but could not be confirmed", and both apart from
//! local validation problems that never reached the network.

use crate::remote::RemoteError;
use crate::value::Value;
use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected locally, no network call was made.
    Local,
    /// The entity disappeared outside the controlling system.
    Drift,
    /// A write may have succeeded but could not be confirmed.
    Verification,
    /// The declared change is not allowed.
    Validation,
    /// The remote backend reported a failure.
    Remote,
}

impl ErrorCategory {
    /// Whether the remote side may now be in an unknown state.
    #[must_use]
    pub fn requires_manual_intervention(&self) -> bool {
        matches!(self, Self::Verification)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Local => "Invalid local input",
            Self::Drift => "Resource deleted outside of n8nform",
            Self::Verification => "Write could not be verified",
            Self::Validation => "Change not allowed",
            Self::Remote => "Remote operation failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Local => "Check the resource declaration and identifiers",
            Self::Drift => "Run refresh to drop the resource from state, or apply to recreate it",
            Self::Verification => {
                "Inspect the remote side before retrying; the write may already have taken effect"
            }
            Self::Validation => "Delete and recreate the resource to change identity attributes",
            Self::Remote => "Check connectivity and credentials, then retry",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable match criterion was supplied.
    #[error("{kind}: no identifier available (need one of: {})", .attributes.join(", "))]
    MissingIdentifier {
        /// Resource kind name.
        kind: String,
        /// Attributes that could have identified the entity.
        attributes: Vec<String>,
    },

    /// The tracked entity is absent from the remote list.
    #[error("{kind} {id} no longer exists remotely")]
    NotFoundDuringRead {
        /// Resource kind name.
        kind: String,
        /// Durable identifier that was looked up.
        id: String,
    },

    /// The create call succeeded but the new entity could not be located.
    #[error("{kind} {key} was created but could not be found afterwards{}", source_suffix(.source))]
    PostCreateVerificationFailed {
        /// Resource kind name.
        kind: String,
        /// Human-meaningful key used for the lookup.
        key: String,
        /// Failure of the verification list call, if any.
        #[source]
        source: Option<RemoteError>,
    },

    /// The update call succeeded but the entity could not be located.
    #[error("{kind} {id} was updated but could not be verified{}", source_suffix(.source))]
    PostUpdateVerificationFailed {
        /// Resource kind name.
        kind: String,
        /// Durable identifier.
        id: String,
        /// Failure of the verification list call, if any.
        #[source]
        source: Option<RemoteError>,
    },

    /// A lookup of an existing entity matched nothing.
    #[error("no {kind} matches {query}")]
    NoMatch {
        /// Resource kind name.
        kind: String,
        /// The criterion that was compared.
        query: String,
    },

    /// Composite key with the wrong number of parts.
    #[error("malformed composite key '{key}': expected {expected} parts, found {found}")]
    MalformedCompositeKey {
        /// The offending key.
        key: String,
        /// Arity of the composite-key kind.
        expected: usize,
        /// Parts actually found.
        found: usize,
    },

    /// A composite key part cannot be encoded unambiguously.
    #[error("cannot encode composite key part '{part}': empty or contains '{delimiter}'")]
    Encoding {
        /// The offending part.
        part: String,
        /// The delimiter in use.
        delimiter: char,
    },

    /// An identity-bearing attribute differs between plan and state.
    #[error("{kind}: cannot change {attribute} from {from} to {to} in place")]
    ImmutableFieldChanged {
        /// Resource kind name.
        kind: String,
        /// Attribute that changed.
        attribute: String,
        /// Value in state.
        from: Value,
        /// Value in plan.
        to: Value,
    },

    /// The declared attributes do not fit the kind schema.
    #[error("invalid {kind} declaration: {message}")]
    InvalidPlan {
        /// Resource kind name.
        kind: String,
        /// What is wrong.
        message: String,
    },

    /// The adapter reported a failure.
    #[error("{operation} {kind} failed: {source}")]
    RemoteOperationFailed {
        /// Resource kind name.
        kind: String,
        /// Operation name (list, create, update, delete).
        operation: &'static str,
        /// Adapter error detail.
        #[source]
        source: RemoteError,
    },
}

fn source_suffix(source: &Option<RemoteError>) -> String {
    source
        .as_ref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn remote(kind: &str, operation: &'static str, source: RemoteError) -> Self {
        Self::RemoteOperationFailed {
            kind: kind.to_string(),
            operation,
            source,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingIdentifier { .. } => ErrorCategory::Local,
            Error::MalformedCompositeKey { .. } => ErrorCategory::Local,
            Error::Encoding { .. } => ErrorCategory::Local,
            Error::InvalidPlan { .. } => ErrorCategory::Local,
            Error::NoMatch { .. } => ErrorCategory::Local,
            Error::NotFoundDuringRead { .. } => ErrorCategory::Drift,
            Error::PostCreateVerificationFailed { .. } => ErrorCategory::Verification,
            Error::PostUpdateVerificationFailed { .. } => ErrorCategory::Verification,
            Error::ImmutableFieldChanged { .. } => ErrorCategory::Validation,
            Error::RemoteOperationFailed { .. } => ErrorCategory::Remote,
        }
    }

    /// Whether this error means the resource should be dropped from state.
    #[must_use]
    pub fn is_drift(&self) -> bool {
        self.category() == ErrorCategory::Drift
    }
}
