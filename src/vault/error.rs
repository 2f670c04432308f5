//! Vault Errors
//!
//! `TigerStyle`: Explicit error types with context.
//!
//! Each rejected write maps to exactly one variant; a rejection is always
//! reported distinctly from a success, never as silent data loss.

use thiserror::Error;

/// Errors from vault operations.
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    /// Input failed validation (empty text, too long, bad scope, log tier)
    #[error("validation error: {message}")]
    Validation {
        /// What was invalid
        message: String,
    },

    /// PII detected; the text was not stored in any form
    #[error("PII detected - memory blocked: {details}")]
    Pii {
        /// Joined violation descriptions
        details: String,
    },

    /// Near-duplicate of an existing record in the same scope
    #[error("Duplicate of memory '{existing_id}' (similarity {score:.2})")]
    Duplicate {
        /// Id of the competing active record
        existing_id: String,
        /// Composite similarity score that triggered the rejection
        score: f64,
    },

    /// Active-record ceiling reached
    #[error("vault is full: {active}/{max} active memories")]
    CapacityExceeded {
        /// Current active count
        active: usize,
        /// Configured ceiling
        max: usize,
    },

    /// No active record with this id
    #[error("memory '{id}' not found or already deleted")]
    NotFound {
        /// The id that failed to resolve
        id: String,
    },

    /// Underlying file I/O failed
    #[error("vault I/O error: {message}")]
    Io {
        /// OS error description
        message: String,
    },

    /// A vault line failed to serialize or deserialize
    #[error("vault serde error: {message}")]
    Serde {
        /// Parser error description
        message: String,
    },
}

impl VaultError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a PII error from violation descriptions.
    #[must_use]
    pub fn pii(violations: &[crate::vault::pii::PiiViolation]) -> Self {
        Self::Pii {
            details: violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Create a duplicate error.
    #[must_use]
    pub fn duplicate(existing_id: impl Into<String>, score: f64) -> Self {
        Self::Duplicate {
            existing_id: existing_id.into(),
            score,
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Whether this error is a rejection of the write request itself,
    /// as opposed to a storage failure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Pii { .. }
                | Self::Duplicate { .. }
                | Self::CapacityExceeded { .. }
        )
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = VaultError::duplicate("abc123def456", 0.91);
        assert!(err.to_string().contains("Duplicate"));
        assert!(err.to_string().contains("abc123def456"));

        let err = VaultError::CapacityExceeded { active: 3, max: 3 };
        assert!(err.to_string().contains("full"));

        let err = VaultError::not_found("xyz");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_is_rejection() {
        assert!(VaultError::validation("empty").is_rejection());
        assert!(VaultError::duplicate("id", 0.9).is_rejection());
        assert!(VaultError::CapacityExceeded { active: 1, max: 1 }.is_rejection());
        assert!(!VaultError::not_found("id").is_rejection());
        assert!(!VaultError::Io {
            message: "disk".into()
        }
        .is_rejection());
    }
}
