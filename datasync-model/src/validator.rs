//! Record validation port.

use datasync_types::DocumentId;
use std::fmt;

/// Result of validating one decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Admitted.
    Valid,
    /// Skipped and counted as invalid.
    Invalid(String),
    /// Admitted, but depends on runtime state not available at load time.
    /// Re-validation is the caller's responsibility.
    Deferred(String),
}

impl ValidationOutcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn deferred(reason: impl Into<String>) -> Self {
        Self::Deferred(reason.into())
    }

    /// Whether the record enters the snapshot.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Validation port for one dataset type.
pub trait RecordValidator<T>: Send + Sync {
    fn validate(&self, record: &T, source: &DocumentId) -> ValidationOutcome;
}

/// Validator that admits every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<T> RecordValidator<T> for AcceptAll {
    fn validate(&self, _record: &T, _source: &DocumentId) -> ValidationOutcome {
        ValidationOutcome::Valid
    }
}

/// Adapts a closure into a [`RecordValidator`].
pub struct FnValidator<F>(F);

impl<F> FnValidator<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

impl<T, F> RecordValidator<T> for FnValidator<F>
where
    F: Fn(&T, &DocumentId) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, record: &T, source: &DocumentId) -> ValidationOutcome {
        (self.0)(record, source)
    }
}
