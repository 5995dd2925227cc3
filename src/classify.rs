//! Mapping native provider errors onto the [`ErrorKind`] taxonomy.
//!
//! Each provider binding supplies an [`ErrorClassifier`] for its native error
//! type. Classifiers are pure: the verdict depends only on the error value.
//! All classifiers share three rules:
//!
//! 1. Cancellation and deadline errors from the caller's context map to
//!    [`ErrorKind::NetworkTimeout`] and are **not** retryable.
//! 2. Unrecognized errors map to [`ErrorKind::ProviderError`].
//! 3. Message heuristics ([`classify_message`]) are consulted only after
//!    structured matching (error codes, typed variants) found nothing.

use crate::error::{CloudError, ErrorKind, ErrorOrigin};

/// A classifier's verdict for one native error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    /// Whether the retry engine may try again. Defaults to the kind's default
    /// and may be overridden per vendor code.
    pub retryable: bool,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl Classification {
    /// Verdict with the kind's default retryability and no suggestions.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    /// Override the kind's default retryability.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Build the taxonomy error for this verdict. A retryability that differs
    /// from the kind's default travels with the error as its retry override.
    pub fn into_error(self, origin: ErrorOrigin) -> CloudError {
        CloudError::at(self.kind, self.message, origin)
            .with_suggestions(self.suggestions)
            .with_retry_override(self.retryable)
    }
}

/// A native error turned into a taxonomy error plus the retry verdict.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub error: CloudError,
    pub retryable: bool,
}

/// Per-provider mapping from a native error type to the taxonomy.
pub trait ErrorClassifier: Send + Sync {
    /// The native error produced by the wrapped operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decide kind, retryability, and suggestions for `err`.
    fn classify(&self, err: &Self::Error) -> Classification;

    /// Classify `err` and wrap it as the cause of a new [`CloudError`] located
    /// at `origin`.
    fn resolve(&self, err: Self::Error, origin: &ErrorOrigin) -> Resolved {
        let classification = self.classify(&err);
        let retryable = classification.retryable;
        Resolved {
            error: classification.into_error(origin.clone()).with_cause(err),
            retryable,
        }
    }
}

/// Classifier for operations that already return [`CloudError`].
///
/// A taxonomy error is never re-classified: the error passes through unchanged
/// and [`CloudError::should_retry`] is the verdict, so cancellations and vendor
/// overrides recorded at the original boundary still hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughClassifier;

impl ErrorClassifier for PassthroughClassifier {
    type Error = CloudError;

    fn classify(&self, err: &CloudError) -> Classification {
        Classification {
            kind: err.kind(),
            retryable: err.should_retry(),
            message: err.message().to_string(),
            suggestions: err.suggestions().to_vec(),
        }
    }

    fn resolve(&self, err: CloudError, _origin: &ErrorOrigin) -> Resolved {
        let retryable = err.should_retry();
        Resolved {
            error: err,
            retryable,
        }
    }
}

/// Message fragments checked by [`classify_message`], in priority order.
///
/// The first fragment contained in the lowercased message wins. Every hint is
/// treated as transient.
pub const TRANSIENT_MESSAGE_HINTS: [(&str, ErrorKind); 6] = [
    ("connection reset", ErrorKind::NetworkTimeout),
    ("connection refused", ErrorKind::NetworkTimeout),
    ("timeout", ErrorKind::NetworkTimeout),
    ("temporary failure", ErrorKind::NetworkTimeout),
    ("service unavailable", ErrorKind::ProviderError),
    ("internal error", ErrorKind::ProviderError),
];

/// Last-resort classification from free-form error text.
///
/// Returns `None` when no hint matches; callers then fall back to
/// [`ErrorKind::ProviderError`].
pub fn classify_message(message: &str) -> Option<Classification> {
    let lowered = message.to_lowercase();
    TRANSIENT_MESSAGE_HINTS
        .iter()
        .find(|(hint, _)| lowered.contains(hint))
        .map(|(_, kind)| Classification::new(*kind, message).with_retryable(true))
}
