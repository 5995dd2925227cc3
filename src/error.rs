//! Provider-independent error taxonomy.
//!
//! Every failure that leaves a provider binding, the simulator, or the retry
//! engine is a [`CloudError`]. The [`ErrorKind`] is a closed set; callers match
//! on the kind (or on [`CloudError::retryable`]) instead of on vendor details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Shared, type-erased underlying cause of a [`CloudError`].
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of provider-independent error categories.
///
/// Serializes as the stable wire code returned by [`ErrorKind::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid, missing, or expired credentials.
    #[serde(rename = "AUTHENTICATION_FAILED")]
    Authentication,
    /// Credentials are valid but lack permission for the operation.
    #[serde(rename = "AUTHORIZATION_FAILED")]
    Authorization,
    /// The provider does not offer the requested service.
    #[serde(rename = "SERVICE_NOT_SUPPORTED")]
    ServiceNotSupported,
    /// The service exists but does not offer the requested operation.
    #[serde(rename = "OPERATION_NOT_SUPPORTED")]
    OperationNotSupported,
    /// The target resource does not exist.
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// Naming or state conflict (duplicate create, non-empty delete, ...).
    #[serde(rename = "RESOURCE_CONFLICT")]
    ResourceConflict,
    /// The provider throttled the request.
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimited,
    /// Transient connectivity failure, timeout, or cancellation.
    #[serde(rename = "NETWORK_TIMEOUT")]
    NetworkTimeout,
    /// Malformed caller input or configuration.
    #[serde(rename = "INVALID_CONFIGURATION")]
    InvalidConfig,
    /// Unclassified vendor failure.
    #[serde(rename = "PROVIDER_ERROR")]
    ProviderError,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::ServiceNotSupported,
        ErrorKind::OperationNotSupported,
        ErrorKind::ResourceNotFound,
        ErrorKind::ResourceConflict,
        ErrorKind::RateLimited,
        ErrorKind::NetworkTimeout,
        ErrorKind::InvalidConfig,
        ErrorKind::ProviderError,
    ];

    /// Stable wire code, e.g. `"RESOURCE_NOT_FOUND"`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION_FAILED",
            Self::Authorization => "AUTHORIZATION_FAILED",
            Self::ServiceNotSupported => "SERVICE_NOT_SUPPORTED",
            Self::OperationNotSupported => "OPERATION_NOT_SUPPORTED",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::ResourceConflict => "RESOURCE_CONFLICT",
            Self::RateLimited => "RATE_LIMIT_EXCEEDED",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::InvalidConfig => "INVALID_CONFIGURATION",
            Self::ProviderError => "PROVIDER_ERROR",
        }
    }

    /// Returns `true` for transient kinds that may succeed on retry:
    /// [`RateLimited`](Self::RateLimited) and [`NetworkTimeout`](Self::NetworkTimeout).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::NetworkTimeout)
    }

    /// Kinds that require user action and therefore always carry suggestions
    /// when produced by the helper constructors.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::Authorization
                | Self::InvalidConfig
                | Self::ServiceNotSupported
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where a failure happened: provider, service, and operation names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorOrigin {
    pub provider: String,
    pub service: String,
    pub operation: String,
}

impl ErrorOrigin {
    /// Origin for `operation` on `service` of `provider`. Empty names are allowed.
    pub fn new(
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            service: service.into(),
            operation: operation.into(),
        }
    }
}

/// Structured, provider-independent error value.
///
/// `retryable` is derived from the kind at construction and cannot be changed
/// afterwards. Enrichment methods consume `self` and return the extended value.
///
/// Displays as `[CODE] message (provider: p)`; [`report`](Self::report) adds
/// the suggestions.
#[derive(Clone, thiserror::Error)]
#[error("[{}] {message}{}", .kind.code(), ProviderSuffix(&.origin.provider))]
pub struct CloudError {
    kind: ErrorKind,
    message: String,
    origin: ErrorOrigin,
    suggestions: Vec<String>,
    #[source]
    cause: Option<Cause>,
    retryable: bool,
    /// Retry verdict recorded by a classifier when it differs from `retryable`.
    retry_override: Option<bool>,
    timestamp: DateTime<Utc>,
    request_id: Option<String>,
    metadata: BTreeMap<String, String>,
}

/// ` (provider: p)`, or nothing for an anonymous provider.
struct ProviderSuffix<'a>(&'a str);

impl fmt::Display for ProviderSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, " (provider: {})", self.0)
        }
    }
}

impl CloudError {
    /// Create an error of `kind` originating from `provider`/`service`/`operation`.
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::at(kind, message, ErrorOrigin::new(provider, service, operation))
    }

    /// Same as [`new`](Self::new) with a prebuilt [`ErrorOrigin`].
    pub fn at(kind: ErrorKind, message: impl Into<String>, origin: ErrorOrigin) -> Self {
        Self {
            kind,
            message: message.into(),
            origin,
            suggestions: Vec::new(),
            cause: None,
            retryable: kind.is_retryable(),
            retry_override: None,
            timestamp: Utc::now(),
            request_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Credentials were rejected. Carries the native `cause` and credential hints.
    pub fn authentication(
        provider: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            ErrorKind::Authentication,
            "Authentication failed",
            provider,
            "",
            "authenticate",
        )
        .with_cause(cause)
        .with_suggestions([
            "Check your credentials are correctly configured",
            "Verify your access keys are not expired",
            "Ensure your credentials have the necessary permissions",
            "Try refreshing your authentication tokens",
        ])
    }

    /// Credentials are valid but not permitted to run `operation`.
    pub fn authorization(
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            ErrorKind::Authorization,
            "Authorization failed",
            provider,
            service,
            operation,
        )
        .with_cause(cause)
        .with_suggestions([
            "Check that your credentials have the required permissions",
            "Verify your IAM policies allow this operation",
            "Ensure you're operating in the correct region/account",
        ])
    }

    /// `"<resource_type> '<id>' not found"`, reported against the `get` operation.
    pub fn not_found(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource_type: &str,
        id: &str,
    ) -> Self {
        Self::new(
            ErrorKind::ResourceNotFound,
            format!("{resource_type} '{id}' not found"),
            provider,
            service,
            "get",
        )
        .with_suggestions([
            "Verify the resource ID is correct",
            "Check that the resource exists in the specified region",
            "Ensure you have permission to access this resource",
        ])
    }

    /// `"Invalid configuration for field '<field>': <reason>"`.
    pub fn invalid_config(
        provider: impl Into<String>,
        service: impl Into<String>,
        field: &str,
        reason: &str,
    ) -> Self {
        Self::new(
            ErrorKind::InvalidConfig,
            format!("Invalid configuration for field '{field}': {reason}"),
            provider,
            service,
            "validate",
        )
        .with_suggestions([
            "Check the field value meets the required format",
            "Refer to the provider documentation for valid values",
            "Ensure all required fields are provided",
        ])
    }

    /// Throttled by the provider. A non-zero `retry_after` becomes an extra suggestion.
    pub fn rate_limited(
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let err = Self::new(
            ErrorKind::RateLimited,
            "Rate limit exceeded",
            provider,
            service,
            operation,
        )
        .with_suggestions([
            "Reduce the frequency of API calls",
            "Implement exponential backoff in your retry logic",
        ]);
        match retry_after {
            Some(after) if !after.is_zero() => {
                err.with_suggestions([format!("Retry after {after:?}")])
            }
            _ => err,
        }
    }

    /// Naming or state conflict, without suggestions; callers add their own.
    pub fn conflict(
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::ResourceConflict,
            message,
            provider,
            service,
            operation,
        )
    }

    /// The provider does not declare `service` in its capability set.
    pub fn service_not_supported(provider: impl Into<String>, service: impl fmt::Display) -> Self {
        let provider = provider.into();
        let message = format!(
            "provider '{provider}' does not support '{service}' service. \
             Please check provider documentation for supported services or switch to a compatible provider"
        );
        Self::new(
            ErrorKind::ServiceNotSupported,
            message,
            provider,
            service.to_string(),
            "",
        )
        .with_suggestions([
            "Call supported_services() to see which services this provider offers",
            "Switch to a provider that offers this service",
        ])
    }

    /// The service is offered, but not this operation or sub-capability.
    pub fn operation_not_supported(
        provider: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorKind::OperationNotSupported,
            format!("operation '{operation}' is not supported"),
            provider,
            service,
            operation,
        )
        .with_suggestions(["Check the provider's supported features before calling this operation"])
    }

    /// The calling context was cancelled before or between attempts.
    ///
    /// The kind is `NetworkTimeout`, but [`should_retry`](Self::should_retry)
    /// is `false`: the caller already gave up.
    pub fn cancelled(origin: ErrorOrigin) -> Self {
        Self::at(ErrorKind::NetworkTimeout, "Operation was cancelled", origin)
            .with_retry_override(false)
    }

    /// The calling context's deadline elapsed. Final, like [`cancelled`](Self::cancelled).
    pub fn timed_out(origin: ErrorOrigin) -> Self {
        Self::at(ErrorKind::NetworkTimeout, "Operation timed out", origin)
            .with_retry_override(false)
    }

    /// Append remediation hints.
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Attach the underlying cause, exposed through [`std::error::Error::source`].
    pub fn with_cause(self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.with_shared_cause(Arc::new(cause))
    }

    /// Like [`with_cause`](Self::with_cause) for a cause that is already shared.
    pub fn with_shared_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Attach a request id and merge debugging metadata.
    pub fn with_context<I, K, V>(mut self, request_id: impl Into<String>, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request_id = Some(request_id.into());
        self.metadata
            .extend(metadata.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Record a classifier's retry verdict when it differs from the kind's default.
    ///
    /// [`retryable`](Self::retryable) keeps reporting the kind's default; the
    /// override only changes [`should_retry`](Self::should_retry).
    pub fn with_retry_override(mut self, retry: bool) -> Self {
        self.retry_override = (retry != self.retryable).then_some(retry);
        self
    }

    /// Insert a single metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable wire code of the kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Human-readable description, without code or provider.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> &ErrorOrigin {
        &self.origin
    }

    pub fn provider(&self) -> &str {
        &self.origin.provider
    }

    pub fn service(&self) -> &str {
        &self.origin.service
    }

    pub fn operation(&self) -> &str {
        &self.origin.operation
    }

    /// Remediation hints, in the order they were added.
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// The native error this value was classified from, if any.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// The kind's default retryability, fixed at construction.
    pub fn retryable(&self) -> bool {
        self.retryable
    }

    /// Whether a retry engine may try again: the classifier's override when one
    /// was recorded, otherwise [`retryable`](Self::retryable).
    pub fn should_retry(&self) -> bool {
        self.retry_override.unwrap_or(self.retryable)
    }

    /// `true` for [`cancelled`](Self::cancelled) and [`timed_out`](Self::timed_out)
    /// errors and any other `NetworkTimeout` a classifier marked as final.
    pub fn is_final_timeout(&self) -> bool {
        self.kind == ErrorKind::NetworkTimeout && !self.should_retry()
    }

    /// When the error was constructed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Vendor request id attached through [`with_context`](Self::with_context).
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Free-form debugging context, keyed for stable ordering.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Shorthand for `self.kind() == kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// The display form followed by the suggestions, one per line.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        if !self.suggestions.is_empty() {
            out.push_str("\nSuggestions:");
            for suggestion in &self.suggestions {
                out.push_str("\n  - ");
                out.push_str(suggestion);
            }
        }
        out
    }
}

impl fmt::Debug for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("origin", &self.origin)
            .field("suggestions", &self.suggestions)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .field("retryable", &self.retryable)
            .field("retry_override", &self.retry_override)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Cross-boundary shape. The cause is internal and never serialized.
#[derive(Serialize)]
struct WireError<'a> {
    code: ErrorKind,
    message: &'a str,
    provider: &'a str,
    suggestions: &'a [String],
    retryable: bool,
}

impl Serialize for CloudError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireError {
            code: self.kind,
            message: &self.message,
            provider: &self.origin.provider,
            suggestions: &self.suggestions,
            retryable: self.retryable,
        }
        .serialize(serializer)
    }
}
