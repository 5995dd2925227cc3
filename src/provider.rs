//! Error classification for concrete cloud provider bindings.
//!
//! Each sub-module is gated behind a Cargo feature flag. A binding wraps its
//! native SDK calls in a [`RetryExecutor`](crate::reliability::RetryExecutor)
//! parameterised with the classifier from its module, so callers only ever
//! observe [`CloudError`](crate::error::CloudError)s.
//!
//! | Module | Feature | Services |
//! |--------|---------|----------|
//! | `aws` | `provider-aws` | EC2 (compute), S3 (storage), RDS (database) |

#[cfg(feature = "provider-aws")]
pub mod aws;
