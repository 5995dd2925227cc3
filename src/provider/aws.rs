//! AWS-style error classification for EC2, S3, and RDS.
//!
//! Matching order for an API error:
//!
//! 1. Service-specific codes (see [`AwsClassifier::classify`]).
//! 2. Codes shared by every AWS service: throttling, internal failures, and
//!    request timeouts.
//! 3. Message heuristics from [`crate::classify::TRANSIENT_MESSAGE_HINTS`].
//! 4. `ProviderError`, not retryable.
//!
//! Transport errors skip straight to step 3. Cancellation and deadline errors
//! are always `NetworkTimeout` and never retried.

use crate::classify::{Classification, ErrorClassifier, Resolved, classify_message};
use crate::error::{ErrorKind, ErrorOrigin};
use thiserror::Error;

/// Native error surface of an AWS SDK call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    /// Structured API error returned by the service.
    #[error("api error {code}: {message}")]
    Api {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The caller's deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Connection-level failure with no structured error code.
    #[error("{0}")]
    Transport(String),
}

impl AwsError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(self, id: impl Into<String>) -> Self {
        match self {
            Self::Api { code, message, .. } => Self::Api {
                code,
                message,
                request_id: Some(id.into()),
            },
            other => other,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Api { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// Which AWS service's code table to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwsService {
    Ec2,
    S3,
    Rds,
}

impl AwsService {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ec2 => "EC2",
            Self::S3 => "S3",
            Self::Rds => "RDS",
        }
    }
}

/// Classifier for [`AwsError`]s produced by one AWS service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwsClassifier {
    service: AwsService,
}

impl AwsClassifier {
    pub fn new(service: AwsService) -> Self {
        Self { service }
    }

    pub fn compute() -> Self {
        Self::new(AwsService::Ec2)
    }

    pub fn storage() -> Self {
        Self::new(AwsService::S3)
    }

    pub fn database() -> Self {
        Self::new(AwsService::Rds)
    }

    pub fn service(&self) -> AwsService {
        self.service
    }

    fn classify_code(&self, code: &str, message: &str) -> Option<Classification> {
        match self.service {
            AwsService::Ec2 => ec2_code(code, message),
            AwsService::S3 => s3_code(code, message),
            AwsService::Rds => rds_code(code, message),
        }
        .or_else(|| self.common_code(code))
    }

    fn common_code(&self, code: &str) -> Option<Classification> {
        let label = self.service.label();
        let c = match code {
            "Throttling" | "ThrottlingException" | "RequestLimitExceeded" => {
                Classification::new(ErrorKind::RateLimited, "Rate limit exceeded").with_suggestions([
                    "Reduce the frequency of API calls",
                    "Implement exponential backoff (this is done automatically)",
                    "Consider using batch operations where available",
                ])
            }
            "InternalError" | "InternalFailure" | "ServiceUnavailable" => Classification::new(
                ErrorKind::ProviderError,
                format!("{label} service error: {code}"),
            )
            .with_retryable(true)
            .with_suggestions([format!("Check AWS {label} service status for any ongoing issues")]),
            "RequestTimeout" | "RequestTimeoutException" => {
                Classification::new(ErrorKind::NetworkTimeout, "Request timed out")
                    .with_suggestions(["Check network connectivity"])
            }
            _ => return None,
        };
        Some(c)
    }

    fn unclassified(&self, message: &str) -> Classification {
        let label = match self.service {
            AwsService::Ec2 => "AWS",
            other => other.label(),
        };
        Classification::new(ErrorKind::ProviderError, format!("{label} error: {message}"))
            .with_suggestions([
                format!("Check AWS {} service status for any ongoing issues", self.service.label()),
                "Verify your request parameters are valid".to_string(),
                "Contact AWS Support if the issue persists".to_string(),
            ])
    }
}

impl ErrorClassifier for AwsClassifier {
    type Error = AwsError;

    fn classify(&self, err: &AwsError) -> Classification {
        match err {
            AwsError::Cancelled => {
                Classification::new(ErrorKind::NetworkTimeout, "Operation was cancelled")
                    .with_retryable(false)
                    .with_suggestions([
                        "Check if the operation timeout is sufficient",
                        "Verify network connectivity",
                    ])
            }
            AwsError::DeadlineExceeded => {
                Classification::new(ErrorKind::NetworkTimeout, "Operation timed out")
                    .with_retryable(false)
                    .with_suggestions([
                        "Increase the operation timeout".to_string(),
                        "Check network connectivity".to_string(),
                        format!("Verify AWS {} service status", self.service.label()),
                    ])
            }
            AwsError::Api { code, message, .. } => self
                .classify_code(code, message)
                .or_else(|| {
                    classify_message(&err.to_string()).map(|c| Classification {
                        message: self.unclassified(message).message,
                        ..c
                    })
                })
                .unwrap_or_else(|| self.unclassified(message)),
            AwsError::Transport(message) => classify_message(message).unwrap_or_else(|| {
                Classification::new(ErrorKind::ProviderError, "Unexpected error occurred")
                    .with_suggestions([
                        "Check the underlying error for more details",
                        "Verify your AWS configuration is correct",
                        "Try the operation again",
                    ])
            }),
        }
    }

    fn resolve(&self, err: AwsError, origin: &ErrorOrigin) -> Resolved {
        let classification = self.classify(&err);
        let retryable = classification.retryable;
        let mut error = classification.into_error(origin.clone());
        if let AwsError::Api {
            code, request_id, ..
        } = &err
        {
            error = error.with_metadata("aws_error_code", code.as_str());
            if let Some(id) = request_id {
                error = error.with_context(id.as_str(), [("aws_service", self.service.label())]);
            }
        }
        Resolved {
            error: error.with_cause(err),
            retryable,
        }
    }
}

fn auth_failed() -> Classification {
    Classification::new(ErrorKind::Authentication, "Authentication failed").with_suggestions([
        "Verify your AWS access key and secret key are correct",
        "Check if your credentials have expired",
        "Ensure your system clock is synchronized",
    ])
}

fn access_denied(service: AwsService) -> Classification {
    Classification::new(ErrorKind::Authorization, "Authorization failed").with_suggestions([
        format!(
            "Verify your IAM user/role has the required {} permissions",
            service.label()
        ),
        "Ensure you're operating in the correct AWS region".to_string(),
    ])
}

fn invalid_field(field: &str, reason: &str) -> Classification {
    Classification::new(
        ErrorKind::InvalidConfig,
        format!("Invalid configuration for field '{field}': {reason}"),
    )
}

fn not_found(resource: &str, id: &str) -> Classification {
    Classification::new(ErrorKind::ResourceNotFound, format!("{resource} '{id}' not found"))
}

fn conflict(message: &str) -> Classification {
    Classification::new(ErrorKind::ResourceConflict, message)
}

fn ec2_code(code: &str, message: &str) -> Option<Classification> {
    let c = match code {
        "UnauthorizedOperation" | "AccessDenied" => access_denied(AwsService::Ec2),
        "AuthFailure" | "InvalidUserID.NotFound" | "SignatureDoesNotMatch" => auth_failed(),
        "InvalidInstanceID.NotFound" => not_found("instance", &extract_instance_id(message))
            .with_suggestions([
                "Verify the instance ID is correct",
                "Ensure the instance hasn't been terminated",
            ]),
        "InvalidAMIID.NotFound" => invalid_field("ImageID", "AMI not found").with_suggestions([
            "Verify the AMI ID is correct and exists in your region",
        ]),
        "InvalidInstanceType" => invalid_field("InstanceType", "Invalid instance type")
            .with_suggestions(["Check the instance type is available in your region"]),
        "InvalidKeyPair.NotFound" => invalid_field("KeyName", "Key pair not found")
            .with_suggestions(["Create the key pair if it doesn't exist"]),
        "InsufficientInstanceCapacity" => conflict("Insufficient capacity for instance type")
            .with_suggestions([
                "Try a different instance type",
                "Try launching in a different availability zone",
            ]),
        "InstanceLimitExceeded" => conflict("Instance limit exceeded").with_suggestions([
            "Request a limit increase from AWS Support",
            "Terminate unused instances to free up capacity",
        ]),
        _ => return None,
    };
    Some(c)
}

fn s3_code(code: &str, message: &str) -> Option<Classification> {
    let c = match code {
        "AccessDenied" => access_denied(AwsService::S3),
        "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "TokenRefreshRequired" => auth_failed(),
        "NoSuchBucket" => not_found("bucket", &extract_bucket_name(message))
            .with_suggestions(["Verify the bucket name is correct"]),
        "NoSuchKey" => not_found("object", "unknown")
            .with_suggestions(["Verify the object key is correct"]),
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => conflict("Bucket already exists")
            .with_suggestions([
                "Choose a different bucket name (bucket names must be globally unique)",
                "Check if you already own this bucket",
            ]),
        "BucketNotEmpty" => conflict("Bucket is not empty")
            .with_suggestions(["Delete all objects in the bucket first"]),
        "InvalidBucketName" => invalid_field("BucketName", "Invalid bucket name").with_suggestions([
            "Bucket names must be 3-63 characters long",
            "Use only lowercase letters, numbers, and hyphens",
        ]),
        "EntityTooLarge" => invalid_field("ObjectSize", "Object too large")
            .with_suggestions(["Use multipart upload for objects larger than 5GB"]),
        "InvalidStorageClass" => invalid_field("StorageClass", "Invalid storage class")
            .with_suggestions(["Check if the storage class is available in your region"]),
        "SlowDown" => Classification::new(ErrorKind::RateLimited, "Rate limit exceeded")
            .with_suggestions(["Reduce the frequency of API calls"]),
        _ => return None,
    };
    Some(c)
}

fn rds_code(code: &str, message: &str) -> Option<Classification> {
    let c = match code {
        "AccessDenied" | "UnauthorizedOperation" => access_denied(AwsService::Rds),
        "InvalidUserID.NotFound" | "SignatureDoesNotMatch" | "TokenRefreshRequired" => {
            auth_failed()
        }
        "DBInstanceNotFoundFault" => {
            not_found("database instance", &extract_db_instance_id(message))
                .with_suggestions(["Verify the database instance ID is correct"])
        }
        "DBInstanceAlreadyExistsFault" => conflict("Database instance already exists")
            .with_suggestions(["Choose a different database instance identifier"]),
        "InsufficientDBInstanceCapacity" => {
            conflict("Insufficient capacity for database instance")
                .with_suggestions(["Try a different instance class"])
        }
        "DBInstanceLimitExceeded" => conflict("Database instance limit exceeded")
            .with_suggestions(["Delete unused database instances to free up capacity"]),
        "InvalidDBInstanceClass" => {
            invalid_field("InstanceClass", "Invalid database instance class")
                .with_suggestions(["Use valid instance classes like db.t3.micro, db.t3.small"])
        }
        "InvalidEngine" => invalid_field("Engine", "Invalid database engine")
            .with_suggestions(["Use supported engines: mysql, postgres, oracle-ee, sqlserver-ex"]),
        "InvalidParameterValue" => invalid_field("Parameter", message)
            .with_suggestions(["Check all parameter values are within valid ranges"]),
        "DBSubnetGroupNotFoundFault" => invalid_field("DBSubnetGroup", "DB subnet group not found")
            .with_suggestions(["Create a DB subnet group first"]),
        "InvalidVPCNetworkStateFault" => invalid_field("VPC", "Invalid VPC network state")
            .with_suggestions(["Ensure your VPC is properly configured"]),
        _ => return None,
    };
    Some(c)
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '\'' | ',' | '.' | '"'))
}

/// First `i-` token that looks like a 17-hex-digit instance id.
fn extract_instance_id(message: &str) -> String {
    message
        .split_whitespace()
        .map(trim_token)
        .find(|t| t.starts_with("i-") && t.len() == 19)
        .unwrap_or("unknown")
        .to_string()
}

/// The token following the word `bucket`.
fn extract_bucket_name(message: &str) -> String {
    let mut tokens = message.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("bucket") {
            if let Some(name) = tokens.next() {
                return trim_token(name).to_string();
            }
        }
    }
    "unknown".to_string()
}

/// First hyphenated token longer than three characters.
fn extract_db_instance_id(message: &str) -> String {
    message
        .split_whitespace()
        .map(trim_token)
        .find(|t| t.len() > 3 && t.contains('-'))
        .unwrap_or("unknown")
        .to_string()
}
