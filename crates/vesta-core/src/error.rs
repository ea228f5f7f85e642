use std::fmt;

use thiserror::Error;

/// Errors reported by the remote collaborators (catalog API, search API, config files).
///
/// This enum is what the HTTP clients return. The sync pipeline never exposes it directly:
/// it is always wrapped as the `#[source]` of a [`ResolveError`] or [`IndexError`], so the
/// full cause chain survives up to the log line written for a failed notification.
///
/// # Examples
///
/// ```
/// use vesta_core::error::AppError;
///
/// let err = AppError::NotFound("products/p1".to_string());
/// assert_eq!(err.to_string(), "Resource not found: products/p1");
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed, or the remote API answered with a server error (5xx).
    #[error("API Client error: {0}")]
    ClientError(String),

    /// The remote API refused the request itself (4xx other than the mapped ones).
    ///
    /// Sending the same request again gets the same answer.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The remote API answered with a body that could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Network or connection error.
    ///
    /// DNS failures, refused connections and resets end up here.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// The remote API reported that the requested resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Credentials were rejected by the remote API.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The remote API reported a conflicting concurrent write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for operator-facing output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ClientError(msg) => format!("API error: {}", msg),
            AppError::Rejected(msg) => {
                format!("The remote API rejected the request: {}", msg)
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check connectivity to the remote API.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   \
                     The server may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::Unauthorized(_) => {
                "Credentials were rejected.\n   \
                 Check the CTP_* and ALGOLIA_* environment variables."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use vesta_core::error::AppError;
    ///
    /// // Network errors are retryable
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// // A missing resource is NOT retryable
    /// let err = AppError::NotFound("products/p1".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::ClientError(_)
        )
    }
}

/// Transport-agnostic classification of a failed notification.
///
/// The server maps each class to a status code; nothing in this crate knows about HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The notification itself is unusable. Redelivering it will not help.
    ClientInput,
    /// The referenced product does not exist.
    NotFound,
    /// Local misconfiguration.
    Internal,
    /// A remote service failed; a later redelivery may succeed.
    External,
}

/// Failures while turning a raw push request into a [`ChangeEvent`](crate::ChangeEvent).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("notification envelope or message data is missing")]
    MissingEnvelope,

    #[error("notification payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("notification payload does not reference a product id")]
    MissingEntityId,
}

/// The catalog resource a resolve step was fetching when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubResource {
    Product,
    ProductType,
    Category,
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubResource::Product => "product",
            SubResource::ProductType => "product type",
            SubResource::Category => "category",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The catalog has no product with this id.
    #[error("product {0} not found")]
    EntityNotFound(String),

    /// Fetching the product or one of its references failed.
    #[error("failed to fetch {resource} {id}")]
    SubResourceFailure {
        resource: SubResource,
        id: String,
        #[source]
        cause: AppError,
    },
}

impl ResolveError {
    pub fn sub_resource(resource: SubResource, id: impl Into<String>, cause: AppError) -> Self {
        Self::SubResourceFailure {
            resource,
            id: id.into(),
            cause,
        }
    }
}

/// The search index call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOperation {
    ReadSettings,
    CreateIndex,
    PutRecord,
    DeleteRecord,
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexOperation::ReadSettings => "read settings",
            IndexOperation::CreateIndex => "create index",
            IndexOperation::PutRecord => "put record",
            IndexOperation::DeleteRecord => "delete record",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    /// The index name or settings cannot be used.
    #[error("invalid configuration for index '{index}': {reason}")]
    ConfigInvalid { index: String, reason: String },

    /// The search service rejected or failed a request.
    #[error("search index '{index}' failed to {operation}")]
    RemoteFailure {
        index: String,
        operation: IndexOperation,
        #[source]
        cause: AppError,
    },
}

impl IndexError {
    pub fn config_invalid(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            index: index.into(),
            reason: reason.into(),
        }
    }

    pub fn remote(index: impl Into<String>, operation: IndexOperation, cause: AppError) -> Self {
        Self::RemoteFailure {
            index: index.into(),
            operation,
            cause,
        }
    }
}

/// Any error that terminates the processing of one notification.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Decode(DecodeError::MissingEntityId) => ErrorClass::NotFound,
            SyncError::Decode(_) => ErrorClass::ClientInput,
            SyncError::Resolve(ResolveError::EntityNotFound(_)) => ErrorClass::NotFound,
            SyncError::Resolve(ResolveError::SubResourceFailure { .. }) => ErrorClass::External,
            SyncError::Index(IndexError::ConfigInvalid { .. }) => ErrorClass::Internal,
            SyncError::Index(IndexError::RemoteFailure { .. }) => ErrorClass::External,
        }
    }

    /// Returns true if redelivering the same notification could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Resolve(ResolveError::SubResourceFailure { cause, .. })
            | SyncError::Index(IndexError::RemoteFailure { cause, .. }) => cause.is_retryable(),
            _ => false,
        }
    }
}

/// Renders an error followed by every `source()` in its chain, separated by `": "`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
