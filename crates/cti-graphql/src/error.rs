//! Error types for the GraphQL client.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::filter::FilterErrors;

/// HTTP error information captured from reqwest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// Error message.
    pub message: String,
    /// HTTP status code (if available).
    pub status_code: Option<u16>,
    /// Whether the error was a timeout.
    pub is_timeout: bool,
    /// Whether the error was a connection failure.
    pub is_connect: bool,
    /// Whether the error happened while building or sending the request.
    pub is_request: bool,
}

impl From<reqwest::Error> for HttpErrorInfo {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status().map(|status| status.as_u16()),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
            is_request: err.is_request(),
        }
    }
}

/// GraphQL error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// Line number in the query (1-based).
    pub line: u32,
    /// Column number in the query (1-based).
    pub column: u32,
}

/// GraphQL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    /// Field name.
    Key(String),
    /// Array index.
    Index(i64),
}

/// Server-side details attached to a platform error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub http_status: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
}

/// GraphQL error as returned by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Error class name, e.g. `FUNCTIONAL_ERROR`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Human-readable error message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Server timestamp of the failure.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_thrown: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: GraphqlErrorData,
    /// Location(s) within the query.
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Path within the response where the error occurred.
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<GraphqlPathSegment>,
    /// Extensions metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() {
            "Message"
        } else {
            self.name.as_str()
        };
        let message = if self.data.reason.is_empty() {
            self.message.as_str()
        } else {
            self.data.reason.as_str()
        };
        write!(f, "GraphQL error: {name}: {message}")
    }
}

impl std::error::Error for GraphqlError {}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn join_errors(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Error type for GraphQL client operations.
#[derive(Debug, Clone, Error)]
pub enum GraphqlClientError {
    /// No server URL was configured.
    #[error("an URL must be set")]
    MissingUrl,

    /// No API token was configured.
    #[error("a token must be set")]
    MissingToken,

    /// The server URL could not be parsed.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// A header value contains characters HTTP does not allow.
    #[error("invalid value for header '{name}'")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
    },

    /// Invalid environment or builder configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An uploaded file has no name.
    #[error("file has empty filename")]
    EmptyFileName,

    /// An uploaded file has no MIME type.
    #[error("file has empty MIME type")]
    EmptyMimeType,

    /// An uploaded file has a MIME type reqwest refuses.
    #[error("file '{name}' has invalid MIME type '{mime}'")]
    InvalidMimeType {
        /// File name.
        name: String,
        /// Rejected MIME type.
        mime: String,
    },

    /// Filter tree with missing content.
    #[error("invalid filters: {0}")]
    InvalidFilter(#[from] FilterErrors),

    /// A structured operation was asked to decode into a non-object type.
    #[error("output type must be a struct, received '{received}'")]
    NotAStruct {
        /// Received type name.
        received: &'static str,
    },

    /// HTTP/network error.
    #[error("HTTP error: {}", .0.message)]
    Http(HttpErrorInfo),

    /// Any response status other than 200.
    #[error("unexpected http status code: {status}")]
    HttpStatus {
        /// HTTP status code.
        status: StatusCode,
        /// Response body (truncated if needed).
        body: String,
    },

    /// JSON encoding or parsing error.
    #[error("JSON error: {0}")]
    Json(String),

    /// GraphQL protocol violation.
    #[error("GraphQL protocol error: {message}")]
    Protocol {
        /// Details.
        message: String,
    },

    /// GraphQL-level errors returned by the server. Response data is discarded.
    #[error("{}", join_errors(.errors))]
    GraphqlErrors {
        /// GraphQL error list.
        errors: Vec<GraphqlError>,
    },

    /// The expected response field is absent.
    #[error("unable to find field '{field}' in map")]
    MissingField {
        /// Response field name.
        field: String,
    },

    /// A response value has an unexpected shape.
    #[error("unable to convert {value} to {expected}")]
    TypeAssertion {
        /// Rendered offending value.
        value: String,
        /// Expected type.
        expected: &'static str,
    },

    /// Response data does not fit the target type.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Impersonation target lookup did not yield exactly one user.
    #[error("could not find user with name \"{username}\"")]
    UserNotFound {
        /// Requested user name.
        username: String,
    },

    /// The pagination driver reached its configured page cap.
    #[error("pagination limit exceeded after {pages} pages")]
    PaginationLimitExceeded {
        /// Pages fetched before giving up.
        pages: usize,
    },

    /// Failure of an entity operation, with context.
    #[error("unable to {action} {entity}: {source}")]
    Operation {
        /// Operation verb.
        action: &'static str,
        /// Entity type name.
        entity: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<GraphqlClientError>,
    },
}

impl From<reqwest::Error> for GraphqlClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(HttpErrorInfo::from(err))
    }
}

impl From<serde_json::Error> for GraphqlClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl GraphqlClientError {
    /// Wrap the error with the entity operation it interrupted.
    #[must_use]
    pub fn in_operation(self, action: &'static str, entity: &'static str) -> Self {
        Self::Operation {
            action,
            entity,
            source: Box::new(self),
        }
    }

    /// The innermost error, with operation context removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns `true` if the request did not complete in time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Http(info) if info.is_timeout)
    }

    /// Server errors, when the failure was reported at the GraphQL level.
    #[must_use]
    pub fn graphql_errors(&self) -> Option<&[GraphqlError]> {
        match self.root() {
            Self::GraphqlErrors { errors } => Some(errors),
            _ => None,
        }
    }
}
