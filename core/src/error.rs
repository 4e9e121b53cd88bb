//! Error types for the facility API client.
//!
//! # Design
//! Transport failures, non-2xx statuses and 2xx responses flagged by the
//! service as failed are kept apart so callers can tell "never reached the
//! server" from "the server refused". `NoRecords` is a failure only for the
//! reshaping fetchers, which treat an empty find result as unusable.

/// Errors returned by `FacilityApi` parsers and `FacilityClient` operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacilityError {
    /// The transport could not complete the round-trip.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The server answered 2xx but the body carries an error marker.
    #[error("remote service error: {0}")]
    Remote(String),

    /// A find query succeeded without matching any record.
    #[error("no {entity} records found")]
    NoRecords { entity: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("timestamp {0} is out of range")]
    InvalidDate(i64),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}
