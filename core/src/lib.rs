//! Async client for the facility-management API.
//!
//! # Overview
//! Wraps the service's generic `performFind` query endpoint and its
//! `service/*` command endpoints. Queries are shaped into `FindQuery` bodies;
//! results are reshaped into per-facility mappings or date-formatted lists.
//!
//! # Design
//! - `FacilityApi` is stateless and does no I/O: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - `FacilityClient` runs the round-trip through an injected `Transport`,
//!   reads "today" from an injected `Clock` and reports swallowed failures to
//!   an injected `Logger`.
//! - Command operations and raw find queries propagate every error. The
//!   reshaping fetchers return `Result`; `FacilityClient::or_default` opts
//!   into log-and-empty behaviour.

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod http;
pub mod logger;
pub mod transport;
pub mod types;

pub use api::{FacilityApi, ServiceAction};
pub use client::FacilityClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use error::FacilityError;
pub use fallback::OrDefault;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use logger::{Logger, TracingLogger};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    ApiResponse, FacilityGroupMember, FacilityGroupMemberships, FacilityOrderCount,
    FacilityOrderCountEntry, FindQuery, FindResult,
};
