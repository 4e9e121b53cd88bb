//! Async facade over the facility API.
//!
//! # Design
//! `FacilityClient` pairs the stateless `FacilityApi` with injected
//! collaborators: a `Transport` for the round-trip, a `Logger` for swallowed
//! failures and a `Clock` for "today". Every operation is build, execute,
//! parse; nothing is shared between calls, so a client can be cloned and used
//! from any number of tasks at once.
//!
//! Pass-through operations return the raw `ApiResponse` and propagate every
//! error. The reshaping fetchers return a typed `Result`; callers who want the
//! log-and-default behaviour go through `FacilityClient::or_default`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::api::{self, FacilityApi, ServiceAction};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::FacilityError;
use crate::fallback::OrDefault;
use crate::http::{HttpRequest, HttpResponse};
use crate::logger::{Logger, TracingLogger};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ApiResponse, FacilityGroupMemberships, FacilityOrderCountEntry};

#[derive(Clone)]
pub struct FacilityClient {
    api: FacilityApi,
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FacilityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacilityClient")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl FacilityClient {
    pub fn new(api: FacilityApi, transport: Arc<dyn Transport>, logger: Arc<dyn Logger>) -> Self {
        Self {
            api,
            transport,
            logger,
            clock: Arc::new(SystemClock),
        }
    }

    /// A client using `reqwest`, `tracing` and the local clock.
    pub fn from_config(config: &ClientConfig) -> Result<Self, FacilityError> {
        if config.timeout_secs == 0 {
            return Err(FacilityError::Config("timeout_secs must be positive".to_string()));
        }
        let mut api = FacilityApi::new(&config.base_url);
        if let Some(token) = &config.token {
            api = api.with_token(token);
        }
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::new(api, Arc::new(transport), Arc::new(TracingLogger)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &FacilityApi {
        &self.api
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Wrap the reshaping fetchers so failures are logged and replaced by
    /// empty results.
    pub fn or_default(&self) -> OrDefault<'_> {
        OrDefault::new(self)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FacilityError> {
        tracing::debug!(method = request.method.as_str(), path = %request.path, "sending facility request");
        let response = self.transport.execute(request).await?;
        tracing::debug!(status = response.status, "facility response received");
        Ok(response)
    }

    async fn command<P>(&self, action: ServiceAction, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        let request = self.api.build_service(action, payload)?;
        api::parse_api_response(self.send(request).await?)
    }

    /// Forward an arbitrary find query.
    #[tracing::instrument(skip_all)]
    pub async fn fetch_facilities<Q>(&self, query: &Q) -> Result<ApiResponse, FacilityError>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.api.build_find(query)?;
        api::parse_api_response(self.send(request).await?)
    }

    /// Group memberships of each facility, keyed by facility id.
    #[tracing::instrument(skip_all, fields(facilities = facility_ids.len()))]
    pub async fn fetch_facility_group_information<S: AsRef<str>>(
        &self,
        facility_ids: &[S],
    ) -> Result<FacilityGroupMemberships, FacilityError> {
        let request = self.api.build_facility_group_information(facility_ids)?;
        api::parse_facility_group_information(self.send(request).await?)
    }

    /// Today's `lastOrderCount` of each facility, "today" being the clock's date.
    #[tracing::instrument(skip_all, fields(facilities = facility_ids.len()))]
    pub async fn fetch_facilities_order_count<S: AsRef<str>>(
        &self,
        facility_ids: &[S],
    ) -> Result<BTreeMap<String, i64>, FacilityError> {
        let request = self
            .api
            .build_facilities_order_count(facility_ids, self.clock.today())?;
        api::parse_facilities_order_count(self.send(request).await?)
    }

    /// The ten most recent order counts of one facility, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_facility_order_counts(
        &self,
        facility_id: &str,
    ) -> Result<Vec<FacilityOrderCountEntry>, FacilityError> {
        let request = self.api.build_facility_order_counts(facility_id)?;
        let response = self.send(request).await?;
        api::parse_facility_order_counts(response, |millis| self.clock.offset_at(millis))
    }

    #[tracing::instrument(skip_all)]
    pub async fn update_facility<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::UpdateFacility, payload).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn fetch_facility_locations<Q>(&self, query: &Q) -> Result<ApiResponse, FacilityError>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.api.build_find(query)?;
        api::parse_api_response(self.send(request).await?)
    }

    #[tracing::instrument(skip_all)]
    pub async fn add_facility_to_group<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::AddFacilityToGroup, payload).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn create_facility_location<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::CreateFacilityLocation, payload).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn update_facility_location<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::UpdateFacilityLocation, payload).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn delete_facility_location<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::DeleteFacilityLocation, payload).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn update_facility_to_group<P>(&self, payload: &P) -> Result<ApiResponse, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.command(ServiceAction::UpdateFacilityToGroup, payload).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::Value;

    use super::*;
    use crate::clock::FixedClock;

    /// Replays queued outcomes and records every request it was given.
    #[derive(Default)]
    pub struct StubTransport {
        outcomes: Mutex<VecDeque<Result<HttpResponse, FacilityError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        pub fn replying(outcome: Result<HttpResponse, FacilityError>) -> Arc<Self> {
            let stub = Self::default();
            stub.outcomes.lock().unwrap().push_back(outcome);
            Arc::new(stub)
        }

        pub fn json(body: Value) -> Arc<Self> {
            Self::replying(Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: body.to_string(),
            }))
        }

        pub fn last_body(&self) -> Value {
            let requests = self.requests.lock().unwrap();
            let body = requests.last().unwrap().body.as_deref().unwrap();
            serde_json::from_str(body).unwrap()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FacilityError> {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FacilityError::Transport("no stubbed response".to_string())))
        }
    }

    #[derive(Default)]
    pub struct RecordingLogger {
        pub entries: Mutex<Vec<(String, FacilityError)>>,
    }

    impl Logger for RecordingLogger {
        fn error(&self, message: &str, error: &FacilityError) {
            self.entries
                .lock()
                .unwrap()
                .push((message.to_string(), error.clone()));
        }
    }

    /// 2024-03-07T10:00:00Z.
    pub fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            DateTime::parse_from_rfc3339("2024-03-07T10:00:00+00:00").unwrap(),
        ))
    }

    pub fn client(transport: Arc<StubTransport>, logger: Arc<RecordingLogger>) -> FacilityClient {
        FacilityClient::new(FacilityApi::new("http://localhost:3000"), transport, logger)
            .with_clock(fixed_clock())
    }
}
