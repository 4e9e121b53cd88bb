//! Log-and-default wrappers around the reshaping fetchers.
//!
//! Callers of these methods cannot tell "nothing found" from "the fetch
//! failed": both yield an empty value, and failures are reported once to the
//! client's `Logger`.

use std::collections::BTreeMap;

use crate::client::FacilityClient;
use crate::error::FacilityError;
use crate::types::{FacilityGroupMemberships, FacilityOrderCountEntry};

pub const GROUP_INFORMATION_FAILED: &str = "Failed to fetch facility group information";
pub const ORDER_COUNT_FAILED: &str = "Failed to fetch total orders count";
pub const ORDER_HISTORY_FAILED: &str = "Failed to fetch order consumed history for this facility";

/// Borrowed view of a `FacilityClient`; see `FacilityClient::or_default`.
#[derive(Debug, Clone, Copy)]
pub struct OrDefault<'a> {
    client: &'a FacilityClient,
}

impl<'a> OrDefault<'a> {
    pub(crate) fn new(client: &'a FacilityClient) -> Self {
        Self { client }
    }

    fn recover<T: Default>(&self, message: &str, result: Result<T, FacilityError>) -> T {
        result.unwrap_or_else(|err| {
            self.client.logger().error(message, &err);
            T::default()
        })
    }

    pub async fn fetch_facility_group_information<S: AsRef<str>>(
        &self,
        facility_ids: &[S],
    ) -> FacilityGroupMemberships {
        let result = self.client.fetch_facility_group_information(facility_ids).await;
        self.recover(GROUP_INFORMATION_FAILED, result)
    }

    pub async fn fetch_facilities_order_count<S: AsRef<str>>(&self, facility_ids: &[S]) -> BTreeMap<String, i64> {
        let result = self.client.fetch_facilities_order_count(facility_ids).await;
        self.recover(ORDER_COUNT_FAILED, result)
    }

    pub async fn fetch_facility_order_counts(&self, facility_id: &str) -> Vec<FacilityOrderCountEntry> {
        let result = self.client.fetch_facility_order_counts(facility_id).await;
        self.recover(ORDER_HISTORY_FAILED, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::client::testing::{client, RecordingLogger, StubTransport};
    use crate::http::HttpResponse;

    #[tokio::test]
    async fn empty_result_defaults_and_logs_once() {
        let logger = Arc::new(RecordingLogger::default());
        let client = client(StubTransport::json(json!({"count": 0, "docs": []})), logger.clone());

        let groups = client.or_default().fetch_facility_group_information(&["F1"]).await;

        assert!(groups.is_empty());
        let entries = logger.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, GROUP_INFORMATION_FAILED);
        assert!(matches!(entries[0].1, FacilityError::NoRecords { .. }));
    }

    #[tokio::test]
    async fn error_flag_defaults_and_logs_once() {
        let logger = Arc::new(RecordingLogger::default());
        let client = client(
            StubTransport::json(json!({"_ERROR_MESSAGE_": "entity not found"})),
            logger.clone(),
        );

        let counts = client.or_default().fetch_facilities_order_count(&["F1", "F2"]).await;

        assert!(counts.is_empty());
        let entries = logger.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ORDER_COUNT_FAILED);
        assert_eq!(entries[0].1, FacilityError::Remote("entity not found".to_string()));
    }

    #[tokio::test]
    async fn transport_failure_defaults_history_to_empty_list() {
        let logger = Arc::new(RecordingLogger::default());
        let transport = StubTransport::replying(Err(FacilityError::Transport("timed out".to_string())));
        let client = client(transport, logger.clone());

        let history = client.or_default().fetch_facility_order_counts("F1").await;

        assert!(history.is_empty());
        let entries = logger.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ORDER_HISTORY_FAILED);
    }

    #[tokio::test]
    async fn http_failure_defaults_and_logs_once() {
        let logger = Arc::new(RecordingLogger::default());
        let transport = StubTransport::replying(Ok(HttpResponse {
            status: 503,
            headers: Vec::new(),
            body: String::new(),
        }));
        let client = client(transport, logger.clone());

        let groups = client.or_default().fetch_facility_group_information(&["F1"]).await;

        assert!(groups.is_empty());
        assert_eq!(logger.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_passes_through_without_logging() {
        let logger = Arc::new(RecordingLogger::default());
        let client = client(
            StubTransport::json(json!({
                "count": 1,
                "docs": [{"facilityId": "F1", "lastOrderCount": 5}]
            })),
            logger.clone(),
        );

        let counts = client.or_default().fetch_facilities_order_count(&["F1"]).await;

        assert_eq!(counts, BTreeMap::from([("F1".to_string(), 5)]));
        assert!(logger.entries.lock().unwrap().is_empty());
    }
}
