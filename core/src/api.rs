//! Stateless request builder and response parser for the facility API.
//!
//! # Design
//! `FacilityApi` holds only the base URL and an optional bearer token. Each
//! operation is split into a `build_*` method producing an `HttpRequest` and a
//! `parse_*` function consuming an `HttpResponse`, so the request shaping and
//! response reshaping stay deterministic and testable without a network.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::FacilityError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    ApiResponse, FacilityGroupMember, FacilityGroupMemberships, FacilityOrderCount,
    FacilityOrderCountEntry, FindQuery, FindResult,
};

pub const FIND_ENDPOINT: &str = "performFind";

pub const FACILITY_GROUP_MEMBER_ENTITY: &str = "FacilityGroupAndMember";
pub const FACILITY_ORDER_COUNT_ENTITY: &str = "FacilityOrderCount";

/// Upper bound on the number of groups a single facility belongs to; sizes
/// the group-information page.
pub const MAX_GROUPS_PER_FACILITY: usize = 10;

/// Number of most recent order-count entries fetched for one facility.
pub const ORDER_HISTORY_SIZE: usize = 10;

const ORDER_COUNT_FIELDS: [&str; 3] = ["entryDate", "facilityId", "lastOrderCount"];

/// Command endpoints under `service/`. Payloads are forwarded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    UpdateFacility,
    AddFacilityToGroup,
    CreateFacilityLocation,
    UpdateFacilityLocation,
    DeleteFacilityLocation,
    UpdateFacilityToGroup,
}

impl ServiceAction {
    pub fn endpoint(self) -> &'static str {
        match self {
            ServiceAction::UpdateFacility => "service/updateFacility",
            ServiceAction::AddFacilityToGroup => "service/addFacilityToGroup",
            ServiceAction::CreateFacilityLocation => "service/createFacilityLocation",
            ServiceAction::UpdateFacilityLocation => "service/updateFacilityLocation",
            ServiceAction::DeleteFacilityLocation => "service/deleteFacilityLocation",
            ServiceAction::UpdateFacilityToGroup => "service/updateFacilityToGroup",
        }
    }
}

/// Synchronous, stateless request builder for the facility API.
#[derive(Debug, Clone)]
pub struct FacilityApi {
    base_url: String,
    token: Option<String>,
}

impl FacilityApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach `Authorization: Bearer <token>` to every built request.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a `POST` of `payload` to `endpoint`, relative to the base URL.
    pub fn build_post<P>(&self, endpoint: &str, payload: &P) -> Result<HttpRequest, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        let body =
            serde_json::to_string(payload).map_err(|e| FacilityError::Serialization(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = &self.token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/{endpoint}", self.base_url),
            headers,
            body: Some(body),
        })
    }

    pub fn build_find<P>(&self, query: &P) -> Result<HttpRequest, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.build_post(FIND_ENDPOINT, query)
    }

    pub fn build_service<P>(&self, action: ServiceAction, payload: &P) -> Result<HttpRequest, FacilityError>
    where
        P: Serialize + ?Sized,
    {
        self.build_post(action.endpoint(), payload)
    }

    pub fn build_facility_group_information<S: AsRef<str>>(
        &self,
        facility_ids: &[S],
    ) -> Result<HttpRequest, FacilityError> {
        self.build_find(&facility_group_information_query(facility_ids))
    }

    pub fn build_facilities_order_count<S: AsRef<str>>(
        &self,
        facility_ids: &[S],
        today: NaiveDate,
    ) -> Result<HttpRequest, FacilityError> {
        self.build_find(&facilities_order_count_query(facility_ids, today))
    }

    pub fn build_facility_order_counts(&self, facility_id: &str) -> Result<HttpRequest, FacilityError> {
        self.build_find(&facility_order_counts_query(facility_id))
    }
}

/// Group memberships of `facility_ids`, sized for at most
/// `MAX_GROUPS_PER_FACILITY` groups per facility.
pub fn facility_group_information_query<S: AsRef<str>>(facility_ids: &[S]) -> FindQuery {
    FindQuery::new(FACILITY_GROUP_MEMBER_ENTITY)
        .filter_in("facilityId", facility_ids)
        .fields(&["facilityId", "facilityGroupId", "facilityGroupTypeId", "fromDate"])
        .distinct(true)
        .filter_by_date(true)
        .view_size(facility_ids.len() * MAX_GROUPS_PER_FACILITY)
}

/// Today's order count of each of `facility_ids`.
pub fn facilities_order_count_query<S: AsRef<str>>(facility_ids: &[S], today: NaiveDate) -> FindQuery {
    FindQuery::new(FACILITY_ORDER_COUNT_ENTITY)
        .filter_in("facilityId", facility_ids)
        .filter("entryDate", today.format("%Y-%m-%d").to_string())
        .fields(&ORDER_COUNT_FIELDS)
        .view_size(facility_ids.len())
}

/// The latest `ORDER_HISTORY_SIZE` order counts of one facility, newest first.
pub fn facility_order_counts_query(facility_id: &str) -> FindQuery {
    FindQuery::new(FACILITY_ORDER_COUNT_ENTITY)
        .filter("facilityId", facility_id)
        .fields(&ORDER_COUNT_FIELDS)
        .view_size(ORDER_HISTORY_SIZE)
        .order_by("entryDate DESC")
}

/// Whether a response body signals failure: a scalar instead of an object,
/// or a truthy `_ERROR_MESSAGE_`, `_ERROR_MESSAGE_LIST_` or `error` field.
/// Truthiness follows the service's JavaScript clients: any list or object
/// is truthy, even an empty one, and a `null` body carries no marker.
pub fn has_error(data: &Value) -> bool {
    let object = match data {
        Value::Object(object) => object,
        Value::Null => return false,
        _ => return true,
    };
    ["_ERROR_MESSAGE_", "_ERROR_MESSAGE_LIST_", "error"]
        .iter()
        .any(|key| object.get(*key).is_some_and(is_truthy))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn error_message(data: &Value) -> String {
    if let Some(message) = data
        .get("_ERROR_MESSAGE_")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        return message.to_string();
    }
    if let Some(list) = data.get("_ERROR_MESSAGE_LIST_").and_then(Value::as_array) {
        let messages: Vec<String> = list
            .iter()
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            .collect();
        return messages.join("; ");
    }
    match data.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => data.to_string(),
    }
}

fn check_status(response: &HttpResponse) -> Result<(), FacilityError> {
    if response.is_success() {
        return Ok(());
    }
    Err(FacilityError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}

/// Decode a pass-through response. Bodies that are not JSON are kept as a
/// JSON string so `ApiResponse::has_error` reports them.
pub fn parse_api_response(response: HttpResponse) -> Result<ApiResponse, FacilityError> {
    check_status(&response)?;
    let data = if response.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&response.body).unwrap_or(Value::String(response.body))
    };
    Ok(ApiResponse {
        status: response.status,
        data,
    })
}

/// Decode a find response, failing on error markers and on empty results.
pub fn parse_find<T: DeserializeOwned>(
    response: HttpResponse,
    entity: &str,
) -> Result<FindResult<T>, FacilityError> {
    check_status(&response)?;
    let data: Value = serde_json::from_str(&response.body)
        .map_err(|e| FacilityError::Deserialization(e.to_string()))?;
    if has_error(&data) {
        return Err(FacilityError::Remote(error_message(&data)));
    }
    let result: FindResult<T> =
        serde_json::from_value(data).map_err(|e| FacilityError::Deserialization(e.to_string()))?;
    if result.count == 0 || result.docs.is_empty() {
        return Err(FacilityError::NoRecords {
            entity: entity.to_string(),
        });
    }
    Ok(result)
}

/// Group membership docs by facility, keeping arrival order within a group.
pub fn parse_facility_group_information(
    response: HttpResponse,
) -> Result<FacilityGroupMemberships, FacilityError> {
    let result: FindResult<FacilityGroupMember> = parse_find(response, FACILITY_GROUP_MEMBER_ENTITY)?;
    Ok(group_by_facility(result.docs))
}

pub fn group_by_facility(docs: Vec<FacilityGroupMember>) -> FacilityGroupMemberships {
    let mut groups = FacilityGroupMemberships::new();
    for member in docs {
        groups
            .entry(member.facility_id.clone())
            .or_default()
            .push(member);
    }
    groups
}

/// Map each facility to its `lastOrderCount`. A later doc for the same
/// facility overwrites an earlier one.
pub fn parse_facilities_order_count(response: HttpResponse) -> Result<BTreeMap<String, i64>, FacilityError> {
    let result: FindResult<FacilityOrderCount> = parse_find(response, FACILITY_ORDER_COUNT_ENTITY)?;
    Ok(result
        .docs
        .into_iter()
        .map(|count| (count.facility_id, count.last_order_count))
        .collect())
}

/// Order-count history with each `entryDate` rendered in the offset
/// `offset_at` reports for that entry's own instant. A doc without an
/// `entryDate` gets an empty date string.
pub fn parse_facility_order_counts<F>(
    response: HttpResponse,
    offset_at: F,
) -> Result<Vec<FacilityOrderCountEntry>, FacilityError>
where
    F: Fn(i64) -> FixedOffset,
{
    let result: FindResult<FacilityOrderCount> = parse_find(response, FACILITY_ORDER_COUNT_ENTITY)?;
    result
        .docs
        .into_iter()
        .map(|count| {
            let entry_date = match count.entry_date {
                Some(millis) => format_entry_date(millis, offset_at(millis))?,
                None => String::new(),
            };
            Ok(FacilityOrderCountEntry {
                facility_id: count.facility_id,
                last_order_count: count.last_order_count,
                entry_date,
            })
        })
        .collect()
}

/// Render epoch milliseconds as `MMM dd yyyy` (e.g. `Nov 14 2023`).
pub fn format_entry_date(millis: i64, offset: FixedOffset) -> Result<String, FacilityError> {
    let instant = DateTime::from_timestamp_millis(millis).ok_or(FacilityError::InvalidDate(millis))?;
    Ok(instant.with_timezone(&offset).format("%b %d %Y").to_string())
}
