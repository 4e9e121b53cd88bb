//! In-memory stand-in for the facility API.
//!
//! Serves `POST /performFind` over a handful of entities and the
//! `POST /service/{action}` commands that mutate them. Failures the real
//! service reports in-band (unknown entity, missing keys) come back as 200
//! with an `_ERROR_MESSAGE_` body.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const ENTITIES: [&str; 4] = [
    "Facility",
    "FacilityGroupAndMember",
    "FacilityOrderCount",
    "FacilityLocation",
];

pub type Record = Map<String, Value>;

/// Records per entity name, plus the UTC offset in which `yyyy-MM-dd`
/// filters on `*Date` fields are read.
#[derive(Clone, Debug)]
pub struct Store {
    entities: HashMap<String, Vec<Record>>,
    day_offset: FixedOffset,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            entities: ENTITIES
                .iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
            day_offset: Utc.fix(),
        }
    }
}

impl Store {
    /// Read date filters as calendar days in `offset` instead of UTC, to match
    /// clients that send their local date.
    pub fn with_day_offset(mut self, offset: FixedOffset) -> Self {
        self.day_offset = offset;
        self
    }

    /// Add a record; `record` must be a JSON object.
    pub fn insert(&mut self, entity: &str, record: Value) {
        if let Value::Object(record) = record {
            self.entities.entry(entity.to_string()).or_default().push(record);
        }
    }

    pub fn records(&self, entity: &str) -> &[Record] {
        self.entities.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    fn records_mut(&mut self, entity: &str) -> &mut Vec<Record> {
        self.entities.entry(entity.to_string()).or_default()
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    pub entity_name: String,
    #[serde(default)]
    pub input_fields: Record,
    #[serde(default)]
    pub field_list: Vec<String>,
    #[serde(default)]
    pub view_size: Option<usize>,
    #[serde(default)]
    pub distinct: Option<String>,
    #[serde(default)]
    pub filter_by_date: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

pub fn app() -> Router {
    app_with(Store::default())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/performFind", post(perform_find))
        .route("/service/{action}", post(run_service))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "_ERROR_MESSAGE_": message.into() }))
}

fn is_yes(flag: &Option<String>) -> bool {
    flag.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("y"))
}

async fn perform_find(State(db): State<Db>, Json(request): Json<FindRequest>) -> Json<Value> {
    let store = db.read().await;
    let Some(records) = store.entities.get(&request.entity_name) else {
        tracing::warn!(entity = %request.entity_name, "find on unknown entity");
        return error_body(format!("Entity [{}] is not defined", request.entity_name));
    };

    let now = Utc::now().timestamp_millis();
    let mut matches: Vec<Record> = records
        .iter()
        .filter(|record| matches_inputs(record, &request.input_fields, store.day_offset))
        .filter(|record| !is_yes(&request.filter_by_date) || is_current(record, now))
        .cloned()
        .collect();

    if let Some(order_by) = &request.order_by {
        sort_records(&mut matches, order_by);
    }

    let mut docs: Vec<Record> = matches
        .into_iter()
        .map(|record| project(record, &request.field_list))
        .collect();
    if is_yes(&request.distinct) {
        let mut seen: Vec<Record> = Vec::new();
        docs.retain(|doc| {
            if seen.contains(doc) {
                false
            } else {
                seen.push(doc.clone());
                true
            }
        });
    }

    let count = docs.len();
    if let Some(view_size) = request.view_size {
        docs.truncate(view_size);
    }
    Json(json!({ "count": count, "docs": docs }))
}

fn matches_inputs(record: &Record, inputs: &Record, day_offset: FixedOffset) -> bool {
    inputs
        .iter()
        .filter(|(field, _)| !field.ends_with("_op"))
        .all(|(field, expected)| {
            let actual = record.get(field).unwrap_or(&Value::Null);
            let op = inputs
                .get(&format!("{field}_op"))
                .and_then(Value::as_str)
                .unwrap_or("equals");
            match op {
                "in" => match expected {
                    Value::Array(options) => options.iter().any(|o| value_matches(field, actual, o, day_offset)),
                    Value::String(list) => list
                        .split(',')
                        .any(|o| value_matches(field, actual, &Value::String(o.trim().to_string()), day_offset)),
                    other => value_matches(field, actual, other, day_offset),
                },
                _ => value_matches(field, actual, expected, day_offset),
            }
        })
}

fn value_matches(field: &str, actual: &Value, expected: &Value, day_offset: FixedOffset) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(millis), Value::String(text)) => {
            if field.ends_with("Date") {
                if let (Some(millis), Ok(day)) = (millis.as_i64(), NaiveDate::parse_from_str(text, "%Y-%m-%d")) {
                    return day_bounds(day, day_offset).is_some_and(|(start, end)| (start..end).contains(&millis));
                }
            }
            millis.to_string() == *text
        }
        _ => false,
    }
}

/// `[start, end)` of `day`, read in `offset`, as epoch millis.
fn day_bounds(day: NaiveDate, offset: FixedOffset) -> Option<(i64, i64)> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    let start = offset.from_local_datetime(&midnight).single()?.timestamp_millis();
    Some((start, start + 24 * 60 * 60 * 1000))
}

fn is_current(record: &Record, now: i64) -> bool {
    let from_ok = record
        .get("fromDate")
        .and_then(Value::as_i64)
        .map_or(true, |from| from <= now);
    let thru_ok = record
        .get("thruDate")
        .and_then(Value::as_i64)
        .map_or(true, |thru| thru > now);
    from_ok && thru_ok
}

fn sort_records(records: &mut [Record], order_by: &str) {
    let mut parts = order_by.split_whitespace();
    let Some(field) = parts.next() else {
        return;
    };
    let (field, descending) = match field.strip_prefix('-') {
        Some(field) => (field, true),
        None => (field, parts.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"))),
    };
    records.sort_by(|a, b| {
        let ordering = compare_values(a.get(field), b.get(field));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn project(record: Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record;
    }
    fields
        .iter()
        .filter_map(|field| record.get(field).map(|value| (field.clone(), value.clone())))
        .collect()
}

async fn run_service(
    State(db): State<Db>,
    Path(action): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let Value::Object(payload) = payload else {
        return Ok(error_body("Request payload must be an object"));
    };
    let mut store = db.write().await;
    let outcome = match action.as_str() {
        "updateFacility" => update_facility(&mut store, payload),
        "addFacilityToGroup" => add_facility_to_group(&mut store, payload),
        "updateFacilityToGroup" => update_facility_to_group(&mut store, payload),
        "createFacilityLocation" => create_facility_location(&mut store, payload),
        "updateFacilityLocation" => update_facility_location(&mut store, payload),
        "deleteFacilityLocation" => delete_facility_location(&mut store, payload),
        _ => return Err(StatusCode::NOT_FOUND),
    };
    tracing::debug!(%action, ok = outcome.is_ok(), "service call");
    Ok(match outcome {
        Ok(body) => Json(body),
        Err(message) => error_body(message),
    })
}

type ServiceResult = Result<Value, String>;

fn required<'a>(payload: &'a Record, keys: &[&str]) -> Result<Vec<&'a Value>, String> {
    keys.iter()
        .map(|key| match payload.get(*key) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(format!("Required field [{key}] is missing")),
        })
        .collect()
}

fn matches_keys(record: &Record, payload: &Record, keys: &[&str]) -> bool {
    keys.iter().all(|key| record.get(*key) == payload.get(*key))
}

fn merge(record: &mut Record, payload: Record) {
    for (key, value) in payload {
        record.insert(key, value);
    }
}

fn event(message: &str, payload: &Record, keys: &[&str]) -> Value {
    let mut body = Record::new();
    body.insert("_EVENT_MESSAGE_".to_string(), Value::String(message.to_string()));
    for key in keys {
        if let Some(value) = payload.get(*key) {
            body.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(body)
}

const FACILITY_KEYS: [&str; 1] = ["facilityId"];
const MEMBER_KEYS: [&str; 3] = ["facilityId", "facilityGroupId", "fromDate"];
const LOCATION_KEYS: [&str; 2] = ["facilityId", "locationSeqId"];

fn update_facility(store: &mut Store, payload: Record) -> ServiceResult {
    required(&payload, &FACILITY_KEYS)?;
    let response = event("Facility updated", &payload, &FACILITY_KEYS);
    let facility = store
        .records_mut("Facility")
        .iter_mut()
        .find(|record| matches_keys(record, &payload, &FACILITY_KEYS))
        .ok_or_else(|| format!("Facility [{}] not found", payload["facilityId"].as_str().unwrap_or_default()))?;
    merge(facility, payload);
    Ok(response)
}

fn add_facility_to_group(store: &mut Store, mut payload: Record) -> ServiceResult {
    required(&payload, &["facilityId", "facilityGroupId"])?;
    payload
        .entry("fromDate")
        .or_insert_with(|| Value::from(Utc::now().timestamp_millis()));
    if store
        .records("FacilityGroupAndMember")
        .iter()
        .any(|record| matches_keys(record, &payload, &MEMBER_KEYS))
    {
        return Err("Facility is already a member of this group".to_string());
    }
    let response = event("Facility added to group", &payload, &MEMBER_KEYS);
    store.records_mut("FacilityGroupAndMember").push(payload);
    Ok(response)
}

fn update_facility_to_group(store: &mut Store, payload: Record) -> ServiceResult {
    required(&payload, &MEMBER_KEYS)?;
    let response = event("Facility group membership updated", &payload, &MEMBER_KEYS);
    let member = store
        .records_mut("FacilityGroupAndMember")
        .iter_mut()
        .find(|record| matches_keys(record, &payload, &MEMBER_KEYS))
        .ok_or_else(|| "Facility group membership not found".to_string())?;
    merge(member, payload);
    Ok(response)
}

fn create_facility_location(store: &mut Store, payload: Record) -> ServiceResult {
    required(&payload, &LOCATION_KEYS)?;
    if store
        .records("FacilityLocation")
        .iter()
        .any(|record| matches_keys(record, &payload, &LOCATION_KEYS))
    {
        return Err(format!("Location [{}] already exists", payload["locationSeqId"].as_str().unwrap_or_default()));
    }
    let response = event("Facility location created", &payload, &LOCATION_KEYS);
    store.records_mut("FacilityLocation").push(payload);
    Ok(response)
}

fn update_facility_location(store: &mut Store, payload: Record) -> ServiceResult {
    required(&payload, &LOCATION_KEYS)?;
    let response = event("Facility location updated", &payload, &LOCATION_KEYS);
    let location = store
        .records_mut("FacilityLocation")
        .iter_mut()
        .find(|record| matches_keys(record, &payload, &LOCATION_KEYS))
        .ok_or_else(|| format!("Location [{}] not found", payload["locationSeqId"].as_str().unwrap_or_default()))?;
    merge(location, payload);
    Ok(response)
}

fn delete_facility_location(store: &mut Store, payload: Record) -> ServiceResult {
    required(&payload, &LOCATION_KEYS)?;
    let locations = store.records_mut("FacilityLocation");
    let before = locations.len();
    locations.retain(|record| !matches_keys(record, &payload, &LOCATION_KEYS));
    if locations.len() == before {
        return Err(format!("Location [{}] not found", payload["locationSeqId"].as_str().unwrap_or_default()));
    }
    Ok(event("Facility location deleted", &payload, &LOCATION_KEYS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(record) => record,
            other => panic!("not an object: {other}"),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn in_operator_matches_any_listed_value() {
        let inputs = record(json!({"facilityId": ["F1", "F2"], "facilityId_op": "in"}));
        assert!(matches_inputs(&record(json!({"facilityId": "F2"})), &inputs, utc()));
        assert!(!matches_inputs(&record(json!({"facilityId": "F3"})), &inputs, utc()));
    }

    #[test]
    fn date_string_matches_millis_on_that_day() {
        let inputs = record(json!({"entryDate": "2023-11-14"}));
        assert!(matches_inputs(&record(json!({"entryDate": 1700000000000i64})), &inputs, utc()));
        assert!(!matches_inputs(&record(json!({"entryDate": 1700100000000i64})), &inputs, utc()));
    }

    #[test]
    fn date_string_is_read_in_day_offset() {
        // 2023-11-15T02:13:20Z is still Nov 14 at -05:00.
        let entry = record(json!({"entryDate": 1700014400000i64}));
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        assert!(!matches_inputs(&entry, &record_of("2023-11-14"), utc()));
        assert!(matches_inputs(&entry, &record_of("2023-11-14"), eastern));
        assert!(!matches_inputs(&entry, &record_of("2023-11-15"), eastern));
    }

    fn record_of(day: &str) -> Record {
        record(json!({ "entryDate": day }))
    }

    #[test]
    fn sort_descending_by_number() {
        let mut records = vec![
            record(json!({"entryDate": 1})),
            record(json!({"entryDate": 3})),
            record(json!({"entryDate": 2})),
        ];
        sort_records(&mut records, "entryDate DESC");
        let order: Vec<i64> = records.iter().map(|r| r["entryDate"].as_i64().unwrap()).collect();
        assert_eq!(order, [3, 2, 1]);
    }

    #[test]
    fn expired_records_are_not_current() {
        assert!(is_current(&record(json!({"fromDate": 0})), 10));
        assert!(!is_current(&record(json!({"fromDate": 0, "thruDate": 5})), 10));
        assert!(!is_current(&record(json!({"fromDate": 20})), 10));
    }

    #[test]
    fn projection_keeps_requested_fields_only() {
        let projected = project(
            record(json!({"facilityId": "F1", "facilityName": "Main", "x": 1})),
            &["facilityId".to_string(), "missing".to_string()],
        );
        assert_eq!(Value::Object(projected), json!({"facilityId": "F1"}));
    }

    #[test]
    fn required_reports_first_missing_key() {
        let err = required(&record(json!({"facilityId": "F1"})), &LOCATION_KEYS).unwrap_err();
        assert_eq!(err, "Required field [locationSeqId] is missing");
    }
}
