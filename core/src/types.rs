//! Request and response shapes for the facility API.
//!
//! # Design
//! The find endpoint is generic: a `FindQuery` names an entity, a set of
//! filter fields and the fields to return. Filters live in an untyped JSON map
//! because the service keys operators off sibling `<field>_op` entries. The
//! reshaped results (`FacilityGroupMemberships`, `FacilityOrderCountEntry`)
//! are typed so each operation has an explicit result shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A structured search against the `performFind` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindQuery {
    pub entity_name: String,
    #[serde(default)]
    pub input_fields: Map<String, Value>,
    #[serde(default)]
    pub field_list: Vec<String>,
    pub view_size: usize,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "ser_flag",
        deserialize_with = "de_flag"
    )]
    pub distinct: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "ser_flag",
        deserialize_with = "de_flag"
    )]
    pub filter_by_date: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl FindQuery {
    pub fn new(entity_name: &str) -> Self {
        Self {
            entity_name: entity_name.to_string(),
            input_fields: Map::new(),
            field_list: Vec::new(),
            view_size: 0,
            distinct: None,
            filter_by_date: None,
            order_by: None,
        }
    }

    /// Match `field` against a single value.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.input_fields.insert(field.to_string(), value.into());
        self
    }

    /// Match `field` against any of `values`, setting the `<field>_op` operator.
    pub fn filter_in<S: AsRef<str>>(mut self, field: &str, values: &[S]) -> Self {
        let values = values
            .iter()
            .map(|v| Value::String(v.as_ref().to_string()))
            .collect();
        self.input_fields
            .insert(field.to_string(), Value::Array(values));
        self.input_fields
            .insert(format!("{field}_op"), Value::String("in".to_string()));
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.field_list = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn view_size(mut self, view_size: usize) -> Self {
        self.view_size = view_size;
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn filter_by_date(mut self, filter_by_date: bool) -> Self {
        self.filter_by_date = Some(filter_by_date);
        self
    }

    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = Some(order_by.to_string());
        self
    }
}

// The service spells booleans as "Y" / "N".
fn ser_flag<S: Serializer>(flag: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match flag {
        Some(true) => serializer.serialize_str("Y"),
        Some(false) => serializer.serialize_str("N"),
        None => serializer.serialize_none(),
    }
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => Some(s.eq_ignore_ascii_case("y")),
        _ => None,
    })
}

/// The body of a successful `performFind` response.
///
/// `count` is the total number of matches on the server; `docs` is at most
/// `viewSize` of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResult<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub docs: Vec<T>,
}

/// One facility's membership in a facility group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityGroupMember {
    pub facility_id: String,
    pub facility_group_id: String,
    #[serde(default)]
    pub facility_group_type_id: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub from_date: Option<i64>,
}

/// Group memberships keyed by facility id. Facilities without a membership
/// have no key.
pub type FacilityGroupMemberships = BTreeMap<String, Vec<FacilityGroupMember>>;

/// A `FacilityOrderCount` record as the find endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityOrderCount {
    pub facility_id: String,
    #[serde(default)]
    pub last_order_count: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub entry_date: Option<i64>,
}

/// A `FacilityOrderCount` record with its entry date rendered as `MMM dd yyyy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityOrderCountEntry {
    pub facility_id: String,
    pub last_order_count: i64,
    pub entry_date: String,
}

/// The raw outcome of a pass-through call: status plus decoded JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    /// Whether the body carries one of the service's error markers.
    pub fn has_error(&self) -> bool {
        crate::api::has_error(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_serialize_as_y_and_unset_options_are_omitted() {
        let query = FindQuery::new("FacilityGroupAndMember")
            .distinct(true)
            .filter_by_date(false)
            .view_size(5);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["entityName"], "FacilityGroupAndMember");
        assert_eq!(json["distinct"], "Y");
        assert_eq!(json["filterByDate"], "N");
        assert_eq!(json["viewSize"], 5);
        assert!(json.get("orderBy").is_none());
    }

    #[test]
    fn filter_in_sets_operator_field() {
        let query = FindQuery::new("Facility").filter_in("facilityId", &["F1", "F2"]);
        assert_eq!(
            Value::Object(query.input_fields),
            serde_json::json!({"facilityId": ["F1", "F2"], "facilityId_op": "in"})
        );
    }

    #[test]
    fn flags_deserialize_from_y_n_strings() {
        let query: FindQuery = serde_json::from_str(
            r#"{"entityName":"Facility","viewSize":1,"distinct":"Y","filterByDate":"N"}"#,
        )
        .unwrap();
        assert_eq!(query.distinct, Some(true));
        assert_eq!(query.filter_by_date, Some(false));
        assert!(query.order_by.is_none());
    }

    #[test]
    fn find_result_tolerates_missing_docs() {
        let result: FindResult<FacilityOrderCount> = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert_eq!(result.count, 0);
        assert!(result.docs.is_empty());
    }
}
