//! The shared property model.
//!
//! Service and framework properties are open, string-keyed bags of JSON
//! values. A registered service's property map is a snapshot: it only
//! changes when the owning registration replaces the whole map.

use std::collections::HashMap;

/// An arbitrary property value.
pub type Value = serde_json::Value;

/// A string-keyed property map.
pub type Properties = HashMap<String, Value>;

/// Implicit property holding a service's registration id.
pub const SERVICE_ID: &str = "service.id";

/// Implicit property holding the set of interface names a service
/// implements.
pub const OBJECT_CLASS: &str = "objectclass";

/// Optional property used to order competing references; higher wins.
pub const SERVICE_RANKING: &str = "service.ranking";

/// Look up a property by case-insensitive key.
///
/// Attribute names are case-insensitive throughout the framework; values
/// are not.
#[must_use]
pub fn get_ci<'a>(props: &'a Properties, key: &str) -> Option<&'a Value> {
    if let Some(v) = props.get(key) {
        return Some(v);
    }
    props
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Read the `service.ranking` property, defaulting to 0 for a missing or
/// non-integer value.
#[must_use]
pub fn ranking_of(props: &Properties) -> i64 {
    get_ci(props, SERVICE_RANKING)
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Read the implicit `service.id` property, if present.
#[must_use]
pub fn service_id_of(props: &Properties) -> Option<u64> {
    get_ci(props, SERVICE_ID).and_then(Value::as_u64)
}
