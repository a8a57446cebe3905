//! Decode/encode of the stored authorization value.
//!
//! Three shapes occur in the store: the legacy all-granted marker (`1` or
//! `"1"`), the legacy empty marker (`0`, `"0"` or null), and the canonical
//! structured map. Decoding happens exactly once, at the persistence
//! boundary; nothing downstream ever sees the raw value.

use serde_json::{Map, Value};

use crate::capability::{Capability, CapabilitySet};

/// Decode a raw stored authorization value.
///
/// Returns `None` for "no access": null, `0`, structural garbage, or a map
/// with nothing granted. An ambiguous value always fails closed; a cleared
/// grant reads the same as "never applied".
pub fn decode(raw: Option<&Value>) -> Option<CapabilitySet> {
    match raw? {
        Value::Null => None,
        Value::Number(n) if n.as_i64() == Some(1) => Some(CapabilitySet::all()),
        Value::Number(_) => None,
        Value::String(s) => decode_string(s),
        Value::Object(map) => decode_map(map),
        _ => None,
    }
}

fn decode_string(raw: &str) -> Option<CapabilitySet> {
    let trimmed = raw.trim();
    if trimmed == "1" {
        return Some(CapabilitySet::all());
    }
    if trimmed.starts_with('{') {
        let map: Map<String, Value> = serde_json::from_str(trimmed).ok()?;
        return decode_map(&map);
    }
    None
}

fn decode_map(map: &Map<String, Value>) -> Option<CapabilitySet> {
    let mut set = CapabilitySet::new();
    for cap in Capability::ALL {
        if map.get(cap.name()).is_some_and(truthy) {
            set.grant(cap);
        }
    }
    if set.is_empty() { None } else { Some(set) }
}

// Legacy rows may carry 1/0 instead of true/false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
        _ => false,
    }
}

/// Canonical structured-map serialization.
///
/// Every known capability is present with an explicit boolean; legacy
/// markers are never re-emitted.
pub fn encode(set: &CapabilitySet) -> Value {
    let mut map = Map::new();
    for cap in Capability::ALL {
        map.insert(cap.name().to_string(), Value::Bool(set.contains(cap)));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_truthy_markers_grant_everything() {
        for raw in [json!(1), json!("1"), json!(" 1 ")] {
            assert_eq!(decode(Some(&raw)), Some(CapabilitySet::all()), "raw={raw}");
        }
    }

    #[test]
    fn empty_markers_and_garbage_decode_to_none() {
        assert_eq!(decode(None), None);
        for raw in [
            json!(null),
            json!(0),
            json!("0"),
            json!(2),
            json!("not json"),
            json!("{broken"),
            json!([1, 2, 3]),
            json!(true),
        ] {
            assert_eq!(decode(Some(&raw)), None, "raw={raw}");
        }
    }

    #[test]
    fn structured_maps_decode_with_missing_keys_false() {
        let set = decode(Some(&json!({"mine": true}))).unwrap();
        assert!(set.contains(Capability::Mine));
        assert!(!set.contains(Capability::Oskolki));

        // Unknown keys are ignored.
        let set = decode(Some(&json!({"mine": true, "quarry": true}))).unwrap();
        assert_eq!(set, CapabilitySet::of(&[Capability::Mine]));
    }

    #[test]
    fn stringified_maps_decode_like_objects() {
        let set = decode(Some(&json!(r#"{"oskolki": true}"#))).unwrap();
        assert_eq!(set, CapabilitySet::of(&[Capability::Oskolki]));
    }

    #[test]
    fn legacy_numeric_flags_inside_maps_are_accepted() {
        let set = decode(Some(&json!({"mine": 1, "oskolki": 0}))).unwrap();
        assert_eq!(set, CapabilitySet::of(&[Capability::Mine]));
    }

    #[test]
    fn all_false_map_fails_closed() {
        assert_eq!(decode(Some(&json!({"mine": false, "oskolki": false}))), None);
        assert_eq!(decode(Some(&json!({}))), None);
    }

    #[test]
    fn encode_is_canonical_and_round_trips() {
        let set = CapabilitySet::of(&[Capability::Mine]);
        let raw = encode(&set);
        assert_eq!(raw, json!({"mine": true, "oskolki": false}));
        assert_eq!(decode(Some(&raw)), Some(set));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Decoding arbitrary strings never panics and only the legacy
            /// marker or a JSON object can produce a grant.
            #[test]
            fn decode_arbitrary_strings_never_panics(raw in ".*") {
                let value = Value::String(raw.clone());
                let decoded = decode(Some(&value));
                if decoded.is_some() {
                    let trimmed = raw.trim();
                    prop_assert!(
                        trimmed == "1" || trimmed.starts_with('{'),
                        "decoded value must be the legacy marker or a JSON object"
                    );
                }
            }

            /// encode/decode round-trips every non-empty subset; empty sets
            /// fail closed to None.
            #[test]
            fn encode_decode_round_trip(mine in any::<bool>(), oskolki in any::<bool>()) {
                let mut set = CapabilitySet::new();
                if mine { set.grant(Capability::Mine); }
                if oskolki { set.grant(Capability::Oskolki); }

                let decoded = decode(Some(&encode(&set)));
                if set.is_empty() {
                    prop_assert_eq!(decoded, None);
                } else {
                    prop_assert_eq!(decoded, Some(set));
                }
            }
        }
    }
}
