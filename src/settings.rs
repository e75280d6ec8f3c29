// src/settings.rs
use serde_json::{Map, Value, json};

use crate::errors::{ClientError, Result};

const TEST_SETTINGS: &str = "test_settings";
const TEST_SETTINGS_NUMBER: &str = "test_settings_number";

/// Keys that stay at the top level when ad-hoc settings are wrapped into `test_settings`.
const TOP_LEVEL_KEYS: [&str; 3] = [TEST_SETTINGS_NUMBER, "concurrency", "test_settings_name"];

/// Which start endpoint a run goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// `batch-run/`
    Single,
    /// `cross-batch-run/`
    Cross,
}

impl RunKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            RunKind::Single => "batch-run/",
            RunKind::Cross => "cross-batch-run/",
        }
    }
}

/// Request body for starting a run, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub kind: RunKind,
    pub body: String,
}

/// Merges the `--test_settings_number` selector (0 = unset) with the `--setting` JSON.
///
/// Malformed JSON is forwarded untouched and left for the server to reject.
pub fn resolve_settings(test_settings_number: u64, setting: Option<&str>) -> Result<ResolvedSettings> {
    let mut is_cross = test_settings_number != 0;

    let setting = match setting.filter(|s| !s.is_empty()) {
        None => {
            return Ok(ResolvedSettings {
                kind: kind_of(is_cross),
                body: json!({ TEST_SETTINGS_NUMBER: test_settings_number }).to_string(),
            });
        }
        Some(s) => s,
    };

    let object = match serde_json::from_str::<Value>(setting) {
        Ok(Value::Object(object)) => object,
        _ => {
            log::warn!("--setting is not a JSON object; sending it to the server unmodified");
            return Ok(ResolvedSettings {
                kind: kind_of(is_cross),
                body: setting.to_string(),
            });
        }
    };

    let has_test_settings = object.contains_key(TEST_SETTINGS);
    let number_in_json = object.get(TEST_SETTINGS_NUMBER);
    is_cross = is_cross || has_test_settings || number_in_json.is_some();

    if test_settings_number == 0 {
        return Ok(ResolvedSettings {
            kind: kind_of(is_cross),
            body: setting.to_string(),
        });
    }

    if let Some(number) = number_in_json {
        if number.as_u64() != Some(test_settings_number) {
            return Err(ClientError::SettingsConflict {
                flag: test_settings_number,
                json: number.clone(),
            });
        }
    }

    let merged = merge_test_settings_number(&object, has_test_settings, test_settings_number);
    Ok(ResolvedSettings {
        kind: RunKind::Cross,
        body: Value::Object(merged).to_string(),
    })
}

/// Builds a new object tagged with `test_settings_number`.
///
/// Without an existing `test_settings` array, `{"model":"Nexus 5X"}` becomes
/// `{"test_settings":[{"model":"Nexus 5X"}],"test_settings_number":N}`.
fn merge_test_settings_number(
    object: &Map<String, Value>,
    has_test_settings: bool,
    test_settings_number: u64,
) -> Map<String, Value> {
    let mut merged = Map::new();

    if has_test_settings {
        merged.extend(object.iter().map(|(k, v)| (k.clone(), v.clone())));
    } else {
        let mut ad_hoc = Map::new();
        for (key, value) in object {
            if TOP_LEVEL_KEYS.contains(&key.as_str()) {
                merged.insert(key.clone(), value.clone());
            } else {
                ad_hoc.insert(key.clone(), value.clone());
            }
        }
        if !ad_hoc.is_empty() {
            merged.insert(TEST_SETTINGS.to_string(), Value::Array(vec![Value::Object(ad_hoc)]));
        }
    }

    merged.insert(TEST_SETTINGS_NUMBER.to_string(), json!(test_settings_number));
    merged
}

fn kind_of(is_cross: bool) -> RunKind {
    if is_cross { RunKind::Cross } else { RunKind::Single }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body_json(resolved: &ResolvedSettings) -> Value {
        serde_json::from_str(&resolved.body).unwrap()
    }

    #[test]
    fn test_selector_only() {
        for n in [1, 5, 999] {
            let resolved = resolve_settings(n, None).unwrap();
            assert_eq!(resolved.body, format!("{{\"test_settings_number\":{n}}}"));
            assert_eq!(resolved.kind, RunKind::Cross);
        }
    }

    #[test]
    fn test_zero_selector_without_json_uses_project_default() {
        let resolved = resolve_settings(0, None).unwrap();
        assert_eq!(body_json(&resolved), json!({ "test_settings_number": 0 }));
        assert_eq!(resolved.kind, RunKind::Single);
    }

    #[test]
    fn test_conflicting_numbers_rejected() {
        let err = resolve_settings(3, Some(r#"{"test_settings_number": 4, "model": "Pixel"}"#))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, ClientError::SettingsConflict { flag: 3, .. }));
    }

    #[test]
    fn test_matching_numbers_accepted() {
        let resolved = resolve_settings(3, Some(r#"{"test_settings_number": 3, "model": "Pixel"}"#))
            .unwrap();
        assert_eq!(
            body_json(&resolved),
            json!({
                "test_settings": [{ "model": "Pixel" }],
                "test_settings_number": 3
            })
        );
    }

    #[test]
    fn test_ad_hoc_keys_wrapped_into_array() {
        let resolved = resolve_settings(
            7,
            Some(r#"{"model":"Nexus 5X","os":"8.0","concurrency":2,"test_settings_name":"nightly"}"#),
        )
        .unwrap();
        assert_eq!(resolved.kind, RunKind::Cross);
        assert_eq!(
            body_json(&resolved),
            json!({
                "test_settings": [{ "model": "Nexus 5X", "os": "8.0" }],
                "test_settings_number": 7,
                "concurrency": 2,
                "test_settings_name": "nightly"
            })
        );
    }

    #[test]
    fn test_existing_test_settings_kept() {
        let resolved = resolve_settings(
            2,
            Some(r#"{"test_settings":[{"model":"A"},{"model":"B"}],"concurrency":1}"#),
        )
        .unwrap();
        assert_eq!(
            body_json(&resolved),
            json!({
                "test_settings": [{ "model": "A" }, { "model": "B" }],
                "concurrency": 1,
                "test_settings_number": 2
            })
        );
    }

    #[test]
    fn test_only_top_level_keys_adds_no_array() {
        let resolved = resolve_settings(2, Some(r#"{"concurrency":3}"#)).unwrap();
        assert_eq!(
            body_json(&resolved),
            json!({ "concurrency": 3, "test_settings_number": 2 })
        );
    }

    #[test]
    fn test_classification_without_selector() {
        let single = resolve_settings(0, Some(r#"{"model":"Pixel"}"#)).unwrap();
        assert_eq!(single.kind, RunKind::Single);
        assert_eq!(single.body, r#"{"model":"Pixel"}"#);

        let cross = resolve_settings(0, Some(r#"{"test_settings":[{"model":"Pixel"}]}"#)).unwrap();
        assert_eq!(cross.kind, RunKind::Cross);

        let numbered = resolve_settings(0, Some(r#"{"test_settings_number":4}"#)).unwrap();
        assert_eq!(numbered.kind, RunKind::Cross);
    }

    #[test]
    fn test_malformed_json_passes_through() {
        let raw = r#"{"model": "Pixel""#;
        let resolved = resolve_settings(5, Some(raw)).unwrap();
        assert_eq!(resolved.body, raw);
        assert_eq!(resolved.kind, RunKind::Cross);

        let resolved = resolve_settings(0, Some(raw)).unwrap();
        assert_eq!(resolved.kind, RunKind::Single);
    }

    #[test]
    fn test_input_object_not_mutated() {
        let object: Map<String, Value> =
            serde_json::from_str(r#"{"model":"Pixel","concurrency":2}"#).unwrap();
        let before = object.clone();
        let merged = merge_test_settings_number(&object, false, 1);
        assert_eq!(object, before);
        assert!(merged.contains_key("test_settings"));
    }
}
