//! Maps raw status payloads onto [`Classification`]s.

use super::matcher::{CompiledMatcher, scalar_to_string};
use crate::error::PsuError;
use log::{debug, warn};
use serde_json::Value;
use strum::Display;

/// Outcome of comparing a payload against the compiled literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Classification {
    On,
    Off,
    /// No confident match; the held status must not change.
    Unknown,
}

/// Classify `raw_payload` with `matcher`. Never fails.
pub fn classify(matcher: &CompiledMatcher, raw_payload: &[u8]) -> Classification {
    if !matcher.is_enabled() {
        debug!("[PSU] Matcher disabled, ignoring message");
        return Classification::Unknown;
    }

    let text = match std::str::from_utf8(raw_payload) {
        Ok(text) => text,
        Err(e) => {
            warn!("[PSU] {}", PsuError::Decode(e));
            return Classification::Unknown;
        }
    };

    let candidate = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => match matcher.extraction_key() {
            // Plain mode: multi-key JSON responses are matched on their raw text
            None => text.to_string(),
            Some(key) => match object.get(key).and_then(scalar_to_string) {
                Some(value) => value,
                None => {
                    warn!("[PSU] Message is JSON but has no usable key: {}", text);
                    return Classification::Unknown;
                }
            },
        },
        _ => {
            if let Some(key) = matcher.extraction_key() {
                warn!(
                    "[PSU] Expected a JSON message with key '{}', got: {}",
                    key, text
                );
            }
            text.to_string()
        }
    };

    if same_ignoring_case(&candidate, matcher.on_literal()) {
        Classification::On
    } else if same_ignoring_case(&candidate, matcher.off_literal()) {
        Classification::Off
    } else {
        debug!("[PSU] Message matches neither response: {}", candidate);
        Classification::Unknown
    }
}

fn same_ignoring_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psu::matcher::compile;

    fn matcher(on: &str, off: &str) -> CompiledMatcher {
        compile(on, off).unwrap().0
    }

    #[test]
    fn test_plain_case_insensitive() {
        let m = matcher("ON", "OFF");
        for payload in ["on", "ON", "On", "oN"] {
            assert_eq!(classify(&m, payload.as_bytes()), Classification::On);
        }
        for payload in ["off", "OFF", "Off"] {
            assert_eq!(classify(&m, payload.as_bytes()), Classification::Off);
        }
        assert_eq!(classify(&m, b"standby"), Classification::Unknown);
        assert_eq!(classify(&m, b""), Classification::Unknown);
    }

    #[test]
    fn test_keyed_json() {
        let m = matcher(r#"{"state":"on"}"#, r#"{"state":"off"}"#);
        assert_eq!(
            classify(&m, br#"{"state":"on","extra":1}"#),
            Classification::On
        );
        assert_eq!(classify(&m, br#"{"state":"off"}"#), Classification::Off);
        assert_eq!(classify(&m, br#"{"state":"OFF"}"#), Classification::Off);
        assert_eq!(classify(&m, br#"{"other":"on"}"#), Classification::Unknown);
    }

    #[test]
    fn test_keyed_json_numeric_value() {
        let m = matcher(r#"{"POWER":1}"#, r#"{"POWER":0}"#);
        assert_eq!(classify(&m, br#"{"POWER":1}"#), Classification::On);
        assert_eq!(classify(&m, br#"{"POWER":0}"#), Classification::Off);
        assert_eq!(classify(&m, br#"{"POWER":null}"#), Classification::Unknown);
    }

    #[test]
    fn test_mismatched_keys_uses_on_key() {
        let m = matcher(r#"{"a":"on"}"#, r#"{"b":"off"}"#);
        assert_eq!(classify(&m, br#"{"b":"off"}"#), Classification::Unknown);
        assert_eq!(classify(&m, br#"{"a":"off"}"#), Classification::Off);
    }

    #[test]
    fn test_plain_text_with_extraction_key_still_compared() {
        let m = matcher(r#"{"state":"on"}"#, r#"{"state":"off"}"#);
        assert_eq!(classify(&m, b"on"), Classification::On);
        assert_eq!(classify(&m, b"OFF"), Classification::Off);
    }

    #[test]
    fn test_json_payload_in_plain_mode_is_unknown() {
        let m = matcher("ON", "OFF");
        assert_eq!(classify(&m, br#"{"state":"ON"}"#), Classification::Unknown);
    }

    #[test]
    fn test_multi_key_json_response_matches_raw_text() {
        let on = r#"{"state":"on","power":1}"#;
        let off = r#"{"state":"off","power":0}"#;
        let m = matcher(on, off);
        assert_eq!(m.extraction_key(), None);
        assert_eq!(classify(&m, on.as_bytes()), Classification::On);
        assert_eq!(classify(&m, off.as_bytes()), Classification::Off);
        assert_eq!(
            classify(&m, br#"{"state":"on","power":2}"#),
            Classification::Unknown
        );
    }

    #[test]
    fn test_mixed_format_matcher() {
        let m = matcher("ON", r#"{"state":"off"}"#);
        assert_eq!(classify(&m, b"on"), Classification::On);
        assert_eq!(classify(&m, br#"{"state":"off"}"#), Classification::Off);
        assert_eq!(classify(&m, br#"{"state":"on"}"#), Classification::Unknown);
    }

    #[test]
    fn test_non_object_json_compared_as_text() {
        let m = matcher("1", "0");
        assert_eq!(classify(&m, b"1"), Classification::On);
        assert_eq!(classify(&m, b"0"), Classification::Off);
    }

    #[test]
    fn test_invalid_utf8_is_unknown() {
        let m = matcher("ON", "OFF");
        assert_eq!(classify(&m, &[0xff, 0xfe, 0x4f]), Classification::Unknown);
    }

    #[test]
    fn test_identical_literals_on_wins() {
        let m = matcher("on", "ON");
        assert_eq!(classify(&m, b"On"), Classification::On);
    }

    #[test]
    fn test_disabled_matcher_is_always_unknown() {
        let m = CompiledMatcher::disabled();
        assert_eq!(classify(&m, b""), Classification::Unknown);
        assert_eq!(classify(&m, b"ON"), Classification::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(Classification::On.to_string(), "on");
        assert_eq!(Classification::Unknown.to_string(), "unknown");
    }
}
