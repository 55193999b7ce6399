//! Compiles the configured ON/OFF responses into a [`CompiledMatcher`].
//!
//! A response is either a plain string (`ON`) or a single-key JSON object
//! (`{"state":"on"}`). In the JSON form the key names the field of incoming
//! JSON payloads that carries the value to compare.

use crate::error::PsuError;
use serde_json::Value;
use std::fmt;

/// One configured response after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSpec {
    Plain(String),
    Keyed { key: String, literal: String },
}

impl ResponseSpec {
    /// Interpret `raw` as keyed JSON when it is an object with exactly one
    /// scalar entry, otherwise as a plain literal.
    pub fn parse(raw: &str) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw)
            && map.len() == 1
            && let Some((key, value)) = map.into_iter().next()
            && let Some(literal) = scalar_to_string(&value)
        {
            return Self::Keyed { key, literal };
        }
        Self::Plain(raw.to_string())
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Keyed { key, .. } => Some(key),
        }
    }

    pub fn literal(&self) -> &str {
        match self {
            Self::Plain(literal) | Self::Keyed { literal, .. } => literal,
        }
    }
}

/// Stringify a JSON scalar. Strings are returned unquoted; `null`, arrays
/// and objects have no comparable form.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Non-fatal configuration-quality issues found while compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherWarning {
    /// Both responses are keyed JSON but with different keys; the ON key is used.
    ConflictingKeys { on_key: String, off_key: String },
    /// Only one response is keyed JSON; its key is used for both.
    MixedFormats { key: String },
    /// ON and OFF literals are equal ignoring case; ON always wins.
    IdenticalLiterals { literal: String },
}

impl fmt::Display for MatcherWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingKeys { on_key, off_key } => write!(
                f,
                "on response uses key '{on_key}' but off response uses '{off_key}', using '{on_key}'"
            ),
            Self::MixedFormats { key } => write!(
                f,
                "only one response is JSON, extracting key '{key}' for both"
            ),
            Self::IdenticalLiterals { literal } => write!(
                f,
                "on and off responses both match '{literal}', every match reads as on"
            ),
        }
    }
}

impl From<MatcherWarning> for PsuError {
    fn from(warning: MatcherWarning) -> Self {
        PsuError::AmbiguousFormat(warning.to_string())
    }
}

/// Normalized ON/OFF matcher. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMatcher {
    extraction_key: Option<String>,
    on_literal: String,
    off_literal: String,
    enabled: bool,
}

impl CompiledMatcher {
    /// Matcher used while the configuration is incomplete; never matches.
    pub fn disabled() -> Self {
        Self {
            extraction_key: None,
            on_literal: String::new(),
            off_literal: String::new(),
            enabled: false,
        }
    }

    pub fn extraction_key(&self) -> Option<&str> {
        self.extraction_key.as_deref()
    }

    pub fn on_literal(&self) -> &str {
        &self.on_literal
    }

    pub fn off_literal(&self) -> &str {
        &self.off_literal
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Build a matcher from the raw ON and OFF response settings.
pub fn compile(
    on_spec: &str,
    off_spec: &str,
) -> Result<(CompiledMatcher, Vec<MatcherWarning>), PsuError> {
    if on_spec.is_empty() {
        return Err(PsuError::ConfigIncomplete("on response is empty"));
    }
    if off_spec.is_empty() {
        return Err(PsuError::ConfigIncomplete("off response is empty"));
    }

    let on = ResponseSpec::parse(on_spec);
    let off = ResponseSpec::parse(off_spec);
    let mut warnings = Vec::new();

    let extraction_key = match (on.key(), off.key()) {
        (Some(on_key), Some(off_key)) => {
            if on_key != off_key {
                warnings.push(MatcherWarning::ConflictingKeys {
                    on_key: on_key.to_string(),
                    off_key: off_key.to_string(),
                });
            }
            Some(on_key.to_string())
        }
        (Some(key), None) | (None, Some(key)) => {
            warnings.push(MatcherWarning::MixedFormats {
                key: key.to_string(),
            });
            Some(key.to_string())
        }
        (None, None) => None,
    };

    if on.literal().to_lowercase() == off.literal().to_lowercase() {
        warnings.push(MatcherWarning::IdenticalLiterals {
            literal: on.literal().to_string(),
        });
    }

    let matcher = CompiledMatcher {
        extraction_key,
        on_literal: on.literal().to_string(),
        off_literal: off.literal().to_string(),
        enabled: true,
    };

    Ok((matcher, warnings))
}
