//! Data helpers for the admin REST contract.
//!
//! # Responsibility
//! - Parse serializer-shaped record lists (`[{pk, model, fields}]`).
//! - Resolve mutation URLs that embed a placeholder id.
//! - Map failed responses to user-facing messages.
//!
//! # Invariants
//! - Every 4xx is recoverable and only 4xx responses surface server text.
//! - URL resolution replaces exactly one path segment.

use crate::widget::Render;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Placeholder used by device URLs keyed by MAC address.
pub const MAC_PLACEHOLDER: &str = "00:00:00:00:00:00";
/// Placeholder used by URLs keyed by numeric primary key.
pub const NUMERIC_PLACEHOLDER: &str = "0";
/// Message shown for non-recoverable failures.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred";

/// One serialized model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub pk: Value,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SerializedRecord {
    /// Primary key as display text (strings unquoted).
    pub fn pk_text(&self) -> String {
        display_value(&self.pk)
    }

    pub fn field_text(&self, name: &str) -> String {
        self.fields.get(name).map(display_value).unwrap_or_default()
    }
}

/// Parses a JSON array of serialized records.
pub fn parse_record_list(json: &str) -> Result<Vec<SerializedRecord>, RecordError> {
    serde_json::from_str(json).map_err(|err| RecordError::Parse(err.to_string()))
}

/// URL with one placeholder path segment substituted client-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    placeholder: String,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Replaces the last path segment equal to the placeholder with `id`.
    ///
    /// # Errors
    /// - `InvalidId` when `id` is blank or contains `/`.
    /// - `PlaceholderMissing` when no path segment matches the placeholder.
    pub fn resolve(&self, id: &str) -> Result<String, RecordError> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(RecordError::InvalidId(id.to_string()));
        }
        let (path, query) = match self.template.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.template.as_str(), None),
        };

        let mut segments: Vec<&str> = path.split('/').collect();
        let Some(position) = segments
            .iter()
            .rposition(|segment| *segment == self.placeholder)
        else {
            return Err(RecordError::PlaceholderMissing {
                template: self.template.clone(),
                placeholder: self.placeholder.clone(),
            });
        };
        segments[position] = id;

        let mut resolved = segments.join("/");
        if let Some(query) = query {
            resolved.push('?');
            resolved.push_str(query);
        }
        Ok(resolved)
    }
}

/// User-facing outcome of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    pub text: String,
    /// `true` for client errors the user can act on.
    pub recoverable: bool,
}

/// Maps an HTTP failure to the message shown to the user. No retry is implied.
///
/// Every 4xx is recoverable; the generic text stands in when the server sent
/// none.
pub fn failure_message(status: u16, body: Option<&str>) -> FailureMessage {
    if !(400..500).contains(&status) {
        return FailureMessage {
            text: GENERIC_FAILURE_MESSAGE.to_string(),
            recoverable: false,
        };
    }
    let text = body
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map_or_else(|| GENERIC_FAILURE_MESSAGE.to_string(), extract_server_text);
    FailureMessage {
        text,
        recoverable: true,
    }
}

fn extract_server_text(body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "detail", "error"] {
            if let Some(Value::String(text)) = object.get(field) {
                return text.clone();
            }
        }
    }
    body.to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Tabular fragment: one `pk | field...` line per record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    pub columns: Vec<String>,
    pub records: Vec<SerializedRecord>,
}

impl Render for RecordTable {
    fn render(&self) -> String {
        self.records
            .iter()
            .map(|record| {
                std::iter::once(record.pk_text())
                    .chain(self.columns.iter().map(|column| record.field_text(column)))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// REST helper errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    Parse(String),
    InvalidId(String),
    PlaceholderMissing {
        template: String,
        placeholder: String,
    },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "record list is malformed: {message}"),
            Self::InvalidId(value) => write!(f, "record id is invalid: `{value}`"),
            Self::PlaceholderMissing {
                template,
                placeholder,
            } => write!(f, "url `{template}` has no `{placeholder}` segment"),
        }
    }
}

impl Error for RecordError {}

#[cfg(test)]
mod tests {
    use super::{
        failure_message, parse_record_list, RecordError, RecordTable, UrlTemplate,
        GENERIC_FAILURE_MESSAGE, MAC_PLACEHOLDER, NUMERIC_PLACEHOLDER,
    };
    use crate::widget::Render;

    const DEVICES: &str = r#"[
        {"pk": 1, "model": "devices.device", "fields": {"name": "printer", "mac": "aa:bb:cc:dd:ee:ff"}},
        {"pk": "x2", "fields": {"name": "router", "mac": null}}
    ]"#;

    #[test]
    fn parses_serializer_records() {
        let records = parse_record_list(DEVICES).expect("records parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pk_text(), "1");
        assert_eq!(records[0].model.as_deref(), Some("devices.device"));
        assert_eq!(records[1].pk_text(), "x2");
        assert_eq!(records[1].field_text("mac"), "");
        assert_eq!(records[1].field_text("missing"), "");
    }

    #[test]
    fn rejects_non_list_payload() {
        let err = parse_record_list(r#"{"pk": 1}"#).expect_err("object payload must fail");
        assert!(matches!(err, RecordError::Parse(_)));
    }

    #[test]
    fn resolves_mac_and_numeric_placeholders() {
        let toggle = UrlTemplate::new("/devices/00:00:00:00:00:00/toggle", MAC_PLACEHOLDER);
        assert_eq!(
            toggle.resolve("aa:bb:cc:dd:ee:ff").expect("mac resolve"),
            "/devices/aa:bb:cc:dd:ee:ff/toggle"
        );

        let vote = UrlTemplate::new("/polls/0/vote/0?next=1", NUMERIC_PLACEHOLDER);
        assert_eq!(
            vote.resolve("42").expect("numeric resolve"),
            "/polls/0/vote/42?next=1"
        );
    }

    #[test]
    fn rejects_missing_placeholder_and_bad_ids() {
        let template = UrlTemplate::new("/orders/list", NUMERIC_PLACEHOLDER);
        assert!(matches!(
            template.resolve("7"),
            Err(RecordError::PlaceholderMissing { .. })
        ));
        let template = UrlTemplate::new("/orders/0", NUMERIC_PLACEHOLDER);
        assert!(matches!(
            template.resolve("a/b"),
            Err(RecordError::InvalidId(_))
        ));
    }

    #[test]
    fn client_errors_surface_server_text() {
        let plain = failure_message(400, Some("Name is required"));
        assert!(plain.recoverable);
        assert_eq!(plain.text, "Name is required");

        let json = failure_message(409, Some(r#"{"detail": "Order already shipped"}"#));
        assert_eq!(json.text, "Order already shipped");
    }

    #[test]
    fn client_errors_without_text_stay_recoverable() {
        for (status, body) in [(404, None), (403, Some("  "))] {
            let message = failure_message(status, body);
            assert!(message.recoverable, "{status} should be recoverable");
            assert_eq!(message.text, GENERIC_FAILURE_MESSAGE);
        }
    }

    #[test]
    fn server_failures_are_generic() {
        for (status, body) in [(500, Some("Traceback ...")), (503, None), (302, Some("moved"))] {
            let message = failure_message(status, body);
            assert!(!message.recoverable);
            assert_eq!(message.text, GENERIC_FAILURE_MESSAGE);
        }
    }

    #[test]
    fn renders_record_table() {
        let table = RecordTable {
            columns: vec!["name".to_string(), "mac".to_string()],
            records: parse_record_list(DEVICES).expect("records parse"),
        };
        assert_eq!(
            table.render(),
            "1 | printer | aa:bb:cc:dd:ee:ff\nx2 | router | "
        );
    }
}
