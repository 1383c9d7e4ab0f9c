//! Server records.
//!
//! Each decoded line is an object with a `type` field. Records are decoded
//! field by field rather than through a strict derive: a missing or
//! mistyped field falls back to a default instead of rejecting the whole
//! record, and an unrecognized `type` becomes [`Record::Unknown`].
//!
//! Wire layout per kind:
//!
//! | `type` | fields |
//! |---|---|
//! | `message`, `error` | `content` |
//! | `clear_desktop` | none |
//! | `desktop_mode_switch` | `mode` |
//! | `desktop_content_stream_start` | none |
//! | `desktop_content_stream` | `stream_type`, `content`, `exit_code?` |
//! | `desktop_content_stream_end` | none |
//! | `desktop_content_set` | `content_type?`, `data?`, `contentType?`, `filename?`, `content?`, `language?` |

use serde_json::{Map, Value};

use crate::desktop::{DesktopMode, FileView, ImageView, DEFAULT_IMAGE_CONTENT_TYPE};
use crate::error::{CoreError, Result};

/// `content_type` value that selects the screenshot branch of `desktop_content_set`.
const IMAGE_CONTENT_TYPE_TAG: &str = "image_base64";

/// Sub-kind of a `desktop_content_stream` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard output line.
    Stdout,
    /// Standard error line.
    Stderr,
    /// Process finished; carries the exit code.
    ExitCode,
    /// The command could not be run at all.
    ExecutionError,
    /// Missing or unrecognized `stream_type`.
    Other(Option<String>),
}

impl StreamKind {
    fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("stdout") => Self::Stdout,
            Some("stderr") => Self::Stderr,
            Some("exit_code") => Self::ExitCode,
            Some("execution_error") => Self::ExecutionError,
            other => Self::Other(other.map(ToString::to_string)),
        }
    }
}

/// Payload of a `desktop_content_set` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSet {
    /// A browser screenshot.
    Image(ImageView),
    /// A file for the file viewer.
    File(FileView),
}

/// One instruction from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Agent chat message.
    Message {
        /// Message text.
        content: String,
    },
    /// Agent-reported error, shown in the chat.
    Error {
        /// Error text.
        content: String,
    },
    /// Drop all desktop payloads, keep the mode.
    ClearDesktop,
    /// Change the desktop mode. `None` when the field was missing or unknown.
    DesktopModeSwitch {
        /// Requested mode.
        mode: Option<DesktopMode>,
    },
    /// A new terminal session begins.
    DesktopContentStreamStart,
    /// One piece of terminal output.
    DesktopContentStream {
        /// Output channel.
        stream_kind: StreamKind,
        /// Output text.
        content: String,
        /// Exit code, for [`StreamKind::ExitCode`].
        exit_code: Option<String>,
    },
    /// The terminal session ended.
    DesktopContentStreamEnd,
    /// Replace the file or screenshot.
    DesktopContentSet(ContentSet),
    /// A `type` this client does not know, or no `type` at all.
    Unknown {
        /// The `type` value, if there was one.
        kind: Option<String>,
    },
}

impl Record {
    /// Decode a record, rejecting values that are not JSON objects.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotARecord`] if `value` is not an object.
    pub fn try_from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::NotARecord(value.to_string()))?;

        let kind = obj.get("type").and_then(Value::as_str);
        let record = match kind {
            Some("message") => Self::Message {
                content: text_field(obj, "content").unwrap_or_default(),
            },
            Some("error") => Self::Error {
                content: text_field(obj, "content").unwrap_or_default(),
            },
            Some("clear_desktop") => Self::ClearDesktop,
            Some("desktop_mode_switch") => Self::DesktopModeSwitch {
                mode: obj
                    .get("mode")
                    .and_then(|v| serde_json::from_value(v.clone()).ok()),
            },
            Some("desktop_content_stream_start") => Self::DesktopContentStreamStart,
            Some("desktop_content_stream") => Self::DesktopContentStream {
                stream_kind: StreamKind::from_wire(obj.get("stream_type").and_then(Value::as_str)),
                content: text_field(obj, "content").unwrap_or_default(),
                exit_code: text_field(obj, "exit_code"),
            },
            Some("desktop_content_stream_end") => Self::DesktopContentStreamEnd,
            Some("desktop_content_set") => Self::DesktopContentSet(content_set(obj)),
            other => Self::Unknown {
                kind: other.map(ToString::to_string),
            },
        };

        Ok(record)
    }

    /// Decode a record, mapping anything that is not an object to
    /// [`Record::Unknown`] with no kind.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::try_from_value(value).unwrap_or(Self::Unknown { kind: None })
    }

    /// Wire name of the record kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::ClearDesktop => "clear_desktop",
            Self::DesktopModeSwitch { .. } => "desktop_mode_switch",
            Self::DesktopContentStreamStart => "desktop_content_stream_start",
            Self::DesktopContentStream { .. } => "desktop_content_stream",
            Self::DesktopContentStreamEnd => "desktop_content_stream_end",
            Self::DesktopContentSet(_) => "desktop_content_set",
            Self::Unknown { kind } => kind.as_deref().unwrap_or("<none>"),
        }
    }
}

fn content_set(obj: &Map<String, Value>) -> ContentSet {
    let is_image = obj.get("content_type").and_then(Value::as_str) == Some(IMAGE_CONTENT_TYPE_TAG);

    if is_image {
        ContentSet::Image(ImageView {
            data: text_field(obj, "data").unwrap_or_default(),
            content_type: text_field(obj, "contentType")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_CONTENT_TYPE.to_string()),
            filename: text_field(obj, "filename").unwrap_or_default(),
        })
    } else {
        ContentSet::File(FileView {
            filename: text_field(obj, "filename").unwrap_or_default(),
            content: text_field(obj, "content").unwrap_or_default(),
            language: text_field(obj, "language").unwrap_or_default(),
        })
    }
}

/// Read a field as text. Strings are taken as-is, other scalars by their
/// JSON text; missing, `null`, arrays and objects give `None`.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: &Value) -> Record {
        Record::from_value(value)
    }

    #[test]
    fn message_and_error() {
        assert_eq!(
            decode(&json!({"type": "message", "content": "hi"})),
            Record::Message { content: "hi".to_string() }
        );
        assert_eq!(
            decode(&json!({"type": "error", "content": "boom"})),
            Record::Error { content: "boom".to_string() }
        );
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        assert_eq!(
            decode(&json!({"type": "message"})),
            Record::Message { content: String::new() }
        );
    }

    #[test]
    fn mode_switch_known_missing_and_unknown() {
        assert_eq!(
            decode(&json!({"type": "desktop_mode_switch", "mode": "file_editor"})),
            Record::DesktopModeSwitch { mode: Some(DesktopMode::FileEditor) }
        );
        assert_eq!(
            decode(&json!({"type": "desktop_mode_switch"})),
            Record::DesktopModeSwitch { mode: None }
        );
        assert_eq!(
            decode(&json!({"type": "desktop_mode_switch", "mode": "holodeck"})),
            Record::DesktopModeSwitch { mode: None }
        );
    }

    #[test]
    fn stream_record_sub_kinds() {
        let record = decode(&json!({
            "type": "desktop_content_stream",
            "stream_type": "exit_code",
            "content": "Process finished",
            "exit_code": 0
        }));
        assert_eq!(
            record,
            Record::DesktopContentStream {
                stream_kind: StreamKind::ExitCode,
                content: "Process finished".to_string(),
                exit_code: Some("0".to_string()),
            }
        );

        let record = decode(&json!({"type": "desktop_content_stream", "stream_type": "weird", "content": "x"}));
        assert!(matches!(
            record,
            Record::DesktopContentStream { stream_kind: StreamKind::Other(Some(ref k)), .. } if k == "weird"
        ));

        let record = decode(&json!({"type": "desktop_content_stream", "content": "x"}));
        assert!(matches!(
            record,
            Record::DesktopContentStream { stream_kind: StreamKind::Other(None), exit_code: None, .. }
        ));
    }

    #[test]
    fn content_set_image_defaults_content_type() {
        let record = decode(&json!({
            "type": "desktop_content_set",
            "content_type": "image_base64",
            "data": "AAA",
            "filename": "x.png"
        }));
        assert_eq!(
            record,
            Record::DesktopContentSet(ContentSet::Image(ImageView {
                data: "AAA".to_string(),
                content_type: "image/png".to_string(),
                filename: "x.png".to_string(),
            }))
        );
    }

    #[test]
    fn content_set_image_keeps_declared_content_type() {
        let record = decode(&json!({
            "type": "desktop_content_set",
            "content_type": "image_base64",
            "data": "AAA",
            "contentType": "image/jpeg"
        }));
        match record {
            Record::DesktopContentSet(ContentSet::Image(image)) => {
                assert_eq!(image.content_type, "image/jpeg");
                assert_eq!(image.filename, "");
            }
            other => panic!("Expected image, got {other:?}"),
        }
    }

    #[test]
    fn content_set_without_image_tag_is_a_file() {
        let record = decode(&json!({
            "type": "desktop_content_set",
            "filename": "main.py",
            "content": "print(1)",
            "language": "py"
        }));
        assert_eq!(
            record,
            Record::DesktopContentSet(ContentSet::File(FileView {
                filename: "main.py".to_string(),
                content: "print(1)".to_string(),
                language: "py".to_string(),
            }))
        );

        let record = decode(&json!({"type": "desktop_content_set", "content_type": "text"}));
        assert_eq!(record, Record::DesktopContentSet(ContentSet::File(FileView::default())));
    }

    #[test]
    fn unknown_kinds() {
        assert_eq!(
            decode(&json!({"type": "telemetry", "x": 1})),
            Record::Unknown { kind: Some("telemetry".to_string()) }
        );
        assert_eq!(decode(&json!({"content": "no type"})), Record::Unknown { kind: None });
        assert_eq!(decode(&json!({"type": 7})), Record::Unknown { kind: None });
    }

    #[test]
    fn non_object_values_are_not_records() {
        assert!(matches!(
            Record::try_from_value(&json!([1, 2])),
            Err(CoreError::NotARecord(_))
        ));
        assert_eq!(decode(&json!("message")), Record::Unknown { kind: None });
    }

    #[test]
    fn kind_names() {
        assert_eq!(Record::ClearDesktop.kind(), "clear_desktop");
        assert_eq!(Record::Unknown { kind: Some("x".to_string()) }.kind(), "x");
        assert_eq!(Record::Unknown { kind: None }.kind(), "<none>");
    }
}
