//! Property-mirror update envelope.
//!
//! Each text frame from the mirror is a JSON object with three optional arrays:
//!
//! ```json
//! {
//!   "created": [{"path": "/canvas/group[0]", "id": 1, "value": null}],
//!   "removed": [4, 5],
//!   "changed": [[1, "new value"]]
//! }
//! ```
//!
//! The server spells the removal field `remvoed`; both spellings are accepted.
//! Entries are decoded one by one so a malformed entry only costs that entry.

use serde::Deserialize;

use crate::error::{CanvasError, Result};
use crate::tree::PropValue;

/// Session-scoped property id assigned by the remote side.
pub type RemoteId = u64;

/// A `created` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedEntry {
    pub path: String,
    pub id: RemoteId,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A `changed` entry (`[id, newValue]` on the wire).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEntry {
    pub id: RemoteId,
    pub value: PropValue,
}

/// An entry that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedEntry {
    pub section: &'static str,
    pub detail: String,
}

/// One decoded update message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateEnvelope {
    pub created: Vec<CreatedEntry>,
    pub removed: Vec<RemoteId>,
    pub changed: Vec<ChangedEntry>,
    /// Entries skipped during decoding.
    pub malformed: Vec<MalformedEntry>,
}

impl UpdateEnvelope {
    /// Decode a text frame.
    ///
    /// Fails only when the frame is not a JSON object at all; anything wrong inside
    /// an individual entry ends up in [`malformed`](Self::malformed).
    pub fn decode(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        let serde_json::Value::Object(obj) = json else {
            return Err(CanvasError::Protocol("update message is not an object".into()));
        };

        let mut envelope = Self::default();

        for entry in section(&obj, "created", &mut envelope.malformed) {
            match CreatedEntry::deserialize(entry) {
                Ok(created) => envelope.created.push(created),
                Err(e) => envelope.malformed.push(MalformedEntry {
                    section: "created",
                    detail: e.to_string(),
                }),
            }
        }

        for key in ["removed", "remvoed"] {
            for entry in section(&obj, key, &mut envelope.malformed) {
                match entry.as_u64() {
                    Some(id) => envelope.removed.push(id),
                    None => envelope.malformed.push(MalformedEntry {
                        section: "removed",
                        detail: format!("not a property id: {entry}"),
                    }),
                }
            }
        }

        for entry in section(&obj, "changed", &mut envelope.malformed) {
            match decode_change(entry) {
                Some(change) => envelope.changed.push(change),
                None => envelope.malformed.push(MalformedEntry {
                    section: "changed",
                    detail: format!("malformed change notification: {entry}"),
                }),
            }
        }

        Ok(envelope)
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Entries of an optional array field. A present but non-array field is recorded
/// as malformed and yields nothing.
fn section<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &'static str,
    malformed: &mut Vec<MalformedEntry>,
) -> &'a [serde_json::Value] {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => &[],
        Some(serde_json::Value::Array(items)) => items,
        Some(other) => {
            malformed.push(MalformedEntry {
                section: key,
                detail: format!("expected an array, got {other}"),
            });
            &[]
        }
    }
}

fn decode_change(entry: &serde_json::Value) -> Option<ChangedEntry> {
    match entry.as_array()?.as_slice() {
        [id, value] => Some(ChangedEntry {
            id: id.as_u64()?,
            value: PropValue::from_json(value),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn decode_all_sections() {
        let env = UpdateEnvelope::decode(
            r#"{
                "created": [{"path": "/c/group[0]", "id": 1, "value": null}],
                "removed": [7],
                "changed": [[1, "x"]]
            }"#,
        )
        .unwrap();
        assert_eq!(env.created.len(), 1);
        assert_eq!(env.created[0].path, "/c/group[0]");
        assert_eq!(env.created[0].id, 1);
        assert_eq!(env.removed, vec![7]);
        assert_eq!(
            env.changed,
            vec![ChangedEntry {
                id: 1,
                value: PropValue::from("x")
            }]
        );
        assert!(env.malformed.is_empty());
    }

    #[test]
    fn decode_accepts_misspelled_removal_field() {
        let env = UpdateEnvelope::decode(r#"{"remvoed": [3, 4]}"#).unwrap();
        assert_eq!(env.removed, vec![3, 4]);
    }

    #[test]
    fn decode_empty_object() {
        let env = UpdateEnvelope::decode("{}").unwrap();
        assert!(env.is_empty());
        assert!(env.malformed.is_empty());
    }

    #[test]
    fn created_value_defaults_to_null() {
        let env = UpdateEnvelope::decode(r#"{"created": [{"path": "/a", "id": 2}]}"#).unwrap();
        assert!(env.created[0].value.is_null());
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let env = UpdateEnvelope::decode(
            r#"{
                "created": [{"id": 1}, {"path": "/a", "id": 2}],
                "removed": ["x", 5],
                "changed": [[1], [2, 3], "bad", [-1, 0]]
            }"#,
        )
        .unwrap();
        assert_eq!(env.created.len(), 1);
        assert_eq!(env.removed, vec![5]);
        assert_eq!(env.changed.len(), 1);
        assert_eq!(env.malformed.len(), 5);
    }

    #[test]
    fn non_array_section_is_malformed() {
        let env = UpdateEnvelope::decode(r#"{"changed": 12}"#).unwrap();
        assert!(env.changed.is_empty());
        assert_eq!(env.malformed.len(), 1);
        assert_eq!(env.malformed[0].section, "changed");
    }

    #[test]
    fn non_object_frame_is_an_error() {
        assert!(matches!(
            UpdateEnvelope::decode("[1,2]"),
            Err(CanvasError::Protocol(_))
        ));
        assert!(matches!(
            UpdateEnvelope::decode("Hello"),
            Err(CanvasError::Json(_))
        ));
    }
}
