use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::QueueError;

pub const LINK_EXTENSION: &str = "link";
pub const BROKEN_EXTENSION: &str = "broken";
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Link file names keep only this many characters of the item id. Two ids
/// sharing the same prefix map to the same file and the later one wins.
pub const ID_PREFIX_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDescriptor {
    pub id: String,
    pub title: String,
    pub url: String,
    pub duration: f64,
}

impl ItemDescriptor {
    pub fn from_value(value: &Value) -> Result<Self, QueueError> {
        let object = value
            .as_object()
            .ok_or_else(|| QueueError::InvalidEntry(format!("expected an object, got {value}")))?;

        let text = |key: &str| -> Result<String, QueueError> {
            match object.get(key) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                Some(other) => Err(QueueError::InvalidEntry(format!(
                    "field `{key}` has unexpected value {other}"
                ))),
                None => Err(QueueError::InvalidEntry(format!("missing field `{key}`"))),
            }
        };

        let id = text("id")?;
        if id.trim().is_empty() {
            return Err(QueueError::InvalidEntry("entry has an empty `id`".to_string()));
        }
        let title = text("title")?;
        let url = text("url")?;
        // Live streams and premieres report a null duration.
        let duration = match object.get("duration") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::Null) => 0.0,
            Some(other) => {
                return Err(QueueError::InvalidEntry(format!(
                    "entry {id}: field `duration` has unexpected value {other}"
                )));
            }
            None => {
                return Err(QueueError::InvalidEntry(format!(
                    "entry {id}: missing field `duration`"
                )));
            }
        };

        Ok(Self {
            id,
            title,
            url,
            duration,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_item_id: Option<String>,
    pub last_download_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "url", alias = "source_url")]
    pub source_url: String,
    #[serde(
        rename = "duration",
        alias = "duration_seconds",
        default,
        deserialize_with = "null_as_zero"
    )]
    pub duration_seconds: f64,
    #[serde(rename = "my_index", alias = "sequence_index", default)]
    pub sequence_index: usize,
    #[serde(rename = "my_title", alias = "channel_label", default)]
    pub channel_label: String,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn from_descriptor(
        descriptor: ItemDescriptor,
        sequence_index: usize,
        channel_label: &str,
        max_height: u32,
    ) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.title,
            source_url: descriptor.url,
            duration_seconds: descriptor.duration,
            sequence_index,
            channel_label: channel_label.to_string(),
            max_height,
            cookies_file: None,
            queued_at: Some(Utc::now()),
        }
    }

    pub fn file_stem(&self) -> String {
        self.id
            .chars()
            .take(ID_PREFIX_LEN)
            .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
            .collect()
    }

    pub fn link_file_name(&self) -> String {
        format!("{}.{LINK_EXTENSION}", self.file_stem())
    }
}

pub fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str) -> WorkItem {
        WorkItem::from_descriptor(
            ItemDescriptor {
                id: id.to_string(),
                title: "T".to_string(),
                url: "u".to_string(),
                duration: 1.0,
            },
            0,
            "chan",
            DEFAULT_MAX_HEIGHT,
        )
    }

    #[test]
    fn link_name_short_id() {
        assert_eq!(item("short").link_file_name(), "short.link");
    }

    #[test]
    fn link_name_truncates_long_id() {
        let name = item(&"a".repeat(30)).link_file_name();
        assert_eq!(name, format!("{}.link", "a".repeat(20)));
    }

    #[test]
    fn descriptor_requires_core_fields() {
        let err = ItemDescriptor::from_value(&json!({"id": "x", "title": "t", "duration": 3}))
            .unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn descriptor_accepts_null_duration() {
        let desc = ItemDescriptor::from_value(
            &json!({"id": "x", "title": "t", "url": "u", "duration": null, "view_count": 5}),
        )
        .unwrap();
        assert_eq!(desc.duration, 0.0);
    }

    #[test]
    fn work_item_reads_legacy_keys() {
        let raw = r#"{"id":"xyz789","title":"Loaded Video","url":"https://example.com/loaded",
            "duration":300.0,"my_index":5,"my_title":"Loaded Channel","extra":true}"#;
        let item: WorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.sequence_index, 5);
        assert_eq!(item.channel_label, "Loaded Channel");
        assert_eq!(item.max_height, DEFAULT_MAX_HEIGHT);
        assert!(item.queued_at.is_none());
    }
}
