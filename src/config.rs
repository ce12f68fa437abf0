use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::domain::{Cursor, DEFAULT_MAX_HEIGHT, default_max_height};
use crate::error::QueueError;
use crate::fs_util;

pub const DEFAULT_CONFIG_FILE: &str = "video_downloads.toml";
const CHANNEL_EXTENSION: &str = "toml";

pub fn load_table(path: &Utf8Path) -> Result<Table, QueueError> {
    if !path.as_std_path().exists() {
        return Err(QueueError::NotFound(path.as_std_path().to_path_buf()));
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| QueueError::Filesystem(format!("read {path}: {err}")))?;
    let mut table: Table = content.parse().map_err(|err: toml::de::Error| {
        QueueError::ConfigParse {
            path: path.as_std_path().to_path_buf(),
            message: err.message().to_string(),
        }
    })?;

    let has_link = table.contains_key("link") || table.contains_key("source_url");
    let has_folder = table.contains_key("target_folder");
    if has_link || has_folder {
        if !has_link {
            return Err(missing_key(path, "link"));
        }
        if !has_folder {
            return Err(missing_key(path, "target_folder"));
        }
    }

    table
        .entry("max_height")
        .or_insert(Value::Integer(i64::from(DEFAULT_MAX_HEIGHT)));
    table
        .entry("last_download_index")
        .or_insert(Value::Integer(0));
    Ok(table)
}

fn missing_key(path: &Utf8Path, key: &str) -> QueueError {
    QueueError::Config {
        path: path.as_std_path().to_path_buf(),
        key: key.to_string(),
    }
}

fn parse_error(path: &Utf8Path, err: toml::de::Error) -> QueueError {
    QueueError::ConfigParse {
        path: path.as_std_path().to_path_buf(),
        message: err.message().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "link", alias = "source_url")]
    pub source_url: String,
    pub target_folder: String,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default)]
    pub last_download_index: u64,
    #[serde(rename = "last_video", default, skip_serializing_if = "Option::is_none")]
    pub last_item_id: Option<String>,
    #[serde(flatten)]
    pub extra: Table,
}

impl ChannelConfig {
    pub fn new(source_url: impl Into<String>, target_folder: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            target_folder: target_folder.into(),
            max_height: DEFAULT_MAX_HEIGHT,
            last_download_index: 0,
            last_item_id: None,
            extra: Table::new(),
        }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, QueueError> {
        let table = load_table(path)?;
        if !table.contains_key("link") && !table.contains_key("source_url") {
            return Err(missing_key(path, "link"));
        }
        Value::Table(table)
            .try_into()
            .map_err(|err| parse_error(path, err))
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), QueueError> {
        let content =
            toml::to_string(self).map_err(|err| QueueError::Serialization(err.to_string()))?;
        fs_util::write_atomic(path.as_std_path(), content.as_bytes())
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            last_item_id: self.last_item_id.clone(),
            last_download_index: self.last_download_index,
        }
    }

    pub fn record_queued(&mut self, item_id: &str) {
        self.last_download_index += 1;
        self.last_item_id = Some(item_id.to_string());
    }

    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.target_folder.trim().is_empty() {
            fallback
        } else {
            &self.target_folder
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawQueueConfig {
    video_definition_dir: String,
    link_queue_dir: String,
    target_dir: String,
    #[serde(default)]
    symlink_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub config_path: Utf8PathBuf,
    pub video_definition_dir: Utf8PathBuf,
    pub link_queue_dir: Utf8PathBuf,
    pub target_dir: Utf8PathBuf,
    pub symlink_dir: Option<Utf8PathBuf>,
}

impl QueueConfig {
    pub fn load(path: &Utf8Path) -> Result<Self, QueueError> {
        let table = load_table(path)?;
        for key in ["video_definition_dir", "link_queue_dir", "target_dir"] {
            if !table.contains_key(key) {
                return Err(missing_key(path, key));
            }
        }
        let raw: RawQueueConfig = Value::Table(table)
            .try_into()
            .map_err(|err| parse_error(path, err))?;

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        let resolve = |value: &str| {
            let candidate = Utf8PathBuf::from(value);
            if candidate.is_absolute() {
                candidate
            } else {
                base_dir.join(candidate)
            }
        };

        Ok(Self {
            config_path: path.to_path_buf(),
            video_definition_dir: resolve(&raw.video_definition_dir),
            link_queue_dir: resolve(&raw.link_queue_dir),
            target_dir: resolve(&raw.target_dir),
            symlink_dir: raw.symlink_dir.as_deref().map(resolve),
        })
    }

    pub fn ensure_dirs(&self) -> Result<(), QueueError> {
        let mut dirs = vec![&self.link_queue_dir, &self.video_definition_dir];
        if let Some(symlink_dir) = &self.symlink_dir {
            dirs.push(symlink_dir);
        }
        for dir in dirs {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| QueueError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }

    pub fn channel_configs(&self) -> Result<Vec<Utf8PathBuf>, QueueError> {
        fs_util::list_with_extension(self.video_definition_dir.as_std_path(), CHANNEL_EXTENSION)?
            .into_iter()
            .map(|path| {
                Utf8PathBuf::from_path_buf(path).map_err(|path| {
                    QueueError::Filesystem(format!("non-utf8 path {}", path.display()))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Utf8Path, name: &str, content: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        fs::write(path.as_std_path(), content).unwrap();
        path
    }

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn empty_file_loads_with_defaults() {
        let (_guard, root) = tempdir();
        let path = write(&root, "empty.toml", "");
        let table = load_table(&path).unwrap();
        assert_eq!(table["max_height"].as_integer(), Some(1080));
        assert_eq!(table["last_download_index"].as_integer(), Some(0));
    }

    #[test]
    fn save_preserves_unknown_keys() {
        let (_guard, root) = tempdir();
        let path = write(
            &root,
            "chan.toml",
            "link = \"https://example.com/list\"\ntarget_folder = \"chan\"\nnote = \"keep me\"\n",
        );
        let mut config = ChannelConfig::load(&path).unwrap();
        config.record_queued("abc");
        config.save(&path).unwrap();

        let reloaded = ChannelConfig::load(&path).unwrap();
        assert_eq!(reloaded.last_download_index, 1);
        assert_eq!(reloaded.last_item_id.as_deref(), Some("abc"));
        assert_eq!(reloaded.extra["note"].as_str(), Some("keep me"));
        let raw = fs::read_to_string(path.as_std_path()).unwrap();
        assert!(raw.contains("last_video = \"abc\""));
        assert!(raw.contains("link = "));
    }

    #[test]
    fn relative_dirs_resolve_against_config_location() {
        let (_guard, root) = tempdir();
        let path = write(
            &root,
            DEFAULT_CONFIG_FILE,
            "video_definition_dir = \"channels\"\nlink_queue_dir = \"queue\"\ntarget_dir = \"/srv/videos\"\n",
        );
        let config = QueueConfig::load(&path).unwrap();
        assert_eq!(config.video_definition_dir, root.join("channels"));
        assert_eq!(config.link_queue_dir, root.join("queue"));
        assert_eq!(config.target_dir, Utf8PathBuf::from("/srv/videos"));
        assert!(config.symlink_dir.is_none());
    }
}
