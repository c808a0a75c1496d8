// mongobackup/src/config/mod.rs
mod paths;

pub use paths::{ARCHIVE_EXTENSION, BackupPaths};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_BACKUP_FOLDER: &str = "backup";
pub const DEFAULT_KEEP_LOCAL_BACKUPS: usize = 10;

/// Named settings as they arrive from the config file, `.env` and the environment.
/// Every value is a string; an empty string counts as unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawSettings {
    pub mongo_uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: Option<String>,
    pub collection: Option<String>,
    pub exclude_collections: Option<String>,
    pub backup_name: Option<String>,
    pub backup_local_folder: Option<String>,
    pub aws_bucket: Option<String>,
    pub aws_default_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub email_only_on_error: Option<String>,
    pub keep_local_backups_count: Option<String>,
    pub keep_remote_backups_count: Option<String>,
    pub archive: Option<String>,
    pub extra_options: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Full connection string; nothing else is passed to the dump tool.
    Uri(String),
    Discrete {
        host: String,
        port: Option<String>,
        db: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
}

impl Credentials {
    /// Source description used in the success message. For a URI this is the text
    /// before the first `@`.
    pub fn source_identifier(&self) -> String {
        match self {
            Credentials::Uri(uri) => uri.split('@').next().unwrap_or(uri).to_string(),
            Credentials::Discrete { host, port, db, .. } => {
                let port = port.as_deref().map(|p| format!(":{}", p)).unwrap_or_default();
                format!("mongodb://{}{}/{}", host, port, db.as_deref().unwrap_or(""))
            }
        }
    }
}

/// Bucket plus optional key prefix, parsed from `bucket/some/prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDestination {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl StorageDestination {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().trim_matches('/');
        let (bucket, prefix) = match value.split_once('/') {
            Some((bucket, prefix)) => (bucket, Some(prefix.trim_matches('/'))),
            None => (value, None),
        };
        if bucket.is_empty() {
            return None;
        }
        Some(StorageDestination {
            bucket: bucket.to_string(),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
        })
    }

    /// Object key for a file placed under this destination.
    pub fn key_for(&self, file_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, file_name),
            None => file_name.to_string(),
        }
    }

    /// Prefix used when listing the objects directly under this destination.
    pub fn list_prefix(&self) -> String {
        self.prefix
            .as_ref()
            .map(|p| format!("{}/", p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for StorageDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "s3://{}/{}", self.bucket, prefix),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddresses {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// `None` when neither a URI nor a host is configured; the dump step reports it.
    pub credentials: Option<Credentials>,
    pub db: Option<String>,
    pub collection: Option<String>,
    pub exclude_collections: Vec<String>,
    pub backup_name: Option<String>,
    pub local_folder: PathBuf,
    pub archive: bool,
    /// Raw `EXTRA_OPTIONS`, split with shell quoting rules when the dump runs.
    pub extra_options: Option<String>,
    pub keep_local_backups: usize,
    pub keep_remote_backups: Option<usize>,
    pub storage: Option<StorageDestination>,
    pub aws: AwsSettings,
    pub email: Option<EmailAddresses>,
    pub email_only_on_error: bool,
}

impl BackupConfig {
    /// Loads settings from an optional JSON file, then overlays `vars`
    /// (normally the process environment after `.env` was applied).
    pub fn load<I>(config_path: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = match config_path {
            Some(path) => read_json_settings(path)?,
            None => Map::new(),
        };
        for (key, value) in vars {
            settings.insert(key, Value::String(value));
        }
        let raw: RawSettings = serde_json::from_value(Value::Object(settings))
            .context("Failed to interpret backup settings")?;
        Self::from_settings(&raw)
    }

    pub fn from_settings(raw: &RawSettings) -> Result<Self> {
        let db = non_empty(&raw.db);
        let credentials = match (non_empty(&raw.mongo_uri), non_empty(&raw.host)) {
            (Some(uri), _) => Some(Credentials::Uri(uri)),
            (None, Some(host)) => Some(Credentials::Discrete {
                host,
                port: non_empty(&raw.port),
                db: db.clone(),
                username: non_empty(&raw.username),
                password: non_empty(&raw.password),
            }),
            (None, None) => {
                warn!("Neither MONGO_URI nor HOST is set, the dump will fail");
                None
            }
        };

        let exclude_collections: Vec<String> = raw
            .exclude_collections
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        let keep_local_backups = match non_empty(&raw.keep_local_backups_count) {
            None => DEFAULT_KEEP_LOCAL_BACKUPS,
            Some(value) => match value.parse::<usize>() {
                Ok(count) if count > 0 => count,
                _ => {
                    warn!(
                        "KEEP_LOCAL_BACKUPS_COUNT={} is not a positive number, keeping {} local backups",
                        value, DEFAULT_KEEP_LOCAL_BACKUPS
                    );
                    DEFAULT_KEEP_LOCAL_BACKUPS
                }
            },
        };

        let keep_remote_backups = non_empty(&raw.keep_remote_backups_count).and_then(|value| {
            match value.parse::<usize>() {
                Ok(count) if count > 0 => Some(count),
                _ => {
                    warn!(
                        "KEEP_REMOTE_BACKUPS_COUNT={} is not a positive number, remote backups will not be pruned",
                        value
                    );
                    None
                }
            }
        });

        let email = match (non_empty(&raw.email_from), non_empty(&raw.email_to)) {
            (Some(from), Some(to)) => Some(EmailAddresses { from, to }),
            _ => None,
        };

        Ok(BackupConfig {
            credentials,
            db,
            collection: non_empty(&raw.collection),
            exclude_collections,
            backup_name: non_empty(&raw.backup_name),
            local_folder: non_empty(&raw.backup_local_folder)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_FOLDER)),
            archive: is_enabled(&raw.archive),
            extra_options: non_empty(&raw.extra_options),
            keep_local_backups,
            keep_remote_backups,
            storage: non_empty(&raw.aws_bucket).and_then(|b| StorageDestination::parse(&b)),
            aws: AwsSettings {
                region: non_empty(&raw.aws_default_region),
                access_key_id: non_empty(&raw.aws_access_key_id),
                secret_access_key: non_empty(&raw.aws_secret_access_key),
                endpoint_url: non_empty(&raw.aws_endpoint_url),
            },
            email,
            email_only_on_error: is_enabled(&raw.email_only_on_error),
        })
    }
}

fn read_json_settings(config_path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    let parsed: Value = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse JSON from config file at {}",
            config_path.display()
        )
    })?;
    let Value::Object(object) = parsed else {
        anyhow::bail!(
            "Config file {} must contain a JSON object of settings",
            config_path.display()
        );
    };

    let mut settings = Map::new();
    for (key, value) in object {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            // Lists are accepted for comma-separated settings such as EXCLUDE_COLLECTIONS.
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(anyhow::anyhow!(
                        "Setting {} may only list strings, found {}",
                        key,
                        other
                    )),
                })
                .collect::<Result<Vec<_>>>()?
                .join(","),
            Value::Object(_) => {
                anyhow::bail!("Setting {} in {} must not be an object", key, config_path.display())
            }
        };
        settings.insert(key, Value::String(value));
    }
    Ok(settings)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_enabled(value: &Option<String>) -> bool {
    match non_empty(value) {
        None => false,
        Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
    }
}
