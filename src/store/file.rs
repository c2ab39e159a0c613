use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::error::{OssError, Result};
use crate::models::{ApiToken, MeterIdentifier, StoredConfiguration};

/// On-disk layout: the configuration surface plus token metadata
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    #[serde(flatten)]
    configuration: StoredConfiguration,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// JSON file store, written atomically and readable by the owner only
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration surface as stored, without rebuilding the token
    pub async fn load_configuration(&self) -> Result<Option<StoredConfiguration>> {
        Ok(self.read_file().await?.map(|file| file.configuration))
    }

    async fn read_file(&self) -> Result<Option<CredentialsFile>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credentials");
                return Ok(None);
            }
            Err(e) => {
                return Err(OssError::Store(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            OssError::Store(format!("Malformed credentials file {}: {}", self.path.display(), e))
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, token: &ApiToken, meter: &MeterIdentifier) -> Result<()> {
        let file = CredentialsFile {
            configuration: StoredConfiguration::new(token, meter),
            label: Some(token.label().to_string()),
            expires_at: Some(token.expires_at()),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| OssError::Store(format!("Failed to encode credentials: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OssError::Store(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp = self.temp_path();
        let written = match write_private(&temp, &json).await {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
                format!("Failed to replace {}: {}", self.path.display(), e)
            }),
            Err(e) => Err(format!("Failed to write {}: {}", temp.display(), e)),
        };

        if let Err(message) = written {
            remove_if_present(&temp).await;
            return Err(OssError::Store(message));
        }

        info!(path = %self.path.display(), meter = %meter, "Stored credentials");
        Ok(())
    }

    async fn load(&self) -> Result<Option<(ApiToken, MeterIdentifier)>> {
        let Some(file) = self.read_file().await? else {
            return Ok(None);
        };

        let meter: MeterIdentifier = file
            .configuration
            .meter_number
            .parse()
            .map_err(|e: String| OssError::Store(e))?;
        if file.configuration.token.trim().is_empty() {
            return Err(OssError::Store(format!(
                "Credentials file {} has an empty token",
                self.path.display()
            )));
        }

        // Files written by hand only carry the two configuration fields
        let token = ApiToken::new(
            file.configuration.token,
            file.label.unwrap_or_default(),
            file.expires_at.unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        Ok(Some((token, meter)))
    }
}

/// Write `contents` to a fresh file that only the owner can read.
///
/// A leftover file from an interrupted save is removed first so its
/// permissions are never reused.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    remove_if_present(path).await;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temporary credentials file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove temporary credentials file: {}", e),
    }
}
