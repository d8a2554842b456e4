use std::path::{Path, PathBuf};

use bridge_core::BridgeError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// `{inboxId, inboxName, savedAt}`, persisted so `ensureInbox` can skip the
/// list-by-name round trip on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarFile {
    #[serde(rename = "inboxId")]
    pub inbox_id: String,
    #[serde(rename = "inboxName")]
    pub inbox_name: String,
    #[serde(rename = "savedAt")]
    pub saved_at: String,
}

/// Default path `/app/data/app-data-<account>-<inbox>.json`; the directory
/// prefix is overridable via `BRIDGE_DATA_DIR`.
pub fn default_sidecar_path(account_id: &str, inbox_name: &str) -> PathBuf {
    let dir = std::env::var("BRIDGE_DATA_DIR").unwrap_or_else(|_| "/app/data".to_string());
    let slug: String = inbox_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    Path::new(&dir).join(format!("app-data-{account_id}-{slug}.json"))
}

pub async fn load(path: &Path) -> Option<SidecarFile> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub async fn save(path: &Path, inbox_id: &str, inbox_name: &str) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            BridgeError::permanent("sidecar_mkdir", "failed to create sidecar directory").with_source(err)
        })?;
    }
    let record = SidecarFile {
        inbox_id: inbox_id.to_string(),
        inbox_name: inbox_name.to_string(),
        saved_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
    };
    let bytes = serde_json::to_vec_pretty(&record)
        .map_err(|err| BridgeError::permanent("sidecar_encode", "failed to encode sidecar file").with_source(err))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| BridgeError::permanent("sidecar_write", "failed to write sidecar file").with_source(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_slugifies_inbox_name() {
        let path = default_sidecar_path("acme", "Customer Support");
        assert!(path.to_string_lossy().ends_with("app-data-acme-customer-support.json"));
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidecar.json");
        save(&path, "42", "Support").await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.inbox_id, "42");
        assert_eq!(loaded.inbox_name, "Support");
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(load(&path).await.is_none());
    }
}
