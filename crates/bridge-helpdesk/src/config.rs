use std::path::PathBuf;

use bridge_core::ConversationStatus;

/// Per-tenant helpdesk configuration, resolved by the tenant registry from
/// environment variables and handed to `HelpdeskClient::new`.
#[derive(Debug, Clone)]
pub struct HelpdeskConfig {
    pub base_url: String,
    pub api_access_token: String,
    pub account_id: String,
    pub inbox_name: String,
    pub sidecar_path: PathBuf,
    pub reopen_resolved: bool,
    pub initial_status: ConversationStatus,
    pub min_media_spacing_ms: u64,
    /// `<webhookBase>/<webhookName>/callback`, used when creating an API
    /// channel inbox.
    pub callback_webhook_url: String,
}

impl HelpdeskConfig {
    pub fn accounts_base(&self) -> String {
        format!("{}/api/v1/accounts/{}", self.base_url.trim_end_matches('/'), self.account_id)
    }
}

/// Default minimum spacing between media sends when the tenant doesn't
/// override it.
pub const DEFAULT_MEDIA_SPACING_MS: u64 = 1_000;
