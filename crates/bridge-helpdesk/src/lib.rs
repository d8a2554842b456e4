//! Per-tenant helpdesk REST client: resolves the tenant's
//! inbox, finds or creates contacts and conversations (with the
//! reopen-resolved pagination policy), sends throttled/retried
//! text-or-media messages, and deletes messages. The wire shape is
//! Chatwoot's accounts/inboxes/contacts/conversations/messages surface
//!.

mod client;
mod config;
mod sidecar;

pub use client::{ContactRef, ConversationRef, HelpdeskClient, InboxHandle, MediaDownloadHook, MediaPayload};
pub use config::{DEFAULT_MEDIA_SPACING_MS, HelpdeskConfig};
pub use sidecar::{SidecarFile, default_sidecar_path};

#[cfg(test)]
mod tests {
    use bridge_core::ConversationStatus;

    use super::*;

    fn config(base_url: &str) -> HelpdeskConfig {
        HelpdeskConfig {
            base_url: base_url.to_string(),
            api_access_token: "token-123".to_string(),
            account_id: "1".to_string(),
            inbox_name: "WhatsApp".to_string(),
            sidecar_path: std::env::temp_dir().join("bridge-helpdesk-test-sidecar.json"),
            reopen_resolved: true,
            initial_status: ConversationStatus::Open,
            min_media_spacing_ms: 1,
            callback_webhook_url: "https://bridge.example/acme/callback".to_string(),
        }
    }

    #[test]
    fn accounts_base_is_well_formed() {
        let cfg = config("https://helpdesk.example/");
        assert_eq!(cfg.accounts_base(), "https://helpdesk.example/api/v1/accounts/1");
    }

    #[tokio::test]
    async fn client_construction_succeeds() {
        let client = HelpdeskClient::new(config("https://helpdesk.example")).unwrap();
        // No network calls happen at construction time.
        drop(client);
    }
}
