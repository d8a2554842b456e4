use std::sync::{Arc, RwLock};

use bridge_core::{ConversationStatus, parse_bool_env};
use bridge_helpdesk::{HelpdeskConfig, default_sidecar_path};
use bridge_provider::ProviderCredentials;

use crate::env_names as names;

/// One fully resolved (provider credentials, helpdesk account, inbox)
/// tuple, a single tenant/integration bound to the bridge.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: String,
    pub helpdesk: HelpdeskConfig,
    pub provider: ProviderCredentials,
    pub ignore_groups: bool,
    pub sign_agent_messages: bool,
    pub default_country: String,
    pub webhook_base: String,
    pub webhook_name: String,
    /// Filled in once `HelpdeskClient::ensure_inbox` resolves an id at
    /// runtime, so `TenantRegistry::by_helpdesk_inbox_id` can route
    /// outbound callbacks back to this tenant. Shared via `Arc` so every
    /// clone of a `Tenant` observes the same resolved value.
    resolved_inbox_id: Arc<RwLock<Option<String>>>,
}

impl Tenant {
    pub fn set_resolved_inbox_id(&self, inbox_id: impl Into<String>) {
        *self.resolved_inbox_id.write().expect("resolved_inbox_id lock poisoned") = Some(inbox_id.into());
    }

    pub fn resolved_inbox_id(&self) -> Option<String> {
        self.resolved_inbox_id.read().expect("resolved_inbox_id lock poisoned").clone()
    }
}

/// Builds one tenant's configuration from the environment. `bare` controls
/// whether the unsuffixed variable names are read (only true for the
/// synthesized `"default"` tenant when no other tenant was discovered).
pub fn build_tenant(id: &str, bare: bool) -> Result<Tenant, String> {
    let get = |base: &str| names::get(base, id, bare);

    let base_url = get(names::HELPDESK_BASE_URL).ok_or_else(|| format!("tenant {id}: missing helpdesk base URL"))?;
    let token = get(names::HELPDESK_TOKEN).ok_or_else(|| format!("tenant {id}: missing helpdesk API token"))?;
    let account_id = get(names::HELPDESK_ACCOUNT).ok_or_else(|| format!("tenant {id}: missing helpdesk account id"))?;
    let inbox_name = get(names::HELPDESK_INBOX).ok_or_else(|| format!("tenant {id}: missing helpdesk inbox name"))?;

    let webhook_base = get(names::WEBHOOK_BASE).unwrap_or_else(|| "http://localhost:8080".to_string());
    let webhook_name = get(names::WEBHOOK_NAME).unwrap_or_else(|| id.to_string());

    let reopen_resolved = parse_bool_env(&names::suffixed(names::HELPDESK_REOPEN_RESOLVED, id, bare), true);
    let initial_status = match get(names::HELPDESK_INITIAL_STATUS).as_deref() {
        Some("pending") => ConversationStatus::Pending,
        Some("resolved") => ConversationStatus::Resolved,
        _ => ConversationStatus::Open,
    };
    let min_media_spacing_ms = get(names::HELPDESK_MEDIA_SPACING_MS)
        .and_then(|v| v.parse().ok())
        .unwrap_or(bridge_helpdesk::DEFAULT_MEDIA_SPACING_MS);

    let helpdesk = HelpdeskConfig {
        base_url,
        api_access_token: token,
        account_id: account_id.clone(),
        inbox_name: inbox_name.clone(),
        sidecar_path: default_sidecar_path(&account_id, &inbox_name),
        reopen_resolved,
        initial_status,
        min_media_spacing_ms,
        callback_webhook_url: format!("{webhook_base}/{webhook_name}/callback"),
    };

    let provider = build_provider_credentials(id, bare).ok_or_else(|| format!("tenant {id}: no provider recipe matched"))?;

    Ok(Tenant {
        id: id.to_string(),
        helpdesk,
        provider,
        ignore_groups: parse_bool_env(&names::suffixed(names::IGNORE_GROUPS, id, bare), false),
        sign_agent_messages: parse_bool_env(&names::suffixed(names::SIGN_AGENT_MESSAGES, id, bare), false),
        default_country: get(names::DEFAULT_COUNTRY).unwrap_or_else(|| "BR".to_string()),
        webhook_base,
        webhook_name,
        resolved_inbox_id: Arc::new(RwLock::new(None)),
    })
}

/// Tries UAZAPI, then Z-API, then Wuzapi, in that order,
/// taking the first recipe whose required keys are all set.
fn build_provider_credentials(id: &str, bare: bool) -> Option<ProviderCredentials> {
    let get = |base: &str| names::get(base, id, bare);

    if let (Some(base_url), Some(token), Some(number)) = (get(names::UAZAPI_BASE_URL), get(names::UAZAPI_TOKEN), get(names::UAZAPI_NUMBER)) {
        return Some(ProviderCredentials::Uazapi { base_url, token, number });
    }
    if let (Some(instance), Some(token), Some(client_token)) = (get(names::ZAPI_INSTANCE), get(names::ZAPI_TOKEN), get(names::ZAPI_CLIENT_TOKEN)) {
        return Some(ProviderCredentials::ZApi { instance, token, client_token });
    }
    if let (Some(base_url), Some(token)) = (get(names::WUZAPI_BASE_URL), get(names::WUZAPI_TOKEN)) {
        return Some(ProviderCredentials::Wuzapi { base_url, token });
    }
    None
}
