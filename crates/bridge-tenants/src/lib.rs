//! Environment-driven tenant registry: discovers tenant ids,
//! builds each tenant's helpdesk/provider configuration, and serves the
//! three lookup shapes the reconciliation processors need (by tenant id,
//! by helpdesk inbox id, by provider identifier).

mod config;
mod discover;
mod env_names;

pub use config::{Tenant, build_tenant};
pub use discover::discover_tenant_ids;

use bridge_core::Dialect;

/// Result of loading every discovered tenant: the tenants that loaded
/// successfully, plus a reason for each one that didn't.
pub struct LoadReport {
    pub tenants: Vec<Tenant>,
    pub failures: Vec<(String, String)>,
}

pub struct TenantRegistry {
    tenants: Vec<Tenant>,
}

impl TenantRegistry {
    /// Discovers and builds every tenant from the environment. Returns an
    /// error only when zero tenants loaded; individual failures are
    /// logged and returned in `LoadReport::failures` regardless.
    pub fn load() -> Result<(Self, LoadReport), String> {
        let ids = discover_tenant_ids();
        let mut tenants = Vec::new();
        let mut failures = Vec::new();

        for id in &ids {
            let bare = id == "default";
            match build_tenant(id, bare) {
                Ok(tenant) => tenants.push(tenant),
                Err(reason) => {
                    tracing::warn!(tenant = id.as_str(), reason = reason.as_str(), "tenant failed to load");
                    failures.push((id.clone(), reason));
                }
            }
        }

        if tenants.is_empty() {
            return Err("no tenant loaded successfully".to_string());
        }

        let report = LoadReport { tenants: tenants.clone(), failures };
        Ok((Self { tenants }, report))
    }

    pub fn by_id(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.id == id)
    }

    /// Inbox ids are only known once `HelpdeskClient::ensure_inbox` has
    /// resolved them at runtime, via `Tenant::set_resolved_inbox_id`.
    pub fn by_helpdesk_inbox_id(&self, inbox_id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.resolved_inbox_id().as_deref() == Some(inbox_id))
    }

    /// Resolves the tenant whose provider identifier matches `identifier`:
    /// UAZAPI matches on the digits of the connected number, Z-API on the
    /// instance string, Wuzapi on a case-insensitive base URL.
    pub fn by_provider_identifier(&self, identifier: &str) -> Option<&Tenant> {
        let digits_only: String = identifier.chars().filter(|c| c.is_ascii_digit()).collect();
        self.tenants.iter().find(|tenant| match &tenant.provider {
            bridge_provider::ProviderCredentials::Uazapi { number, .. } => {
                let normalized: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
                !normalized.is_empty() && normalized == digits_only
            }
            bridge_provider::ProviderCredentials::ZApi { instance, .. } => instance == identifier,
            bridge_provider::ProviderCredentials::Wuzapi { base_url, .. } => base_url.eq_ignore_ascii_case(identifier),
        })
    }

    pub fn dialect_for(&self, tenant_id: &str) -> Option<Dialect> {
        self.by_id(tenant_id).map(|tenant| tenant.provider.dialect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tenant> {
        self.tenants.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: std::sync::OnceLock<Mutex<()>> = std::sync::OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_default_vars() {
        for base in [
            "WOOTRICO_INTEGRATIONS",
            "WOOTRICO_HELPDESK_BASE_URL",
            "WOOTRICO_HELPDESK_TOKEN",
            "WOOTRICO_HELPDESK_ACCOUNT",
            "WOOTRICO_HELPDESK_INBOX",
            "WOOTRICO_UAZAPI_BASE_URL",
            "WOOTRICO_UAZAPI_TOKEN",
            "WOOTRICO_UAZAPI_NUMBER",
            "WOOTRICO_ZAPI_INSTANCE",
            "WOOTRICO_ZAPI_TOKEN",
            "WOOTRICO_ZAPI_CLIENT_TOKEN",
            "WOOTRICO_WUZAPI_BASE_URL",
            "WOOTRICO_WUZAPI_TOKEN",
        ] {
            unsafe { std::env::remove_var(base) };
        }
    }

    #[test]
    fn missing_everything_fails_to_load() {
        let _guard = env_lock().lock().unwrap();
        clear_default_vars();
        assert!(TenantRegistry::load().is_err());
    }

    #[test]
    fn uazapi_recipe_is_tried_before_zapi_and_wuzapi() {
        let _guard = env_lock().lock().unwrap();
        clear_default_vars();
        unsafe {
            std::env::set_var("WOOTRICO_HELPDESK_BASE_URL", "https://helpdesk.example");
            std::env::set_var("WOOTRICO_HELPDESK_TOKEN", "tok");
            std::env::set_var("WOOTRICO_HELPDESK_ACCOUNT", "1");
            std::env::set_var("WOOTRICO_HELPDESK_INBOX", "WhatsApp");
            std::env::set_var("WOOTRICO_UAZAPI_BASE_URL", "https://uazapi.example");
            std::env::set_var("WOOTRICO_UAZAPI_TOKEN", "tok");
            std::env::set_var("WOOTRICO_UAZAPI_NUMBER", "5511999998888");
            std::env::set_var("WOOTRICO_ZAPI_INSTANCE", "inst");
            std::env::set_var("WOOTRICO_ZAPI_TOKEN", "tok");
            std::env::set_var("WOOTRICO_ZAPI_CLIENT_TOKEN", "ct");
        }

        let (registry, report) = TenantRegistry::load().unwrap();
        assert!(report.failures.is_empty());
        let tenant = registry.by_id("default").unwrap();
        assert!(matches!(tenant.provider, bridge_provider::ProviderCredentials::Uazapi { .. }));

        clear_default_vars();
    }

    #[test]
    fn provider_identifier_lookup_matches_digits_for_uazapi() {
        let _guard = env_lock().lock().unwrap();
        clear_default_vars();
        unsafe {
            std::env::set_var("WOOTRICO_HELPDESK_BASE_URL", "https://helpdesk.example");
            std::env::set_var("WOOTRICO_HELPDESK_TOKEN", "tok");
            std::env::set_var("WOOTRICO_HELPDESK_ACCOUNT", "1");
            std::env::set_var("WOOTRICO_HELPDESK_INBOX", "WhatsApp");
            std::env::set_var("WOOTRICO_UAZAPI_BASE_URL", "https://uazapi.example");
            std::env::set_var("WOOTRICO_UAZAPI_TOKEN", "tok");
            std::env::set_var("WOOTRICO_UAZAPI_NUMBER", "+55 11 99999-8888");
        }

        let (registry, _) = TenantRegistry::load().unwrap();
        assert!(registry.by_provider_identifier("5511999998888").is_some());
        assert!(registry.by_provider_identifier("0000000000000").is_none());

        clear_default_vars();
    }

    #[test]
    fn resolved_inbox_id_round_trips() {
        let _guard = env_lock().lock().unwrap();
        clear_default_vars();
        unsafe {
            std::env::set_var("WOOTRICO_HELPDESK_BASE_URL", "https://helpdesk.example");
            std::env::set_var("WOOTRICO_HELPDESK_TOKEN", "tok");
            std::env::set_var("WOOTRICO_HELPDESK_ACCOUNT", "1");
            std::env::set_var("WOOTRICO_HELPDESK_INBOX", "WhatsApp");
            std::env::set_var("WOOTRICO_WUZAPI_BASE_URL", "https://wuzapi.example");
            std::env::set_var("WOOTRICO_WUZAPI_TOKEN", "tok");
        }

        let (registry, _) = TenantRegistry::load().unwrap();
        let tenant = registry.by_id("default").unwrap();
        tenant.set_resolved_inbox_id("42");
        assert!(registry.by_helpdesk_inbox_id("42").is_some());

        clear_default_vars();
    }
}
