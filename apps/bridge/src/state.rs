//! Process-wide shared state: one provider/helpdesk client pair per
//! tenant, plus the credit ledger and mapping cache the two processors
//! share.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_core::Dialect;
use bridge_helpdesk::{HelpdeskClient, MediaDownloadHook};
use bridge_ledger::CreditLedger;
use bridge_mapping::MappingCache;
use bridge_provider::ProviderClient;
use bridge_queue::BridgeQueue;
use bridge_tenants::{Tenant, TenantRegistry};

/// A tenant plus the two stateful REST clients built from its credentials.
pub struct TenantClients {
    pub tenant: Tenant,
    pub helpdesk: Arc<HelpdeskClient>,
    pub provider: Arc<ProviderClient>,
    /// Only set for UAZAPI tenants: lets the helpdesk client fetch media
    /// straight from the provider instead of a plain URL.
    pub download_hook: Option<MediaDownloadHook>,
}

pub struct AppState {
    pub registry: TenantRegistry,
    pub clients: HashMap<String, TenantClients>,
    pub queue: BridgeQueue,
    pub ledger: CreditLedger,
    pub mapping: MappingCache,
}

impl AppState {
    pub fn build(registry: TenantRegistry, queue: BridgeQueue) -> Result<Self, String> {
        let mut clients = HashMap::new();
        for tenant in registry.iter() {
            let provider = Arc::new(ProviderClient::new(tenant.provider.clone()).map_err(|err| err.to_string())?);
            let helpdesk = Arc::new(HelpdeskClient::new(tenant.helpdesk.clone()).map_err(|err| err.to_string())?);

            let download_hook: Option<MediaDownloadHook> = if tenant.provider.dialect() == Dialect::Uazapi {
                let provider = provider.clone();
                Some(Arc::new(move |msg_id: String| {
                    let provider = provider.clone();
                    Box::pin(async move { provider.download(&msg_id).await })
                        as std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, bridge_core::BridgeError>> + Send>>
                }))
            } else {
                None
            };

            clients.insert(tenant.id.clone(), TenantClients { tenant: tenant.clone(), helpdesk, provider, download_hook });
        }

        Ok(Self { registry, clients, queue, ledger: CreditLedger::new(), mapping: MappingCache::new() })
    }

    /// Tenant whose advertised webhook name matches `webhook_name`, used by
    /// the HTTP ingress to serve `/<webhookName>/ticket-stats`.
    pub fn by_webhook_name(&self, webhook_name: &str) -> Option<&TenantClients> {
        self.clients.values().find(|c| c.tenant.webhook_name == webhook_name)
    }
}
