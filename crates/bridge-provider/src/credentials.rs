use bridge_core::Dialect;

/// Per-tenant provider credentials, one of the three shapes the tenant
/// recipe matching produces. Each variant carries exactly the fields its
/// dialect's REST surface needs.
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    ZApi {
        instance: String,
        token: String,
        client_token: String,
    },
    Uazapi {
        base_url: String,
        token: String,
        /// The tenant's connected WhatsApp number, digits only. Used to
        /// resolve inbound payloads to this tenant; a Z-API `owner`
        /// equivalent is not needed here since UAZAPI's own endpoints
        /// don't require it.
        number: String,
    },
    Wuzapi {
        base_url: String,
        token: String,
    },
}

impl ProviderCredentials {
    pub fn dialect(&self) -> Dialect {
        match self {
            ProviderCredentials::ZApi { .. } => Dialect::ZApi,
            ProviderCredentials::Uazapi { .. } => Dialect::Uazapi,
            ProviderCredentials::Wuzapi { .. } => Dialect::Wuzapi,
        }
    }
}
