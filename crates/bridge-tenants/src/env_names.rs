/// Every recognized base variable name, each optionally suffixed with
/// `_<id>` for a non-default tenant. Kept in one place so
/// discovery and per-tenant config building agree on exactly what to scan.
pub const INTEGRATIONS_LIST: &str = "WOOTRICO_INTEGRATIONS";

pub const HELPDESK_BASE_URL: &str = "WOOTRICO_HELPDESK_BASE_URL";
pub const HELPDESK_TOKEN: &str = "WOOTRICO_HELPDESK_TOKEN";
pub const HELPDESK_ACCOUNT: &str = "WOOTRICO_HELPDESK_ACCOUNT";
pub const HELPDESK_INBOX: &str = "WOOTRICO_HELPDESK_INBOX";
pub const HELPDESK_REOPEN_RESOLVED: &str = "WOOTRICO_HELPDESK_REOPEN_RESOLVED";
pub const HELPDESK_INITIAL_STATUS: &str = "WOOTRICO_HELPDESK_INITIAL_STATUS";
pub const HELPDESK_MEDIA_SPACING_MS: &str = "WOOTRICO_HELPDESK_MEDIA_SPACING_MS";

pub const UAZAPI_BASE_URL: &str = "WOOTRICO_UAZAPI_BASE_URL";
pub const UAZAPI_TOKEN: &str = "WOOTRICO_UAZAPI_TOKEN";
pub const UAZAPI_NUMBER: &str = "WOOTRICO_UAZAPI_NUMBER";

pub const ZAPI_INSTANCE: &str = "WOOTRICO_ZAPI_INSTANCE";
pub const ZAPI_TOKEN: &str = "WOOTRICO_ZAPI_TOKEN";
pub const ZAPI_CLIENT_TOKEN: &str = "WOOTRICO_ZAPI_CLIENT_TOKEN";

pub const WUZAPI_BASE_URL: &str = "WOOTRICO_WUZAPI_BASE_URL";
pub const WUZAPI_TOKEN: &str = "WOOTRICO_WUZAPI_TOKEN";

pub const IGNORE_GROUPS: &str = "WOOTRICO_IGNORE_GROUPS";
pub const SIGN_AGENT_MESSAGES: &str = "WOOTRICO_SIGN_AGENT_MESSAGES";
pub const DEFAULT_COUNTRY: &str = "WOOTRICO_DEFAULT_COUNTRY";
pub const WEBHOOK_BASE: &str = "WOOTRICO_WEBHOOK_BASE";
pub const WEBHOOK_NAME: &str = "WOOTRICO_WEBHOOK_NAME";

/// The probe vars used purely to detect whether a numeric tenant index
/// exists at all (at least one of the three provider recipes or the
/// helpdesk base URL must be present).
pub const PROBE_VARS: &[&str] = &[HELPDESK_BASE_URL, UAZAPI_BASE_URL, ZAPI_INSTANCE, WUZAPI_BASE_URL];

/// Builds the env var name for `base` under tenant `id`: bare for
/// `"default"` with no explicit suffix requested, `_<id>` otherwise.
pub fn suffixed(base: &str, id: &str, bare_default: bool) -> String {
    if bare_default && id == "default" {
        base.to_string()
    } else {
        format!("{base}_{id}")
    }
}

pub fn get(base: &str, id: &str, bare_default: bool) -> Option<String> {
    std::env::var(suffixed(base, id, bare_default)).ok().filter(|v| !v.trim().is_empty())
}
