use crate::env_names::{self, INTEGRATIONS_LIST, PROBE_VARS};

const MAX_NUMERIC_SCAN: u32 = 64;

/// Discovers tenant ids: numeric `_<n>` suffixes present on any probe var
/// (sorted numerically), plus any ids named in `WOOTRICO_INTEGRATIONS`
/// (comma-separated, sorted lexically after the numeric ones). When
/// neither discovery path finds anything, a single `"default"` tenant is
/// synthesized reading bare, unsuffixed variables.
pub fn discover_tenant_ids() -> Vec<String> {
    let mut numeric = Vec::new();
    for n in 1..=MAX_NUMERIC_SCAN {
        let suffix = n.to_string();
        if PROBE_VARS.iter().any(|base| env_names::get(base, &suffix, false).is_some()) {
            numeric.push(n);
        }
    }
    numeric.sort_unstable();
    let mut ids: Vec<String> = numeric.into_iter().map(|n| n.to_string()).collect();

    if let Ok(list) = std::env::var(INTEGRATIONS_LIST) {
        let mut named: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .filter(|id| !ids.contains(id))
            .collect();
        named.sort();
        ids.extend(named);
    }

    if ids.is_empty() {
        vec!["default".to_string()]
    } else {
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: std::sync::OnceLock<Mutex<()>> = std::sync::OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn no_env_vars_synthesizes_default() {
        let _guard = env_lock().lock().unwrap();
        unsafe {
            std::env::remove_var("WOOTRICO_INTEGRATIONS");
            std::env::remove_var("WOOTRICO_HELPDESK_BASE_URL_1");
        }
        assert_eq!(discover_tenant_ids(), vec!["default".to_string()]);
    }

    #[test]
    fn numeric_suffixes_are_sorted_numerically() {
        let _guard = env_lock().lock().unwrap();
        unsafe {
            std::env::set_var("WOOTRICO_HELPDESK_BASE_URL_2", "https://two.example");
            std::env::set_var("WOOTRICO_HELPDESK_BASE_URL_10", "https://ten.example");
        }
        let ids = discover_tenant_ids();
        let pos2 = ids.iter().position(|id| id == "2").unwrap();
        let pos10 = ids.iter().position(|id| id == "10").unwrap();
        assert!(pos2 < pos10);
        unsafe {
            std::env::remove_var("WOOTRICO_HELPDESK_BASE_URL_2");
            std::env::remove_var("WOOTRICO_HELPDESK_BASE_URL_10");
        }
    }

    #[test]
    fn integrations_list_adds_named_ids() {
        let _guard = env_lock().lock().unwrap();
        unsafe {
            std::env::set_var("WOOTRICO_INTEGRATIONS", "acme, globex");
        }
        let ids = discover_tenant_ids();
        assert!(ids.contains(&"acme".to_string()));
        assert!(ids.contains(&"globex".to_string()));
        unsafe {
            std::env::remove_var("WOOTRICO_INTEGRATIONS");
        }
    }
}
