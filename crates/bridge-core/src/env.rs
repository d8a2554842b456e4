/// Parses a boolean environment variable. Accepts `1/true/yes/on` and
/// `0/false/no/off` case-insensitively; any other value (including the
/// variable being unset) falls back to `default`.
///
/// ```
/// use bridge_core::parse_bool_env;
/// // SAFETY: single-threaded doctest, no concurrent env access.
/// unsafe { std::env::set_var("DEMO_FLAG", "YES") };
/// assert!(parse_bool_env("DEMO_FLAG", false));
/// unsafe { std::env::remove_var("DEMO_FLAG") };
/// assert!(!parse_bool_env("DEMO_FLAG", false));
/// ```
pub fn parse_bool_env(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn accepts_truthy_and_falsy_variants() {
        let _guard = env_lock().lock().unwrap();
        for v in ["1", "true", "YES", "On"] {
            unsafe { std::env::set_var("BE_TEST_BOOL", v) };
            assert!(parse_bool_env("BE_TEST_BOOL", false), "{v} should be true");
        }
        for v in ["0", "false", "NO", "Off"] {
            unsafe { std::env::set_var("BE_TEST_BOOL", v) };
            assert!(!parse_bool_env("BE_TEST_BOOL", true), "{v} should be false");
        }
        unsafe { std::env::remove_var("BE_TEST_BOOL") };
    }

    #[test]
    fn falls_back_to_default_on_garbage_or_unset() {
        let _guard = env_lock().lock().unwrap();
        unsafe { std::env::remove_var("BE_TEST_BOOL_2") };
        assert!(parse_bool_env("BE_TEST_BOOL_2", true));
        unsafe { std::env::set_var("BE_TEST_BOOL_2", "maybe") };
        assert!(!parse_bool_env("BE_TEST_BOOL_2", false));
        unsafe { std::env::remove_var("BE_TEST_BOOL_2") };
    }
}
