/// Wuzapi ships inline media as URL-safe base64 with padding stripped.
/// Corrects it back to standard base64 so `base64::engine::general_purpose::STANDARD`
/// can decode it downstream.
pub fn sanitize_wuzapi_base64(raw: &str) -> String {
    let mut cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned = cleaned.replace('-', "+").replace('_', "/");
    let remainder = cleaned.len() % 4;
    if remainder != 0 {
        cleaned.push_str(&"=".repeat(4 - remainder));
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_safe_characters_are_restored() {
        assert_eq!(sanitize_wuzapi_base64("a-b_c"), "a+b/c=");
    }

    #[test]
    fn padding_is_added_to_a_multiple_of_four() {
        assert_eq!(sanitize_wuzapi_base64("abcde"), "abcde===");
        assert_eq!(sanitize_wuzapi_base64("abcd"), "abcd");
    }

    #[test]
    fn whitespace_is_stripped() {
        assert_eq!(sanitize_wuzapi_base64("ab cd\n"), "abcd");
    }
}
