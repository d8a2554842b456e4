use once_cell::sync::Lazy;
use regex::Regex;

static STRICT_E164: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("static regex"));

/// Calling codes for the handful of markets this bridge has tenants in.
/// Ordered longest-prefix-first so `calling_code_for` and prefix lookups
/// never mis-split an overlapping code.
const CALLING_CODES: &[(&str, &str)] = &[
    ("BR", "55"),
    ("US", "1"),
    ("CA", "1"),
    ("MX", "52"),
    ("AR", "54"),
    ("CO", "57"),
    ("PT", "351"),
    ("ES", "34"),
];

fn calling_code_for(country: &str) -> Option<&'static str> {
    CALLING_CODES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(country))
        .map(|(_, dial)| *dial)
}

/// True iff `value` matches the strict E.164 shape (`+` followed by 2-15
/// digits, no leading zero after the `+`). Used to decide whether a
/// contact's `phone_number` field may be populated.
pub fn is_strict_e164(value: &str) -> bool {
    STRICT_E164.is_match(value)
}

/// True iff `identifier` is a WhatsApp group identifier (`…@g.us` or
/// `…-group`), which must never be run through E.164 normalization or
/// attached as a contact's `phone_number`.
pub fn is_group_identifier(identifier: &str) -> bool {
    identifier.ends_with("@g.us") || identifier.ends_with("-group")
}

/// Normalizes a free-form phone string to E.164 using `default_country`
/// when the input doesn't already carry a `+` or international `00`
/// prefix. Returns `None` when the result isn't a valid E.164 number or
/// the default country is unrecognized.
///
/// ```
/// use bridge_core::normalize_e164;
/// assert_eq!(normalize_e164("11999998888", "BR").as_deref(), Some("+5511999998888"));
/// assert_eq!(normalize_e164("+14155550000", "BR").as_deref(), Some("+14155550000"));
/// assert_eq!(normalize_e164("0014155550000", "BR").as_deref(), Some("+14155550000"));
/// ```
pub fn normalize_e164(raw: &str, default_country: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if trimmed.starts_with('+') {
        let candidate = format!("+{digits}");
        return is_strict_e164(&candidate).then_some(candidate);
    }

    if let Some(rest) = digits.strip_prefix("00") {
        let candidate = format!("+{rest}");
        return is_strict_e164(&candidate).then_some(candidate);
    }

    let calling_code = calling_code_for(default_country)?;
    let with_code = if digits.starts_with(calling_code) {
        digits
    } else {
        format!("{calling_code}{digits}")
    };
    let candidate = format!("+{with_code}");
    is_strict_e164(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn br_local_number_gains_country_code() {
        assert_eq!(
            normalize_e164("11999998888", "BR").as_deref(),
            Some("+5511999998888")
        );
    }

    #[test]
    fn already_e164_passes_through_regardless_of_default_country() {
        assert_eq!(
            normalize_e164("+14155550000", "BR").as_deref(),
            Some("+14155550000")
        );
    }

    #[test]
    fn international_00_prefix_is_converted() {
        assert_eq!(
            normalize_e164("0014155550000", "BR").as_deref(),
            Some("+14155550000")
        );
    }

    #[test]
    fn unknown_default_country_yields_none() {
        assert_eq!(normalize_e164("123456", "ZZ"), None);
    }

    #[test]
    fn group_identifiers_are_detected() {
        assert!(is_group_identifier("120363407124580783-group"));
        assert!(is_group_identifier("1203634071245-80783@g.us"));
        assert!(!is_group_identifier("+5511999998888"));
    }

    #[test]
    fn strict_e164_rejects_missing_plus() {
        assert!(!is_strict_e164("5511999998888"));
        assert!(is_strict_e164("+5511999998888"));
    }
}
