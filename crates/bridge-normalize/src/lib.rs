//! Turns a raw provider webhook payload into a `NormalizedEvent`,
//! collapsing the Z-API, UAZAPI and Wuzapi wire dialects into one shape
//!. Also classifies the handful of non-message notification
//! payloads (deletions, status ticks) the reconciliation processor needs
//! to short-circuit before ever reaching the normalizer proper.

mod base64fix;
mod dialects;

use bridge_core::{NormalizedEvent, Origin, reason};
use serde_json::Value;

pub use dialects::{uazapi, wuzapi, zapi};

/// A non-message notification payload that the inbound processor handles
/// before (and instead of) normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEvent {
    /// UAZAPI reported a message was deleted on the device.
    UazapiDeletion,
    /// UAZAPI's generic status-tick event; always ignored.
    UazapiMessagesUpdate,
    /// Z-API reported a message was deleted on the device.
    ZapiRevoke,
    /// Any other Z-API notification payload carrying no message content.
    ZapiOtherNotification,
}

/// Classifies `payload` as a special (non-message) event, if it is one.
/// Must be checked before `detect_origin`/`normalize`, since these
/// payloads don't carry the structural shape the dialect extractors
/// expect.
pub fn detect_special_event(payload: &Value) -> Option<SpecialEvent> {
    if uazapi::is_deletion(payload) {
        return Some(SpecialEvent::UazapiDeletion);
    }
    if uazapi::is_messages_update(payload) {
        return Some(SpecialEvent::UazapiMessagesUpdate);
    }
    if zapi::is_revoke(payload) {
        return Some(SpecialEvent::ZapiRevoke);
    }
    if zapi::is_other_notification(payload) {
        return Some(SpecialEvent::ZapiOtherNotification);
    }
    None
}

/// `detectPayloadOrigin`: identifies which of the three dialects produced
/// `payload` from its structural shape alone.
pub fn detect_origin(payload: &Value) -> Origin {
    if zapi::matches(payload) {
        Origin::ZApi
    } else if uazapi::matches(payload) {
        Origin::Uazapi
    } else if wuzapi::matches(payload) {
        Origin::Wuzapi
    } else {
        Origin::Unknown
    }
}

/// Pulls the provider message id a deletion-flavoured `SpecialEvent`
/// refers to, so the inbound processor can mirror it onto the helpdesk
/// side via the mapping cache's reverse lookup. Ignored special events
/// (`UazapiMessagesUpdate`, `ZapiOtherNotification`) never reach this.
pub fn special_event_message_id(event: SpecialEvent, payload: &Value) -> Option<String> {
    match event {
        SpecialEvent::UazapiDeletion => payload
            .get("messageId")
            .and_then(Value::as_str)
            .or_else(|| payload.get("message").and_then(|m| m.get("id")).and_then(Value::as_str))
            .or_else(|| payload.get("event").and_then(|e| e.get("Id")).and_then(Value::as_str))
            .map(String::from),
        SpecialEvent::ZapiRevoke => payload.get("messageId").and_then(Value::as_str).map(String::from),
        SpecialEvent::UazapiMessagesUpdate | SpecialEvent::ZapiOtherNotification => None,
    }
}

/// Normalizes `payload` into a `NormalizedEvent` using the tenant's group
/// and phone-default-country policy. Payloads that don't match any known
/// dialect yield a dropped event tagged `unknown_origin`.
pub fn normalize(payload: &Value, ignore_groups: bool, default_country: &str) -> NormalizedEvent {
    match detect_origin(payload) {
        Origin::ZApi => zapi::extract(payload, ignore_groups, default_country),
        Origin::Uazapi => uazapi::extract(payload, ignore_groups, default_country),
        Origin::Wuzapi => wuzapi::extract(payload, ignore_groups, default_country),
        Origin::Unknown => {
            tracing::warn!("payload matched no known provider dialect");
            NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_payload_is_dropped() {
        let event = normalize(&json!({"foo": "bar"}), false, "BR");
        assert!(event.ignored);
        assert_eq!(event.ignore_reason.as_deref(), Some(reason::UNKNOWN_ORIGIN));
    }

    #[test]
    fn detects_each_dialect() {
        assert_eq!(detect_origin(&json!({"phone": "1", "momment": 1})), Origin::ZApi);
        assert_eq!(detect_origin(&json!({"message": {"content": "x", "sender": "y"}})), Origin::Uazapi);
        assert_eq!(detect_origin(&json!({"type": "Message", "event": {"Info": {}, "Message": {}}})), Origin::Wuzapi);
        assert_eq!(detect_origin(&json!({})), Origin::Unknown);
    }

    #[test]
    fn special_events_are_classified_before_normalization() {
        assert_eq!(detect_special_event(&json!({"type": "DeletedMessage", "state": "Deleted"})), Some(SpecialEvent::UazapiDeletion));
        assert_eq!(detect_special_event(&json!({"event": "messages_update"})), Some(SpecialEvent::UazapiMessagesUpdate));
        assert_eq!(detect_special_event(&json!({"notification": "REVOKE"})), Some(SpecialEvent::ZapiRevoke));
        assert_eq!(detect_special_event(&json!({"notification": "PRESENCE"})), Some(SpecialEvent::ZapiOtherNotification));
        assert_eq!(detect_special_event(&json!({"phone": "1", "momment": 1, "text": {"message": "hi"}})), None);
    }

    #[test]
    fn special_event_message_id_is_extracted_for_deletions_only() {
        assert_eq!(
            special_event_message_id(SpecialEvent::ZapiRevoke, &json!({"notification": "REVOKE", "messageId": "abc"})),
            Some("abc".to_string())
        );
        assert_eq!(
            special_event_message_id(SpecialEvent::UazapiDeletion, &json!({"type": "DeletedMessage", "state": "Deleted", "messageId": "xyz"})),
            Some("xyz".to_string())
        );
        assert_eq!(special_event_message_id(SpecialEvent::UazapiMessagesUpdate, &json!({})), None);
    }
}
