use bridge_core::{MessageKind, NormalizedEvent, Origin, is_group_identifier, normalize_e164, reason};
use serde_json::Value;

/// True iff `payload` has both `phone` and `momment`, the structural
/// signature `detectPayloadOrigin` uses to recognize Z-API.
pub fn matches(payload: &Value) -> bool {
    payload.get("phone").and_then(Value::as_str).is_some() && payload.get("momment").is_some()
}

/// True iff this is a Z-API deletion notification (`notification=REVOKE`).
pub fn is_revoke(payload: &Value) -> bool {
    payload.get("notification").and_then(Value::as_str) == Some("REVOKE")
}

/// True iff this is some other Z-API notification payload that carries no
/// message content and should just be dropped.
pub fn is_other_notification(payload: &Value) -> bool {
    payload.get("notification").and_then(Value::as_str).is_some() && !is_revoke(payload)
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn media(payload: &Value) -> (Option<String>, Option<MessageKind>, String) {
    if let Some(image) = payload.get("image") {
        return (
            str_field(image, "imageUrl").map(String::from),
            Some(MessageKind::Image),
            str_field(image, "caption").unwrap_or_default().to_string(),
        );
    }
    if let Some(audio) = payload.get("audio") {
        return (str_field(audio, "audioUrl").map(String::from), Some(MessageKind::Audio), String::new());
    }
    if let Some(video) = payload.get("video") {
        return (
            str_field(video, "videoUrl").map(String::from),
            Some(MessageKind::Video),
            str_field(video, "caption").unwrap_or_default().to_string(),
        );
    }
    if let Some(document) = payload.get("document") {
        return (
            str_field(document, "documentUrl").map(String::from),
            Some(MessageKind::Document),
            str_field(document, "caption").unwrap_or_default().to_string(),
        );
    }
    let text = payload.get("text").and_then(|t| str_field(t, "message")).unwrap_or_default().to_string();
    (None, None, text)
}

pub fn extract(payload: &Value, ignore_groups: bool, default_country: &str) -> NormalizedEvent {
    let Some(phone) = str_field(payload, "phone") else {
        return NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN);
    };
    let is_group = payload.get("isGroup").and_then(Value::as_bool).unwrap_or_else(|| is_group_identifier(phone));

    if is_group && ignore_groups {
        return NormalizedEvent::dropped(reason::GROUP_DISCONSIDERED);
    }

    let (media_url, media_kind, text_or_caption) = media(payload);
    let message_id = str_field(payload, "messageId").unwrap_or_default().to_string();

    let normalized_phone = if is_group { phone.to_string() } else { normalize_e164(phone, default_country).unwrap_or_else(|| phone.to_string()) };

    NormalizedEvent {
        origin: Origin::ZApi,
        phone: Some(normalized_phone),
        lid: None,
        jid: None,
        text: text_or_caption,
        name: str_field(payload, "senderName").unwrap_or_default().to_string(),
        sender_photo: if is_group { None } else { str_field(payload, "senderPhoto").map(String::from) },
        media: media_url,
        media_kind,
        is_group,
        from_me: payload.get("fromMe").and_then(Value::as_bool).unwrap_or(false),
        from_api: payload.get("fromApi").and_then(Value::as_bool).unwrap_or(false),
        status: str_field(payload, "status").unwrap_or("RECEIVED").to_string(),
        message_id,
        reply_id: str_field(payload, "referenceMessageId").map(String::from),
        group_name: if is_group { str_field(payload, "chatName").map(String::from) } else { None },
        sender_name: str_field(payload, "senderName").map(String::from),
        edited_message_id: str_field(payload, "editedMessageId").map(String::from),
        ignored: false,
        ignore_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_requires_phone_and_momment() {
        assert!(matches(&json!({"phone": "5511999998888", "momment": 1690000000000u64})));
        assert!(!matches(&json!({"phone": "5511999998888"})));
    }

    #[test]
    fn extracts_text_message() {
        let payload = json!({
            "phone": "5511999998888",
            "momment": 1690000000000u64,
            "messageId": "abc",
            "senderName": "Ana",
            "text": {"message": "oi"}
        });
        let event = extract(&payload, false, "BR");
        assert_eq!(event.text, "oi");
        assert_eq!(event.message_id, "abc");
        assert_eq!(event.phone.as_deref(), Some("+5511999998888"));
        assert!(!event.ignored);
    }

    #[test]
    fn group_message_is_dropped_when_tenant_ignores_groups() {
        let payload = json!({
            "phone": "120363407124580783-group",
            "momment": 1690000000000u64,
            "isGroup": true,
            "text": {"message": "oi"}
        });
        let event = extract(&payload, true, "BR");
        assert!(event.ignored);
        assert_eq!(event.ignore_reason.as_deref(), Some(reason::GROUP_DISCONSIDERED));
    }

    #[test]
    fn group_phone_is_kept_verbatim_when_groups_allowed() {
        let payload = json!({
            "phone": "120363407124580783-group",
            "momment": 1690000000000u64,
            "isGroup": true,
            "chatName": "Friends",
            "text": {"message": "oi"}
        });
        let event = extract(&payload, false, "BR");
        assert_eq!(event.phone.as_deref(), Some("120363407124580783-group"));
        assert_eq!(event.group_name.as_deref(), Some("Friends"));
        assert_eq!(event.sender_photo, None);
    }

    #[test]
    fn revoke_notification_is_detected() {
        assert!(is_revoke(&json!({"notification": "REVOKE"})));
        assert!(is_other_notification(&json!({"notification": "MESSAGE_STATUS"})));
        assert!(!is_other_notification(&json!({"notification": "REVOKE"})));
    }
}
