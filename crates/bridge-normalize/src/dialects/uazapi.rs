use bridge_core::{MessageKind, NormalizedEvent, Origin, is_group_identifier, normalize_e164, reason};
use serde_json::Value;

/// True iff `payload.message` has both `content` and `sender`, the
/// structural signature `detectPayloadOrigin` uses to recognize UAZAPI.
pub fn matches(payload: &Value) -> bool {
    let Some(message) = payload.get("message") else { return false };
    message.get("content").and_then(Value::as_str).is_some() && message.get("sender").and_then(Value::as_str).is_some()
}

/// True iff this is a UAZAPI message-deletion notification.
pub fn is_deletion(payload: &Value) -> bool {
    if payload.get("type").and_then(Value::as_str) != Some("DeletedMessage") {
        return false;
    }
    let event_type = payload.get("event").and_then(|e| e.get("Type")).and_then(Value::as_str);
    let state = payload.get("state").and_then(Value::as_str);
    event_type == Some("Deleted") || state == Some("Deleted")
}

/// True iff this is the generic UAZAPI `messages_update` event, which is
/// always ignored (status ticks, not content).
pub fn is_messages_update(payload: &Value) -> bool {
    payload.get("event").and_then(Value::as_str) == Some("messages_update")
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn media_kind(message_type: &str) -> Option<MessageKind> {
    match message_type {
        "image" => Some(MessageKind::Image),
        "audio" | "ptt" => Some(MessageKind::Audio),
        "video" => Some(MessageKind::Video),
        "document" => Some(MessageKind::Document),
        _ => None,
    }
}

pub fn extract(payload: &Value, ignore_groups: bool, default_country: &str) -> NormalizedEvent {
    let Some(message) = payload.get("message") else {
        return NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN);
    };
    let Some(sender) = str_field(message, "sender") else {
        return NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN);
    };

    let chat_id = message.get("chat").and_then(|c| str_field(c, "wa_chatid")).unwrap_or(sender);
    let is_group = message.get("isGroup").and_then(Value::as_bool).unwrap_or_else(|| is_group_identifier(chat_id));

    if is_group && ignore_groups {
        return NormalizedEvent::dropped(reason::GROUP_DISCONSIDERED);
    }

    let message_type = str_field(message, "type").unwrap_or("text");
    let kind = media_kind(message_type);
    let content = str_field(message, "content").unwrap_or_default().to_string();
    let media_url = message.get("fileURL").and_then(Value::as_str).or_else(|| message.get("mediaUrl").and_then(Value::as_str)).map(String::from);

    let message_id = str_field(message, "id").or_else(|| str_field(message, "messageid")).unwrap_or_default().to_string();
    let sender_name = str_field(message, "senderName").map(String::from);

    let identifier = if is_group { chat_id.to_string() } else { normalize_e164(sender, default_country).unwrap_or_else(|| sender.to_string()) };

    NormalizedEvent {
        origin: Origin::Uazapi,
        phone: Some(identifier),
        lid: None,
        jid: None,
        text: content,
        name: sender_name.clone().unwrap_or_default(),
        sender_photo: None,
        media: if kind.is_some() { media_url } else { None },
        media_kind: kind,
        is_group,
        from_me: message.get("fromMe").and_then(Value::as_bool).unwrap_or(false),
        from_api: message.get("fromApi").and_then(Value::as_bool).unwrap_or(false),
        status: str_field(message, "status").unwrap_or("RECEIVED").to_string(),
        message_id,
        reply_id: message.get("quotedMsg").and_then(|q| str_field(q, "id")).map(String::from),
        group_name: if is_group { message.get("chat").and_then(|c| str_field(c, "name")).map(String::from) } else { None },
        sender_name,
        edited_message_id: str_field(message, "editedMessageId").map(String::from),
        ignored: false,
        ignore_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_message() -> Value {
        json!({
            "owner": "5511988887777",
            "message": {
                "id": "MSG1",
                "type": "text",
                "content": "ola",
                "sender": "5511999998888@s.whatsapp.net",
                "senderName": "Bruno",
                "chat": {"wa_chatid": "5511999998888@s.whatsapp.net"},
                "fromMe": false
            }
        })
    }

    #[test]
    fn matches_requires_message_content_and_sender() {
        assert!(matches(&sample_message()));
        assert!(!matches(&json!({"message": {"content": "x"}})));
    }

    #[test]
    fn extracts_direct_text_message() {
        let event = extract(&sample_message(), false, "BR");
        assert_eq!(event.text, "ola");
        assert_eq!(event.phone.as_deref(), Some("+5511999998888"));
        assert_eq!(event.sender_name.as_deref(), Some("Bruno"));
    }

    #[test]
    fn group_chat_uses_wa_chatid_verbatim() {
        let payload = json!({
            "message": {
                "id": "MSG2",
                "type": "image",
                "content": "legenda",
                "sender": "5511999998888@s.whatsapp.net",
                "isGroup": true,
                "chat": {"wa_chatid": "120363407124580783@g.us", "name": "Familia"},
                "fileURL": "https://cdn.example/img.jpg"
            }
        });
        let event = extract(&payload, false, "BR");
        assert_eq!(event.phone.as_deref(), Some("120363407124580783@g.us"));
        assert_eq!(event.group_name.as_deref(), Some("Familia"));
        assert_eq!(event.media.as_deref(), Some("https://cdn.example/img.jpg"));
        assert_eq!(event.media_kind, Some(MessageKind::Image));
    }

    #[test]
    fn deletion_event_is_detected() {
        let payload = json!({"type": "DeletedMessage", "state": "Deleted"});
        assert!(is_deletion(&payload));
        assert!(!is_deletion(&json!({"type": "DeletedMessage", "state": "Other"})));
    }

    #[test]
    fn messages_update_is_detected() {
        assert!(is_messages_update(&json!({"event": "messages_update"})));
        assert!(!is_messages_update(&json!({"event": "messages"})));
    }
}
