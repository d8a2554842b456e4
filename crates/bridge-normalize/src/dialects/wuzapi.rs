use bridge_core::{MessageKind, NormalizedEvent, Origin, is_group_identifier, normalize_e164, reason};
use serde_json::Value;

use crate::base64fix::sanitize_wuzapi_base64;

/// True iff `payload` carries `event.Info`, `event.Message` and
/// `type == "Message"`, the structural signature `detectPayloadOrigin`
/// uses to recognize Wuzapi.
pub fn matches(payload: &Value) -> bool {
    payload.get("type").and_then(Value::as_str) == Some("Message")
        && payload.get("event").map(|e| e.get("Info").is_some() && e.get("Message").is_some()).unwrap_or(false)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Returns (text-or-caption, media field name, media kind) for whichever
/// message variant is present in `event.Message`.
fn media(message: &Value) -> (String, Option<&'static str>, Option<MessageKind>) {
    if let Some(extended) = message.get("extendedTextMessage") {
        return (str_field(extended, "text").unwrap_or_default().to_string(), None, None);
    }
    if let Some(image) = message.get("imageMessage") {
        return (str_field(image, "caption").unwrap_or_default().to_string(), Some("imageMessage"), Some(MessageKind::Image));
    }
    if let Some(audio) = message.get("audioMessage") {
        let _ = audio;
        return (String::new(), Some("audioMessage"), Some(MessageKind::Audio));
    }
    if let Some(video) = message.get("videoMessage") {
        return (str_field(video, "caption").unwrap_or_default().to_string(), Some("videoMessage"), Some(MessageKind::Video));
    }
    if let Some(document) = message.get("documentMessage") {
        return (str_field(document, "caption").unwrap_or_default().to_string(), Some("documentMessage"), Some(MessageKind::Document));
    }
    (str_field(message, "conversation").unwrap_or_default().to_string(), None, None)
}

fn reply_stanza_id(message: &Value, field: Option<&str>) -> Option<String> {
    let context = field.and_then(|f| message.get(f)).and_then(|m| m.get("contextInfo")).or_else(|| message.get("extendedTextMessage").and_then(|e| e.get("contextInfo")));
    context.and_then(|c| str_field(c, "stanzaId")).map(String::from)
}

pub fn extract(payload: &Value, ignore_groups: bool, default_country: &str) -> NormalizedEvent {
    let Some(event) = payload.get("event") else {
        return NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN);
    };
    let Some(info) = event.get("Info") else {
        return NormalizedEvent::dropped(reason::UNKNOWN_ORIGIN);
    };
    let message = event.get("Message").cloned().unwrap_or(Value::Null);

    let chat = str_field(info, "Chat").unwrap_or_default();
    let sender_name = str_field(info, "PushName").map(String::from);
    let is_group = info.get("IsGroup").and_then(Value::as_bool).unwrap_or_else(|| is_group_identifier(chat));

    if is_group && ignore_groups {
        return NormalizedEvent::dropped(reason::GROUP_DISCONSIDERED);
    }

    let (text, media_field, kind) = media(&message);
    let reply_id = reply_stanza_id(&message, media_field);

    let raw_base64 = payload.get("base64").and_then(Value::as_str);
    let media_value = raw_base64.map(sanitize_wuzapi_base64);

    let identifier = if is_group {
        if !chat.is_empty() { chat.to_string() } else { sender_name.clone().unwrap_or_default() }
    } else {
        let sender = str_field(info, "Sender").unwrap_or(chat);
        normalize_e164(sender, default_country).unwrap_or_else(|| sender.to_string())
    };

    NormalizedEvent {
        origin: Origin::Wuzapi,
        phone: Some(identifier),
        lid: None,
        jid: None,
        text,
        name: sender_name.clone().unwrap_or_default(),
        sender_photo: None,
        media: if kind.is_some() { media_value } else { None },
        media_kind: kind,
        is_group,
        from_me: info.get("IsFromMe").and_then(Value::as_bool).unwrap_or(false),
        from_api: payload.get("fromApi").and_then(Value::as_bool).unwrap_or(false),
        status: "RECEIVED".to_string(),
        message_id: str_field(info, "ID").unwrap_or_default().to_string(),
        reply_id,
        group_name: if is_group { sender_name.clone() } else { None },
        sender_name,
        edited_message_id: None,
        ignored: false,
        ignore_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "type": "Message",
            "event": {
                "Info": {
                    "Chat": "5511999998888@s.whatsapp.net",
                    "Sender": "5511999998888@s.whatsapp.net",
                    "IsFromMe": false,
                    "IsGroup": false,
                    "PushName": "Carla",
                    "ID": "3EB0ABC"
                },
                "Message": {"conversation": "oi"}
            }
        })
    }

    #[test]
    fn matches_requires_info_message_and_type() {
        assert!(matches(&sample()));
        assert!(!matches(&json!({"type": "Message", "event": {"Info": {}}})));
    }

    #[test]
    fn extracts_direct_text_message() {
        let event = extract(&sample(), false, "BR");
        assert_eq!(event.text, "oi");
        assert_eq!(event.phone.as_deref(), Some("+5511999998888"));
        assert_eq!(event.message_id, "3EB0ABC");
    }

    #[test]
    fn group_uses_raw_chat_and_falls_back_to_push_name() {
        let payload = json!({
            "type": "Message",
            "event": {
                "Info": {"Chat": "120363407124580783@g.us", "IsGroup": true, "PushName": "Dani", "ID": "3EB1"},
                "Message": {"imageMessage": {"caption": "foto"}}
            },
            "base64": "a-b_c"
        });
        let event = extract(&payload, false, "BR");
        assert_eq!(event.phone.as_deref(), Some("120363407124580783@g.us"));
        assert_eq!(event.text, "foto");
        assert_eq!(event.media.as_deref(), Some("a+b/c="));
        assert_eq!(event.media_kind, Some(MessageKind::Image));
        assert_eq!(event.group_name.as_deref(), Some("Dani"));
    }

    #[test]
    fn group_message_dropped_when_ignored() {
        let payload = json!({
            "type": "Message",
            "event": {
                "Info": {"Chat": "120363407124580783@g.us", "IsGroup": true},
                "Message": {"conversation": "oi"}
            }
        });
        let event = extract(&payload, true, "BR");
        assert!(event.ignored);
        assert_eq!(event.ignore_reason.as_deref(), Some(reason::GROUP_DISCONSIDERED));
    }
}
