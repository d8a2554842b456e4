//! Subject C: outbound helpdesk callbacks. Same single pull
//! consumer / ack-unconditionally discipline as the inbound processor.

use std::sync::Arc;

use bridge_core::{BridgeError, MessageKind, reason};
use bridge_dlq::{DlqError, DlqPublisher};
use bridge_mapping::MappingEntry;
use bridge_provider::{Attachment, SendRequest};
use bridge_queue::{BridgeQueue, Subject};
use serde_json::Value;

use crate::state::{AppState, TenantClients};

pub async fn run(queue: BridgeQueue, state: Arc<AppState>, dlq: DlqPublisher) {
    let mut consumer = match queue.consumer(Subject::Callback).await {
        Ok(consumer) => consumer,
        Err(err) => {
            tracing::error!(error = %err, "failed to attach outbound consumer, processor exiting");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let message = match delivery {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "outbound consumer stream error");
                continue;
            }
        };

        let payload: Value = match serde_json::from_slice(&message.payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unparseable callback payload");
                ack(&message).await;
                continue;
            }
        };

        if let Err(err) = handle(&state, &payload).await {
            tracing::warn!(error = %err, code = err.code(), "outbound event processing failed");
            dlq.publish(
                "unknown",
                "unknown",
                "unknown",
                0,
                DlqError { code: err.code().to_string(), message: err.to_string(), stage: None },
                &payload,
            )
            .await
            .ok();
        }

        ack(&message).await;
    }
}

async fn ack(message: &async_nats::jetstream::Message) {
    if let Err(err) = message.ack().await {
        tracing::warn!(error = %err, "failed to ack outbound message");
    }
}

async fn handle(state: &AppState, payload: &Value) -> Result<(), BridgeError> {
    let event_name = payload.get("event").and_then(Value::as_str).unwrap_or_default();
    let deleted = payload.get("content_attributes").and_then(|attrs| attrs.get("deleted")).and_then(Value::as_bool).unwrap_or(false);

    if event_name == "message_updated" && deleted {
        return handle_delete(state, payload).await;
    }

    if event_name != "message_created" {
        tracing::debug!(reason = reason::EVENT_NOT_MESSAGE_CREATED, event_name, "dropping callback");
        return Ok(());
    }

    if payload.get("message_type").and_then(Value::as_str) != Some("outgoing") {
        tracing::debug!(reason = reason::MESSAGE_NOT_OUTGOING, "dropping non-outgoing callback");
        return Ok(());
    }

    if payload.get("private").and_then(Value::as_bool).unwrap_or(false) {
        tracing::debug!(reason = reason::MENSAGEM_PRIVADA, "dropping private callback");
        return Ok(());
    }

    let Some(tc) = route_to_tenant(state, payload) else {
        tracing::warn!(reason = reason::INTEGRATION_NOT_FOUND, "no tenant matched callback");
        return Ok(());
    };

    let helpdesk_msg_id = payload.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string))).unwrap_or_default();
    let conversation_id =
        payload.get("conversation").and_then(|c| c.get("id")).and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string))).unwrap_or_default();
    let contact = payload.get("conversation").and_then(|c| c.get("meta")).and_then(|m| m.get("sender")).cloned().unwrap_or(Value::Null);

    let Some((recipient, is_group)) = resolve_recipient(&contact) else {
        tracing::warn!(reason = reason::WHATSAPP_MESSAGE_ID_NOT_FOUND, "callback contact has no usable identifier");
        return Ok(());
    };

    let kind = attachments_kind(payload);

    let reply_to = payload
        .get("content_attributes")
        .and_then(|attrs| attrs.get("in_reply_to"))
        .and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
        .and_then(|hd_id| state.mapping.get_by_helpdesk_id(&hd_id))
        .map(|entry| entry.provider_msg_id);

    let mut content = payload.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    if tc.tenant.sign_agent_messages && let Some(name) = derive_signature_name(payload) {
        content = if content.is_empty() { format!("*{name}:*") } else { format!("*{name}:*\n\n{content}") };
    }

    if state.ledger.consume_provider(&recipient, kind) {
        tracing::debug!(reason = reason::TICKET_CONSUMED, recipient, "callback is the echo of an already-handled provider send");
        return Ok(());
    }

    let attachments = split_attachments(payload);
    for attachment in &attachments {
        state.ledger.add_helpdesk(&recipient, attachment.kind);
    }
    if attachments.is_empty() {
        state.ledger.add_helpdesk(&recipient, MessageKind::Text);
    }

    let (lid, jid) = if is_group { (None, None) } else { (contact.get("lid").and_then(Value::as_str).map(String::from), contact.get("jid").and_then(Value::as_str).map(String::from)) };

    let request = SendRequest { recipient: recipient.clone(), text: Some(content), attachments, lid, jid, reply_to, is_group };

    match tc.provider.send(&request).await {
        Ok(outcomes) => {
            if !helpdesk_msg_id.is_empty()
                && let Some(first) = outcomes.first()
            {
                state.mapping.store(
                    helpdesk_msg_id,
                    MappingEntry {
                        provider_msg_id: first.provider_message_id.clone(),
                        conversation_id,
                        inbox_id: tc.tenant.resolved_inbox_id().unwrap_or_default(),
                        provider_dialect: tc.tenant.provider.dialect(),
                        tenant_id: tc.tenant.id.clone(),
                    },
                );
            }
            Ok(())
        }
        Err(err) => {
            if request.attachments.is_empty() {
                state.ledger.release_helpdesk(&recipient, MessageKind::Text);
            } else {
                for attachment in &request.attachments {
                    state.ledger.release_helpdesk(&recipient, attachment.kind);
                }
            }
            Err(err)
        }
    }
}

async fn handle_delete(state: &AppState, payload: &Value) -> Result<(), BridgeError> {
    let helpdesk_msg_id = payload.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string))).unwrap_or_default();
    let Some(entry) = state.mapping.get_by_helpdesk_id(&helpdesk_msg_id) else {
        tracing::debug!(reason = reason::WHATSAPP_MESSAGE_ID_NOT_FOUND, helpdesk_msg_id, "no mapping for deleted message");
        return Ok(());
    };

    let tc = state
        .clients
        .get(&entry.tenant_id)
        .or_else(|| route_to_tenant(state, payload))
        .or_else(|| state.clients.values().next());
    let Some(tc) = tc else {
        return Ok(());
    };

    let contact = payload.get("conversation").and_then(|c| c.get("meta")).and_then(|m| m.get("sender")).cloned().unwrap_or(Value::Null);
    let recipient = resolve_recipient(&contact).map(|(id, _)| id);

    tc.provider.delete(&entry.provider_msg_id, recipient.as_deref()).await?;
    state.mapping.remove_by_helpdesk_id(&helpdesk_msg_id);
    Ok(())
}

fn route_to_tenant<'a>(state: &'a AppState, payload: &Value) -> Option<&'a TenantClients> {
    if state.clients.len() == 1 {
        return state.clients.values().next();
    }
    let inbox_id = payload.get("conversation").and_then(|c| c.get("inbox_id")).and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))?;
    state.registry.by_helpdesk_inbox_id(&inbox_id).and_then(|tenant| state.clients.get(&tenant.id))
}

/// Group identifiers are used verbatim; direct contacts prefer
/// phone_number, else lid, else jid, else identifier.
fn resolve_recipient(contact: &Value) -> Option<(String, bool)> {
    let identifier = contact.get("identifier").and_then(Value::as_str)?;
    if identifier.ends_with("@g.us") || identifier.ends_with("-group") {
        return Some((identifier.to_string(), true));
    }
    let chosen = contact
        .get("phone_number")
        .and_then(Value::as_str)
        .or_else(|| contact.get("lid").and_then(Value::as_str))
        .or_else(|| contact.get("jid").and_then(Value::as_str))
        .unwrap_or(identifier);
    Some((chosen.to_string(), false))
}

/// Signature name lookup order: assignee.available_name → assignee.name →
/// sender.name → sender.available_name → sender-of-conversation.name.
fn derive_signature_name(payload: &Value) -> Option<String> {
    let assignee = payload.get("conversation").and_then(|c| c.get("meta")).and_then(|m| m.get("assignee"));
    let sender = payload.get("sender");
    let conversation_sender = payload.get("conversation").and_then(|c| c.get("meta")).and_then(|m| m.get("sender"));

    assignee
        .and_then(|a| a.get("available_name"))
        .and_then(Value::as_str)
        .or_else(|| assignee.and_then(|a| a.get("name")).and_then(Value::as_str))
        .or_else(|| sender.and_then(|s| s.get("name")).and_then(Value::as_str))
        .or_else(|| sender.and_then(|s| s.get("available_name")).and_then(Value::as_str))
        .or_else(|| conversation_sender.and_then(|s| s.get("name")).and_then(Value::as_str))
        .map(String::from)
}

fn attachment_kind(file_type: &str) -> MessageKind {
    match file_type {
        "image" => MessageKind::Image,
        "audio" => MessageKind::Audio,
        "video" => MessageKind::Video,
        _ => MessageKind::Document,
    }
}

/// The kind this callback's send should be credited/consumed under: the
/// first attachment's kind, or text when there are none.
fn attachments_kind(payload: &Value) -> MessageKind {
    payload
        .get("attachments")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(|a| a.get("file_type"))
        .and_then(Value::as_str)
        .map(attachment_kind)
        .unwrap_or(MessageKind::Text)
}

fn split_attachments(payload: &Value) -> Vec<Attachment> {
    payload
        .get("attachments")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|a| {
                    let file_type = a.get("file_type").and_then(Value::as_str).unwrap_or("file");
                    Attachment {
                        kind: attachment_kind(file_type),
                        url: a.get("data_url").and_then(Value::as_str).map(String::from),
                        base64: None,
                        filename: a.get("file_name").or_else(|| a.get("fallback_title")).and_then(Value::as_str).map(String::from),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_recipient_treats_g_us_and_dash_group_as_groups() {
        let contact = json!({"identifier": "5511999998888@g.us"});
        assert_eq!(resolve_recipient(&contact), Some(("5511999998888@g.us".to_string(), true)));

        let contact = json!({"identifier": "120363-group"});
        assert_eq!(resolve_recipient(&contact), Some(("120363-group".to_string(), true)));
    }

    #[test]
    fn resolve_recipient_prefers_phone_number_then_lid_then_jid_then_identifier() {
        let contact = json!({"identifier": "123@lid", "phone_number": "+5511999998888", "lid": "456@lid", "jid": "789@s.whatsapp.net"});
        assert_eq!(resolve_recipient(&contact), Some(("+5511999998888".to_string(), false)));

        let contact = json!({"identifier": "123@lid", "lid": "456@lid", "jid": "789@s.whatsapp.net"});
        assert_eq!(resolve_recipient(&contact), Some(("456@lid".to_string(), false)));

        let contact = json!({"identifier": "123@lid"});
        assert_eq!(resolve_recipient(&contact), Some(("123@lid".to_string(), false)));
    }

    #[test]
    fn resolve_recipient_is_none_without_identifier() {
        assert_eq!(resolve_recipient(&json!({})), None);
    }

    #[test]
    fn derive_signature_name_prefers_assignee_available_name() {
        let payload = json!({
            "conversation": {"meta": {"assignee": {"available_name": "Agent A", "name": "agent.a"}}},
            "sender": {"name": "Client"},
        });
        assert_eq!(derive_signature_name(&payload).as_deref(), Some("Agent A"));
    }

    #[test]
    fn derive_signature_name_falls_back_through_the_chain() {
        let payload = json!({"sender": {"available_name": "Client Available"}});
        assert_eq!(derive_signature_name(&payload).as_deref(), Some("Client Available"));

        assert_eq!(derive_signature_name(&json!({})), None);
    }

    #[test]
    fn attachment_kind_maps_known_file_types_and_defaults_to_document() {
        assert_eq!(attachment_kind("image"), MessageKind::Image);
        assert_eq!(attachment_kind("audio"), MessageKind::Audio);
        assert_eq!(attachment_kind("video"), MessageKind::Video);
        assert_eq!(attachment_kind("file"), MessageKind::Document);
        assert_eq!(attachment_kind("unknown"), MessageKind::Document);
    }

    #[test]
    fn attachments_kind_uses_first_attachment_or_defaults_to_text() {
        let payload = json!({"attachments": [{"file_type": "image"}, {"file_type": "audio"}]});
        assert_eq!(attachments_kind(&payload), MessageKind::Image);
        assert_eq!(attachments_kind(&json!({})), MessageKind::Text);
    }

    #[test]
    fn split_attachments_extracts_url_kind_and_filename() {
        let payload = json!({"attachments": [
            {"file_type": "image", "data_url": "https://example.com/a.png", "file_name": "a.png"},
            {"file_type": "document", "data_url": "https://example.com/b.pdf", "fallback_title": "b.pdf"},
        ]});
        let attachments = split_attachments(&payload);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].kind, MessageKind::Image);
        assert_eq!(attachments[0].url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(attachments[0].filename.as_deref(), Some("a.png"));
        assert_eq!(attachments[1].filename.as_deref(), Some("b.pdf"));
    }

    #[test]
    fn split_attachments_is_empty_without_attachments_key() {
        assert!(split_attachments(&json!({})).is_empty());
    }
}
