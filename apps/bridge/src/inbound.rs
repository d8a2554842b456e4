//! Subject P: inbound provider events. A single pull consumer
//! processes deliveries one at a time in arrival order; every message
//! acks regardless of outcome so a poison message never head-of-line
//! blocks the subject.

use std::sync::Arc;

use bridge_core::{BridgeError, Dialect, Direction, MessageKind, NormalizedEvent, Origin};
use bridge_dlq::{DlqError, DlqPublisher};
use bridge_helpdesk::MediaPayload;
use bridge_mapping::MappingEntry;
use bridge_normalize::{self, SpecialEvent};
use bridge_queue::{BridgeQueue, Subject};
use serde_json::Value;

use crate::state::{AppState, TenantClients};

const EDIT_MARKER: &str = "(*mensagem editada pelo usuário*)";

pub async fn run(queue: BridgeQueue, state: Arc<AppState>, dlq: DlqPublisher) {
    let mut consumer = match queue.consumer(Subject::Principal).await {
        Ok(consumer) => consumer,
        Err(err) => {
            tracing::error!(error = %err, "failed to attach inbound consumer, processor exiting");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let message = match delivery {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "inbound consumer stream error");
                continue;
            }
        };

        let payload: Value = match serde_json::from_slice(&message.payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unparseable inbound payload");
                ack(&message).await;
                continue;
            }
        };

        if let Err(err) = handle(&state, &payload).await {
            tracing::warn!(error = %err, code = err.code(), "inbound event processing failed");
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
        tracing::warn!(error = %err, "failed to ack inbound message");
    }
}

async fn handle(state: &AppState, payload: &Value) -> Result<(), BridgeError> {
    if let Some(special) = bridge_normalize::detect_special_event(payload) {
        return handle_special(state, special, payload).await;
    }

    let Some(tenant_clients) = route_to_tenant(state, payload) else {
        tracing::debug!("no tenant matched inbound payload, dropping");
        return Ok(());
    };

    let event = bridge_normalize::normalize(payload, tenant_clients.tenant.ignore_groups, &tenant_clients.tenant.default_country);
    if event.ignored {
        tracing::info!(reason = event.ignore_reason.as_deref().unwrap_or(""), "inbound event dropped");
        return Ok(());
    }

    match (event.from_me, event.from_api) {
        (false, _) => handle_incoming(state, tenant_clients, &event).await,
        (true, false) => handle_agent_from_phone(state, tenant_clients, &event).await,
        (true, true) => handle_provider_echo(state, &event).await,
    }
}

/// Deletion-flavoured special events mirror the provider-side delete onto
/// the helpdesk side by reversing the mapping cache lookup (symmetric to
/// the callback processor's own delete handling).
async fn handle_special(state: &AppState, special: SpecialEvent, payload: &Value) -> Result<(), BridgeError> {
    match special {
        SpecialEvent::UazapiMessagesUpdate | SpecialEvent::ZapiOtherNotification => Ok(()),
        SpecialEvent::UazapiDeletion | SpecialEvent::ZapiRevoke => {
            let Some(provider_msg_id) = bridge_normalize::special_event_message_id(special, payload) else {
                return Ok(());
            };
            let Some(helpdesk_msg_id) = state.mapping.get_helpdesk_id_by_provider_id(&provider_msg_id) else {
                return Ok(());
            };
            let Some(entry) = state.mapping.get_by_helpdesk_id(&helpdesk_msg_id) else {
                return Ok(());
            };
            let Some(tenant_clients) = state.clients.get(&entry.tenant_id) else {
                return Ok(());
            };
            tenant_clients.helpdesk.delete_message(&entry.conversation_id, &helpdesk_msg_id).await?;
            state.mapping.remove_by_helpdesk_id(&helpdesk_msg_id);
            Ok(())
        }
    }
}

/// Single tenant short-circuits straight through; otherwise routes by the
/// provider identifier the payload structurally exposes.
fn route_to_tenant<'a>(state: &'a AppState, payload: &Value) -> Option<&'a TenantClients> {
    if state.clients.len() == 1 {
        return state.clients.values().next();
    }

    match bridge_normalize::detect_origin(payload) {
        Origin::Uazapi => {
            let owner = payload.get("owner").and_then(Value::as_str);
            let chatid = payload.get("message").and_then(|m| m.get("chatid")).and_then(Value::as_str);
            owner
                .and_then(|o| state.registry.by_provider_identifier(o))
                .or_else(|| chatid.and_then(|c| state.registry.by_provider_identifier(c)))
                .and_then(|tenant| state.clients.get(&tenant.id))
        }
        Origin::ZApi => single_tenant_of_dialect(state, Dialect::ZApi),
        Origin::Wuzapi => single_tenant_of_dialect(state, Dialect::Wuzapi),
        Origin::Unknown => None,
    }
}

fn single_tenant_of_dialect(state: &AppState, dialect: Dialect) -> Option<&TenantClients> {
    let mut matches = state.clients.values().filter(|c| c.tenant.provider.dialect() == dialect);
    let first = matches.next()?;
    if matches.next().is_some() { None } else { Some(first) }
}

/// `fromMe=false`: a genuine inbound message from the client.
async fn handle_incoming(state: &AppState, tc: &TenantClients, event: &NormalizedEvent) -> Result<(), BridgeError> {
    let mut content = event.text.clone();
    let mut reply_id = event.reply_id.as_ref().and_then(|id| state.mapping.get_helpdesk_id_by_provider_id(id));

    if let Some(edited_id) = &event.edited_message_id
        && let Some(helpdesk_id) = state.mapping.get_helpdesk_id_by_provider_id(edited_id)
    {
        content = if content.is_empty() { EDIT_MARKER.to_string() } else { format!("{content}\n{EDIT_MARKER}") };
        reply_id = Some(helpdesk_id);
    }

    if event.is_group {
        let sender = event.sender_name.as_deref().unwrap_or(&event.name);
        content = format!("**{sender}:**\n{content}");
    }

    deliver(state, tc, event, Direction::Incoming, content, reply_id).await.map(|_| ())
}

/// `fromMe=true, fromApi=false`: the agent replied from their own phone,
/// bypassing the helpdesk entirely.
async fn handle_agent_from_phone(state: &AppState, tc: &TenantClients, event: &NormalizedEvent) -> Result<(), BridgeError> {
    let Some(identifier) = event.contact_identifier().map(str::to_string) else {
        return Ok(());
    };
    let kind = event.media_kind.unwrap_or(MessageKind::Text);

    state.ledger.add_provider(&identifier, kind);
    let result = deliver(state, tc, event, Direction::Outgoing, event.text.clone(), None).await;
    if result.is_err() {
        state.ledger.release_provider(&identifier, kind);
    }
    result.map(|_| ())
}

/// `fromMe=true, fromApi=true`: the provider echoing a message sent via
/// its own API. Two origins collapse onto this one event shape:
///
/// - the agent-phone branch above just posted outgoing and pre-credited
///   the provider map, so this echo is that send reflected back,
///   already handled; there is nothing further to do here.
/// - the callback processor's agent-UI branch pre-credits the helpdesk
///   map and sends via the provider directly (it never posts a second
///   helpdesk message, since the one the agent typed already exists);
///   this echo is *that* send reflected back. A conversation keeps
///   exactly one helpdesk message per round trip, so this branch must
///   not re-post either, it only pre-credits the provider map so a
///   further duplicate helpdesk callback for the same send is itself
///   suppressed.
///
/// Either way the credit consumed from the helpdesk map tells us which
/// case we're in; a genuinely untracked echo (sentinel absent) is simply
/// dropped.
async fn handle_provider_echo(state: &AppState, event: &NormalizedEvent) -> Result<(), BridgeError> {
    let Some(identifier) = event.contact_identifier().map(str::to_string) else {
        return Ok(());
    };
    let kind = event.media_kind.unwrap_or(MessageKind::Text);

    if state.ledger.consume_helpdesk(&identifier, kind) {
        return Ok(());
    }

    state.ledger.add_provider(&identifier, kind);
    Ok(())
}

/// Shared ensure-inbox/contact/conversation/send sequence,
/// storing the mapping on a successful post.
async fn deliver(
    state: &AppState,
    tc: &TenantClients,
    event: &NormalizedEvent,
    direction: Direction,
    content: String,
    reply_id: Option<String>,
) -> Result<String, BridgeError> {
    let identifier = event
        .contact_identifier()
        .ok_or_else(|| BridgeError::permanent("inbound_missing_identifier", "normalized event has no contact identifier"))?;

    let inbox = tc.helpdesk.ensure_inbox().await?;
    tc.tenant.set_resolved_inbox_id(inbox.id.clone());

    let contact = tc
        .helpdesk
        .find_or_create_contact(identifier, &event.name, event.is_group, event.sender_photo.as_deref())
        .await?;
    let conversation = tc.helpdesk.find_or_create_conversation(&inbox, &contact).await?;

    let helpdesk_msg_id = match event.media_kind {
        Some(kind) => {
            let payload = media_payload(event);
            tc.helpdesk
                .send_media(&conversation.id, direction, kind, payload, Some(&content), reply_id.as_deref(), tc.download_hook.as_ref())
                .await?
        }
        None => tc.helpdesk.send_text(&conversation.id, direction, &content, reply_id.as_deref()).await?,
    };

    if !helpdesk_msg_id.is_empty() {
        state.mapping.store(
            helpdesk_msg_id.clone(),
            MappingEntry {
                provider_msg_id: event.message_id.clone(),
                conversation_id: conversation.id,
                inbox_id: inbox.id,
                provider_dialect: tc.tenant.provider.dialect(),
                tenant_id: tc.tenant.id.clone(),
            },
        );
    }

    Ok(helpdesk_msg_id)
}

/// Wuzapi inlines base64 media straight in the event; the other two
/// dialects only ever hand back a URL.
fn media_payload(event: &NormalizedEvent) -> MediaPayload {
    match event.origin {
        Origin::Uazapi => MediaPayload { provider_msg_id: Some(event.message_id.clone()), url: event.media.clone(), base64: None },
        Origin::Wuzapi => MediaPayload { provider_msg_id: None, url: None, base64: event.media.clone() },
        _ => MediaPayload { provider_msg_id: None, url: event.media.clone(), base64: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event(origin: Origin) -> NormalizedEvent {
        let mut event = NormalizedEvent::dropped("unused");
        event.ignored = false;
        event.ignore_reason = None;
        event.origin = origin;
        event.message_id = "msg-1".to_string();
        event.media = Some("media-value".to_string());
        event
    }

    #[test]
    fn media_payload_uses_provider_message_id_for_uazapi() {
        let event = base_event(Origin::Uazapi);
        let payload = media_payload(&event);
        assert_eq!(payload.provider_msg_id.as_deref(), Some("msg-1"));
        assert_eq!(payload.url.as_deref(), Some("media-value"));
        assert!(payload.base64.is_none());
    }

    #[test]
    fn media_payload_inlines_base64_for_wuzapi() {
        let event = base_event(Origin::Wuzapi);
        let payload = media_payload(&event);
        assert!(payload.provider_msg_id.is_none());
        assert!(payload.url.is_none());
        assert_eq!(payload.base64.as_deref(), Some("media-value"));
    }

    #[test]
    fn media_payload_uses_plain_url_for_zapi() {
        let event = base_event(Origin::ZApi);
        let payload = media_payload(&event);
        assert!(payload.provider_msg_id.is_none());
        assert_eq!(payload.url.as_deref(), Some("media-value"));
        assert!(payload.base64.is_none());
    }
}
