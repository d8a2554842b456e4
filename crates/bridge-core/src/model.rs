use serde::{Deserialize, Serialize};

/// One of the three provider wire dialects a tenant can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    ZApi,
    Uazapi,
    Wuzapi,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::ZApi => "zapi",
            Dialect::Uazapi => "uazapi",
            Dialect::Wuzapi => "wuzapi",
        }
    }
}

impl From<Dialect> for Origin {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::ZApi => Origin::ZApi,
            Dialect::Uazapi => Origin::Uazapi,
            Dialect::Wuzapi => Origin::Wuzapi,
        }
    }
}

/// `origin` field of a normalized event: the three known dialects plus a
/// sentinel for payload shapes `detectPayloadOrigin` couldn't classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    ZApi,
    Uazapi,
    Wuzapi,
    Unknown,
}

/// Message content kind, shared by the credit ledger's key, the
/// normalized event and both REST clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
        }
    }
}

/// Message direction relative to the helpdesk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// Helpdesk conversation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Resolved,
    Pending,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Pending => "pending",
        }
    }
}

/// The canonical event produced by the normalizer for every inbound
/// provider payload, collapsing the three dialects into one shape. Field
/// names mirror the wire-level vocabulary (`lid`, `jid`, `fromMe`, …)
/// deliberately, since those are the terms the rest of the pipeline
/// reasons in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub origin: Origin,
    pub phone: Option<String>,
    pub lid: Option<String>,
    pub jid: Option<String>,
    pub text: String,
    pub name: String,
    pub sender_photo: Option<String>,
    pub media: Option<String>,
    pub media_kind: Option<MessageKind>,
    pub is_group: bool,
    pub from_me: bool,
    pub from_api: bool,
    pub status: String,
    pub message_id: String,
    pub reply_id: Option<String>,
    pub group_name: Option<String>,
    pub sender_name: Option<String>,
    pub edited_message_id: Option<String>,
    pub ignored: bool,
    pub ignore_reason: Option<String>,
}

impl NormalizedEvent {
    /// The identifier this event's contact should be created/matched
    /// under: lid, then jid, then phone. "find-or-create
    /// contact" ordering.
    pub fn contact_identifier(&self) -> Option<&str> {
        self.lid
            .as_deref()
            .or(self.jid.as_deref())
            .or(self.phone.as_deref())
    }

    pub fn dropped(reason: &str) -> Self {
        Self {
            origin: Origin::Unknown,
            phone: None,
            lid: None,
            jid: None,
            text: String::new(),
            name: String::new(),
            sender_photo: None,
            media: None,
            media_kind: None,
            is_group: false,
            from_me: false,
            from_api: false,
            status: String::new(),
            message_id: String::new(),
            reply_id: None,
            group_name: None,
            sender_name: None,
            edited_message_id: None,
            ignored: true,
            ignore_reason: Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_identifier_prefers_lid_then_jid_then_phone() {
        let mut event = NormalizedEvent::dropped("unused");
        event.phone = Some("+5511999998888".into());
        assert_eq!(event.contact_identifier(), Some("+5511999998888"));
        event.jid = Some("123@s.whatsapp.net".into());
        assert_eq!(event.contact_identifier(), Some("123@s.whatsapp.net"));
        event.lid = Some("456@lid".into());
        assert_eq!(event.contact_identifier(), Some("456@lid"));
    }

    #[test]
    fn dropped_event_is_always_ignored() {
        let event = NormalizedEvent::dropped("group_disconsidered");
        assert!(event.ignored);
        assert_eq!(event.ignore_reason.as_deref(), Some("group_disconsidered"));
    }
}
