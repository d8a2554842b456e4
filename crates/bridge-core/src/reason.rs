//! Reason tags logged alongside every event the reconciliation processors
//! drop, "user-visible failure behavior" list. Centralized
//! here so both processors and their tests spell them identically.

pub const GROUP_DISCONSIDERED: &str = "group_disconsidered";
pub const INTEGRATION_NOT_FOUND: &str = "integration_not_found";
pub const EVENT_NOT_MESSAGE_CREATED: &str = "event_not_message_created";
pub const MESSAGE_NOT_OUTGOING: &str = "message_not_outgoing";
pub const MENSAGEM_PRIVADA: &str = "mensagem_privada";
pub const TICKET_CONSUMED: &str = "ticket_consumed";
pub const WHATSAPP_MESSAGE_ID_NOT_FOUND: &str = "whatsapp_message_id_not_found";
pub const UNKNOWN_ORIGIN: &str = "unknown_origin";
pub const NOTIFICATION_EVENT: &str = "notification_event";
