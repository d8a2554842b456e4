//! The echo-suppression credit ledger: two independent
//! counter maps, `outgoingProvider` and `outgoingHelpdesk`, each keyed by
//! `(recipient, kind)`. A counter dropping to zero is removed immediately
//! so the maps never accumulate dead entries.

use std::collections::BTreeMap;

use bridge_core::MessageKind;
use dashmap::DashMap;

/// One of the ledger's two counter maps.
#[derive(Default)]
struct CreditMap {
    inner: DashMap<(String, MessageKind), u32>,
}

impl CreditMap {
    fn add(&self, recipient: &str, kind: MessageKind) {
        *self.inner.entry((recipient.to_string(), kind)).or_insert(0) += 1;
    }

    /// Decrements the counter if present and non-zero, removing the entry
    /// when it reaches zero. Returns whether a credit was available.
    fn consume(&self, recipient: &str, kind: MessageKind) -> bool {
        let key = (recipient.to_string(), kind);
        let mut drop_entry = false;
        let had_credit = match self.inner.get_mut(&key) {
            Some(mut count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    drop_entry = true;
                }
                true
            }
            _ => false,
        };
        if drop_entry {
            self.inner.remove(&key);
        }
        had_credit
    }

    fn snapshot(&self) -> BTreeMap<String, BTreeMap<&'static str, u32>> {
        let mut out: BTreeMap<String, BTreeMap<&'static str, u32>> = BTreeMap::new();
        for entry in self.inner.iter() {
            let ((recipient, kind), count) = (entry.key().clone(), *entry.value());
            out.entry(recipient).or_default().insert(kind.as_str(), count);
        }
        out
    }
}

/// Process-wide credit ledger shared by both reconciliation processors.
#[derive(Default)]
pub struct CreditLedger {
    provider: CreditMap,
    helpdesk: CreditMap,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-credits the provider echo map so an upcoming provider-side echo
    /// of a message this process just sent is self-cancelled.
    pub fn add_provider(&self, recipient: &str, kind: MessageKind) {
        self.provider.add(recipient, kind);
    }

    /// Consumes one provider-echo credit. `true` means a credit was
    /// present, and has now been consumed, so the caller should treat the
    /// event as an already-handled echo and skip it.
    pub fn consume_provider(&self, recipient: &str, kind: MessageKind) -> bool {
        self.provider.consume(recipient, kind)
    }

    /// Undoes a pre-credit after a send that was expected to complete but
    /// failed, so the credit doesn't linger and mask a later legitimate
    /// echo.
    pub fn release_provider(&self, recipient: &str, kind: MessageKind) {
        self.provider.consume(recipient, kind);
    }

    /// Pre-credits the helpdesk echo map.
    pub fn add_helpdesk(&self, recipient: &str, kind: MessageKind) {
        self.helpdesk.add(recipient, kind);
    }

    /// Consumes one helpdesk-echo credit with an inverted sentinel:
    /// returns `true` when the key was absent, meaning nothing to
    /// consume, so the caller should treat the event as unprotected and
    /// drop it; `false` when a credit was present and has now been
    /// consumed, meaning the caller should proceed, pre-crediting the
    /// provider map and delivering.
    pub fn consume_helpdesk(&self, recipient: &str, kind: MessageKind) -> bool {
        if !self.helpdesk.inner.contains_key(&(recipient.to_string(), kind)) {
            return true;
        }
        !self.helpdesk.consume(recipient, kind)
    }

    pub fn release_helpdesk(&self, recipient: &str, kind: MessageKind) {
        self.helpdesk.consume(recipient, kind);
    }

    /// Snapshot for the `/ticket-stats` endpoint.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            outgoing_provider: self.provider.snapshot(),
            outgoing_helpdesk: self.helpdesk.snapshot(),
        }
    }

    /// Wipes both counter maps. Called by the global 5-hour eviction timer
    /// alongside the mapping cache's wipe.
    pub fn clear(&self) {
        self.provider.inner.clear();
        self.helpdesk.inner.clear();
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerStats {
    pub outgoing_provider: BTreeMap<String, BTreeMap<&'static str, u32>>,
    pub outgoing_helpdesk: BTreeMap<String, BTreeMap<&'static str, u32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_consume_nets_zero() {
        let ledger = CreditLedger::new();
        ledger.add_provider("+5511999998888", MessageKind::Text);
        assert!(ledger.consume_provider("+5511999998888", MessageKind::Text));
        assert!(!ledger.consume_provider("+5511999998888", MessageKind::Text));
    }

    #[test]
    fn consume_without_credit_returns_false() {
        let ledger = CreditLedger::new();
        assert!(!ledger.consume_provider("+5511999998888", MessageKind::Image));
    }

    #[test]
    fn zero_entries_are_collapsed() {
        let ledger = CreditLedger::new();
        ledger.add_provider("+5511999998888", MessageKind::Text);
        ledger.consume_provider("+5511999998888", MessageKind::Text);
        assert!(ledger.stats().outgoing_provider.is_empty());
    }

    #[test]
    fn consume_helpdesk_sentinel_true_when_absent() {
        let ledger = CreditLedger::new();
        assert!(ledger.consume_helpdesk("+5511999998888", MessageKind::Text));
    }

    #[test]
    fn consume_helpdesk_false_when_credit_present() {
        let ledger = CreditLedger::new();
        ledger.add_helpdesk("+5511999998888", MessageKind::Text);
        assert!(!ledger.consume_helpdesk("+5511999998888", MessageKind::Text));
        // Second call finds nothing left: sentinel true again.
        assert!(ledger.consume_helpdesk("+5511999998888", MessageKind::Text));
    }

    #[test]
    fn counters_never_go_negative() {
        let ledger = CreditLedger::new();
        for _ in 0..5 {
            assert!(!ledger.consume_provider("x", MessageKind::Document));
        }
    }

    #[test]
    fn independent_recipients_and_kinds_do_not_interfere() {
        let ledger = CreditLedger::new();
        ledger.add_provider("a", MessageKind::Text);
        ledger.add_provider("a", MessageKind::Image);
        ledger.add_provider("b", MessageKind::Text);
        assert!(ledger.consume_provider("a", MessageKind::Text));
        assert!(ledger.consume_provider("a", MessageKind::Image));
        assert!(ledger.consume_provider("b", MessageKind::Text));
        assert!(!ledger.consume_provider("a", MessageKind::Text));
    }
}
