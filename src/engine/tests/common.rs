use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::domain::{
    RuleId, RuleKind, TicketType, TicketTypeId, ValidationRule,
};
use crate::engine::ValidationEngine;
use crate::fias::{AddressCheck, AddressProvider};
use crate::store::{InMemoryRuleStore, RuleSnapshot};

pub(super) fn ticket_type(id: u64, name: &str, keywords: &[&str]) -> TicketType {
    TicketType {
        id: TicketTypeId(id),
        name: name.to_string(),
        description: String::new(),
        detection_keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        keyword_weights: BTreeMap::new(),
        active: true,
    }
}

pub(super) fn rule(id: u64, name: &str, kind: RuleKind, pattern: &str) -> ValidationRule {
    ValidationRule {
        id: RuleId(id),
        name: name.to_string(),
        pattern: pattern.to_string(),
        kind,
        error_message: format!("{name} failed"),
        active: true,
        priority: 0,
    }
}

/// Provider double returning a programmed answer and counting calls.
pub(super) struct StaticProvider {
    answer: AddressCheck,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub(super) fn new(answer: AddressCheck) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AddressProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn check(&self, _address: &str) -> AddressCheck {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

pub(super) fn engine_with(
    snapshot: RuleSnapshot,
    provider: Arc<StaticProvider>,
) -> ValidationEngine<InMemoryRuleStore> {
    ValidationEngine::new(Arc::new(InMemoryRuleStore::new(snapshot)), provider)
}
