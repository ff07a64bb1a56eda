//! Ticket classification and rule evaluation.
//!
//! [`ValidationEngine::validate_ticket`] is the single entry point live
//! traffic uses; the template regression runner and the batch runner both
//! call through the same evaluator rather than duplicating dispatch.

pub mod detection;
pub mod domain;
pub(crate) mod rules;

#[cfg(test)]
mod tests;

pub use detection::{
    detect_ticket_type, detect_with_report, DetectionReport, KeywordMatch, TypeScore,
};
pub use domain::{
    FailedRule, PassedRule, RuleExpectation, RuleId, RuleKind, TemplateId, TestTemplate,
    TicketType, TicketTypeId, ValidationResult, ValidationRule,
};

use std::sync::Arc;

use tracing::debug;

use crate::fias::AddressProvider;
use crate::store::{RuleStore, StoreError};

/// Stateless engine composing the type detector and rule evaluator.
///
/// Each call reads a fresh configuration snapshot from the store, so the
/// engine holds no mutable state and calls may run concurrently.
pub struct ValidationEngine<S> {
    store: Arc<S>,
    provider: Arc<dyn AddressProvider>,
}

impl<S> ValidationEngine<S>
where
    S: RuleStore,
{
    pub fn new(store: Arc<S>, provider: Arc<dyn AddressProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate a live ticket: detect its type, then evaluate the rules
    /// bound to that type, or the full active rule set when no type scores
    /// above zero.
    pub fn validate_ticket(&self, text: &str) -> Result<ValidationResult, EngineError> {
        let (result, _) = self.validate_ticket_with_report(text)?;
        Ok(result)
    }

    /// Same as [`validate_ticket`](Self::validate_ticket) but also returns
    /// the detection diagnostics for admin-facing output.
    pub fn validate_ticket_with_report(
        &self,
        text: &str,
    ) -> Result<(ValidationResult, DetectionReport), EngineError> {
        let ticket_types = self.store.active_ticket_types()?;
        if ticket_types.is_empty() {
            return Err(EngineError::NoActiveTicketTypes);
        }

        let (detected, report) = detect_with_report(text, &ticket_types, None);
        let detected = detected.cloned();

        let rules = self
            .store
            .active_rules(detected.as_ref().map(|tt| tt.id))?;
        debug!(
            detected_type = report.detected_type_name.as_deref().unwrap_or("none"),
            rule_count = rules.len(),
            "validating ticket"
        );

        let result = self.validate_against(text, &rules, detected);
        Ok((result, report))
    }

    /// Rule-set-parameterized variant shared by the template and batch
    /// runners. Evaluates every active rule in `rules` against `text`.
    pub fn validate_against(
        &self,
        text: &str,
        rules: &[ValidationRule],
        detected_type: Option<TicketType>,
    ) -> ValidationResult {
        let outcomes = rules::evaluate_rules(text, rules, self.provider.as_ref());

        let failed_rules: Vec<FailedRule> = outcomes
            .iter()
            .filter_map(|outcome| outcome.failed_rule())
            .collect();
        let passed_rules: Vec<PassedRule> = outcomes
            .iter()
            .filter_map(|outcome| outcome.passed_rule())
            .collect();

        ValidationResult {
            is_valid: failed_rules.is_empty(),
            detected_type,
            rules_evaluated: outcomes.len(),
            failed_rules,
            passed_rules,
        }
    }
}

/// Error raised by the validation engine itself. Rule-level problems never
/// surface here; they degrade to rule-scoped failures instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No active ticket types are configured; a broken deployment rather
    /// than a bad ticket.
    #[error("no active ticket types are configured")]
    NoActiveTicketTypes,
}
