//! Read-only boundary to the rule/type configuration owned by the admin
//! collaborator. The engine reads a fresh snapshot per call so rule edits
//! take effect on the next validation without a restart.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{
    RuleExpectation, RuleId, TemplateId, TestTemplate, TicketType, TicketTypeId, ValidationRule,
};

/// Storage abstraction so the engine can be exercised against any backend.
pub trait RuleStore: Send + Sync {
    fn active_ticket_types(&self) -> Result<Vec<TicketType>, StoreError>;
    /// Active rules bound to a ticket type, or the full active set when
    /// no type is given.
    fn active_rules(&self, ticket_type: Option<TicketTypeId>)
        -> Result<Vec<ValidationRule>, StoreError>;
    fn rule_by_id(&self, rule: RuleId) -> Result<Option<ValidationRule>, StoreError>;
    fn active_templates(&self) -> Result<Vec<TestTemplate>, StoreError>;
    fn template_expectations(&self, template: TemplateId)
        -> Result<Vec<RuleExpectation>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unable to read rule snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("rule snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Binding between a ticket type and a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBinding {
    pub ticket_type_id: TicketTypeId,
    pub rule_id: RuleId,
}

/// Expectation record as stored, carrying its template reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationRecord {
    pub template_id: TemplateId,
    pub rule_id: RuleId,
    pub expect_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Full configuration snapshot as serialized to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSnapshot {
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
    #[serde(default)]
    pub rule_bindings: Vec<RuleBinding>,
    #[serde(default)]
    pub templates: Vec<TestTemplate>,
    #[serde(default)]
    pub expectations: Vec<ExpectationRecord>,
}

impl RuleSnapshot {
    fn active_ticket_types(&self) -> Vec<TicketType> {
        self.ticket_types
            .iter()
            .filter(|tt| tt.active)
            .cloned()
            .collect()
    }

    fn active_rules(&self, ticket_type: Option<TicketTypeId>) -> Vec<ValidationRule> {
        match ticket_type {
            Some(type_id) => {
                let bound: BTreeSet<RuleId> = self
                    .rule_bindings
                    .iter()
                    .filter(|binding| binding.ticket_type_id == type_id)
                    .map(|binding| binding.rule_id)
                    .collect();
                self.rules
                    .iter()
                    .filter(|rule| rule.active && bound.contains(&rule.id))
                    .cloned()
                    .collect()
            }
            None => self
                .rules
                .iter()
                .filter(|rule| rule.active)
                .cloned()
                .collect(),
        }
    }

    fn template_expectations(&self, template: TemplateId) -> Vec<RuleExpectation> {
        // At most one expectation per (template, rule) pair; duplicates keep
        // the first occurrence.
        let mut seen: BTreeSet<RuleId> = BTreeSet::new();
        let mut expectations = Vec::new();
        for record in self
            .expectations
            .iter()
            .filter(|record| record.template_id == template)
        {
            if !seen.insert(record.rule_id) {
                warn!(
                    template_id = template.0,
                    rule_id = record.rule_id.0,
                    "duplicate expectation for template, keeping the first"
                );
                continue;
            }
            expectations.push(RuleExpectation {
                rule_id: record.rule_id,
                expect_pass: record.expect_pass,
                note: record.note.clone(),
            });
        }
        expectations
    }
}

/// Store backed by a JSON snapshot file.
///
/// The file is reread on every call, preserving the fresh-read-per-call
/// contract: an edited snapshot applies to the very next validation.
#[derive(Debug, Clone)]
pub struct JsonRuleStore {
    path: PathBuf,
}

impl JsonRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<RuleSnapshot, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl RuleStore for JsonRuleStore {
    fn active_ticket_types(&self) -> Result<Vec<TicketType>, StoreError> {
        Ok(self.load()?.active_ticket_types())
    }

    fn active_rules(
        &self,
        ticket_type: Option<TicketTypeId>,
    ) -> Result<Vec<ValidationRule>, StoreError> {
        Ok(self.load()?.active_rules(ticket_type))
    }

    fn rule_by_id(&self, rule: RuleId) -> Result<Option<ValidationRule>, StoreError> {
        Ok(self
            .load()?
            .rules
            .into_iter()
            .find(|candidate| candidate.id == rule))
    }

    fn active_templates(&self) -> Result<Vec<TestTemplate>, StoreError> {
        Ok(self
            .load()?
            .templates
            .into_iter()
            .filter(|template| template.active)
            .collect())
    }

    fn template_expectations(
        &self,
        template: TemplateId,
    ) -> Result<Vec<RuleExpectation>, StoreError> {
        Ok(self.load()?.template_expectations(template))
    }
}

/// Store serving a fixed in-memory snapshot, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleStore {
    snapshot: RuleSnapshot,
}

impl InMemoryRuleStore {
    pub fn new(snapshot: RuleSnapshot) -> Self {
        Self { snapshot }
    }
}

impl RuleStore for InMemoryRuleStore {
    fn active_ticket_types(&self) -> Result<Vec<TicketType>, StoreError> {
        Ok(self.snapshot.active_ticket_types())
    }

    fn active_rules(
        &self,
        ticket_type: Option<TicketTypeId>,
    ) -> Result<Vec<ValidationRule>, StoreError> {
        Ok(self.snapshot.active_rules(ticket_type))
    }

    fn rule_by_id(&self, rule: RuleId) -> Result<Option<ValidationRule>, StoreError> {
        Ok(self
            .snapshot
            .rules
            .iter()
            .find(|candidate| candidate.id == rule)
            .cloned())
    }

    fn active_templates(&self) -> Result<Vec<TestTemplate>, StoreError> {
        Ok(self
            .snapshot
            .templates
            .iter()
            .filter(|template| template.active)
            .cloned()
            .collect())
    }

    fn template_expectations(
        &self,
        template: TemplateId,
    ) -> Result<Vec<RuleExpectation>, StoreError> {
        Ok(self.snapshot.template_expectations(template))
    }
}
