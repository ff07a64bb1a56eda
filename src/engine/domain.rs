use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a ticket type record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketTypeId(pub u64);

/// Identifier of a validation rule record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

/// Identifier of a curated test template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub u64);

/// A category of service request with its own keyword signature.
///
/// Keywords prefixed with `-` are negative: a match subtracts from the
/// type's score instead of adding to it. A keyword and its negative
/// counterpart are independent entries, each with its own weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub detection_keywords: Vec<String>,
    /// Per-keyword weights keyed by the keyword including its sign marker.
    #[serde(default)]
    pub keyword_weights: BTreeMap<String, f64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl TicketType {
    /// Weight for a keyword (key includes the sign marker), defaulting to 1.0.
    pub fn keyword_weight(&self, keyword: &str) -> f64 {
        self.keyword_weights
            .get(&keyword.to_lowercase())
            .copied()
            .unwrap_or(1.0)
    }
}

/// Evaluation strategy a validation rule uses.
///
/// Unknown tags in configuration data deserialize to [`RuleKind::Custom`],
/// which always passes with a logged warning, so kinds introduced by data
/// alone cannot block every ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Pattern found anywhere in the text.
    Regex,
    /// Pattern NOT found anywhere in the text.
    RegexNotMatch,
    /// Pattern matches the entire text.
    RegexFullmatch,
    /// Pattern does NOT match the entire text.
    RegexNotFullmatch,
    /// First capture group extracts an address checked against FIAS.
    FiasCheck,
    /// Reserved extension point; passes with a logged warning.
    #[serde(other)]
    Custom,
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Regex => "regex",
            RuleKind::RegexNotMatch => "regex_not_match",
            RuleKind::RegexFullmatch => "regex_fullmatch",
            RuleKind::RegexNotFullmatch => "regex_not_fullmatch",
            RuleKind::FiasCheck => "fias_check",
            RuleKind::Custom => "custom",
        }
    }
}

/// A single validation rule as configured by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: RuleId,
    pub name: String,
    /// Semantics depend on [`RuleKind`]; a regex for every current kind.
    pub pattern: String,
    pub kind: RuleKind,
    /// Shown to the user verbatim when the rule fails.
    pub error_message: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Higher priority rules are evaluated and reported first. Every active
    /// rule is always evaluated; priority never short-circuits.
    #[serde(default)]
    pub priority: i32,
}

/// A curated ticket text used for rule regression testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTemplate {
    pub id: TemplateId,
    pub name: String,
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Expected outcome for one (template, rule) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExpectation {
    pub rule_id: RuleId,
    pub expect_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A rule that failed during evaluation, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRule {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub error_message: String,
}

/// A rule that passed during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassedRule {
    pub rule_id: RuleId,
    pub rule_name: String,
}

/// Outcome of validating a single ticket text.
///
/// Produced fresh per call and never persisted by the engine; storage and
/// user notification are the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub detected_type: Option<TicketType>,
    /// Failed rules in evaluation order (priority descending, id ascending).
    pub failed_rules: Vec<FailedRule>,
    pub passed_rules: Vec<PassedRule>,
    pub rules_evaluated: usize,
}

impl ValidationResult {
    pub fn detected_type_name(&self) -> Option<&str> {
        self.detected_type.as_ref().map(|tt| tt.name.as_str())
    }

    /// Verbatim error messages of the failed rules, in evaluation order.
    pub fn error_messages(&self) -> Vec<&str> {
        self.failed_rules
            .iter()
            .map(|failed| failed.error_message.as_str())
            .collect()
    }
}

fn default_active() -> bool {
    true
}
