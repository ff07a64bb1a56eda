use regex::{Regex, RegexBuilder};
use tracing::warn;

use super::domain::{FailedRule, PassedRule, RuleId, RuleKind, ValidationRule};
use crate::fias::{AddressCheck, AddressProvider};

/// Outcome of evaluating one rule against one text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RuleOutcome {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub passed: bool,
    /// Message shown on failure; the configured `error_message` verbatim,
    /// or a synthesized one when the rule itself is misconfigured.
    pub failure_message: Option<String>,
}

impl RuleOutcome {
    pub fn failed_rule(&self) -> Option<FailedRule> {
        if self.passed {
            return None;
        }
        Some(FailedRule {
            rule_id: self.rule_id,
            rule_name: self.rule_name.clone(),
            error_message: self
                .failure_message
                .clone()
                .unwrap_or_else(|| "rule failed".to_string()),
        })
    }

    pub fn passed_rule(&self) -> Option<PassedRule> {
        if !self.passed {
            return None;
        }
        Some(PassedRule {
            rule_id: self.rule_id,
            rule_name: self.rule_name.clone(),
        })
    }
}

/// Evaluate every active rule against `text`, in priority order.
///
/// No short-circuiting: the caller gets all simultaneous problems. Inactive
/// rules are skipped entirely and do not count toward the evaluated total.
pub(crate) fn evaluate_rules(
    text: &str,
    rules: &[ValidationRule],
    provider: &dyn AddressProvider,
) -> Vec<RuleOutcome> {
    let mut ordered: Vec<&ValidationRule> = rules.iter().filter(|rule| rule.active).collect();
    // Higher priority first; ties resolved by rule id for stable reporting.
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    ordered
        .into_iter()
        .map(|rule| evaluate_rule(text, rule, provider))
        .collect()
}

fn evaluate_rule(text: &str, rule: &ValidationRule, provider: &dyn AddressProvider) -> RuleOutcome {
    let verdict = match rule.kind {
        RuleKind::Regex => regex_verdict(text, rule, false, false),
        RuleKind::RegexNotMatch => regex_verdict(text, rule, true, false),
        RuleKind::RegexFullmatch => regex_verdict(text, rule, false, true),
        RuleKind::RegexNotFullmatch => regex_verdict(text, rule, true, true),
        RuleKind::FiasCheck => fias_verdict(text, rule, provider),
        RuleKind::Custom => {
            warn!(
                rule = %rule.name,
                "custom rule kind has no handler, treating as passed"
            );
            Verdict::Pass
        }
    };

    match verdict {
        Verdict::Pass => RuleOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            passed: true,
            failure_message: None,
        },
        Verdict::Fail => RuleOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            passed: false,
            failure_message: Some(rule.error_message.clone()),
        },
        Verdict::Misconfigured(detail) => {
            warn!(rule = %rule.name, %detail, "rule is misconfigured, marking as failed");
            RuleOutcome {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                passed: false,
                failure_message: Some(format!("rule '{}' is misconfigured", rule.name)),
            }
        }
    }
}

enum Verdict {
    Pass,
    Fail,
    /// The pattern could not be compiled or used; never aborts the run.
    Misconfigured(String),
}

fn regex_verdict(text: &str, rule: &ValidationRule, negate: bool, full: bool) -> Verdict {
    let regex = match build_regex(&rule.pattern, full) {
        Ok(regex) => regex,
        Err(err) => return Verdict::Misconfigured(err.to_string()),
    };

    let matched = regex.is_match(text);
    if matched != negate {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

fn fias_verdict(text: &str, rule: &ValidationRule, provider: &dyn AddressProvider) -> Verdict {
    let regex = match build_regex(&rule.pattern, false) {
        Ok(regex) => regex,
        Err(err) => return Verdict::Misconfigured(err.to_string()),
    };

    // The first capture group extracts the candidate address; if extraction
    // fails the rule fails without ever consulting the provider.
    let address = regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str().trim().to_string())
        .filter(|address| !address.is_empty());

    let address = match address {
        Some(address) => address,
        None => return Verdict::Fail,
    };

    match provider.check(&address) {
        AddressCheck::Found { .. } => Verdict::Pass,
        AddressCheck::NotFound => Verdict::Fail,
        AddressCheck::Unavailable { reason } => {
            warn!(
                rule = %rule.name,
                provider = provider.name(),
                %reason,
                "address provider unavailable, failing open"
            );
            Verdict::Pass
        }
    }
}

/// Compile a rule pattern with the engine's shared regex semantics:
/// case-insensitive, multi-line, dot matches newline. Full-match variants
/// anchor the pattern to the entire text.
fn build_regex(pattern: &str, full: bool) -> Result<Regex, regex::Error> {
    let effective = if full {
        format!(r"\A(?:{pattern})\z")
    } else {
        pattern.to_string()
    };

    RegexBuilder::new(&effective)
        .case_insensitive(true)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}
