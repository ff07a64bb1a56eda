//! Regression testing of validation rules against curated template texts.
//!
//! A template test evaluates the template against exactly the rules named
//! by its expectations, not the type-detected subset, and compares each
//! actual pass/fail with the expected one. Results form an audit trail of
//! rule behavior over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{
    EngineError, RuleId, TemplateId, TestTemplate, ValidationEngine, ValidationRule,
};
use crate::store::RuleStore;

/// Comparison of one expectation with the observed rule outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationOutcome {
    pub rule_id: RuleId,
    pub rule_name: Option<String>,
    pub expect_pass: bool,
    /// Observed result; absent when the referenced rule no longer exists.
    pub actual_pass: Option<bool>,
    pub detail: ExpectationDetail,
}

impl ExpectationOutcome {
    pub fn matched(&self) -> bool {
        self.detail == ExpectationDetail::Match
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationDetail {
    Match,
    Mismatch,
    /// The referenced rule no longer exists or is inactive. Counted as a
    /// mismatch so drift between rules and test coverage cannot hide.
    RuleMissing,
}

/// Result of running one template test; immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateTestResult {
    pub template_id: TemplateId,
    pub template_name: String,
    pub rules_tested: usize,
    pub rules_matched: usize,
    pub rules_mismatched: usize,
    pub overall_pass: bool,
    pub details: Vec<ExpectationOutcome>,
    pub run_at: DateTime<Utc>,
}

/// Aggregate over a run of every active template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSuiteResult {
    pub total_templates: usize,
    pub templates_passed: usize,
    pub templates_failed: usize,
    pub all_passed: bool,
    pub results: Vec<TemplateTestResult>,
    pub run_at: DateTime<Utc>,
}

impl<S> ValidationEngine<S>
where
    S: RuleStore,
{
    /// Run a single template against the rules its expectations name.
    pub fn run_template_test(
        &self,
        template: &TestTemplate,
    ) -> Result<TemplateTestResult, EngineError> {
        let expectations = self.store().template_expectations(template.id)?;

        // Resolve each referenced rule; vanished or inactive rules become
        // explicit mismatches instead of silent skips.
        let mut resolvable: Vec<(ValidationRule, bool)> = Vec::new();
        let mut missing: Vec<ExpectationOutcome> = Vec::new();
        for expectation in &expectations {
            match self.store().rule_by_id(expectation.rule_id)? {
                Some(rule) if rule.active => {
                    resolvable.push((rule, expectation.expect_pass));
                }
                _ => {
                    warn!(
                        template = %template.name,
                        rule_id = expectation.rule_id.0,
                        "expectation references a missing or inactive rule"
                    );
                    missing.push(ExpectationOutcome {
                        rule_id: expectation.rule_id,
                        rule_name: None,
                        expect_pass: expectation.expect_pass,
                        actual_pass: None,
                        detail: ExpectationDetail::RuleMissing,
                    });
                }
            }
        }

        let rules: Vec<ValidationRule> = resolvable.iter().map(|(rule, _)| rule.clone()).collect();
        let evaluation = self.validate_against(&template.text, &rules, None);

        let mut details = Vec::with_capacity(expectations.len());
        for (rule, expect_pass) in &resolvable {
            let actual_pass = evaluation
                .passed_rules
                .iter()
                .any(|passed| passed.rule_id == rule.id);
            let detail = if actual_pass == *expect_pass {
                ExpectationDetail::Match
            } else {
                ExpectationDetail::Mismatch
            };
            details.push(ExpectationOutcome {
                rule_id: rule.id,
                rule_name: Some(rule.name.clone()),
                expect_pass: *expect_pass,
                actual_pass: Some(actual_pass),
                detail,
            });
        }
        details.extend(missing);

        let rules_matched = details.iter().filter(|outcome| outcome.matched()).count();
        let rules_mismatched = details.len() - rules_matched;

        Ok(TemplateTestResult {
            template_id: template.id,
            template_name: template.name.clone(),
            rules_tested: details.len(),
            rules_matched,
            rules_mismatched,
            overall_pass: rules_mismatched == 0,
            details,
            run_at: Utc::now(),
        })
    }

    /// Run every active template, aggregating a global pass/fail summary.
    pub fn run_all_template_tests(&self) -> Result<TemplateSuiteResult, EngineError> {
        let templates = self.store().active_templates()?;

        let mut results = Vec::with_capacity(templates.len());
        for template in &templates {
            results.push(self.run_template_test(template)?);
        }

        let templates_passed = results.iter().filter(|result| result.overall_pass).count();
        let templates_failed = results.len() - templates_passed;

        Ok(TemplateSuiteResult {
            total_templates: results.len(),
            templates_passed,
            templates_failed,
            all_passed: templates_failed == 0,
            results,
            run_at: Utc::now(),
        })
    }
}
