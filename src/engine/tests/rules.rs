use super::common::{engine_with, rule, StaticProvider};
use crate::engine::domain::{RuleId, RuleKind};
use crate::engine::rules::evaluate_rules;
use crate::fias::AddressCheck;
use crate::store::RuleSnapshot;

fn provider_found() -> std::sync::Arc<StaticProvider> {
    StaticProvider::new(AddressCheck::Found { matched: None })
}

#[test]
fn regex_passes_on_search_match_anywhere() {
    let rules = vec![rule(1, "has-inn", RuleKind::Regex, r"ИНН\s*\d{10}")];
    let provider = provider_found();

    let outcomes = evaluate_rules("Новый клиент, ИНН 1234567890, срочно", &rules, provider.as_ref());

    assert!(outcomes[0].passed);
}

#[test]
fn regex_not_match_fails_when_pattern_present() {
    let rules = vec![rule(1, "no-test-data", RuleKind::RegexNotMatch, r"тест")];
    let provider = provider_found();

    let outcomes = evaluate_rules("это тестовая заявка", &rules, provider.as_ref());

    assert!(!outcomes[0].passed);
    assert_eq!(
        outcomes[0].failure_message.as_deref(),
        Some("no-test-data failed")
    );
}

#[test]
fn regex_fullmatch_requires_entire_text() {
    // Worked example from the contract: "1234567890" passes, a prefixed
    // variant does not.
    let rules = vec![rule(1, "inn-only", RuleKind::RegexFullmatch, r"\d{10}")];
    let provider = provider_found();

    let pass = evaluate_rules("1234567890", &rules, provider.as_ref());
    let fail = evaluate_rules("ИНН 1234567890", &rules, provider.as_ref());

    assert!(pass[0].passed);
    assert!(!fail[0].passed);
}

#[test]
fn regex_not_fullmatch_inverts_the_anchor() {
    let rules = vec![rule(1, "not-bare-inn", RuleKind::RegexNotFullmatch, r"\d{10}")];
    let provider = provider_found();

    let pass = evaluate_rules("ИНН 1234567890", &rules, provider.as_ref());
    let fail = evaluate_rules("1234567890", &rules, provider.as_ref());

    assert!(pass[0].passed);
    assert!(!fail[0].passed);
}

#[test]
fn patterns_are_case_insensitive() {
    let rules = vec![rule(1, "address", RuleKind::Regex, r"адрес установки")];
    let provider = provider_found();

    let outcomes = evaluate_rules("АДРЕС УСТАНОВКИ: Москва", &rules, provider.as_ref());

    assert!(outcomes[0].passed);
}

#[test]
fn malformed_pattern_fails_the_rule_and_continues() {
    let rules = vec![
        rule(1, "broken", RuleKind::Regex, r"(["),
        rule(2, "fine", RuleKind::Regex, r"касса"),
    ];
    let provider = provider_found();

    let outcomes = evaluate_rules("касса не работает", &rules, provider.as_ref());

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].passed);
    assert_eq!(
        outcomes[0].failure_message.as_deref(),
        Some("rule 'broken' is misconfigured")
    );
    assert!(outcomes[1].passed);
}

#[test]
fn custom_kind_always_passes() {
    let rules = vec![rule(1, "future", RuleKind::Custom, "")];
    let provider = provider_found();

    let outcomes = evaluate_rules("любой текст", &rules, provider.as_ref());

    assert!(outcomes[0].passed);
}

#[test]
fn unknown_kind_tag_deserializes_to_custom() {
    let raw = r#"{
        "id": 7,
        "name": "novel",
        "pattern": "",
        "kind": "llm_check",
        "error_message": "never shown"
    }"#;

    let parsed: crate::engine::domain::ValidationRule =
        serde_json::from_str(raw).expect("unknown kind parses");

    assert_eq!(parsed.kind, RuleKind::Custom);
}

#[test]
fn every_active_rule_is_evaluated_without_short_circuit() {
    let mut failing_first = rule(1, "first", RuleKind::Regex, r"отсутствует");
    failing_first.priority = 10;
    let rules = vec![
        failing_first,
        rule(2, "second", RuleKind::Regex, r"касса"),
        rule(3, "third", RuleKind::RegexNotMatch, r"касса"),
    ];
    let provider = provider_found();

    let outcomes = evaluate_rules("касса", &rules, provider.as_ref());

    let passed = outcomes.iter().filter(|o| o.passed).count();
    let failed = outcomes.iter().filter(|o| !o.passed).count();
    assert_eq!(passed + failed, 3);
    assert_eq!(failed, 2);
}

#[test]
fn rules_are_ordered_by_priority_then_id() {
    let mut low = rule(5, "low", RuleKind::Regex, r"x");
    low.priority = 1;
    let mut high = rule(9, "high", RuleKind::Regex, r"x");
    high.priority = 10;
    let mut high_earlier_id = rule(3, "high-early", RuleKind::Regex, r"x");
    high_earlier_id.priority = 10;

    let provider = provider_found();
    let outcomes = evaluate_rules("x", &[low, high, high_earlier_id], provider.as_ref());

    let order: Vec<u64> = outcomes.iter().map(|o| o.rule_id.0).collect();
    assert_eq!(order, vec![3, 9, 5]);
}

#[test]
fn inactive_rules_are_not_evaluated() {
    let mut off = rule(1, "off", RuleKind::Regex, r"x");
    off.active = false;
    let on = rule(2, "on", RuleKind::Regex, r"x");

    let provider = provider_found();
    let outcomes = evaluate_rules("x", &[off, on], provider.as_ref());

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].rule_id, RuleId(2));
}

#[test]
fn fias_rule_passes_when_provider_finds_address() {
    let rules = vec![rule(
        1,
        "fias",
        RuleKind::FiasCheck,
        r"Адрес установки:\s*(.+)",
    )];
    let provider = provider_found();

    let outcomes = evaluate_rules(
        "Адрес установки: Москва, ул Льва Толстого 16",
        &rules,
        provider.as_ref(),
    );

    assert!(outcomes[0].passed);
    assert_eq!(provider.call_count(), 1);
}

#[test]
fn fias_rule_fails_when_address_not_found() {
    let rules = vec![rule(
        1,
        "fias",
        RuleKind::FiasCheck,
        r"Адрес установки:\s*(.+)",
    )];
    let provider = StaticProvider::new(AddressCheck::NotFound);

    let outcomes = evaluate_rules(
        "Адрес установки: пр. Несуществующий 99",
        &rules,
        provider.as_ref(),
    );

    assert!(!outcomes[0].passed);
    assert_eq!(outcomes[0].failure_message.as_deref(), Some("fias failed"));
}

#[test]
fn fias_extraction_failure_skips_the_provider_entirely() {
    let rules = vec![rule(
        1,
        "fias",
        RuleKind::FiasCheck,
        r"Адрес установки:\s*(.+)",
    )];
    let provider = provider_found();

    let outcomes = evaluate_rules("заявка без адреса", &rules, provider.as_ref());

    assert!(!outcomes[0].passed);
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn fias_pattern_without_capture_group_fails_without_provider_call() {
    let rules = vec![rule(1, "fias", RuleKind::FiasCheck, r"Адрес установки:.+")];
    let provider = provider_found();

    let outcomes = evaluate_rules("Адрес установки: Москва", &rules, provider.as_ref());

    assert!(!outcomes[0].passed);
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn fias_fails_open_when_provider_is_unavailable() {
    let rules = vec![rule(
        1,
        "fias",
        RuleKind::FiasCheck,
        r"Адрес установки:\s*(.+)",
    )];
    let provider = StaticProvider::new(AddressCheck::Unavailable {
        reason: "simulated outage".to_string(),
    });

    let outcomes = evaluate_rules("Адрес установки: Москва", &rules, provider.as_ref());

    assert!(outcomes[0].passed);
    assert_eq!(provider.call_count(), 1);
}

#[test]
fn validate_against_reports_verbatim_error_messages_in_priority_order() {
    let mut urgent = rule(2, "urgent", RuleKind::Regex, r"недостижимо");
    urgent.priority = 100;
    urgent.error_message = "Укажите контактный телефон".to_string();
    let mut minor = rule(1, "minor", RuleKind::Regex, r"недостижимо");
    minor.priority = 1;
    minor.error_message = "Укажите адрес".to_string();

    let engine = engine_with(RuleSnapshot::default(), provider_found());
    let result = engine.validate_against("текст заявки", &[minor.clone(), urgent.clone()], None);

    assert!(!result.is_valid);
    assert_eq!(result.rules_evaluated, 2);
    assert_eq!(
        result.error_messages(),
        vec!["Укажите контактный телефон", "Укажите адрес"]
    );
    assert_eq!(
        result.failed_rules.len() + result.passed_rules.len(),
        result.rules_evaluated
    );
}
