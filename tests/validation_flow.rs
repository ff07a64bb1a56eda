use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use ticket_triage::engine::{
    EngineError, RuleId, RuleKind, TemplateId, TestTemplate, TicketType, TicketTypeId,
    ValidationEngine, ValidationRule,
};
use ticket_triage::fias::{AddressCheck, AddressProvider};
use ticket_triage::store::{
    InMemoryRuleStore, JsonRuleStore, RuleBinding, RuleSnapshot,
};

struct OfflineProvider;

impl AddressProvider for OfflineProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn check(&self, _address: &str) -> AddressCheck {
        AddressCheck::Unavailable {
            reason: "offline in tests".to_string(),
        }
    }
}

fn ticket_type(id: u64, name: &str, keywords: &[&str]) -> TicketType {
    TicketType {
        id: TicketTypeId(id),
        name: name.to_string(),
        description: String::new(),
        detection_keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        keyword_weights: BTreeMap::new(),
        active: true,
    }
}

fn rule(id: u64, name: &str, kind: RuleKind, pattern: &str, message: &str) -> ValidationRule {
    ValidationRule {
        id: RuleId(id),
        name: name.to_string(),
        pattern: pattern.to_string(),
        kind,
        error_message: message.to_string(),
        active: true,
        priority: 0,
    }
}

fn snapshot() -> RuleSnapshot {
    RuleSnapshot {
        ticket_types: vec![
            ticket_type(1, "Установка", &["установка", "-ремонт"]),
            ticket_type(2, "Ремонт", &["ремонт"]),
        ],
        rules: vec![
            rule(
                10,
                "has-inn",
                RuleKind::Regex,
                r"ИНН\s*\d{10}",
                "Укажите ИНН организации",
            ),
            rule(
                11,
                "has-phone",
                RuleKind::Regex,
                r"\+7\d{10}",
                "Укажите контактный телефон",
            ),
            rule(
                12,
                "no-test-marker",
                RuleKind::RegexNotMatch,
                r"тестовая заявка",
                "Уберите пометку о тестовой заявке",
            ),
        ],
        rule_bindings: vec![
            RuleBinding {
                ticket_type_id: TicketTypeId(1),
                rule_id: RuleId(10),
            },
            RuleBinding {
                ticket_type_id: TicketTypeId(1),
                rule_id: RuleId(11),
            },
        ],
        templates: vec![TestTemplate {
            id: TemplateId(1),
            name: "установка".to_string(),
            text: "Установка. ИНН 1234567890 +79991234567".to_string(),
            active: true,
        }],
        expectations: Vec::new(),
    }
}

fn engine(snapshot: RuleSnapshot) -> ValidationEngine<InMemoryRuleStore> {
    ValidationEngine::new(
        Arc::new(InMemoryRuleStore::new(snapshot)),
        Arc::new(OfflineProvider),
    )
}

#[test]
fn detected_type_limits_rules_to_its_bindings() {
    let engine = engine(snapshot());

    let result = engine
        .validate_ticket("Установка терминала. ИНН 1234567890, тел +79991234567")
        .expect("validation runs");

    assert_eq!(result.detected_type_name(), Some("Установка"));
    // Only the two bound rules run, not the unbound third one.
    assert_eq!(result.rules_evaluated, 2);
    assert!(result.is_valid);
}

#[test]
fn undetected_type_falls_back_to_the_full_rule_set() {
    let engine = engine(snapshot());

    let result = engine
        .validate_ticket("ничего похожего на ключевые слова")
        .expect("validation runs");

    assert!(result.detected_type.is_none());
    assert_eq!(result.rules_evaluated, 3);
    assert!(!result.is_valid);
    assert_eq!(result.failed_rules.len(), 2);
}

#[test]
fn failed_rules_surface_configured_messages_verbatim() {
    let engine = engine(snapshot());

    let result = engine
        .validate_ticket("Установка кассы без реквизитов")
        .expect("validation runs");

    assert!(!result.is_valid);
    assert!(result
        .error_messages()
        .contains(&"Укажите ИНН организации"));
    assert!(result
        .error_messages()
        .contains(&"Укажите контактный телефон"));
}

#[test]
fn validation_is_a_pure_function_of_its_inputs() {
    let engine = engine(snapshot());
    let text = "Установка. ИНН 1234567890";

    let first = engine.validate_ticket(text).expect("first run");
    let second = engine.validate_ticket(text).expect("second run");

    assert_eq!(first, second);
    assert_eq!(
        first.failed_rules.len() + first.passed_rules.len(),
        first.rules_evaluated
    );
}

#[test]
fn empty_type_list_is_a_deployment_error() {
    let engine = engine(RuleSnapshot::default());

    let result = engine.validate_ticket("любой текст");

    assert!(matches!(result, Err(EngineError::NoActiveTicketTypes)));
}

#[test]
fn fias_outage_does_not_block_submission() {
    let mut snapshot = snapshot();
    snapshot.rules.push(rule(
        13,
        "fias-address",
        RuleKind::FiasCheck,
        r"Адрес:\s*(.+)",
        "Адрес не найден в ФИАС",
    ));

    let engine = engine(snapshot);
    let result = engine
        .validate_ticket("Адрес: Москва, ул Льва Толстого 16")
        .expect("validation runs");

    // The provider is offline; the fias rule must fail open.
    assert!(!result
        .error_messages()
        .contains(&"Адрес не найден в ФИАС"));
}

#[test]
fn json_store_rereads_the_snapshot_on_every_call() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("rules.json");

    let initial = snapshot();
    std::fs::write(
        &path,
        serde_json::to_string(&initial).expect("snapshot serializes"),
    )
    .expect("snapshot written");

    let engine = ValidationEngine::new(
        Arc::new(JsonRuleStore::new(&path)),
        Arc::new(OfflineProvider),
    );

    let before = engine
        .validate_ticket("Установка без реквизитов")
        .expect("first validation");
    assert!(!before.is_valid);

    // Deactivate every rule; the edit must apply to the very next call.
    let mut edited = initial;
    for rule in &mut edited.rules {
        rule.active = false;
    }
    let mut file = std::fs::File::create(&path).expect("snapshot reopened");
    file.write_all(
        serde_json::to_string(&edited)
            .expect("snapshot serializes")
            .as_bytes(),
    )
    .expect("snapshot rewritten");

    let after = engine
        .validate_ticket("Установка без реквизитов")
        .expect("second validation");
    assert!(after.is_valid);
    assert_eq!(after.rules_evaluated, 0);
}
