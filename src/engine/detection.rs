use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::domain::TicketType;

/// One keyword that matched during detection, with its contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    /// Keyword without its sign marker.
    pub keyword: String,
    /// Non-overlapping occurrences found in the lowercased text.
    pub count: u32,
    pub weight: f64,
    pub is_negative: bool,
}

impl KeywordMatch {
    pub fn weighted_score(&self) -> f64 {
        let score = f64::from(self.count) * self.weight;
        if self.is_negative {
            -score
        } else {
            score
        }
    }
}

/// Score details for one ticket type during a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeScore {
    pub type_name: String,
    pub total_score: f64,
    pub matches: Vec<KeywordMatch>,
    /// Positive keywords that matched; negative matches are excluded even
    /// though they affect the score.
    pub matched_keywords: usize,
    pub total_keywords: usize,
}

impl TypeScore {
    pub fn match_percentage(&self) -> f64 {
        if self.total_keywords == 0 {
            return 0.0;
        }
        (self.matched_keywords as f64 / self.total_keywords as f64) * 100.0
    }
}

/// Diagnostic report for a detection run, for admin-facing output only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub detected_type_name: Option<String>,
    pub scores: Vec<TypeScore>,
    pub text_preview: String,
    pub types_evaluated: usize,
    /// Names of every type sharing the winning score when more than one did.
    pub ambiguous_types: Vec<String>,
}

impl DetectionReport {
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous_types.len() > 1
    }

    /// Human-readable summary of the detection run.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        match &self.detected_type_name {
            Some(name) => {
                let _ = writeln!(out, "detected type: {name}");
            }
            None => {
                let _ = writeln!(out, "no type detected");
            }
        }
        if self.is_ambiguous() {
            let _ = writeln!(
                out,
                "warning: multiple types share the winning score: {}",
                self.ambiguous_types.join(", ")
            );
        }
        let _ = writeln!(out, "types evaluated: {}", self.types_evaluated);

        let mut ordered: Vec<&TypeScore> = self.scores.iter().collect();
        ordered.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for score in ordered {
            let _ = writeln!(
                out,
                "{}: score {:.2}, keywords {}/{} ({:.1}%)",
                score.type_name,
                score.total_score,
                score.matched_keywords,
                score.total_keywords,
                score.match_percentage()
            );
            for matched in &score.matches {
                let sign = if matched.is_negative { '-' } else { '+' };
                let _ = writeln!(
                    out,
                    "  {sign} '{}': {}x weight {:.2} -> {:.2}",
                    matched.keyword,
                    matched.count,
                    matched.weight,
                    matched.weighted_score()
                );
            }
        }
        out
    }
}

const NEGATIVE_MARKER: char = '-';
const PREVIEW_CHARS: usize = 200;

/// Detect the best-matching ticket type for `text`.
///
/// Scores every active type and selects the strictly highest total, only
/// when that total is greater than zero. When two or more types share the
/// winning score the first one in the supplied list wins; callers that need
/// stable results must keep the list order stable.
pub fn detect_ticket_type<'a>(
    text: &str,
    ticket_types: &'a [TicketType],
    weight_overrides: Option<&BTreeMap<String, f64>>,
) -> Option<&'a TicketType> {
    detect_with_report(text, ticket_types, weight_overrides).0
}

/// Detection with a full per-type diagnostic report.
pub fn detect_with_report<'a>(
    text: &str,
    ticket_types: &'a [TicketType],
    weight_overrides: Option<&BTreeMap<String, f64>>,
) -> (Option<&'a TicketType>, DetectionReport) {
    let overrides: BTreeMap<String, f64> = weight_overrides
        .map(|weights| {
            weights
                .iter()
                .map(|(key, value)| (key.to_lowercase(), *value))
                .collect()
        })
        .unwrap_or_default();

    let text_lower = text.to_lowercase();

    let mut best: Option<(&TicketType, f64)> = None;
    let mut ambiguous: Vec<String> = Vec::new();
    let mut scores = Vec::new();
    let mut types_evaluated = 0;

    for ticket_type in ticket_types {
        if !ticket_type.active {
            continue;
        }
        types_evaluated += 1;

        let score = score_type(&text_lower, ticket_type, &overrides);
        let total = score.total_score;

        if total > 0.0 {
            match best {
                Some((_, best_score)) if total > best_score => {
                    best = Some((ticket_type, total));
                    ambiguous = vec![ticket_type.name.clone()];
                }
                Some((_, best_score)) if total == best_score => {
                    ambiguous.push(ticket_type.name.clone());
                }
                None => {
                    best = Some((ticket_type, total));
                    ambiguous = vec![ticket_type.name.clone()];
                }
                _ => {}
            }
        }

        scores.push(score);
    }

    let detected = best.map(|(ticket_type, _)| ticket_type);
    let report = DetectionReport {
        detected_type_name: detected.map(|tt| tt.name.clone()),
        scores,
        text_preview: text.chars().take(PREVIEW_CHARS).collect(),
        types_evaluated,
        ambiguous_types: ambiguous,
    };

    (detected, report)
}

fn score_type(
    text_lower: &str,
    ticket_type: &TicketType,
    overrides: &BTreeMap<String, f64>,
) -> TypeScore {
    let mut total = 0.0;
    let mut matches = Vec::new();
    let mut matched_keywords = 0;

    for keyword in &ticket_type.detection_keywords {
        let is_negative = keyword.starts_with(NEGATIVE_MARKER);
        let bare = if is_negative { &keyword[1..] } else { keyword };
        let bare_lower = bare.to_lowercase();
        if bare_lower.is_empty() {
            continue;
        }

        let count = text_lower.matches(bare_lower.as_str()).count() as u32;

        // The weight key keeps the sign marker so a keyword and its negative
        // counterpart carry independent weights.
        let weight_key = keyword.to_lowercase();
        let weight = overrides
            .get(&weight_key)
            .copied()
            .unwrap_or_else(|| ticket_type.keyword_weight(&weight_key));

        let matched = KeywordMatch {
            keyword: bare.to_string(),
            count,
            weight,
            is_negative,
        };
        total += matched.weighted_score();

        if count > 0 {
            if !is_negative {
                matched_keywords += 1;
            }
            matches.push(matched);
        }
    }

    TypeScore {
        type_name: ticket_type.name.clone(),
        total_score: total,
        matches,
        matched_keywords,
        total_keywords: ticket_type.detection_keywords.len(),
    }
}
