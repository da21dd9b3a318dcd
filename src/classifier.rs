use regex::RegexBuilder;

use crate::models::{ExpenseType, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Contains,
    StartsWith,
    Regex,
}

/// Maps free-text type tags onto the canonical vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRule {
    pub pattern: String,
    pub match_type: MatchType,
    pub kind: ExpenseType,
}

impl TypeRule {
    pub fn new(pattern: &str, match_type: MatchType, kind: ExpenseType) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_type,
            kind,
        }
    }
}

/// Infers a type from the category when the tag alone says nothing useful.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub pattern: String,
    pub kind: ExpenseType,
}

impl CategoryRule {
    pub fn new(pattern: &str, kind: ExpenseType) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }
}

fn matches(text: &str, pattern: &str, match_type: MatchType) -> bool {
    let text_lower = text.to_lowercase();
    let pat_lower = pattern.to_lowercase();
    match match_type {
        MatchType::Contains => !pat_lower.is_empty() && text_lower.contains(&pat_lower),
        MatchType::StartsWith => !pat_lower.is_empty() && text_lower.starts_with(&pat_lower),
        MatchType::Regex => RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(text))
            .unwrap_or(false),
    }
}

/// First matching rule wins; no tag or no match is `Unclassified`.
pub fn classify(tag: Option<&str>, rules: &[TypeRule]) -> ExpenseType {
    let Some(tag) = tag else {
        return ExpenseType::Unclassified;
    };
    rules
        .iter()
        .find(|r| r.kind.is_classified() && matches(tag, &r.pattern, r.match_type))
        .map(|r| r.kind)
        .unwrap_or(ExpenseType::Unclassified)
}

pub fn classify_category(category: &str, rules: &[CategoryRule]) -> Option<ExpenseType> {
    rules
        .iter()
        .find(|r| r.kind.is_classified() && matches(category, &r.pattern, MatchType::Contains))
        .map(|r| r.kind)
}

/// Overrides each record's type with the one implied by its category, when a
/// category rule matches. Records without a match keep their type.
pub fn infer_types_from_category(records: &mut [Record], rules: &[CategoryRule]) {
    for r in records.iter_mut() {
        if let Some(kind) = classify_category(&r.category, rules) {
            r.expense_type = kind;
        }
    }
}
