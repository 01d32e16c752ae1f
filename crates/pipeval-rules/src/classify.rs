//! Stage and funnel classification.

use pipeval_core::{keys, Funnel, Record, Scope};
use pipeval_normalize::fold_text;

/// Folded stage names that are not part of the tracked pipeline; such rows are dropped.
const EXCLUDED_STAGES: &[&str] = &[
    "contato inicial",
    "primeiro contato",
    "descartado",
    "descartados",
    "suspenso",
    "suspensos",
    "arquivado",
];

const ONBOARDING_KEYWORDS: &[&str] = &["onboarding", "kickoff", "kick off", "boas vindas", "implantacao"];

const SALES_KEYWORDS: &[&str] = &["venda", "comercial", "sales"];

/// A stage matches a pattern when every token of the pattern occurs in the folded stage.
const PROPOSAL_PATTERNS: &[&[&str]] = &[&["elaboracao", "proposta"], &["proposal", "draft"]];

const CONTRACT_PATTERNS: &[&[&str]] = &[&["elaboracao", "contrato"], &["contract", "draft"]];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub stage: String,
    pub funnel: Funnel,
    pub scopes: Vec<Scope>,
}

pub fn stage_of(record: &Record) -> &str {
    record.first_of(&[keys::STAGE_NAME, "stage"])
}

pub fn is_excluded_stage(stage: &str) -> bool {
    let folded = fold_text(stage);
    EXCLUDED_STAGES.contains(&folded.as_str())
}

fn contains_any(folded: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| folded.contains(needle))
}

/// Explicit `funil` wins; otherwise guess from the stage name, defaulting to sales.
pub fn infer_funnel(record: &Record, stage: &str) -> Funnel {
    let explicit = record.get(keys::FUNIL);
    if !explicit.is_empty() {
        let folded = fold_text(explicit);
        return if contains_any(&folded, ONBOARDING_KEYWORDS) {
            Funnel::Onboarding
        } else if contains_any(&folded, SALES_KEYWORDS) {
            Funnel::Sales
        } else {
            Funnel::Other(explicit.to_string())
        };
    }

    if contains_any(&fold_text(stage), ONBOARDING_KEYWORDS) {
        Funnel::Onboarding
    } else {
        Funnel::Sales
    }
}

fn matches_any_pattern(folded_stage: &str, patterns: &[&[&str]]) -> bool {
    patterns
        .iter()
        .any(|tokens| tokens.iter().all(|token| folded_stage.contains(token)))
}

pub fn applicable_scopes(stage: &str, funnel: &Funnel) -> Vec<Scope> {
    let folded = fold_text(stage);
    let mut scopes = Vec::new();
    if *funnel == Funnel::Sales {
        scopes.push(Scope::General);
    }
    if matches_any_pattern(&folded, PROPOSAL_PATTERNS) {
        scopes.push(Scope::Proposal);
    }
    if matches_any_pattern(&folded, CONTRACT_PATTERNS) {
        scopes.push(Scope::Contract);
    }
    scopes
}

/// `None` when the row sits in an excluded stage.
pub fn classify(record: &Record) -> Option<Classification> {
    let stage = stage_of(record);
    if is_excluded_stage(stage) {
        return None;
    }
    let funnel = infer_funnel(record, stage);
    let scopes = applicable_scopes(stage, &funnel);
    Some(Classification {
        stage: stage.to_string(),
        funnel,
        scopes,
    })
}
