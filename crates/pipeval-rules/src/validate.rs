//! Stage-conditional rule scopes.
//!
//! Every check runs independently and appends at most one [`FieldError`]; nothing short-circuits.
//! Toggle keys are the canonical field keys below, grouped under the scope name.

use std::sync::LazyLock;

use pipeval_core::{keys, FieldError, Record, Scope};
use pipeval_normalize::fold_text;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::config::{RuleSettings, ValidationToggles};

/// Toggle key for the company-identification check (company name + tax id, or the company list).
pub const COMPANY_CHECK: &str = "empresa";

const PAYMENT_TYPES: &[&str] = &["mensal fixo", "exito", "spot", "hora trabalhada", "pro bono"];

const CURRENCY_FIELDS: &[(&str, &str)] = &[
    (keys::VALOR_MENSAL_FIXO_CC, "Valor mensal fixo (CC)"),
    (keys::VALOR_SPOT_CC, "Valor spot (CC)"),
    (keys::VALOR_EXITO_CC, "Valor de êxito (CC)"),
    (keys::VALOR_HORA_CC, "Valor hora (CC)"),
];

const SPLIT_FIELDS: &[(&str, &str)] = &[
    (keys::PERCENTUAL_ORIGINACAO, "Percentual de originação"),
    (keys::PERCENTUAL_EXECUCAO, "Percentual de execução"),
    (keys::PERCENTUAL_INDICACAO, "Percentual de indicação"),
];

const UNDEFINED_PLACEHOLDER: &str = "a definir";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:[0-9]{1,3}(?:\.[0-9]{3})+|[0-9]+)(?:,[0-9]{1,2})?|[0-9]+\.[0-9]{1,2})$").expect("valid currency regex")
});

static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+%$").expect("valid split regex"));

static DEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2})/([0-9]{2})/([0-9]{4})$").expect("valid deadline regex"));

/// Settings pre-folded for comparison.
#[derive(Debug, Clone)]
pub struct RuleSet {
    requesters: Vec<String>,
    requester_display: Vec<String>,
    deprecated_domain: String,
    current_domain: String,
    document_hosts: Vec<String>,
}

impl RuleSet {
    pub fn from_settings(settings: &RuleSettings) -> Self {
        let domain = |d: &str| d.trim().trim_start_matches('@').to_ascii_lowercase();
        Self {
            requesters: settings.requesters.iter().map(|n| fold_text(n)).collect(),
            requester_display: settings.requesters.clone(),
            deprecated_domain: domain(&settings.deprecated_email_domain),
            current_domain: domain(&settings.current_email_domain),
            document_hosts: settings
                .document_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_settings(&RuleSettings::default())
    }
}

struct ScopeRun<'a> {
    scope: Scope,
    toggles: &'a ValidationToggles,
    errors: &'a mut Vec<FieldError>,
}

impl ScopeRun<'_> {
    fn check(&mut self, field: &str, check: impl FnOnce() -> Option<FieldError>) {
        if !self.toggles.is_enabled(self.scope, field) {
            return;
        }
        if let Some(err) = check() {
            self.errors.push(err);
        }
    }
}

/// Run `scopes` in order against `record` and concatenate their errors.
pub fn validate_record(
    record: &Record,
    scopes: &[Scope],
    rules: &RuleSet,
    toggles: &ValidationToggles,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for scope in scopes {
        let mut run = ScopeRun {
            scope: *scope,
            toggles,
            errors: &mut errors,
        };
        match scope {
            Scope::General => general_intake(record, rules, &mut run),
            Scope::Proposal => proposal_drafting(record, rules, &mut run),
            Scope::Contract => contract_drafting(record, rules, &mut run),
        }
    }
    errors
}

fn required(label: &str, value: &str) -> Option<FieldError> {
    value.trim().is_empty().then(|| {
        FieldError::new(
            label,
            "Campo obrigatório não preenchido",
            format!("Preencha o campo {label}"),
            value,
        )
    })
}

fn required_defined(label: &str, value: &str) -> Option<FieldError> {
    if let Some(err) = required(label, value) {
        return Some(err);
    }
    (fold_text(value) == UNDEFINED_PLACEHOLDER).then(|| {
        FieldError::new(
            label,
            "Valor ainda não definido",
            format!("Substitua \"A definir\" pelo valor real de {label}"),
            value,
        )
    })
}

fn email_field(label: &str, value: &str, rules: &RuleSet) -> Option<FieldError> {
    if let Some(err) = required(label, value) {
        return Some(err);
    }
    let email = value.trim();
    if !EMAIL_RE.is_match(email) {
        return Some(FieldError::new(
            label,
            "E-mail em formato inválido",
            "Informe um e-mail no formato nome@dominio",
            value,
        ));
    }
    let lower = email.to_ascii_lowercase();
    if !rules.deprecated_domain.is_empty() && lower.ends_with(&format!("@{}", rules.deprecated_domain)) {
        let local = email.split('@').next().unwrap_or_default();
        return Some(FieldError::new(
            label,
            format!("Domínio @{} foi descontinuado", rules.deprecated_domain),
            format!(
                "Corrija para o domínio atual @{}: {}@{}",
                rules.current_domain, local, rules.current_domain
            ),
            value,
        ));
    }
    None
}

fn document_link(label: &str, value: &str, rules: &RuleSet) -> Option<FieldError> {
    if let Some(err) = required(label, value) {
        return Some(err);
    }
    let link = value.trim().to_ascii_lowercase();
    if !link.starts_with("https://") {
        return Some(FieldError::new(
            label,
            "Link não usa https://",
            "Cole o link completo do documento, começando com https://",
            value,
        ));
    }
    if !rules.document_hosts.iter().any(|host| link.contains(host)) {
        return Some(FieldError::new(
            label,
            "Link não aponta para um documento interno",
            format!(
                "Use um link de documento em {}",
                rules.document_hosts.join(", ")
            ),
            value,
        ));
    }
    None
}

/// Lead type from its canonical column, else from any column named like `tipo..lead`.
pub fn lead_type(record: &Record) -> &str {
    let direct = record.get(keys::TIPO_DE_LEAD);
    if !direct.is_empty() {
        return direct;
    }
    record
        .iter()
        .find(|(key, value)| {
            let tokens: Vec<&str> = key.split('_').collect();
            !value.is_empty()
                && tokens.contains(&"lead")
                && (tokens.contains(&"tipo") || tokens.contains(&"type"))
        })
        .map(|(_, value)| value)
        .unwrap_or("")
}

fn json_entry_populated(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.trim().is_empty(),
        JsonValue::Array(items) => items.iter().any(json_entry_populated),
        JsonValue::Object(map) => map.values().any(json_entry_populated),
        JsonValue::Bool(_) | JsonValue::Number(_) => true,
    }
}

/// True when the multi-entry company list carries at least one filled entry.
pub fn companies_populated(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    // list cells of objects arrive joined as `{..}, {..}`
    let parsed = serde_json::from_str::<JsonValue>(raw)
        .or_else(|_| serde_json::from_str::<JsonValue>(&format!("[{raw}]")));
    match parsed {
        Ok(value @ (JsonValue::Array(_) | JsonValue::Object(_))) => json_entry_populated(&value),
        Ok(_) => true,
        Err(_) => !(raw.starts_with('{') || raw.starts_with('[')),
    }
}

fn general_intake(record: &Record, rules: &RuleSet, run: &mut ScopeRun<'_>) {
    run.check(keys::SOLICITANTE, || {
        let value = record.get(keys::SOLICITANTE);
        if let Some(err) = required("Solicitante", value) {
            return Some(err);
        }
        if rules.requesters.is_empty() || rules.requesters.contains(&fold_text(value)) {
            return None;
        }
        Some(FieldError::new(
            "Solicitante",
            "Solicitante não reconhecido",
            format!("Use um dos nomes cadastrados: {}", rules.requester_display.join(", ")),
            value,
        ))
    });

    run.check(keys::EMAIL, || {
        email_field("E-mail corporativo", record.get(keys::EMAIL), rules)
    });
    run.check(keys::CADASTRADO_POR, || {
        email_field("Cadastrado por", record.get(keys::CADASTRADO_POR), rules)
    });

    let due = fold_text(record.get(keys::DUE_DILIGENCE));
    run.check(keys::DUE_DILIGENCE, || {
        let value = record.get(keys::DUE_DILIGENCE);
        if let Some(err) = required("Due diligence", value) {
            return Some(err);
        }
        (due != "sim" && due != "nao").then(|| {
            FieldError::new("Due diligence", "Resposta inválida", "Responda Sim ou Não", value)
        })
    });

    run.check(keys::LOCAL_REUNIAO, || {
        required("Local da reunião", record.get(keys::LOCAL_REUNIAO))
    });

    let lead = lead_type(record);
    run.check(keys::TIPO_DE_LEAD, || required("Tipo de lead", lead));

    run.check(COMPANY_CHECK, || {
        let has_pair = record.has_value(keys::RAZAO_SOCIAL) && record.has_value(keys::CNPJ);
        if has_pair || companies_populated(record.get(keys::EMPRESAS)) {
            return None;
        }
        let seen = [record.get(keys::RAZAO_SOCIAL), record.get(keys::CNPJ)]
            .iter()
            .filter(|v| !v.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" / ");
        Some(FieldError::new(
            "Razão social / CNPJ",
            "Empresa não identificada",
            "Informe razão social e CNPJ, ou preencha a lista de empresas",
            &seen,
        ))
    });

    if due == "sim" {
        run.check(keys::PRAZO_REUNIAO_DUE, || {
            required_defined(
                "Prazo da reunião de due diligence",
                record.get(keys::PRAZO_REUNIAO_DUE),
            )
        });
        run.check(keys::HORARIO_REUNIAO_DUE, || {
            required_defined(
                "Horário da reunião de due diligence",
                record.get(keys::HORARIO_REUNIAO_DUE),
            )
        });
    }

    let folded_lead = fold_text(lead);
    if folded_lead == "indicacao" || folded_lead == "referral" {
        run.check(keys::TIPO_INDICACAO, || {
            required("Tipo de indicação", record.get(keys::TIPO_INDICACAO))
        });
        run.check(keys::INDICADO_POR, || {
            required("Indicado por", record.get(keys::INDICADO_POR))
        });
    }
}

fn phone_digits(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if (12..=13).contains(&digits.len()) && digits.starts_with("55") {
        digits[2..].to_string()
    } else {
        digits
    }
}

fn proposal_drafting(record: &Record, rules: &RuleSet, run: &mut ScopeRun<'_>) {
    run.check(keys::NOME_COMPLETO, || {
        let value = record.get(keys::NOME_COMPLETO);
        if let Some(err) = required("Nome completo", value) {
            return Some(err);
        }
        (value.split_whitespace().count() < 2).then(|| {
            FieldError::new(
                "Nome completo",
                "Nome incompleto",
                "Informe nome e sobrenome do contato",
                value,
            )
        })
    });

    run.check(keys::EMAIL_PROPOSTA, || {
        email_field("E-mail do contato", record.get(keys::EMAIL_PROPOSTA), rules)
    });

    run.check(keys::TELEFONE_PROPOSTA, || {
        let value = record.get(keys::TELEFONE_PROPOSTA);
        if let Some(err) = required("Telefone do contato", value) {
            return Some(err);
        }
        let len = phone_digits(value).len();
        (!(10..=11).contains(&len)).then(|| {
            FieldError::new(
                "Telefone do contato",
                "Telefone com quantidade de dígitos inválida",
                "Informe DDD + número, com 10 ou 11 dígitos",
                value,
            )
        })
    });

    run.check(keys::LINK_DA_PROPOSTA, || {
        document_link("Link da proposta", record.get(keys::LINK_DA_PROPOSTA), rules)
    });
}

fn valid_deadline(value: &str) -> bool {
    let Some(caps) = DEADLINE_RE.captures(value.trim()) else {
        return false;
    };
    let part = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
    let (day, month, year) = (part(1), part(2), part(3));
    (1..=31).contains(&day) && (1..=12).contains(&month) && (2000..=2100).contains(&year)
}

fn contract_drafting(record: &Record, rules: &RuleSet, run: &mut ScopeRun<'_>) {
    run.check(keys::TIPO_PAGAMENTO, || {
        let value = record.get(keys::TIPO_PAGAMENTO);
        if let Some(err) = required("Tipo de pagamento", value) {
            return Some(err);
        }
        let folded = fold_text(value);
        (!PAYMENT_TYPES.iter().any(|t| folded.contains(t))).then(|| {
            FieldError::new(
                "Tipo de pagamento",
                "Tipo de pagamento não reconhecido",
                "Use Mensal fixo, Êxito, Spot, Hora trabalhada ou Pro bono",
                value,
            )
        })
    });

    run.check(keys::OBJETO_CONTRATO, || {
        required("Objeto do contrato", record.get(keys::OBJETO_CONTRATO))
    });

    for (key, label) in CURRENCY_FIELDS {
        run.check(key, || {
            let value = record.get(key).trim();
            if value.is_empty() || value == "0" || CURRENCY_RE.is_match(value) {
                return None;
            }
            Some(FieldError::new(
                *label,
                "Valor monetário em formato inválido",
                "Use apenas números, ex.: 1500,00 (0 quando não se aplica)",
                value,
            ))
        });
    }

    for (key, label) in SPLIT_FIELDS {
        run.check(key, || {
            let value = record.get(key).trim();
            if value.is_empty() || SPLIT_RE.is_match(value) {
                return None;
            }
            Some(FieldError::new(
                *label,
                "Percentual em formato inválido",
                "Use números inteiros seguidos de %, ex.: 30%",
                value,
            ))
        });
    }

    run.check(keys::PRAZO_ENTREGA, || {
        let value = record.get(keys::PRAZO_ENTREGA);
        if let Some(err) = required("Prazo de entrega", value) {
            return Some(err);
        }
        (!valid_deadline(value)).then(|| {
            FieldError::new(
                "Prazo de entrega",
                "Data inválida",
                "Use o formato DD/MM/AAAA com uma data entre 2000 e 2100",
                value,
            )
        })
    });

    run.check(keys::LINK_CONTRATO, || {
        document_link("Link do contrato", record.get(keys::LINK_CONTRATO), rules)
    });
}
