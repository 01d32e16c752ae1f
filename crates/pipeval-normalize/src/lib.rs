//! Header normalization, the static alias table and row materialization.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use pipeval_core::{keys, Cell, Record};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const CRATE_NAME: &str = "pipeval-normalize";

/// Values that count as "not filled in" when deciding whether an empty alias may overwrite them.
const PLACEHOLDER_VALUES: &[&str] = &["-", "--", "n/a", "na", "null", "undefined"];

/// Literal serialized forms of empty containers that some exports write into cells.
const EMPTY_CONTAINER_FORMS: &[&str] = &["[]", "{}", "[ ]", "{ }"];

/// Normalized header token -> canonical key.
static ALIAS_TABLE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let groups: &[(&str, &[&str])] = &[
        (
            keys::SOLICITANTE,
            &["solicitante", "nome_do_solicitante", "solicitante_nome", "requisitante", "requester"],
        ),
        (
            keys::EMAIL,
            &["email", "e_mail", "email_corporativo", "email_do_solicitante", "email_solicitante", "corporate_email"],
        ),
        (
            keys::CADASTRADO_POR,
            &["cadastrado_por", "cadastrante", "email_do_cadastrante", "email_cadastrante", "registrado_por", "registered_by"],
        ),
        (
            keys::DUE_DILIGENCE,
            &["due_diligence", "duediligence", "precisa_de_due_diligence", "necessita_due_diligence", "due_diligence_necessaria"],
        ),
        (
            keys::PRAZO_REUNIAO_DUE,
            &["prazo_reuniao_due", "prazo_da_reuniao_de_due", "prazo_due_diligence", "data_reuniao_due"],
        ),
        (
            keys::HORARIO_REUNIAO_DUE,
            &["horario_reuniao_due", "horario_da_reuniao_de_due", "horario_due", "hora_reuniao_due"],
        ),
        (
            keys::LOCAL_REUNIAO,
            &["local_reuniao", "local_da_reuniao", "onde_sera_a_reuniao", "meeting_location"],
        ),
        (
            keys::TIPO_DE_LEAD,
            &["tipo_de_lead", "tipo_lead", "tipo_do_lead", "lead_type"],
        ),
        (
            keys::TIPO_INDICACAO,
            &["tipo_indicacao", "tipo_de_indicacao", "categoria_da_indicacao", "referral_type"],
        ),
        (
            keys::INDICADO_POR,
            &["indicado_por", "indicacao_de", "nome_do_indicador", "indicador", "referred_by", "referrer"],
        ),
        (
            keys::RAZAO_SOCIAL,
            &["razao_social", "razao_social_da_empresa", "nome_empresarial", "empresa", "company_name"],
        ),
        (keys::CNPJ, &["cnpj", "cnpj_da_empresa", "cnpj_cpf", "tax_id"]),
        (
            keys::EMPRESAS,
            &["empresas", "empresas_cnpjs", "empresas_e_cnpjs", "lista_de_empresas", "companies"],
        ),
        (
            keys::STAGE_NAME,
            &["stage_name", "stage", "etapa", "etapa_do_funil", "fase", "estagio", "deal_stage"],
        ),
        (keys::FUNIL, &["funil", "funnel", "pipeline", "nome_do_funil", "pipeline_name"]),
        (
            keys::TITULO,
            &["titulo", "title", "nome_do_negocio", "negocio", "oportunidade", "deal_title"],
        ),
        (
            keys::NOME_COMPLETO,
            &["nome_completo", "nome_completo_do_contato", "contato_nome_completo", "nome_do_contato", "full_name"],
        ),
        (
            keys::EMAIL_PROPOSTA,
            &["email_proposta", "email_do_contato", "email_para_envio_da_proposta", "contato_email", "contact_email"],
        ),
        (
            keys::TELEFONE_PROPOSTA,
            &["telefone_proposta", "telefone_do_contato", "contato_telefone", "telefone", "celular", "whatsapp", "phone"],
        ),
        (
            keys::LINK_DA_PROPOSTA,
            &["link_da_proposta", "link_proposta", "proposta_link", "url_da_proposta", "proposal_link"],
        ),
        (
            keys::TIPO_PAGAMENTO,
            &["tipo_pagamento", "tipo_de_pagamento", "forma_de_pagamento", "modalidade_de_cobranca", "payment_type"],
        ),
        (
            keys::OBJETO_CONTRATO,
            &["objeto_contrato", "objeto_do_contrato", "escopo_do_contrato", "contract_object"],
        ),
        (
            keys::VALOR_MENSAL_FIXO_CC,
            &["valor_mensal_fixo_cc", "valor_mensal_fixo", "valor_fixo_mensal", "mensal_fixo"],
        ),
        (keys::VALOR_SPOT_CC, &["valor_spot_cc", "valor_spot", "spot"]),
        (
            keys::VALOR_EXITO_CC,
            &["valor_exito_cc", "valor_exito", "honorarios_de_exito", "exito"],
        ),
        (
            keys::VALOR_HORA_CC,
            &["valor_hora_cc", "valor_hora", "valor_da_hora", "hora_trabalhada"],
        ),
        (
            keys::PERCENTUAL_ORIGINACAO,
            &["percentual_originacao", "split_originacao", "originacao"],
        ),
        (
            keys::PERCENTUAL_EXECUCAO,
            &["percentual_execucao", "split_execucao", "execucao"],
        ),
        (keys::PERCENTUAL_INDICACAO, &["percentual_indicacao", "split_indicacao"]),
        (
            keys::PRAZO_ENTREGA,
            &["prazo_entrega", "prazo_de_entrega", "data_de_entrega", "delivery_deadline"],
        ),
        (
            keys::LINK_CONTRATO,
            &["link_contrato", "link_do_contrato", "contrato_link", "url_do_contrato", "contract_link"],
        ),
        (
            keys::STATUS,
            &["status", "situacao", "resultado", "status_do_negocio", "deal_status"],
        ),
        (
            keys::CREATED_AT,
            &["created_at", "criado_em", "data_de_criacao", "data_criacao", "negocio_criado_em", "add_time"],
        ),
        (
            keys::UPDATED_AT,
            &["updated_at", "atualizado_em", "ultima_atualizacao", "data_de_atualizacao", "ultima_modificacao", "update_time"],
        ),
        (
            keys::EMAIL_NOTIFICACAO,
            &["email_notificacao", "email_para_notificacao", "notificar_email", "notify_email"],
        ),
        (
            keys::TELEFONE_NOTIFICACAO,
            &["telefone_notificacao", "telefone_para_notificacao", "whatsapp_notificacao", "notify_phone"],
        ),
    ];

    groups
        .iter()
        .flat_map(|(key, tokens)| tokens.iter().map(move |token| (*token, *key)))
        .collect()
});

/// Read-only view of the built-in alias table.
pub fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    &ALIAS_TABLE
}

fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Turn a raw header into a `[a-z0-9_]` token. Pure, total and idempotent.
pub fn normalize_header(raw: &str) -> String {
    let stripped = strip_diacritics(&raw.trim().to_lowercase());
    let mut out = String::with_capacity(stripped.len());
    let mut in_whitespace = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            out.push(ch);
        }
    }
    out
}

/// Lowercase, diacritic-free, single-spaced form used for free-text comparisons.
pub fn fold_text(input: &str) -> String {
    strip_diacritics(&input.to_lowercase())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a normalized token: overrides, then the alias table, then the token itself.
pub fn resolve_key(token: &str, overrides: &HashMap<String, String>) -> String {
    if let Some(key) = overrides.get(token) {
        return key.clone();
    }
    ALIAS_TABLE
        .get(token)
        .map(|key| key.to_string())
        .unwrap_or_else(|| token.to_string())
}

/// Normalize caller-supplied overrides; blank targets are dropped.
pub fn normalize_overrides(overrides: &BTreeMap<String, String>) -> HashMap<String, String> {
    overrides
        .iter()
        .filter_map(|(header, key)| {
            let key = normalize_header(key);
            if key.is_empty() {
                None
            } else {
                Some((normalize_header(header), key))
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Column {
    header: String,
    key: String,
}

/// Header row resolved to canonical keys once per sheet.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    columns: Vec<Column>,
}

impl HeaderMap {
    /// `overrides` must already be normalized with [`normalize_overrides`].
    pub fn build(headers: &[String], overrides: &HashMap<String, String>) -> Self {
        let columns = headers
            .iter()
            .map(|header| Column {
                header: header.clone(),
                key: resolve_key(&normalize_header(header), overrides),
            })
            .collect();
        Self { columns }
    }
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_VALUES
        .iter()
        .any(|p| value.trim().eq_ignore_ascii_case(p))
}

fn clean_text(value: &str) -> String {
    let trimmed = value.trim();
    if EMPTY_CONTAINER_FORMS.contains(&trimmed) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Display text for one data cell. Objects are kept as their JSON text.
pub fn display_value(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Scalar(text) | Cell::Object(text) => clean_text(text),
        Cell::List(items) => items
            .iter()
            .map(|item| clean_text(item))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn merge_value(fields: &mut BTreeMap<String, String>, key: &str, value: String) {
    if value.is_empty() {
        if let Some(existing) = fields.get(key) {
            if !existing.is_empty() && !is_placeholder(existing) {
                return;
            }
        }
    }
    fields.insert(key.to_string(), value);
}

/// Combine every column of `row` into a single record.
///
/// Rows shorter than the header are padded with empties; cells past the last header are ignored.
/// Among columns aliasing the same key an empty value never replaces a filled one, while a later
/// non-empty value does.
pub fn materialize(row: &[Cell], header_map: &HeaderMap) -> Record {
    let width = header_map.columns.len();
    if row.len() > width {
        debug!(extra = row.len() - width, "ignoring cells beyond the header row");
    }

    let mut fields = BTreeMap::new();
    for (column, col) in header_map.columns.iter().enumerate() {
        let cell = row.get(column).unwrap_or(&Cell::Empty);
        if matches!(cell, Cell::Object(_)) {
            debug!(column, header = %col.header, "structured cell kept as JSON text");
        }
        merge_value(&mut fields, &col.key, display_value(cell));
    }

    let registrant_missing = fields
        .get(keys::CADASTRADO_POR)
        .map_or(true, |v| v.is_empty());
    if registrant_missing {
        let email = fields.get(keys::EMAIL).cloned().unwrap_or_default();
        fields.insert(keys::CADASTRADO_POR.to_string(), email);
    }

    Record::from_fields(fields)
}
