//! Core domain model for pipeval: sheet cells, materialized records and validation results.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

pub const CRATE_NAME: &str = "pipeval-core";

/// Display text used for `FieldError::current_value` when the field is blank.
pub const EMPTY_DISPLAY: &str = "(vazio)";

/// Canonical field vocabulary. Unknown sheet columns keep their normalized header as key.
pub mod keys {
    // general intake
    pub const SOLICITANTE: &str = "solicitante";
    pub const EMAIL: &str = "email";
    pub const CADASTRADO_POR: &str = "cadastrado_por";
    pub const DUE_DILIGENCE: &str = "due_diligence";
    pub const PRAZO_REUNIAO_DUE: &str = "prazo_reuniao_due";
    pub const HORARIO_REUNIAO_DUE: &str = "horario_reuniao_due";
    pub const LOCAL_REUNIAO: &str = "local_reuniao";
    pub const TIPO_DE_LEAD: &str = "tipo_de_lead";
    pub const TIPO_INDICACAO: &str = "tipo_indicacao";
    pub const INDICADO_POR: &str = "indicado_por";
    pub const RAZAO_SOCIAL: &str = "razao_social";
    pub const CNPJ: &str = "cnpj";
    pub const EMPRESAS: &str = "empresas";

    // classification
    pub const STAGE_NAME: &str = "stage_name";
    pub const FUNIL: &str = "funil";
    pub const TITULO: &str = "titulo";

    // proposal drafting
    pub const NOME_COMPLETO: &str = "nome_completo";
    pub const EMAIL_PROPOSTA: &str = "email_proposta";
    pub const TELEFONE_PROPOSTA: &str = "telefone_proposta";
    pub const LINK_DA_PROPOSTA: &str = "link_da_proposta";

    // contract drafting
    pub const TIPO_PAGAMENTO: &str = "tipo_pagamento";
    pub const OBJETO_CONTRATO: &str = "objeto_contrato";
    pub const VALOR_MENSAL_FIXO_CC: &str = "valor_mensal_fixo_cc";
    pub const VALOR_SPOT_CC: &str = "valor_spot_cc";
    pub const VALOR_EXITO_CC: &str = "valor_exito_cc";
    pub const VALOR_HORA_CC: &str = "valor_hora_cc";
    pub const PERCENTUAL_ORIGINACAO: &str = "percentual_originacao";
    pub const PERCENTUAL_EXECUCAO: &str = "percentual_execucao";
    pub const PERCENTUAL_INDICACAO: &str = "percentual_indicacao";
    pub const PRAZO_ENTREGA: &str = "prazo_entrega";
    pub const LINK_CONTRATO: &str = "link_contrato";

    // reporting
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const EMAIL_NOTIFICACAO: &str = "email_notificacao";
    pub const TELEFONE_NOTIFICACAO: &str = "telefone_notificacao";
}

/// One spreadsheet cell as delivered by the sheet client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Scalar(String),
    List(Vec<String>),
    /// Non-empty JSON object, kept as its JSON text.
    Object(String),
}

impl Cell {
    pub fn scalar(value: impl Into<String>) -> Self {
        Cell::Scalar(value.into())
    }

    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Cell::Empty,
            JsonValue::Array(items) => Cell::List(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(json_scalar_text)
                    .collect(),
            ),
            JsonValue::Object(map) if map.is_empty() => Cell::Scalar("{}".to_string()),
            JsonValue::Object(map) => Cell::Object(JsonValue::Object(map).to_string()),
            other => Cell::Scalar(json_scalar_text(other)),
        }
    }

    /// Plain text of the cell, used for header cells.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Scalar(s) | Cell::Object(s) => s.clone(),
            Cell::List(items) => items.join(", "),
        }
    }
}

fn json_scalar_text(value: JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s,
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        JsonValue::deserialize(deserializer).map(Cell::from_json)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Scalar(value.to_string())
        }
    }
}

/// Materialized semantic view of one row: canonical key -> display value.
///
/// An absent key and an empty string are equivalent for every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn from_fields(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn has_value(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// First non-empty value among `keys`, in order.
    pub fn first_of<'a>(&'a self, keys: &[&str]) -> &'a str {
        keys.iter()
            .map(|k| self.get(k))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Rule scopes, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    General,
    Proposal,
    Contract,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::General, Scope::Proposal, Scope::Contract];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::General => "general",
            Scope::Proposal => "proposal",
            Scope::Contract => "contract",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub remediation: String,
    pub current_value: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        remediation: impl Into<String>,
        current_value: &str,
    ) -> Self {
        let current_value = if current_value.trim().is_empty() {
            EMPTY_DISPLAY.to_string()
        } else {
            current_value.to_string()
        };
        Self {
            field: field.into(),
            message: message.into(),
            remediation: remediation.into(),
            current_value,
        }
    }
}

/// Normalized outcome of a deal. Unrecognized text is kept as its lowercase form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusClass {
    Win,
    Lost,
    Ongoing,
    Unrecognized(String),
}

impl StatusClass {
    pub fn as_str(&self) -> &str {
        match self {
            StatusClass::Win => "win",
            StatusClass::Lost => "lost",
            StatusClass::Ongoing => "ongoing",
            StatusClass::Unrecognized(raw) => raw,
        }
    }
}

impl Serialize for StatusClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Funnel {
    Sales,
    Onboarding,
    Other(String),
}

impl Funnel {
    pub fn display_name(&self) -> &str {
        match self {
            Funnel::Sales => "Funil de Vendas",
            Funnel::Onboarding => "Onboarding de Clientes",
            Funnel::Other(name) => name,
        }
    }
}

impl Serialize for Funnel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    pub status: StatusClass,
    pub status_raw: String,
    pub created_at_iso: Option<String>,
    pub updated_at_iso: Option<String>,
    pub days_since_reference: Option<u32>,
    pub notify_email: Option<String>,
    pub notify_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub row_index: usize,
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub title: String,
    pub stage: String,
    pub funnel: Funnel,
    #[serde(flatten)]
    pub derived: DerivedFields,
}

impl ValidationResult {
    pub fn new(
        row_index: usize,
        errors: Vec<FieldError>,
        title: String,
        stage: String,
        funnel: Funnel,
        derived: DerivedFields,
    ) -> Self {
        Self {
            row_index,
            valid: errors.is_empty(),
            errors,
            title,
            stage,
            funnel,
            derived,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub results: Vec<ValidationResult>,
    pub total: usize,
    pub com_erros: usize,
}

impl ValidationResponse {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        let com_erros = results.iter().filter(|r| !r.valid).count();
        Self {
            total: results.len(),
            com_erros,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cells_deserialize_from_mixed_json() {
        let cells: Vec<Cell> =
            serde_json::from_value(json!(["a", 12, 1500.0, 2.5, null, ["x", "", null], {}, {"k": 1}, true]))
                .unwrap();
        assert_eq!(cells[0], Cell::scalar("a"));
        assert_eq!(cells[1], Cell::scalar("12"));
        assert_eq!(cells[2], Cell::scalar("1500"));
        assert_eq!(cells[3], Cell::scalar("2.5"));
        assert_eq!(cells[4], Cell::Empty);
        assert_eq!(cells[5], Cell::List(vec!["x".into(), "".into()]));
        assert_eq!(cells[6], Cell::scalar("{}"));
        assert!(matches!(cells[7], Cell::Object(_)));
        assert_eq!(cells[8], Cell::scalar("true"));
    }

    #[test]
    fn field_error_displays_blank_current_value() {
        let err = FieldError::new("Solicitante", "Campo obrigatório", "Preencha", "  ");
        assert_eq!(err.current_value, EMPTY_DISPLAY);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["currentValue"], EMPTY_DISPLAY);
    }

    #[test]
    fn response_counts_invalid_results() {
        let derived = DerivedFields {
            status: StatusClass::Unrecognized("novo".into()),
            status_raw: "Novo".into(),
            created_at_iso: None,
            updated_at_iso: None,
            days_since_reference: None,
            notify_email: None,
            notify_phone: None,
        };
        let ok = ValidationResult::new(2, vec![], String::new(), String::new(), Funnel::Sales, derived.clone());
        let bad = ValidationResult::new(
            3,
            vec![FieldError::new("E-mail", "Inválido", "Corrija", "x")],
            String::new(),
            String::new(),
            Funnel::Sales,
            derived,
        );
        let response = ValidationResponse::new(vec![ok, bad]);
        assert_eq!(response.total, 2);
        assert_eq!(response.com_erros, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["comErros"], 1);
        assert_eq!(json["results"][0]["status"], "novo");
        assert_eq!(json["results"][0]["funnel"], "Funil de Vendas");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn record_first_of_skips_blank_values() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), String::new());
        fields.insert("b".to_string(), "x".to_string());
        let record = Record::from_fields(fields);
        assert_eq!(record.first_of(&["a", "b"]), "x");
        assert_eq!(record.get("missing"), "");
    }
}
