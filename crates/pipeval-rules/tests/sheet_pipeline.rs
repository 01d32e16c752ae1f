use chrono::{DateTime, TimeZone, Utc};
use pipeval_core::{keys, Cell, StatusClass};
use std::collections::{BTreeMap, HashMap};

use pipeval_normalize::{alias_table, materialize, normalize_overrides, HeaderMap};
use pipeval_rules::{EngineConfig, ValidationEngine, ValidationRequest};
use serde_json::json;

const HEADERS: &[&str] = &[
    "Título",
    "Etapa",
    "Solicitante",
    "E-mail Corporativo",
    "Cadastrado por",
    "Due Diligence",
    "Prazo da reunião de due",
    "Local da Reunião",
    "Tipo de Lead",
    "Razão Social",
    "CNPJ",
    "Status",
    "Data de Criação",
    "Última Atualização",
];

fn engine() -> ValidationEngine {
    ValidationEngine::new(EngineConfig::default()).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 15, 0, 0).single().unwrap()
}

fn valid_row() -> Vec<&'static str> {
    vec![
        "Consultoria ACME",
        "Negociação",
        "Ana Souza",
        "ana@new-domain.example",
        "",
        "Não",
        "",
        "Sede",
        "Inbound",
        "ACME Ltda",
        "12.345.678/0001-90",
        "Em andamento",
        "01/07/2025 09:00",
        "25/07/2025 14:30",
    ]
}

fn request(rows: Vec<Vec<&str>>) -> ValidationRequest {
    let mut raw_rows = vec![HEADERS.iter().map(|h| Cell::from(*h)).collect::<Vec<_>>()];
    raw_rows.extend(
        rows.into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect::<Vec<_>>()),
    );
    ValidationRequest::new(raw_rows)
}

fn with(column: &str, value: &'static str) -> Vec<&'static str> {
    let idx = HEADERS.iter().position(|h| *h == column).unwrap();
    let mut row = valid_row();
    row[idx] = value;
    row
}

#[test]
fn valid_row_has_no_errors_and_derived_fields() {
    let response = engine().validate_sheet(&request(vec![valid_row()]), now());
    assert_eq!(response.total, 1);
    assert_eq!(response.com_erros, 0);

    let result = &response.results[0];
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.row_index, 2);
    assert_eq!(result.stage, "Negociação");
    assert_eq!(result.derived.status, StatusClass::Ongoing);
    assert_eq!(
        result.derived.updated_at_iso.as_deref(),
        Some("2025-07-25T14:30:00-03:00")
    );
    // 2025-07-25T17:30Z -> 2025-08-01T15:00Z
    assert_eq!(result.derived.days_since_reference, Some(6));
    assert_eq!(result.derived.notify_email.as_deref(), Some("ana@new-domain.example"));
}

#[test]
fn every_alias_lands_on_its_canonical_key() {
    let value = [Cell::scalar("valor-123")];
    for (token, key) in alias_table() {
        let header_map = HeaderMap::build(&[token.to_string()], &HashMap::new());
        let record = materialize(&value, &header_map);
        assert_eq!(record.get(key), "valor-123", "{token} -> {key}");
    }

    let mut overrides = BTreeMap::new();
    overrides.insert("Responsável Interno".to_string(), keys::SOLICITANTE.to_string());
    let header_map = HeaderMap::build(&["RESPONSAVEL  interno".to_string()], &normalize_overrides(&overrides));
    assert_eq!(materialize(&value, &header_map).get(keys::SOLICITANTE), "valor-123");
}

#[test]
fn blank_company_entries_do_not_identify_the_company() {
    let raw = json!({
        "rawRows": [
            ["Título", "Solicitante", "E-mail", "Due Diligence", "Local da Reunião", "Tipo de Lead", "Empresas"],
            ["Negócio A", "Ana Souza", "ana@new-domain.example", "Não", "Sede", "Inbound",
             [{"razao_social": "", "cnpj": ""}, {"razao_social": "", "cnpj": ""}]]
        ]
    });
    let request: ValidationRequest = serde_json::from_value(raw).unwrap();
    let response = engine().validate_sheet(&request, now());
    let fields: Vec<_> = response.results[0].errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["Razão social / CNPJ"]);
}

#[test]
fn structured_cells_keep_the_row() {
    let raw = json!({
        "rawRows": [["Título", "Observações"], ["Negócio A", {"nota": "ligar amanhã"}]]
    });
    let request: ValidationRequest = serde_json::from_value(raw).unwrap();
    let response = engine().validate_sheet(&request, now());
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].row_index, 2);
    assert_eq!(response.results[0].title, "Negócio A");
}

#[test]
fn missing_requester_reports_exactly_one_error() {
    let response = engine().validate_sheet(&request(vec![with("Solicitante", "")]), now());
    let result = &response.results[0];
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].field, "Solicitante");
    assert_eq!(response.com_erros, 1);
}

#[test]
fn deprecated_domain_is_flagged_even_when_well_formed() {
    let response = engine().validate_sheet(
        &request(vec![with("E-mail Corporativo", "joao@old-domain.example")]),
        now(),
    );
    let errors = &response.results[0].errors;
    // cadastrado_por falls back to the same address, so both fields are flagged
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| e.remediation.contains("joao@new-domain.example")));
}

#[test]
fn due_diligence_controls_deadline_requiredness() {
    let mut row = with("Due Diligence", "Sim");
    let idx = HEADERS.iter().position(|h| *h == "Prazo da reunião de due").unwrap();
    row[idx] = "";
    let response = engine().validate_sheet(&request(vec![row, with("Due Diligence", "Não")]), now());

    let first: Vec<_> = response.results[0].errors.iter().map(|e| e.field.as_str()).collect();
    assert!(first.contains(&"Prazo da reunião de due diligence"));
    assert!(response.results[1].valid);
}

#[test]
fn excluded_stages_never_reach_results() {
    let rows = vec![
        with("Etapa", "Contato Inicial"),
        with("Etapa", "DESCARTADO"),
        with("Etapa", "suspenso"),
        valid_row(),
    ];
    let response = engine().validate_sheet(&request(rows), now());
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].row_index, 5);
}

#[test]
fn contract_stage_checks_currency_fields() {
    let raw = json!({
        "rawRows": [
            ["Etapa", "Funil", "Tipo de pagamento", "Objeto do contrato", "Valor spot", "Prazo de entrega", "Link do contrato"],
            ["Elaboração de Contrato", "Onboarding", "Spot", "Parecer", "0", "10/10/2025", "https://docs.google.com/d/1"],
            ["Elaboração de Contrato", "Onboarding", "Spot", "Parecer", "R$ 100", "10/10/2025", "https://docs.google.com/d/1"]
        ]
    });
    let request: ValidationRequest = serde_json::from_value(raw).unwrap();
    let response = engine().validate_sheet(&request, now());
    assert!(response.results[0].valid, "{:?}", response.results[0].errors);
    assert_eq!(response.results[1].errors.len(), 1);
    assert_eq!(response.results[1].errors[0].field, "Valor spot (CC)");
}

#[test]
fn request_toggles_disable_checks() {
    let raw = json!({
        "rawRows": [["Solicitante", "Título"], ["", "Negócio X"]],
        "validationConfig": {
            "general": {
                "solicitante": false, "email": false, "cadastrado_por": false,
                "due_diligence": false, "local_reuniao": false, "tipo_de_lead": false,
                "empresa": false, "unknown_field": false
            },
            "unknown_scope": { "x": true }
        }
    });
    let request: ValidationRequest = serde_json::from_value(raw).unwrap();
    let response = engine().validate_sheet(&request, now());
    assert!(response.results[0].valid);
}

#[test]
fn repeated_runs_are_identical() {
    let rows = vec![valid_row(), with("Solicitante", ""), with("CNPJ", "")];
    let engine = engine();
    let first = serde_json::to_string(&engine.validate_sheet(&request(rows.clone()), now())).unwrap();
    let second = serde_json::to_string(&engine.validate_sheet(&request(rows), now())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn response_serializes_with_camel_case_summary() {
    let response = engine().validate_sheet(&request(vec![with("Solicitante", "")]), now());
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["total"], 1);
    assert_eq!(value["comErros"], 1);
    assert_eq!(value["results"][0]["rowIndex"], 2);
    assert_eq!(value["results"][0]["valid"], false);
    assert_eq!(value["results"][0]["errors"][0]["currentValue"], "(vazio)");
    assert_eq!(value["results"][0]["statusRaw"], "Em andamento");
    assert_eq!(value["results"][0]["notifyPhone"], serde_json::Value::Null);
}
