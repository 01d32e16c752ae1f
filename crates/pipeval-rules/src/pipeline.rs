//! Sheet-level orchestration: header resolution, per-row processing and the response summary.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pipeval_core::{keys, Cell, ValidationResponse, ValidationResult};
use pipeval_normalize::{materialize, normalize_overrides, HeaderMap};
use serde::Deserialize;
use tracing::{debug, info, info_span};

use crate::classify::{classify, stage_of};
use crate::config::{ConfigError, EngineConfig, ValidationToggles};
use crate::metrics::derive_fields;
use crate::validate::{validate_record, RuleSet};

/// Header row first, then data rows.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub raw_rows: Vec<Vec<Cell>>,
    #[serde(default)]
    pub column_overrides: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub validation_config: Option<ValidationToggles>,
}

impl ValidationRequest {
    pub fn new(raw_rows: Vec<Vec<Cell>>) -> Self {
        Self {
            raw_rows,
            ..Self::default()
        }
    }
}

/// Immutable, shareable engine. One instance serves any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    config: EngineConfig,
    /// Engine-level column overrides, already normalized.
    overrides: HashMap<String, String>,
    rules: RuleSet,
    tz: Tz,
}

struct SheetContext<'a> {
    header_map: HeaderMap,
    toggles: ValidationToggles,
    rules: &'a RuleSet,
    tz: Tz,
    now: DateTime<Utc>,
}

impl ValidationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let tz = config.settings.tz()?;
        let rules = RuleSet::from_settings(&config.settings);
        let overrides = normalize_overrides(&config.column_overrides);
        Ok(Self {
            config,
            overrides,
            rules,
            tz,
        })
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Validate every data row. `now` only feeds `daysSinceReference`.
    pub fn validate_sheet(&self, request: &ValidationRequest, now: DateTime<Utc>) -> ValidationResponse {
        let span = info_span!("validate_sheet", rows = request.raw_rows.len());
        let _guard = span.enter();

        let Some((header_row, data_rows)) = request.raw_rows.split_first() else {
            debug!("empty sheet");
            return ValidationResponse::new(Vec::new());
        };

        let headers: Vec<String> = header_row.iter().map(Cell::to_text).collect();
        // request overrides win per normalized header
        let mut overrides = self.overrides.clone();
        if let Some(extra) = &request.column_overrides {
            overrides.extend(normalize_overrides(extra));
        }
        let toggles = match &request.validation_config {
            Some(extra) => self.config.validation.merged_with(extra),
            None => self.config.validation.clone(),
        };
        let ctx = SheetContext {
            header_map: HeaderMap::build(&headers, &overrides),
            toggles,
            rules: &self.rules,
            tz: self.tz,
            now,
        };

        let mut results = Vec::with_capacity(data_rows.len());
        let mut excluded = 0usize;
        for (offset, row) in data_rows.iter().enumerate() {
            // header is spreadsheet line 1
            let row_index = offset + 2;
            match process_row(row_index, row, &ctx) {
                Some(result) => results.push(result),
                None => excluded += 1,
            }
        }

        let response = ValidationResponse::new(results);
        info!(
            results = response.total,
            invalid = response.com_erros,
            excluded,
            "sheet validated"
        );
        response
    }
}

fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(|cell| match cell {
        Cell::Empty => true,
        Cell::Scalar(s) => s.trim().is_empty(),
        Cell::List(items) => items.iter().all(|s| s.trim().is_empty()),
        Cell::Object(_) => false,
    })
}

fn process_row(row_index: usize, row: &[Cell], ctx: &SheetContext<'_>) -> Option<ValidationResult> {
    if is_blank_row(row) {
        debug!(row_index, "blank row");
        return None;
    }

    let record = materialize(row, &ctx.header_map);
    let Some(classification) = classify(&record) else {
        debug!(row_index, stage = %stage_of(&record), "excluded stage");
        return None;
    };

    let errors = validate_record(&record, &classification.scopes, ctx.rules, &ctx.toggles);
    let derived = derive_fields(&record, ctx.tz, ctx.now);
    Some(ValidationResult::new(
        row_index,
        errors,
        record.get(keys::TITULO).to_string(),
        classification.stage,
        classification.funnel,
        derived,
    ))
}
