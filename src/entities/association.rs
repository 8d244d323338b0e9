use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::entities::{first_str, is_truthy};
use crate::error::BiolinkMcpError;
use crate::sources::biolink::BiolinkClient;

const MAX_PAGE_SIZE: u64 = 100;
const MAX_PAGES: usize = 50;

/// Friendly aliases accepted in place of canonical Biolink categories.
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("gene-to-gene", "biolink:PairwiseGeneToGeneInteraction"),
    ("interactions", "biolink:PairwiseGeneToGeneInteraction"),
    ("gene-interactions", "biolink:PairwiseGeneToGeneInteraction"),
    ("gene-diseases", "biolink:CausalGeneToDiseaseAssociation"),
    ("gene-to-disease", "biolink:CausalGeneToDiseaseAssociation"),
    ("gene-phenotypes", "biolink:GeneToPhenotypicFeatureAssociation"),
    ("phenotype-genes", "biolink:GeneToPhenotypicFeatureAssociation"),
];

/// Resolves an alias to its canonical category; unknown values pass through.
pub(crate) fn canonical_category(value: &str) -> String {
    let key = value
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '_'], "-");
    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| value.to_string())
}

#[derive(Debug, Clone)]
pub(crate) struct AssociationQuery {
    pub entity_id: String,
    pub category: String,
    pub limit: u64,
    pub offset: u64,
    pub max_items: Option<usize>,
    pub evidence_min: Option<i64>,
    pub sources: Vec<String>,
    pub compact: bool,
}

impl AssociationQuery {
    pub(crate) fn new(entity_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            category: category.into(),
            limit: 20,
            offset: 0,
            max_items: None,
            evidence_min: None,
            sources: Vec::new(),
            compact: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AssociationTable {
    pub items: Vec<Value>,
    pub count: usize,
    pub category: String,
    pub entity_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct CompactAssociation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_count: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Fetches associations page by page, then applies evidence and source filters.
pub(crate) async fn fetch(
    client: &BiolinkClient,
    query: &AssociationQuery,
) -> Result<AssociationTable, BiolinkMcpError> {
    let category = canonical_category(&query.category);
    let per_page = query.limit.clamp(1, MAX_PAGE_SIZE);
    let mut offset = query.offset;
    let mut items: Vec<Value> = Vec::new();
    let mut exhausted = false;

    for page_index in 0..MAX_PAGES {
        let page = client
            .association_table(&query.entity_id, &category, offset, per_page, None)
            .await?;
        let rows = take_rows(page);
        let page_len = rows.len();
        items.extend(rows);
        debug!(
            entity_id = %query.entity_id,
            category = %category,
            page = page_index,
            rows = page_len,
            "Fetched association page"
        );

        if let Some(max_items) = query.max_items {
            if items.len() >= max_items {
                items.truncate(max_items);
                exhausted = true;
                break;
            }
        }

        if (page_len as u64) < per_page {
            exhausted = true;
            break;
        }
        offset = offset.saturating_add(per_page);
    }

    if !exhausted {
        warn!(
            entity_id = %query.entity_id,
            category = %category,
            pages = MAX_PAGES,
            rows = items.len(),
            "Association pagination stopped at the page cap; results may be incomplete"
        );
    }

    if let Some(min) = query.evidence_min {
        items.retain(|row| evidence_count(row) >= min as f64);
    }

    if !query.sources.is_empty() {
        let allowed: HashSet<&str> = query.sources.iter().map(String::as_str).collect();
        items.retain(|row| row_source(row).is_some_and(|s| allowed.contains(s)));
    }

    let items = if query.compact {
        items
            .iter()
            .map(|row| serde_json::to_value(shape_row(row)))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        items
    };

    Ok(AssociationTable {
        count: items.len(),
        items,
        category,
        entity_id: query.entity_id.clone(),
    })
}

/// Rows live under `associations` or `items` depending on the endpoint.
fn take_rows(mut page: Value) -> Vec<Value> {
    for key in ["associations", "items"] {
        match page.get_mut(key).map(Value::take) {
            Some(Value::Array(rows)) if !rows.is_empty() => return rows,
            Some(other) if is_truthy(&other) => return Vec::new(),
            _ => {}
        }
    }
    Vec::new()
}

fn evidence_count(row: &Value) -> f64 {
    row.get("evidence_count")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn row_source(row: &Value) -> Option<&str> {
    first_str(row, &["aggregator_knowledge_source", "provided_by"])
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Nested `{id, label}` objects win over flat `subject` / `subject_label` fields.
fn endpoint_fields(row: &Value, key: &str) -> (Option<String>, Option<String>) {
    let flat_label = row.get(format!("{key}_label").as_str());
    match row.get(key) {
        Some(Value::Object(node)) => (
            non_empty(node.get("id")),
            non_empty(node.get("label")).or_else(|| non_empty(flat_label)),
        ),
        flat => (non_empty(flat), non_empty(flat_label)),
    }
}

pub(crate) fn shape_row(row: &Value) -> CompactAssociation {
    let (subject_id, subject_label) = endpoint_fields(row, "subject");
    let (object_id, object_label) = endpoint_fields(row, "object");
    let predicate = match row.get("predicate") {
        Some(Value::Object(node)) => non_empty(node.get("id")),
        other => non_empty(other),
    };

    CompactAssociation {
        subject_id,
        subject_label,
        predicate,
        object_id,
        object_label,
        evidence_count: row
            .get("evidence_count")
            .filter(|v| !v.is_null())
            .cloned(),
        source: row_source(row).map(str::to_string),
    }
}
