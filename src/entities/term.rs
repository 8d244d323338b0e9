use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::BiolinkMcpError;
use crate::sources::biolink::BiolinkClient;

/// Canonical identity of a free-text term, all-null when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct NormalizedTerm {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    category: Option<Value>,
}

/// Resolves a term to the top search hit, optionally within a taxon label.
///
/// Upstream HTTP status errors yield an empty result rather than an error;
/// network failures still propagate.
pub(crate) async fn normalize(
    client: &BiolinkClient,
    query: &str,
    taxon: Option<&str>,
) -> Result<NormalizedTerm, BiolinkMcpError> {
    let payload = match client.search(query, taxon).await {
        Ok(payload) => payload,
        Err(err @ BiolinkMcpError::HttpStatus { .. }) => {
            debug!(query, "Normalization search failed: {err}");
            return Ok(NormalizedTerm::default());
        }
        Err(err) => return Err(err),
    };

    let resp: SearchResponse =
        serde_json::from_value(payload).map_err(|source| BiolinkMcpError::ApiJson {
            path: "search".into(),
            source,
        })?;

    let Some(top) = resp.items.into_iter().next() else {
        return Ok(NormalizedTerm::default());
    };

    Ok(NormalizedTerm {
        id: top.id,
        full_name: top.full_name,
        category: top.category.as_ref().and_then(category_label),
    })
}

/// Categories arrive as a string or, on older payloads, a list of strings.
fn category_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }
}
